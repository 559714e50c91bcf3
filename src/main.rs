//! mcpcheck - MCP Server Compliance, Load and Security Testing Harness

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mcpcheck::cli::{run, Cli};
use mcpcheck::HarnessError;

fn init_logging(verbosity: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbosity {
            0 => EnvFilter::new("mcpcheck=info"),
            1 => EnvFilter::new("mcpcheck=debug"),
            _ => EnvFilter::new("mcpcheck=trace"),
        }
    };

    // stderr keeps stdout clean for reports
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn print_banner() {
    eprintln!(
        "{} v{}",
        "mcpcheck".cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    if !cli.quiet {
        print_banner();
    }

    let code = match run::execute(&cli).await {
        Ok(code) => code,
        Err(e) => {
            match e.downcast::<HarnessError>() {
                Ok(harness) => eprintln!("{:?}", miette::Report::new(harness)),
                Err(other) => eprintln!("{} {:#}", "Error:".red().bold(), other),
            }
            1
        }
    };

    std::process::exit(code);
}
