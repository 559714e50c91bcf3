//! Security Finding - Vulnerability data structures
//!
//! A rule reports a `Finding` against source text; the scan driver pins it to
//! a file and gives it a stable id, producing a `SecurityVulnerability`.

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::results::Severity;

/// Class of weakness a rule looks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanCategory {
    SqlInjection,
    CommandInjection,
    CodeInjection,
    PathTraversal,
    HardcodedSecrets,
    WeakCrypto,
    UncheckedInput,
    NaiveAuth,
    DangerousImport,
}

impl ScanCategory {
    pub const ALL: [ScanCategory; 9] = [
        ScanCategory::SqlInjection,
        ScanCategory::CommandInjection,
        ScanCategory::CodeInjection,
        ScanCategory::PathTraversal,
        ScanCategory::HardcodedSecrets,
        ScanCategory::WeakCrypto,
        ScanCategory::UncheckedInput,
        ScanCategory::NaiveAuth,
        ScanCategory::DangerousImport,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScanCategory::SqlInjection => "sql_injection",
            ScanCategory::CommandInjection => "command_injection",
            ScanCategory::CodeInjection => "code_injection",
            ScanCategory::PathTraversal => "path_traversal",
            ScanCategory::HardcodedSecrets => "hardcoded_secrets",
            ScanCategory::WeakCrypto => "weak_crypto",
            ScanCategory::UncheckedInput => "unchecked_input",
            ScanCategory::NaiveAuth => "naive_auth",
            ScanCategory::DangerousImport => "dangerous_import",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ScanCategory::SqlInjection => "SQL injection",
            ScanCategory::CommandInjection => "Command injection",
            ScanCategory::CodeInjection => "Code injection",
            ScanCategory::PathTraversal => "Path traversal",
            ScanCategory::HardcodedSecrets => "Hardcoded secret",
            ScanCategory::WeakCrypto => "Weak cryptography",
            ScanCategory::UncheckedInput => "Unchecked input",
            ScanCategory::NaiveAuth => "Naive authentication",
            ScanCategory::DangerousImport => "Dangerous import",
        }
    }
}

impl std::fmt::Display for ScanCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ScanCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|c| c.as_str()).collect();
                format!("unknown scan category '{}' (expected one of: {})", s, known.join(", "))
            })
    }
}

/// Source language a rule applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Python,
    /// JavaScript and TypeScript share one rule set
    JavaScript,
}

impl Language {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "py" => Some(Language::Python),
            "js" | "mjs" | "cjs" | "jsx" | "ts" | "tsx" => Some(Language::JavaScript),
            _ => None,
        }
    }
}

/// One rule match against source text, not yet tied to a file
#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    pub rule: &'static str,
    pub category: ScanCategory,
    pub severity: Severity,
    /// 1-based line of the match start
    pub line: usize,
    /// Exact matched text, hashed into the vulnerability id
    pub matched: String,
    /// The source line containing the match
    pub snippet: String,
    pub recommendation: &'static str,
    pub cwe: Option<&'static str>,
}

/// A detected vulnerability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityVulnerability {
    /// First 16 hex chars of SHA-256 over category, file and matched text
    pub id: String,
    pub severity: Severity,
    pub category: ScanCategory,
    pub file: String,
    pub line: usize,
    pub snippet: String,
    pub recommendation: String,
    pub rule: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwe: Option<String>,
}

impl SecurityVulnerability {
    pub fn from_finding(file: &str, finding: Finding) -> Self {
        Self {
            id: vulnerability_id(finding.category, file, &finding.matched),
            severity: finding.severity,
            category: finding.category,
            file: file.to_string(),
            line: finding.line,
            snippet: finding.snippet,
            recommendation: finding.recommendation.to_string(),
            rule: finding.rule.to_string(),
            cwe: finding.cwe.map(str::to_string),
        }
    }

    pub fn location(&self) -> String {
        format!("{}:{}", self.file, self.line)
    }
}

pub fn vulnerability_id(category: ScanCategory, file: &str, matched: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(category.as_str().as_bytes());
    hasher.update(b"|");
    hasher.update(file.as_bytes());
    hasher.update(b"|");
    hasher.update(matched.as_bytes());
    format!("{:x}", hasher.finalize())[..16].to_string()
}
