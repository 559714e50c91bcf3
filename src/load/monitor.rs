//! Child process resource sampling

use sysinfo::{Pid, ProcessesToUpdate, System};

use super::stats::ResourceSample;

/// Samples CPU and memory of one process
pub struct ResourceMonitor {
    system: System,
    pid: Pid,
}

impl ResourceMonitor {
    pub fn new(pid: u32) -> Self {
        let pid = Pid::from_u32(pid);
        let mut system = System::new();
        // CPU usage is a delta between refreshes; prime the first one
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        Self { system, pid }
    }

    /// Monitor for an optional pid (mock exchanges have none)
    pub fn for_pid(pid: Option<u32>) -> Option<Self> {
        pid.map(Self::new)
    }

    /// Current usage, or `None` if the process is gone
    pub fn sample(&mut self) -> Option<ResourceSample> {
        self.system
            .refresh_processes(ProcessesToUpdate::Some(&[self.pid]), true);
        let process = self.system.process(self.pid)?;
        Some(ResourceSample {
            memory_mb: process.memory() as f64 / (1024.0 * 1024.0),
            cpu_pct: process.cpu_usage() as f64,
        })
    }
}
