//! Manages a local Bento cluster (HDFS + HBase + MapReduce in a box).
//!
//! The cluster is opaque to the rest of the harness: it can be started and
//! stopped, nothing else. The `bin/bento` script records its PID under
//! `state/`, which is also how a still-running cluster from an earlier run
//! is detected and reused.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::common::check;
use crate::common::shell::{LocalShell, ShellCmd};

pub struct BentoCluster {
    home: PathBuf,
    pid: Option<i32>,
}

impl BentoCluster {
    /// Wrap the Bento installation at `home`, validating that it looks like
    /// one.
    pub fn new<P: Into<PathBuf>>(home: P) -> Result<BentoCluster, failure::Error> {
        let home = home.into();
        if !home.exists() {
            return Err(failure::format_err!(
                "BentoCluster root directory not found: {:?}",
                home
            ));
        }
        if !home.join("bin").join("bento").exists() {
            return Err(failure::format_err!("Invalid Bento home dir: {:?}", home));
        }
        Ok(BentoCluster { home, pid: None })
    }

    fn pid_file(&self) -> PathBuf {
        self.home.join("state").join("bento-cluster.pid")
    }

    fn checkin_pid_file(&self) -> PathBuf {
        self.home.join("state").join("checkin-daemon.pid")
    }

    /// Start the cluster, unless the PID file names a process that is still
    /// alive, in which case that cluster is reused.
    pub fn start(&mut self, shell: &LocalShell) -> Result<(), failure::Error> {
        if let Some(pid) = read_pid(&self.pid_file())? {
            if process_is_alive(pid) {
                info!("Bento cluster already started as PID={}", pid);
                self.pid = Some(pid);
            } else {
                // Stale PID file, remove and start a new Bento.
                fs::remove_file(self.pid_file())?;
            }
        }

        if self.pid.is_none() {
            let start = shell.run(
                ShellCmd::args(vec!["bin/bento", "start"])
                    .cwd(&self.home)
                    .env("BENTO_LOG_ENABLE", "1"),
            )?;
            check::expect_zero(&start)?;

            let pid = read_pid(&self.pid_file())?.ok_or_else(|| {
                failure::format_err!("bento start left no PID file at {:?}", self.pid_file())
            })?;
            info!("Bento cluster created and started as PID={}", pid);
            self.pid = Some(pid);
        }

        Ok(())
    }

    /// Stop the running cluster, if any, along with its check-in daemon.
    /// Failures to kill are logged and ignored; the PID files are removed
    /// either way.
    pub fn stop(&mut self, shell: &LocalShell) -> Result<(), failure::Error> {
        let pid = match self.pid.take() {
            Some(pid) => pid,
            None => {
                info!("Bento cluster not started, nothing to stop.");
                return Ok(());
            }
        };

        info!("Killing Bento cluster running as PID={}", pid);
        kill(shell, pid)?;
        if self.pid_file().exists() {
            fs::remove_file(self.pid_file())?;
        }

        if let Some(pid) = read_pid(&self.checkin_pid_file())? {
            debug!("Killing Bento check-in daemon running as PID={}", pid);
            kill(shell, pid)?;
            fs::remove_file(self.checkin_pid_file())?;
        }

        Ok(())
    }
}

fn kill(shell: &LocalShell, pid: i32) -> Result<(), failure::Error> {
    // bash's builtin kill, so no external binary is needed.
    let kill = shell.run(cmd!("kill -9 {}", pid))?;
    if kill.status != 0 {
        debug!(
            "Could not kill process with PID={}: {}",
            pid,
            kill.stderr.trim()
        );
    }
    Ok(())
}

fn read_pid(path: &Path) -> Result<Option<i32>, failure::Error> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)?;
    Ok(Some(raw.trim().parse::<i32>()?))
}

fn process_is_alive(pid: i32) -> bool {
    Path::new(&format!("/proc/{}", pid)).exists()
}
