//! Reachability probes for the assistant process.
//!
//! `initialize` asks a probe whether the assistant is reachable. Several
//! strategies exist and any one success is enough, so the default is a
//! `ProbeChain` over all configured probes.
//!
//! Implementors should:
//! - Never panic; return an error describing why the probe failed
//! - Bound their own latency (local socket connects, one-shot process scans)

use std::env;
use std::path::PathBuf;

use sysinfo::System;

use crate::config::ProbeConfig;
use crate::error::{CompanionError, Result};

pub trait ConnectionProbe {
    /// Short identifier used in logs and aggregated errors.
    fn name(&self) -> &'static str;

    fn probe(&self) -> Result<()>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Environment variable
// ─────────────────────────────────────────────────────────────────────────────

/// Succeeds when a truthy marker variable is set (the assistant exports one
/// into every process it spawns).
#[derive(Debug, Clone)]
pub struct EnvProbe {
    var: String,
}

impl EnvProbe {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl ConnectionProbe for EnvProbe {
    fn name(&self) -> &'static str {
        "env"
    }

    fn probe(&self) -> Result<()> {
        match env::var(&self.var) {
            Ok(value) if is_truthy(&value) => Ok(()),
            Ok(value) => Err(CompanionError::ProbeFailed {
                probe: self.name().to_string(),
                details: format!("{}={} is not truthy", self.var, value),
            }),
            Err(_) => Err(CompanionError::ProbeFailed {
                probe: self.name().to_string(),
                details: format!("{} not set", self.var),
            }),
        }
    }
}

fn is_truthy(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "" | "0" | "false" | "no" | "off"
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Process list
// ─────────────────────────────────────────────────────────────────────────────

/// Scans the process table for a process whose name or command line
/// mentions the assistant binary.
#[derive(Debug, Clone)]
pub struct ProcessProbe {
    needle: String,
}

impl ProcessProbe {
    pub fn new(needle: impl Into<String>) -> Self {
        Self {
            needle: needle.into().to_ascii_lowercase(),
        }
    }

    fn matches(&self, name: &str, cmd: &[String]) -> bool {
        if name.to_ascii_lowercase().contains(&self.needle) {
            return true;
        }
        // node-based installs show up as `node .../bin/claude`
        cmd.iter().take(2).any(|arg| {
            std::path::Path::new(arg)
                .file_name()
                .map(|file| file.to_string_lossy().to_ascii_lowercase() == self.needle)
                .unwrap_or(false)
        })
    }
}

impl ConnectionProbe for ProcessProbe {
    fn name(&self) -> &'static str {
        "process"
    }

    fn probe(&self) -> Result<()> {
        let own_pid = std::process::id();
        let mut sys = System::new();
        sys.refresh_processes();

        let found = sys.processes().iter().any(|(pid, process)| {
            pid.as_u32() != own_pid && self.matches(process.name(), process.cmd())
        });

        if found {
            Ok(())
        } else {
            Err(CompanionError::ProbeFailed {
                probe: self.name().to_string(),
                details: format!("no running process matches '{}'", self.needle),
            })
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Socket trial
// ─────────────────────────────────────────────────────────────────────────────

/// Attempts a connection to a local socket the assistant listens on.
#[derive(Debug, Clone)]
pub struct SocketProbe {
    path: PathBuf,
}

impl SocketProbe {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl ConnectionProbe for SocketProbe {
    fn name(&self) -> &'static str {
        "socket"
    }

    #[cfg(unix)]
    fn probe(&self) -> Result<()> {
        use std::os::unix::net::UnixStream;

        // Connecting to a local socket either succeeds or is refused at once.
        UnixStream::connect(&self.path)
            .map(drop)
            .map_err(|err| CompanionError::ProbeFailed {
                probe: self.name().to_string(),
                details: format!("{}: {}", self.path.display(), err),
            })
    }

    #[cfg(not(unix))]
    fn probe(&self) -> Result<()> {
        Err(CompanionError::ProbeFailed {
            probe: self.name().to_string(),
            details: format!(
                "unix sockets unsupported on this platform ({})",
                self.path.display()
            ),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Chain
// ─────────────────────────────────────────────────────────────────────────────

/// Runs probes in order and stops at the first success.
#[derive(Default)]
pub struct ProbeChain {
    probes: Vec<Box<dyn ConnectionProbe>>,
}

impl ProbeChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, probe: impl ConnectionProbe + 'static) -> Self {
        self.probes.push(Box::new(probe));
        self
    }

    pub fn from_config(config: &ProbeConfig) -> Self {
        let mut chain = Self::new();
        if let Some(var) = config.env_var.as_deref().filter(|v| !v.is_empty()) {
            chain = chain.with(EnvProbe::new(var));
        }
        if let Some(path) = config.socket_path.clone() {
            chain = chain.with(SocketProbe::new(path));
        }
        if let Some(name) = config.process_name.as_deref().filter(|n| !n.is_empty()) {
            chain = chain.with(ProcessProbe::new(name));
        }
        chain
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }
}

impl ConnectionProbe for ProbeChain {
    fn name(&self) -> &'static str {
        "chain"
    }

    fn probe(&self) -> Result<()> {
        if self.probes.is_empty() {
            return Err(CompanionError::NotReachable(
                "no probes configured".to_string(),
            ));
        }

        let mut failures = Vec::with_capacity(self.probes.len());
        for probe in &self.probes {
            match probe.probe() {
                Ok(()) => {
                    tracing::debug!(probe = probe.name(), "Assistant probe succeeded");
                    return Ok(());
                }
                Err(err) => {
                    tracing::debug!(probe = probe.name(), error = %err, "Assistant probe failed");
                    failures.push(err.to_string());
                }
            }
        }

        Err(CompanionError::NotReachable(failures.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(bool);

    impl ConnectionProbe for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn probe(&self) -> Result<()> {
            if self.0 {
                Ok(())
            } else {
                Err(CompanionError::ProbeFailed {
                    probe: "fixed".to_string(),
                    details: "down".to_string(),
                })
            }
        }
    }

    #[test]
    fn chain_succeeds_if_any_probe_succeeds() {
        let chain = ProbeChain::new().with(Fixed(false)).with(Fixed(true));
        assert!(chain.probe().is_ok());
    }

    #[test]
    fn chain_aggregates_failures() {
        let chain = ProbeChain::new().with(Fixed(false)).with(Fixed(false));
        let err = chain.probe().unwrap_err().to_string();
        assert_eq!(err.matches("Probe fixed failed: down").count(), 2);
    }

    #[test]
    fn empty_chain_is_unreachable() {
        assert!(ProbeChain::new().probe().is_err());
    }

    #[test]
    fn env_probe_requires_truthy_value() {
        let var = "COMPANION_TEST_PROBE_MARKER";
        let probe = EnvProbe::new(var);

        env::remove_var(var);
        assert!(probe.probe().is_err());

        env::set_var(var, "0");
        assert!(probe.probe().is_err());

        env::set_var(var, "1");
        assert!(probe.probe().is_ok());
        env::remove_var(var);
    }

    #[test]
    fn process_probe_matches_name_or_script() {
        let probe = ProcessProbe::new("claude");
        assert!(probe.matches("claude", &[]));
        assert!(probe.matches(
            "node",
            &["node".to_string(), "/usr/local/bin/claude".to_string()]
        ));
        assert!(!probe.matches("node", &["node".to_string(), "server.js".to_string()]));
    }

    #[test]
    fn socket_probe_fails_for_missing_socket() {
        let dir = tempfile::tempdir().expect("temp dir");
        let probe = SocketProbe::new(dir.path().join("absent.sock"));
        assert!(probe.probe().is_err());
    }

    #[cfg(unix)]
    #[test]
    fn socket_probe_succeeds_against_listening_socket() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("assistant.sock");
        let _listener = std::os::unix::net::UnixListener::bind(&path).expect("bind");

        assert!(SocketProbe::new(path).probe().is_ok());
    }

    #[test]
    fn from_config_skips_empty_entries() {
        let config = ProbeConfig {
            env_var: Some(String::new()),
            process_name: None,
            socket_path: None,
        };
        assert!(ProbeChain::from_config(&config).is_empty());
        assert_eq!(ProbeChain::from_config(&ProbeConfig::default()).len(), 2);
    }
}
