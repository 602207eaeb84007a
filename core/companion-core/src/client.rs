//! Message channel to the assistant.

use std::process::{Command, Stdio};

use crate::error::{CompanionError, Result};

pub trait AssistantClient {
    fn query(&self, message: &str) -> Result<String>;
}

/// Sends one-shot prompts through the assistant CLI in print mode.
#[derive(Debug, Clone)]
pub struct CliClient {
    program: String,
    skip_permissions: bool,
}

impl CliClient {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            skip_permissions: false,
        }
    }

    pub fn skip_permissions(mut self, skip: bool) -> Self {
        self.skip_permissions = skip;
        self
    }

    fn args<'a>(&self, message: &'a str) -> Vec<&'a str> {
        let mut args = vec!["--print"];
        if self.skip_permissions {
            args.push("--dangerously-skip-permissions");
        }
        args.push(message);
        args
    }
}

impl Default for CliClient {
    fn default() -> Self {
        Self::new("claude")
    }
}

impl AssistantClient for CliClient {
    fn query(&self, message: &str) -> Result<String> {
        let output = Command::new(&self.program)
            .args(self.args(message))
            .stdin(Stdio::null())
            .output()
            .map_err(|err| CompanionError::QueryFailed(format!("{}: {}", self.program, err)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CompanionError::QueryFailed(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}
