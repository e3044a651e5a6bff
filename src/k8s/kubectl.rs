//! kubectl invocation
//!
//! The port relay and log streaming primitives are long-lived kubectl
//! processes; this builds their commands with a consistent kubeconfig and
//! namespace.

use std::path::PathBuf;
use tokio::process::Command;

/// kubectl command builder bound to one kubeconfig and namespace
#[derive(Clone, Debug)]
pub struct Kubectl {
    binary: String,
    kubeconfig: Option<PathBuf>,
    namespace: String,
}

impl Kubectl {
    pub fn new(namespace: impl Into<String>, kubeconfig: Option<PathBuf>) -> Self {
        Self {
            binary: "kubectl".to_string(),
            kubeconfig,
            namespace: namespace.into(),
        }
    }

    /// Use a different kubectl executable
    #[cfg(test)]
    pub fn binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Global arguments followed by the subcommand arguments
    pub fn args<I, S>(&self, args: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut all = Vec::new();
        if let Some(ref kubeconfig) = self.kubeconfig {
            all.push("--kubeconfig".to_string());
            all.push(kubeconfig.to_string_lossy().to_string());
        }
        all.push("-n".to_string());
        all.push(self.namespace.clone());
        all.extend(args.into_iter().map(Into::into));
        all
    }

    /// Build a command ready to be spawned
    pub fn command<I, S>(&self, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut command = Command::new(&self.binary);
        command.args(self.args(args));
        command
    }
}
