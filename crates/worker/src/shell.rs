//! Platform-specific shell invocation, abstracted behind a trait so the
//! Executor's supervision logic stays platform-agnostic (SPEC_FULL.md §4.3,
//! REDESIGN FLAGS "worker platform coupling" — the source hard-codes
//! `cmd /C`; here POSIX and Windows implementations are chosen at compile
//! time instead).

use tokio::process::Command;

/// Builds the `tokio::process::Command` that runs an opaque command line
/// through the platform's default shell.
pub trait ShellInvocationBuilder: Send + Sync {
    fn build(&self, command: &str) -> Command;
}

#[derive(Default)]
pub struct DefaultShell;

#[cfg(unix)]
impl ShellInvocationBuilder for DefaultShell {
    fn build(&self, command: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd
    }
}

#[cfg(windows)]
impl ShellInvocationBuilder for DefaultShell {
    fn build(&self, command: &str) -> Command {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(command);
        cmd
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn posix_shell_runs_a_command() {
        let mut cmd = DefaultShell.build("echo hi");
        let output = cmd.output().await.unwrap();
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hi");
    }
}
