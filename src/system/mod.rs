//! System interaction modules for interfaces, packages, services, and files.

pub mod files;
pub mod network;
pub mod packages;
pub mod services;

pub use files::ManagedFile;
pub use network::{collect_inventory, load_inventory, InterfaceInventory};
pub use packages::PackageInstaller;
pub use services::{Service, ServiceManager};

use crate::error::{L2tpIpsecError, Result};
use tokio::process::Command;

/// Run a command to completion, mapping spawn failures and non-zero exits.
async fn run(program: &str, args: &[&str], envs: &[(&str, &str)]) -> Result<()> {
    let command = format!("{} {}", program, args.join(" "));

    let output = Command::new(program)
        .args(args)
        .envs(envs.iter().copied())
        .output()
        .await
        .map_err(|e| L2tpIpsecError::CommandFailed {
            command: command.clone(),
            message: e.to_string(),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(command_error(command, &stderr));
    }

    Ok(())
}

fn command_error(command: String, stderr: &str) -> L2tpIpsecError {
    if stderr.contains("Operation not permitted")
        || stderr.contains("Permission denied")
        || stderr.contains("are you root?")
    {
        return L2tpIpsecError::PermissionDenied;
    }
    L2tpIpsecError::CommandFailed {
        command,
        message: stderr.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_error_detects_permissions() {
        let err = command_error(
            "apt-get install -y ppp".into(),
            "E: Could not open lock file /var/lib/dpkg/lock-frontend - open (13: Permission denied)\nE: Unable to acquire the dpkg frontend lock, are you root?\n",
        );
        assert!(matches!(err, L2tpIpsecError::PermissionDenied));

        let err = command_error(
            "systemctl restart ipsec".into(),
            "Failed to restart ipsec.service: Unit ipsec.service not found.\n",
        );
        match err {
            L2tpIpsecError::CommandFailed { command, message } => {
                assert_eq!(command, "systemctl restart ipsec");
                assert_eq!(message, "Failed to restart ipsec.service: Unit ipsec.service not found.");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
