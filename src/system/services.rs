//! Service lifecycle via systemctl.

use std::fmt;

use tracing::info;

use crate::error::Result;

/// Daemons managed by the recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Service {
    Xl2tpd,
    Ipsec,
}

impl Service {
    pub const ALL: [Service; 2] = [Service::Xl2tpd, Service::Ipsec];

    pub fn unit(&self) -> &'static str {
        match self {
            Service::Xl2tpd => "xl2tpd",
            Service::Ipsec => "ipsec",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.unit())
    }
}

/// Enables and restarts services.
pub struct ServiceManager {
    dry_run: bool,
}

impl ServiceManager {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    /// Enable the service at boot.
    pub async fn enable(&self, service: Service) -> Result<Option<String>> {
        self.systemctl("enable", service).await
    }

    pub async fn restart(&self, service: Service) -> Result<Option<String>> {
        self.systemctl("restart", service).await
    }

    /// Returns the command line that ran, `None` when only logged.
    async fn systemctl(&self, action: &str, service: Service) -> Result<Option<String>> {
        let command = format!("systemctl {} {}", action, service.unit());

        if self.dry_run {
            info!("Would run: {}", command);
            return Ok(None);
        }

        super::run("systemctl", &[action, service.unit()], &[]).await?;
        info!("Service {}: {}", service, action);
        Ok(Some(command))
    }
}
