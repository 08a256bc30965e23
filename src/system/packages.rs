//! Package installation via apt-get.

use tracing::info;

use crate::error::Result;

/// Packages every install needs besides the IPsec implementation.
pub const BASE_PACKAGES: &[&str] = &["lsof", "ppp", "xl2tpd"];

/// Installs the VPN packages.
pub struct PackageInstaller {
    packages: Vec<String>,
    dry_run: bool,
}

impl PackageInstaller {
    pub fn new(ipsec_package: &str, dry_run: bool) -> Self {
        let mut packages: Vec<String> = BASE_PACKAGES.iter().map(|p| p.to_string()).collect();
        if !packages.iter().any(|p| p == ipsec_package) {
            packages.push(ipsec_package.to_string());
        }
        Self { packages, dry_run }
    }

    #[cfg(test)]
    pub fn packages(&self) -> &[String] {
        &self.packages
    }

    /// Install all packages. apt-get is a no-op for ones already present.
    ///
    /// Returns the command line that ran, `None` when only logged.
    pub async fn install(&self) -> Result<Option<String>> {
        let mut args = vec!["install", "-y", "--no-install-recommends"];
        args.extend(self.packages.iter().map(String::as_str));
        let command = format!("apt-get {}", args.join(" "));

        if self.dry_run {
            info!("Would run: {}", command);
            return Ok(None);
        }

        super::run("apt-get", &args, &[("DEBIAN_FRONTEND", "noninteractive")]).await?;
        info!("Installed packages: {}", self.packages.join(" "));
        Ok(Some(command))
    }
}
