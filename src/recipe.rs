//! A single converge run: packages, services, config files, delayed restarts.

use std::path::Path;

use tracing::info;

use crate::attributes::Attributes;
use crate::config::Config;
use crate::error::Result;
use crate::render;
use crate::system::{ManagedFile, PackageInstaller, Service, ServiceManager};

/// A generated file and the services to restart when it changes.
#[derive(Debug, Clone)]
pub struct FileResource {
    pub file: ManagedFile,
    pub notifies: Vec<Service>,
}

/// Options for an apply run.
#[derive(Debug, Clone, Default)]
pub struct ApplyOptions<'a> {
    pub dry_run: bool,
    /// Stage every file under this directory instead of `/`. Packages and
    /// services are left alone while staging.
    pub root: Option<&'a Path>,
}

impl ApplyOptions<'_> {
    /// Whether package and service commands run on this host.
    pub fn touches_host(&self) -> bool {
        !self.dry_run && self.root.is_none()
    }
}

/// What an apply run changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub changed_files: Vec<String>,
    pub restarted: Vec<Service>,
    /// Package and service commands that actually ran.
    pub host_commands: Vec<String>,
}

/// Build the five generated files from resolved attributes.
pub fn files(config: &Config, attrs: &Attributes) -> Vec<FileResource> {
    vec![
        FileResource {
            file: ManagedFile::new(
                &config.ipsec_conf_path,
                render::ipsec_conf(&attrs.ipsec_conf),
                0o644,
            ),
            notifies: vec![Service::Ipsec],
        },
        FileResource {
            file: ManagedFile::new(
                &config.ipsec_secrets_path,
                render::ipsec_secrets(&attrs.ipsec_secrets),
                0o600,
            )
            .sensitive(),
            notifies: vec![Service::Ipsec],
        },
        FileResource {
            file: ManagedFile::new(
                config.chap_secrets_path(),
                render::chap_secrets(&attrs.users),
                0o600,
            )
            .sensitive(),
            notifies: vec![Service::Xl2tpd, Service::Ipsec],
        },
        FileResource {
            file: ManagedFile::new(
                config.xl2tpd_conf_path(),
                render::xl2tpd_conf(&attrs.xl2tpd_conf),
                0o644,
            ),
            notifies: vec![Service::Xl2tpd],
        },
        FileResource {
            file: ManagedFile::new(
                config.pppoptfile(),
                render::ppp_options(&attrs.ppp_options),
                0o644,
            ),
            notifies: vec![Service::Xl2tpd],
        },
    ]
}

/// Write every file and collect the services whose files changed, once each,
/// in first-notified order.
fn converge_files(resources: &[FileResource], options: &ApplyOptions<'_>) -> Result<ApplyReport> {
    let mut report = ApplyReport::default();

    for resource in resources {
        if !resource.file.converge(options.root, options.dry_run)? {
            continue;
        }
        report
            .changed_files
            .push(resource.file.target(options.root).display().to_string());
        for service in &resource.notifies {
            if !report.restarted.contains(service) {
                report.restarted.push(*service);
            }
        }
    }

    Ok(report)
}

/// Install, enable, write, then restart what changed.
pub async fn apply(
    config: &Config,
    attrs: &Attributes,
    options: &ApplyOptions<'_>,
) -> Result<ApplyReport> {
    let log_only = !options.touches_host();
    let mut host_commands = Vec::new();

    host_commands.extend(
        PackageInstaller::new(&config.ipsec_package, log_only)
            .install()
            .await?,
    );

    let services = ServiceManager::new(log_only);
    for service in Service::ALL {
        host_commands.extend(services.enable(service).await?);
    }

    let mut report = converge_files(&files(config, attrs), options)?;

    for service in &report.restarted {
        host_commands.extend(services.restart(*service).await?);
    }
    report.host_commands = host_commands;

    info!(
        "Converged: {} file(s) changed, {} service(s) restarted",
        report.changed_files.len(),
        report.restarted.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::network::{
        AddressFamily, AddressInfo, AddressScope, InterfaceInventory, InterfaceRecord,
    };
    use std::fs;

    fn attrs(config: &Config) -> Attributes {
        let inventory: InterfaceInventory = [InterfaceRecord::new("eth0").with_address(
            AddressInfo::new("203.0.113.5", AddressFamily::Inet, AddressScope::Global),
        )]
        .into_iter()
        .collect();
        Attributes::resolve(config, &inventory).unwrap()
    }

    #[test]
    fn test_file_modes_and_paths() {
        let config = Config::default();
        let resources = files(&config, &attrs(&config));

        let summary: Vec<(String, u32, bool)> = resources
            .iter()
            .map(|r| (r.file.path.display().to_string(), r.file.mode, r.file.sensitive))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("/etc/ipsec.conf".to_string(), 0o644, false),
                ("/etc/ipsec.secrets".to_string(), 0o600, true),
                ("/etc/ppp/chap-secrets".to_string(), 0o600, true),
                ("/etc/xl2tpd/xl2tpd.conf".to_string(), 0o644, false),
                ("/etc/ppp/options.xl2tpd".to_string(), 0o644, false),
            ]
        );
        assert!(resources[0].file.content.contains("\tlisten=203.0.113.5\n"));
    }

    #[test]
    fn test_restarts_deduplicated_and_only_on_change() {
        let root = std::env::temp_dir().join(format!("l2tp-ipsec-recipe-{}", std::process::id()));
        let _ = fs::remove_dir_all(&root);
        let options = ApplyOptions {
            dry_run: false,
            root: Some(&root),
        };
        let config = Config::default();
        let resources = files(&config, &attrs(&config));

        let first = converge_files(&resources, &options).unwrap();
        assert_eq!(first.changed_files.len(), 5);
        assert_eq!(first.restarted, vec![Service::Ipsec, Service::Xl2tpd]);

        let second = converge_files(&resources, &options).unwrap();
        assert_eq!(second, ApplyReport::default());

        // Only the pppd options change: xl2tpd alone restarts
        let config = Config {
            dns_servers: vec!["1.1.1.1".into()],
            ..Config::default()
        };
        let third = converge_files(&files(&config, &attrs(&config)), &options).unwrap();
        assert_eq!(third.restarted, vec![Service::Xl2tpd]);
        assert_eq!(third.changed_files.len(), 1);

        let _ = fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn test_dry_run_apply() {
        let config = Config::default();
        let root = std::env::temp_dir().join(format!("l2tp-ipsec-dry-{}", std::process::id()));
        let options = ApplyOptions {
            dry_run: true,
            root: Some(&root),
        };

        let report = apply(&config, &attrs(&config), &options).await.unwrap();
        assert_eq!(report.changed_files.len(), 5);
        assert_eq!(report.restarted, vec![Service::Ipsec, Service::Xl2tpd]);
        assert!(!root.exists());
        assert!(report.host_commands.is_empty());
    }

    #[tokio::test]
    async fn test_staged_apply_leaves_host_alone() {
        let config = Config::default();
        let root = std::env::temp_dir().join(format!("l2tp-ipsec-staged-{}", std::process::id()));
        let _ = fs::remove_dir_all(&root);
        let options = ApplyOptions {
            dry_run: false,
            root: Some(&root),
        };

        let report = apply(&config, &attrs(&config), &options).await.unwrap();
        assert!(report.host_commands.is_empty());
        assert_eq!(report.changed_files.len(), 5);
        assert_eq!(report.restarted, vec![Service::Ipsec, Service::Xl2tpd]);
        assert!(root.join("etc/ipsec.secrets").exists());

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_touches_host() {
        let stage = Path::new("/tmp/stage");
        let cases = [
            (false, None, true),
            (true, None, false),
            (false, Some(stage), false),
            (true, Some(stage), false),
        ];
        for (dry_run, root, expected) in cases {
            assert_eq!(ApplyOptions { dry_run, root }.touches_host(), expected);
        }
    }
}
