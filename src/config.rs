//! Provisioning preferences.
//!
//! Loaded from a small JSON file, `~/.config/l2tp-ipsec/config.json` unless
//! `--config` points elsewhere. Every field has a default, so an empty object
//! (or no file at the default location) yields a working server config.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{L2tpIpsecError, Result};

/// A CHAP account allowed to dial in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub password: String,
}

/// Persisted provisioning preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// IPsec implementation package (`openswan`, `strongswan`, `libreswan`).
    pub ipsec_package: String,

    /// Base name of the interface clients connect to. Aliases (`eth0:1`) are
    /// considered too.
    pub public_interface: String,
    /// Base name of the interface on the internal network.
    pub private_interface: String,

    pub users: Vec<User>,
    /// Pre-shared key for the IPsec secrets entry.
    pub psk: String,

    /// Network handed out over PPP; excluded from `virtual_private`.
    pub ppp_link_network: String,
    pub ip_range: String,
    pub local_ip: String,
    pub dns_servers: Vec<String>,

    pub xl2tpd_path: PathBuf,
    pub ppp_path: PathBuf,
    /// Defaults to `<ppp_path>/options.xl2tpd`.
    pub pppoptfile: Option<PathBuf>,
    pub ipsec_conf_path: PathBuf,
    pub ipsec_secrets_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ipsec_package: "openswan".into(),
            public_interface: "eth0".into(),
            private_interface: "eth0".into(),
            users: Vec::new(),
            psk: "preshared_secret".into(),
            ppp_link_network: "10.55.55.0/24".into(),
            ip_range: "10.55.55.5-10.55.55.100".into(),
            local_ip: "10.55.55.4".into(),
            dns_servers: vec!["8.8.8.8".into(), "8.8.4.4".into()],
            xl2tpd_path: PathBuf::from("/etc/xl2tpd"),
            ppp_path: PathBuf::from("/etc/ppp"),
            pppoptfile: None,
            ipsec_conf_path: PathBuf::from("/etc/ipsec.conf"),
            ipsec_secrets_path: PathBuf::from("/etc/ipsec.secrets"),
        }
    }
}

impl Config {
    /// Default config file path: `~/.config/l2tp-ipsec/config.json`.
    ///
    /// Returns `None` if the home/config directory can't be determined.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("l2tp-ipsec").join("config.json"))
    }

    /// Load the config.
    ///
    /// With an explicit path the file must exist. Without one, a missing file
    /// at the default location means defaults. A file that exists but doesn't
    /// parse is always an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) if p.exists() => p,
                _ => return Ok(Self::default()),
            },
        };

        let contents = fs::read_to_string(&path)
            .map_err(|e| L2tpIpsecError::Config(format!("{}: {}", path.display(), e)))?;

        Self::from_json(&contents)
            .map_err(|e| L2tpIpsecError::Config(format!("{}: {}", path.display(), e)))
    }

    fn from_json(contents: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(contents)
    }

    pub fn pppoptfile(&self) -> PathBuf {
        self.pppoptfile
            .clone()
            .unwrap_or_else(|| self.ppp_path.join("options.xl2tpd"))
    }

    pub fn chap_secrets_path(&self) -> PathBuf {
        self.ppp_path.join("chap-secrets")
    }

    pub fn xl2tpd_conf_path(&self) -> PathBuf {
        self.xl2tpd_path.join("xl2tpd.conf")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_uses_defaults() {
        let config = Config::from_json("{}").unwrap();
        assert_eq!(config.ipsec_package, "openswan");
        assert_eq!(config.public_interface, "eth0");
        assert_eq!(config.private_interface, "eth0");
        assert!(config.users.is_empty());
        assert_eq!(config.pppoptfile(), PathBuf::from("/etc/ppp/options.xl2tpd"));
        assert_eq!(config.chap_secrets_path(), PathBuf::from("/etc/ppp/chap-secrets"));
        assert_eq!(config.xl2tpd_conf_path(), PathBuf::from("/etc/xl2tpd/xl2tpd.conf"));
    }

    #[test]
    fn test_partial_override() {
        let config = Config::from_json(
            r#"{
  "public_interface": "ens3",
  "ppp_path": "/opt/ppp",
  "users": [{"name": "alice", "password": "s3cret"}]
}"#,
        )
        .unwrap();

        assert_eq!(config.public_interface, "ens3");
        assert_eq!(config.private_interface, "eth0");
        assert_eq!(config.pppoptfile(), PathBuf::from("/opt/ppp/options.xl2tpd"));
        assert_eq!(
            config.users,
            vec![User {
                name: "alice".into(),
                password: "s3cret".into()
            }]
        );
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let path = std::env::temp_dir().join(format!(
            "l2tp-ipsec-missing-{}.json",
            std::process::id()
        ));
        assert!(matches!(
            Config::load(Some(&path)),
            Err(L2tpIpsecError::Config(_))
        ));
    }

    #[test]
    fn test_malformed_file_is_error() {
        let path = std::env::temp_dir().join(format!(
            "l2tp-ipsec-malformed-{}.json",
            std::process::id()
        ));
        fs::write(&path, "{ not json").unwrap();
        let result = Config::load(Some(&path));
        let _ = fs::remove_file(&path);
        assert!(matches!(result, Err(L2tpIpsecError::Config(_))));
    }
}
