//! Resolved provisioning attributes.
//!
//! Built once from the config and the interface inventory, then handed by
//! reference to the renderers. Nothing is resolved lazily or stored globally.

use tracing::debug;

use crate::config::{Config, User};
use crate::error::Result;
use crate::system::network::{resolve_global_ipv4, InterfaceInventory, InterfacePattern};

const CIPHERS: &str = "aes256-sha1,aes128-sha1,3des-sha1";

/// A named block of `key -> value` entries, in output order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    pub entries: Vec<(String, String)>,
}

impl Section {
    fn new(name: &str, entries: &[(&str, &str)]) -> Self {
        Self {
            name: name.to_string(),
            entries: entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[cfg(test)]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Everything the renderers need, fully resolved.
#[derive(Debug, Clone)]
pub struct Attributes {
    pub public_ip: Option<String>,
    pub private_ip: Option<String>,
    pub ipsec_conf: Vec<Section>,
    /// `selector -> secret` lines of ipsec.secrets.
    pub ipsec_secrets: Vec<(String, String)>,
    pub xl2tpd_conf: Vec<Section>,
    /// pppd options; list options appear once per value.
    pub ppp_options: Vec<(String, String)>,
    pub users: Vec<User>,
}

impl Attributes {
    /// Resolve the public and private addresses and derive every config block.
    ///
    /// Fails only if an interface name in the config can't form a pattern.
    /// A missing address is not an error and renders as an empty string.
    pub fn resolve(config: &Config, inventory: &InterfaceInventory) -> Result<Self> {
        let public_pattern = InterfacePattern::new(&config.public_interface)?;
        let private_pattern = InterfacePattern::new(&config.private_interface)?;

        let public_ip = resolve_global_ipv4(inventory, &public_pattern);
        debug!(
            "Using public IP {} for l2tp-ipsec from public interface {}",
            public_ip.as_deref().unwrap_or(""),
            public_pattern.base()
        );

        let private_ip = resolve_global_ipv4(inventory, &private_pattern);
        debug!(
            "Using private IP {} for l2tp-ipsec from private interface {}",
            private_ip.as_deref().unwrap_or(""),
            private_pattern.base()
        );

        Ok(Self::derive(config, public_ip, private_ip))
    }

    fn derive(config: &Config, public_ip: Option<String>, private_ip: Option<String>) -> Self {
        let public = public_ip.clone().unwrap_or_default();
        let private = private_ip.clone().unwrap_or_default();

        let virtual_private = format!(
            "%v4:!{},%v4:!{}/32",
            config.ppp_link_network, private
        );

        let ipsec_conf = vec![
            Section::new("version 2", &[]),
            Section::new(
                "config setup",
                &[
                    ("dumpdir", "/var/run/pluto/"),
                    ("nat_traversal", "yes"),
                    ("virtual_private", virtual_private.as_str()),
                    ("protostack", "netkey"),
                    ("force_keepalive", "yes"),
                    ("keep_alive", "60"),
                    ("listen", public.as_str()),
                ],
            ),
            Section::new(
                "conn L2TP-PSK-noNAT",
                &[
                    ("authby", "secret"),
                    ("pfs", "no"),
                    ("auto", "add"),
                    ("keyingtries", "3"),
                    ("rekey", "no"),
                    ("ike", CIPHERS),
                    ("phase2alg", CIPHERS),
                    // iOS never sends delete notify
                    ("dpddelay", "30"),
                    ("dpdtimeout", "120"),
                    ("dpdaction", "clear"),
                    ("ikelifetime", "8h"),
                    ("keylife", "1h"),
                    ("type", "transport"),
                    ("left", public.as_str()),
                    ("leftprotoport", "17/1701"),
                    ("right", "%any"),
                    ("rightprotoport", "17/%any"),
                ],
            ),
        ];

        let ipsec_secrets = vec![(
            format!("{} %any", public),
            format!("PSK \"{}\"", config.psk),
        )];

        let pppoptfile = config.pppoptfile().display().to_string();
        let xl2tpd_conf = vec![
            Section::new("global", &[("ipsec saref", "yes")]),
            Section::new(
                "lns default",
                &[
                    ("ip range", config.ip_range.as_str()),
                    ("local ip", config.local_ip.as_str()),
                    ("refuse chap", "yes"),
                    ("refuse pap", "yes"),
                    ("require authentication", "yes"),
                    ("ppp debug", "yes"),
                    ("pppoptfile", pppoptfile.as_str()),
                    ("length bit", "yes"),
                ],
            ),
        ];

        let mut ppp_options: Vec<(String, String)> = vec![("require-mschap-v2".into(), String::new())];
        for server in &config.dns_servers {
            ppp_options.push(("ms-dns".into(), server.clone()));
        }
        ppp_options.extend(
            [
                ("asyncmap", "0"),
                ("auth", ""),
                ("crtscts", ""),
                ("lock", ""),
                ("hide-password", ""),
                ("modem", ""),
                ("name", "l2tpd"),
                ("proxyarp", ""),
                ("lcp-echo-interval", "30"),
                ("lcp-echo-failure", "4"),
            ]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string())),
        );

        Self {
            public_ip,
            private_ip,
            ipsec_conf,
            ipsec_secrets,
            xl2tpd_conf,
            ppp_options,
            users: config.users.clone(),
        }
    }

    #[cfg(test)]
    pub fn ipsec_section(&self, name: &str) -> Option<&Section> {
        self.ipsec_conf.iter().find(|s| s.name == name)
    }
}
