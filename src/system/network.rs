//! Interface inventory and global IPv4 address selection.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::error::{L2tpIpsecError, Result};

/// Longest interface name the kernel accepts (IFNAMSIZ minus the NUL).
const MAX_INTERFACE_NAME: usize = 15;

/// Address family tag as reported by the inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AddressFamily {
    Inet,
    Inet6,
    Other,
}

impl AddressFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            AddressFamily::Inet => "inet",
            AddressFamily::Inet6 => "inet6",
            AddressFamily::Other => "other",
        }
    }
}

impl From<String> for AddressFamily {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "inet" => AddressFamily::Inet,
            "inet6" => AddressFamily::Inet6,
            _ => AddressFamily::Other,
        }
    }
}

impl From<AddressFamily> for String {
    fn from(value: AddressFamily) -> Self {
        value.as_str().to_string()
    }
}

/// Reachability scope of an address.
///
/// iproute2 reports `global`, other inventories `Global`; both parse the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AddressScope {
    Global,
    Link,
    Host,
    Other,
}

impl AddressScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            AddressScope::Global => "Global",
            AddressScope::Link => "Link",
            AddressScope::Host => "Host",
            AddressScope::Other => "Other",
        }
    }
}

impl From<String> for AddressScope {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "global" => AddressScope::Global,
            "link" => AddressScope::Link,
            "host" => AddressScope::Host,
            _ => AddressScope::Other,
        }
    }
}

impl From<AddressScope> for String {
    fn from(value: AddressScope) -> Self {
        value.as_str().to_string()
    }
}

/// One address assigned to an interface. `address` doubles as the mapping key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressInfo {
    pub address: String,
    pub family: AddressFamily,
    pub scope: AddressScope,
}

impl AddressInfo {
    pub fn new(address: impl Into<String>, family: AddressFamily, scope: AddressScope) -> Self {
        Self {
            address: address.into(),
            family,
            scope,
        }
    }

    fn is_global_ipv4(&self) -> bool {
        self.family == AddressFamily::Inet && self.scope == AddressScope::Global
    }
}

/// A network interface (or alias such as `eth0:1`) and its addresses in
/// the order the inventory listed them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceRecord {
    pub name: String,
    #[serde(default)]
    pub addresses: Vec<AddressInfo>,
}

impl InterfaceRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            addresses: Vec::new(),
        }
    }

    /// Insert an address keyed by its string form. An existing entry with the
    /// same key is replaced in place, keeping its position.
    pub fn insert_address(&mut self, info: AddressInfo) {
        match self.addresses.iter_mut().find(|a| a.address == info.address) {
            Some(existing) => *existing = info,
            None => self.addresses.push(info),
        }
    }

    pub fn with_address(mut self, info: AddressInfo) -> Self {
        self.insert_address(info);
        self
    }
}

/// Every interface known to the host, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InterfaceInventory {
    interfaces: Vec<InterfaceRecord>,
}

impl InterfaceInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record, replacing any record with the same name in place.
    pub fn insert(&mut self, record: InterfaceRecord) {
        match self.interfaces.iter_mut().find(|r| r.name == record.name) {
            Some(existing) => *existing = record,
            None => self.interfaces.push(record),
        }
    }

    #[cfg(test)]
    pub fn get(&self, name: &str) -> Option<&InterfaceRecord> {
        self.interfaces.iter().find(|r| r.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &InterfaceRecord> {
        self.interfaces.iter()
    }

    pub fn len(&self) -> usize {
        self.interfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }
}

impl FromIterator<InterfaceRecord> for InterfaceInventory {
    fn from_iter<I: IntoIterator<Item = InterfaceRecord>>(iter: I) -> Self {
        let mut inventory = Self::new();
        for record in iter {
            inventory.insert(record);
        }
        inventory
    }
}

/// Selects a base interface and its numbered aliases: `eth0`, `eth0:0`,
/// `eth0:12`, but never `veth0`, `eth0x` or `eth0:`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfacePattern {
    base: String,
}

impl InterfacePattern {
    /// Build a pattern from a configured base name.
    ///
    /// Rejects names the kernel would never report, so a typo in the config
    /// halts the run instead of silently resolving nothing.
    pub fn new(base: &str) -> Result<Self> {
        let invalid = |reason: &str| L2tpIpsecError::InvalidInterfacePattern {
            name: base.to_string(),
            reason: reason.to_string(),
        };

        if base.is_empty() {
            return Err(invalid("name is empty"));
        }
        if base.len() > MAX_INTERFACE_NAME {
            return Err(invalid("name is longer than 15 bytes"));
        }
        if base.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(invalid("name contains whitespace"));
        }
        if base.contains(':') {
            return Err(invalid("alias suffix belongs to the interface, not the base name"));
        }
        if base.contains('/') {
            return Err(invalid("name contains '/'"));
        }

        Ok(Self {
            base: base.to_string(),
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn matches(&self, name: &str) -> bool {
        match name.strip_prefix(self.base.as_str()) {
            Some("") => true,
            Some(rest) => rest.strip_prefix(':').is_some_and(|index| {
                !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit())
            }),
            None => false,
        }
    }
}

/// Return the first global-scope IPv4 address found on interfaces matching
/// `pattern`, walking interfaces and then their addresses in inventory order.
///
/// Other qualifying addresses are discarded. `None` when nothing qualifies.
pub fn resolve_global_ipv4(
    inventory: &InterfaceInventory,
    pattern: &InterfacePattern,
) -> Option<String> {
    inventory
        .iter()
        .filter(|record| pattern.matches(&record.name))
        .flat_map(|record| record.addresses.iter())
        .find(|info| info.is_global_ipv4())
        .map(|info| info.address.clone())
}

/// Enumerate the host's interfaces via `ip -j addr show`.
pub async fn collect_inventory() -> Result<InterfaceInventory> {
    let output = Command::new("ip")
        .args(["-j", "addr", "show"])
        .output()
        .await
        .map_err(|e| L2tpIpsecError::CommandFailed {
            command: "ip -j addr show".into(),
            message: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(L2tpIpsecError::CommandFailed {
            command: "ip -j addr show".into(),
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_ip_json(&stdout)
}

/// Read an inventory saved as JSON (the serde form of `InterfaceInventory`).
pub fn load_inventory(path: &Path) -> Result<InterfaceInventory> {
    let contents = fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(|e| {
        L2tpIpsecError::ParseError(format!("inventory {}: {}", path.display(), e))
    })
}

#[derive(Debug, Deserialize)]
struct IpLink {
    ifname: String,
    #[serde(default)]
    addr_info: Vec<IpAddrInfo>,
}

#[derive(Debug, Deserialize)]
struct IpAddrInfo {
    #[serde(default)]
    family: Option<String>,
    #[serde(default)]
    local: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    label: Option<String>,
}

/// Parse `ip -j addr show` output.
///
/// IPv4 aliases carry their own label (`eth0:1`) and become separate records,
/// ordered by first appearance.
fn parse_ip_json(output: &str) -> Result<InterfaceInventory> {
    let links: Vec<IpLink> = serde_json::from_str(output)
        .map_err(|e| L2tpIpsecError::ParseError(format!("ip -j addr: {}", e)))?;

    let mut records: Vec<InterfaceRecord> = Vec::new();

    for link in links {
        // Links without addresses still belong to the inventory
        if !records.iter().any(|r| r.name == link.ifname) {
            records.push(InterfaceRecord::new(link.ifname.clone()));
        }

        for addr in link.addr_info {
            // iproute2 emits `{}` placeholders for some address entries
            let Some(local) = addr.local else {
                continue;
            };

            let info = AddressInfo::new(
                local,
                AddressFamily::from(addr.family.unwrap_or_default()),
                AddressScope::from(addr.scope.unwrap_or_default()),
            );

            let name = addr.label.unwrap_or_else(|| link.ifname.clone());
            match records.iter_mut().find(|r| r.name == name) {
                Some(record) => record.insert_address(info),
                None => records.push(InterfaceRecord::new(name).with_address(info)),
            }
        }
    }

    Ok(records.into_iter().collect())
}
