//! Record data model
//!
//! Types shared by the reconciler, the resolvers and the provider client.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// IP version (v4 or v6)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpVersion {
    V4,
    V6,
}

impl IpVersion {
    /// Both families, in the order a tick processes them
    pub const ALL: [IpVersion; 2] = [IpVersion::V4, IpVersion::V6];

    /// The IP version of an address
    pub fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => IpVersion::V4,
            IpAddr::V6(_) => IpVersion::V6,
        }
    }

    /// The DNS record type published for this family
    pub fn record_type(self) -> RecordType {
        match self {
            IpVersion::V4 => RecordType::A,
            IpVersion::V6 => RecordType::Aaaa,
        }
    }
}

impl fmt::Display for IpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpVersion::V4 => f.write_str("IPv4"),
            IpVersion::V6 => f.write_str("IPv6"),
        }
    }
}

/// DNS record type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordType {
    /// A record (IPv4)
    #[serde(rename = "A")]
    A,
    /// AAAA record (IPv6)
    #[serde(rename = "AAAA")]
    Aaaa,
}

impl RecordType {
    /// Wire name of the record type
    pub fn as_str(self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
        }
    }

    /// The address family this record type carries
    pub fn ip_version(self) -> IpVersion {
        match self {
            RecordType::A => IpVersion::V4,
            RecordType::Aaaa => IpVersion::V6,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "A" => Ok(RecordType::A),
            "AAAA" => Ok(RecordType::Aaaa),
            other => Err(crate::Error::invalid_input(format!(
                "unsupported record type: {}",
                other
            ))),
        }
    }
}

/// A provider zone, resolved once at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    /// Provider-assigned zone identifier
    id: String,
    /// Domain name, e.g. "example.com"
    name: String,
}

impl Zone {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Join a relative hostname with the zone's domain
    pub fn fqdn(&self, hostname: &str) -> String {
        fqdn(hostname, &self.name)
    }
}

/// `hostname + "." + zone`, with no normalization of either side
pub fn fqdn(hostname: &str, zone_name: &str) -> String {
    format!("{}.{}", hostname, zone_name)
}

/// What one family wants published this tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordRequest {
    /// Relative hostname, e.g. "www"
    pub hostname: String,
    pub record_type: RecordType,
    pub desired: IpAddr,
}

impl RecordRequest {
    /// Build a request; the record type follows the address family
    pub fn new(hostname: impl Into<String>, desired: IpAddr) -> Self {
        Self {
            hostname: hostname.into(),
            record_type: IpVersion::of(&desired).record_type(),
            desired,
        }
    }

    /// Desired record content as the provider stores it
    pub fn content(&self) -> String {
        self.desired.to_string()
    }
}

/// A record as the provider stores it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRecord {
    /// Provider-assigned record identifier
    pub id: String,
    /// Fully-qualified name as returned by the provider
    pub name: String,
    /// Record type as returned by the provider ("A", "AAAA", ...)
    #[serde(rename = "type")]
    pub record_type: String,
    /// Record content (the address string for A/AAAA)
    pub content: String,
}

impl RemoteRecord {
    /// Exact, case-sensitive match on name and type
    pub fn matches(&self, fqdn: &str, record_type: RecordType) -> bool {
        self.name == fqdn && self.record_type == record_type.as_str()
    }
}
