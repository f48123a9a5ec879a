// # Address Probe Trait
//
// Defines the interface for discovering the host's outbound address.
//
// ## Implementations
//
// - UDP route probe: `cfddns-probe` crate
//
// ## Usage
//
// ```rust,ignore
// use cfddns_core::{AddressProbe, IpVersion, ProbeOutcome};
//
// let probe = /* AddressProbe implementation */;
// match probe.probe(IpVersion::V6).await {
//     ProbeOutcome::Address(ip) => println!("outbound v6: {}", ip),
//     ProbeOutcome::NotAvailable { reason } => println!("skip v6: {}", reason),
// }
// ```

use async_trait::async_trait;
use std::net::IpAddr;

use crate::record::IpVersion;

/// Result of probing one address family
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The network stack picked this local address for the route
    Address(IpAddr),
    /// The family has no usable route on this host; skip it this tick
    NotAvailable {
        /// Why the family was skipped (for logging)
        reason: String,
    },
}

impl ProbeOutcome {
    pub fn not_available(reason: impl Into<String>) -> Self {
        Self::NotAvailable {
            reason: reason.into(),
        }
    }
}

/// Trait for outbound address discovery
///
/// # Trust Level: Semi-Trusted
///
/// Probes may perform local socket I/O but must not send application
/// traffic, retry, or sleep. An unsupported family is reported as
/// [`ProbeOutcome::NotAvailable`], never as an error: the scheduler skips
/// that family for the tick and carries on with the other one.
#[async_trait]
pub trait AddressProbe: Send + Sync {
    /// Discover the local address used to reach the public internet for `version`
    async fn probe(&self, version: IpVersion) -> ProbeOutcome;
}
