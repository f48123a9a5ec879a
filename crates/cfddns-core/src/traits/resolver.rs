// # Resolver Trait
//
// Resolves a fully-qualified name to its currently published address.
//
// The answer is only a hint used by the reconciler to skip a provider
// round-trip when DNS already serves the desired address. The provider's
// record listing stays authoritative.
//
// ## Implementations
//
// - `SystemResolver`: platform resolver (`cfddns-resolver` crate)
// - `ExplicitResolver`: ordered list of DNS servers with per-query fallback

use async_trait::async_trait;
use std::net::IpAddr;

use crate::record::RecordType;

/// Successful lookup result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// First address of the requested type
    Address(IpAddr),
    /// The query succeeded but returned no records of that type
    Empty,
}

/// Trait for DNS resolution strategies
///
/// Chosen once at startup and shared read-only for the process lifetime.
/// Implementations bound each attempt with their own timeout and never retry
/// a failed query beyond their configured server list.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolve `fqdn` for `record_type`
    ///
    /// # Returns
    ///
    /// - `Ok(Resolution::Address(ip))`: first published address
    /// - `Ok(Resolution::Empty)`: the name has no record of that type
    /// - `Err(Error)`: the lookup itself failed
    async fn resolve(&self, fqdn: &str, record_type: RecordType) -> crate::Result<Resolution>;

    /// Short description for startup logging
    fn describe(&self) -> String;
}
