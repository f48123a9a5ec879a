// # Record Store Trait
//
// Defines the interface to the provider's record management API, scoped to
// a zone.
//
// ## Implementations
//
// - Cloudflare: `cfddns-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use cfddns_core::{RecordStore, RecordType, Zone};
//
// let store = /* RecordStore implementation */;
// let zone = Zone::new("023e105f4ecef8ad9ca31a8372d0c353", "example.com");
// let records = store.list(&zone, "www.example.com", RecordType::A).await?;
// ```

use async_trait::async_trait;

use crate::record::{RecordType, RemoteRecord, Zone};

/// Trait for DNS provider record stores
///
/// # Trust Level: Untrusted
///
/// Record stores are isolated, stateless and single-shot:
///
/// ## Allowed Capabilities
/// - ✅ Perform HTTP/HTTPS API calls to their endpoints only
/// - ✅ Parse provider-specific responses
/// - ✅ Return success or failure (the scheduler handles backoff)
///
/// ## Forbidden Capabilities
/// - ❌ Spawn tasks or threads
/// - ❌ Retry or back off (owned by `Scheduler`)
/// - ❌ Decide whether a mutation is needed (owned by `Reconciler`)
/// - ❌ Cache records between calls
///
/// Every call carries a bounded timeout so a hung request cannot block
/// shutdown indefinitely.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// List records in `zone` filtered by name and type
    ///
    /// The filter is a hint to the provider; the reconciler re-checks each
    /// returned record for an exact match.
    async fn list(
        &self,
        zone: &Zone,
        fqdn: &str,
        record_type: RecordType,
    ) -> crate::Result<Vec<RemoteRecord>>;

    /// Create a record for the relative `hostname`
    async fn create(
        &self,
        zone: &Zone,
        hostname: &str,
        record_type: RecordType,
        content: &str,
    ) -> crate::Result<RemoteRecord>;

    /// Overwrite the content of record `record_id`
    async fn update(
        &self,
        zone: &Zone,
        record_id: &str,
        hostname: &str,
        record_type: RecordType,
        content: &str,
    ) -> crate::Result<()>;

    /// Provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}
