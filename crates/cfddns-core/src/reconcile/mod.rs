//! Record reconciliation
//!
//! Decides, for one hostname/type/address triple, whether the provider's
//! record must be created, updated, or left alone, and applies at most one
//! mutation.
//!
//! ## Decision Flow
//!
//! 1. Build the FQDN from hostname and zone
//! 2. Optional fast path: if DNS already serves the desired address, stop
//! 3. List the provider's records for (FQDN, type)
//! 4. Select the last exact match
//! 5. No match → create; same content → nothing; else → update

use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::record::{RecordRequest, RemoteRecord, Zone};
use crate::traits::{RecordStore, Resolution, Resolver};

/// Outcome of one reconciliation
#[derive(Debug)]
pub enum ReconcileOutcome {
    /// DNS already resolves to the desired address; the provider was not contacted
    UpToDate,
    /// The provider record already holds the desired address
    Unchanged { record_id: String },
    /// A new record was created
    Created { record: RemoteRecord },
    /// An existing record was overwritten
    Updated {
        record_id: String,
        previous: String,
    },
    /// A provider call failed
    Failed(Error),
}

impl ReconcileOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, ReconcileOutcome::Failed(_))
    }

    /// Whether the provider record was mutated
    pub fn is_change(&self) -> bool {
        matches!(
            self,
            ReconcileOutcome::Created { .. } | ReconcileOutcome::Updated { .. }
        )
    }

    /// Short label for logs and events
    pub fn label(&self) -> &'static str {
        match self {
            ReconcileOutcome::UpToDate => "up-to-date",
            ReconcileOutcome::Unchanged { .. } => "unchanged",
            ReconcileOutcome::Created { .. } => "created",
            ReconcileOutcome::Updated { .. } => "updated",
            ReconcileOutcome::Failed(_) => "failed",
        }
    }
}

/// Reconciles one record against the provider
///
/// Holds no mutable state, so a single instance can serve both families,
/// sequentially or concurrently.
pub struct Reconciler {
    store: Arc<dyn RecordStore>,
    resolver: Option<Arc<dyn Resolver>>,
}

impl Reconciler {
    /// Reconciler that always consults the provider
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            resolver: None,
        }
    }

    /// Enable the DNS fast path
    pub fn with_resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Bring the provider record for `request` in line with its desired address
    pub async fn reconcile(&self, zone: &Zone, request: &RecordRequest) -> ReconcileOutcome {
        let fqdn = zone.fqdn(&request.hostname);

        let resolved = self.resolve_hint(&fqdn, request).await;
        if resolved == Some(request.desired) {
            info!("{} {} is up to date", fqdn, request.desired);
            return ReconcileOutcome::UpToDate;
        }

        let records = match self.store.list(zone, &fqdn, request.record_type).await {
            Ok(records) => records,
            Err(e) => {
                return ReconcileOutcome::Failed(Error::ListRecords {
                    fqdn,
                    source: Box::new(e),
                });
            }
        };

        let desired = request.content();
        let candidate = select_candidate(&records, &fqdn, request, &desired, resolved);

        match candidate {
            None => self.create(zone, request, &desired).await,
            Some(record) if record.content == desired => {
                info!("{} not changed: {}", fqdn, desired);
                ReconcileOutcome::Unchanged {
                    record_id: record.id.clone(),
                }
            }
            Some(record) => self.update(zone, request, record, &desired).await,
        }
    }

    /// Advisory lookup; failures count as "not up to date"
    async fn resolve_hint(&self, fqdn: &str, request: &RecordRequest) -> Option<IpAddr> {
        let resolver = self.resolver.as_ref()?;
        match resolver.resolve(fqdn, request.record_type).await {
            Ok(Resolution::Address(ip)) => Some(ip),
            Ok(Resolution::Empty) => {
                debug!("{} has no {} record in DNS yet", fqdn, request.record_type);
                None
            }
            Err(e) => {
                warn!("Resolve {} failed: {}", fqdn, e);
                None
            }
        }
    }

    async fn create(&self, zone: &Zone, request: &RecordRequest, desired: &str) -> ReconcileOutcome {
        match self
            .store
            .create(zone, &request.hostname, request.record_type, desired)
            .await
        {
            Ok(record) => {
                info!("created record for {}", request.hostname);
                ReconcileOutcome::Created { record }
            }
            Err(e) => ReconcileOutcome::Failed(Error::CreateRecord {
                hostname: request.hostname.clone(),
                source: Box::new(e),
            }),
        }
    }

    async fn update(
        &self,
        zone: &Zone,
        request: &RecordRequest,
        record: &RemoteRecord,
        desired: &str,
    ) -> ReconcileOutcome {
        match self
            .store
            .update(
                zone,
                &record.id,
                &request.hostname,
                request.record_type,
                desired,
            )
            .await
        {
            Ok(()) => {
                info!(
                    "update record for {} ok ({} -> {})",
                    request.hostname, record.content, desired
                );
                ReconcileOutcome::Updated {
                    record_id: record.id.clone(),
                    previous: record.content.clone(),
                }
            }
            Err(e) => ReconcileOutcome::Failed(Error::UpdateRecord {
                hostname: request.hostname.clone(),
                record_id: record.id.clone(),
                source: Box::new(e),
            }),
        }
    }
}

/// Last record whose name and type match exactly
fn select_candidate<'a>(
    records: &'a [RemoteRecord],
    fqdn: &str,
    request: &RecordRequest,
    desired: &str,
    resolved: Option<IpAddr>,
) -> Option<&'a RemoteRecord> {
    let mut candidate = None;
    let mut matches = 0usize;

    for record in records {
        debug!(
            provider = %record.content,
            local = %desired,
            resolved = %resolved.map(|ip| ip.to_string()).unwrap_or_default(),
            "{} of {}",
            record.name,
            record.record_type
        );
        if record.matches(fqdn, request.record_type) {
            matches += 1;
            candidate = Some(record);
        }
    }

    if matches > 1 {
        warn!(
            "{} has {} {} records at the provider, using the last one",
            fqdn, matches, request.record_type
        );
    }

    candidate
}
