// # cfddns-core
//
// Core library for the cfddns dynamic DNS agent.
//
// ## Architecture Overview
//
// - **AddressProbe**: Trait for discovering the outbound address per family
// - **Resolver**: Trait for looking up what DNS currently publishes
// - **RecordStore**: Trait for the provider's record list/create/update API
// - **Reconciler**: Decides and applies create/update/no-op for one record
// - **Scheduler**: Immediate first run, fixed interval, doubling backoff, shutdown
//
// ## Design Principles
//
// 1. **Explicit configuration**: one immutable `AgentConfig`, no globals
// 2. **Injected strategies**: resolver, probe and store are chosen once at startup
// 3. **Single owner of retry**: only the scheduler waits or retries
// 4. **Library-First**: the daemon is a thin wiring layer over this crate

pub mod config;
pub mod error;
pub mod reconcile;
pub mod record;
pub mod scheduler;
pub mod traits;

// Re-export core types for convenience
pub use config::{AgentConfig, BackoffPolicy, Credentials, FamilySetting, ResolverMode, ServerEndpoint};
pub use error::{Error, Result};
pub use reconcile::{ReconcileOutcome, Reconciler};
pub use record::{IpVersion, RecordRequest, RecordType, RemoteRecord, Zone, fqdn};
pub use scheduler::{Scheduler, SchedulerEvent, SchedulerState, TickReport};
pub use traits::{AddressProbe, ProbeOutcome, RecordStore, Resolution, Resolver};
