//! Core traits for the cfddns agent
//!
//! - [`AddressProbe`]: discover the outbound address per family
//! - [`Resolver`]: look up what DNS currently publishes
//! - [`RecordStore`]: list/create/update records at the provider

pub mod address_probe;
pub mod record_store;
pub mod resolver;

pub use address_probe::{AddressProbe, ProbeOutcome};
pub use record_store::RecordStore;
pub use resolver::{Resolution, Resolver};
