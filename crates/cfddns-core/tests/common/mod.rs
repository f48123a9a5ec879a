//! Test doubles and common utilities for contract tests
//!
//! Minimal in-memory doubles that record every call so tests can assert on
//! exactly which provider operations happened.

#![allow(dead_code)]

use cfddns_core::error::{Error, Result};
use cfddns_core::traits::{AddressProbe, ProbeOutcome, RecordStore, Resolution, Resolver};
use cfddns_core::{AgentConfig, BackoffPolicy, IpVersion, RecordType, RemoteRecord, Zone};
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const ZONE_ID: &str = "zone-1234";
pub const ZONE_NAME: &str = "example.com";
pub const HOSTNAME: &str = "www";

pub fn zone() -> Zone {
    Zone::new(ZONE_ID, ZONE_NAME)
}

pub fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

pub fn remote(id: &str, name: &str, rtype: &str, content: &str) -> RemoteRecord {
    RemoteRecord {
        id: id.to_string(),
        name: name.to_string(),
        record_type: rtype.to_string(),
        content: content.to_string(),
    }
}

/// A recorded mutation call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Create {
        hostname: String,
        record_type: RecordType,
        content: String,
    },
    Update {
        record_id: String,
        hostname: String,
        record_type: RecordType,
        content: String,
    },
}

/// In-memory RecordStore that counts calls and can be told to fail
#[derive(Clone, Default)]
pub struct MockRecordStore {
    records: Arc<Mutex<Vec<RemoteRecord>>>,
    mutations: Arc<Mutex<Vec<Mutation>>>,
    list_calls: Arc<AtomicUsize>,
    /// Number of upcoming list() calls that fail
    failing_lists: Arc<AtomicUsize>,
    fail_mutations: Arc<Mutex<bool>>,
    next_id: Arc<AtomicUsize>,
}

impl MockRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<RemoteRecord>) -> Self {
        let store = Self::new();
        *store.records.lock().unwrap() = records;
        store
    }

    /// Fail the next `n` list() calls
    pub fn fail_next_lists(&self, n: usize) {
        self.failing_lists.store(n, Ordering::SeqCst);
    }

    pub fn fail_mutations(&self, fail: bool) {
        *self.fail_mutations.lock().unwrap() = fail;
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn mutations(&self) -> Vec<Mutation> {
        self.mutations.lock().unwrap().clone()
    }

    pub fn records(&self) -> Vec<RemoteRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl RecordStore for MockRecordStore {
    async fn list(
        &self,
        zone: &Zone,
        fqdn: &str,
        record_type: RecordType,
    ) -> Result<Vec<RemoteRecord>> {
        assert_eq!(zone.id(), ZONE_ID, "calls must stay scoped to the zone");
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        let failing = self.failing_lists.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_lists.store(failing - 1, Ordering::SeqCst);
            return Err(Error::provider("mock", "Provider unavailable"));
        }

        // Like a real provider: filter on name and type
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.name == fqdn && r.record_type == record_type.as_str())
            .cloned()
            .collect())
    }

    async fn create(
        &self,
        zone: &Zone,
        hostname: &str,
        record_type: RecordType,
        content: &str,
    ) -> Result<RemoteRecord> {
        self.mutations.lock().unwrap().push(Mutation::Create {
            hostname: hostname.to_string(),
            record_type,
            content: content.to_string(),
        });
        if *self.fail_mutations.lock().unwrap() {
            return Err(Error::provider("mock", "create rejected"));
        }

        let id = format!("new-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let record = remote(&id, &zone.fqdn(hostname), record_type.as_str(), content);
        self.records.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        _zone: &Zone,
        record_id: &str,
        hostname: &str,
        record_type: RecordType,
        content: &str,
    ) -> Result<()> {
        self.mutations.lock().unwrap().push(Mutation::Update {
            record_id: record_id.to_string(),
            hostname: hostname.to_string(),
            record_type,
            content: content.to_string(),
        });
        if *self.fail_mutations.lock().unwrap() {
            return Err(Error::provider("mock", "update rejected"));
        }

        let mut records = self.records.lock().unwrap();
        if let Some(r) = records.iter_mut().find(|r| r.id == record_id) {
            r.content = content.to_string();
        }
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// Probe with a fixed answer per family
#[derive(Clone)]
pub struct ScriptedProbe {
    v4: ProbeOutcome,
    v6: ProbeOutcome,
    calls: Arc<Mutex<Vec<IpVersion>>>,
}

impl ScriptedProbe {
    pub fn new(v4: ProbeOutcome, v6: ProbeOutcome) -> Self {
        Self {
            v4,
            v6,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn v4_only(addr: &str) -> Self {
        Self::new(
            ProbeOutcome::Address(ip(addr)),
            ProbeOutcome::not_available("network is unreachable"),
        )
    }

    pub fn calls(&self) -> Vec<IpVersion> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl AddressProbe for ScriptedProbe {
    async fn probe(&self, version: IpVersion) -> ProbeOutcome {
        self.calls.lock().unwrap().push(version);
        match version {
            IpVersion::V4 => self.v4.clone(),
            IpVersion::V6 => self.v6.clone(),
        }
    }
}

/// Resolver with a fixed answer
pub struct FixedResolver {
    answer: std::result::Result<Resolution, String>,
    calls: Arc<AtomicUsize>,
}

impl FixedResolver {
    pub fn address(addr: &str) -> Self {
        Self {
            answer: Ok(Resolution::Address(ip(addr))),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn empty() -> Self {
        Self {
            answer: Ok(Resolution::Empty),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing(msg: &str) -> Self {
        Self {
            answer: Err(msg.to_string()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Resolver for FixedResolver {
    async fn resolve(&self, _fqdn: &str, _record_type: RecordType) -> Result<Resolution> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.clone().map_err(Error::resolution)
    }

    fn describe(&self) -> String {
        "fixed".to_string()
    }
}

/// Configuration used by scheduler tests: 60s interval, 10s initial backoff
pub fn test_config() -> AgentConfig {
    AgentConfig::new(ZONE_NAME, HOSTNAME)
        .with_interval(Duration::from_secs(60))
        .with_backoff(BackoffPolicy::new(Duration::from_secs(10)))
        .with_fast_path(false)
}
