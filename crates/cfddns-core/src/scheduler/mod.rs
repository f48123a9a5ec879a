//! Periodic reconciliation scheduler
//!
//! The Scheduler is responsible for:
//! - Running one reconciliation per enabled family immediately at startup
//! - Re-running every `interval` in steady state
//! - Backing off with a doubling delay while ticks keep failing
//! - Stopping at the next wait point once shutdown is signalled
//!
//! ## State Machine
//!
//! ```text
//!            start
//!  Idle ──────────────► Running ──── ok ────► Idle (wait interval)
//!   ▲                     │  ▲                  │
//!   │                  failed │                 │ interval elapsed
//!   │                     ▼  │ delay elapsed    ▼
//!   └──── ok ──────── Backoff ◄──────────── Running
//!
//!  any wait + shutdown ───────────────────► Stopped
//! ```
//!
//! A failed initial run does not enter Backoff; the scheduler goes straight
//! to steady-state waiting.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::config::{AgentConfig, FamilySetting};
use crate::error::{Error, Result};
use crate::reconcile::{ReconcileOutcome, Reconciler};
use crate::record::{IpVersion, RecordRequest, Zone};
use crate::traits::{AddressProbe, ProbeOutcome};

/// Capacity of the scheduler event channel
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Scheduler lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Waiting for the next interval
    Idle,
    /// Reconciling
    Running,
    /// Waiting out a backoff delay
    Backoff,
    /// Terminal
    Stopped,
}

/// Events emitted by the Scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// State transition
    StateChanged { state: SchedulerState },

    /// A family was skipped this tick
    FamilySkipped { version: IpVersion, reason: String },

    /// A family reconciled without error
    Reconciled {
        version: IpVersion,
        address: IpAddr,
        outcome: &'static str,
    },

    /// A family's reconciliation failed
    ReconcileFailed { version: IpVersion, error: String },

    /// A backoff wait is about to start
    BackoffScheduled { attempt: u32, delay: Duration },

    /// Scheduler stopped
    Stopped { reason: String },
}

/// Result of reconciling one family
#[derive(Debug)]
pub struct FamilyReport {
    pub version: IpVersion,
    pub address: IpAddr,
    pub outcome: ReconcileOutcome,
}

/// Everything that happened in one tick
#[derive(Debug, Default)]
pub struct TickReport {
    /// Families that were reconciled
    pub results: Vec<FamilyReport>,
    /// Families skipped because no address was available
    pub skipped: Vec<IpVersion>,
}

impl TickReport {
    /// True if any reconciled family failed
    pub fn failed(&self) -> bool {
        self.results.iter().any(|r| r.outcome.is_failed())
    }

    /// The first failure, for logging
    pub fn first_error(&self) -> Option<&Error> {
        self.results.iter().find_map(|r| match &r.outcome {
            ReconcileOutcome::Failed(e) => Some(e),
            _ => None,
        })
    }
}

/// Periodic reconciliation scheduler
///
/// ## Lifecycle
///
/// 1. Create with [`Scheduler::new()`]
/// 2. Start with [`Scheduler::run()`] and a shutdown receiver
/// 3. Send `true` on the shutdown channel to stop at the next wait point
///
/// ## Threading
///
/// The scheduler runs on a single task. Families are reconciled one after
/// the other; they share only read-only configuration.
pub struct Scheduler {
    config: AgentConfig,
    zone: Zone,
    probe: Arc<dyn AddressProbe>,
    reconciler: Reconciler,
    event_tx: mpsc::Sender<SchedulerEvent>,
}

impl Scheduler {
    /// Create a new scheduler
    ///
    /// # Returns
    ///
    /// A tuple of (scheduler, event_receiver) where event_receiver yields scheduler events
    pub fn new(
        config: AgentConfig,
        zone: Zone,
        probe: Arc<dyn AddressProbe>,
        reconciler: Reconciler,
    ) -> Result<(Self, mpsc::Receiver<SchedulerEvent>)> {
        config.validate()?;

        if zone.name() != config.zone {
            return Err(Error::config(format!(
                "zone {} does not match configured zone {}",
                zone.name(),
                config.zone
            )));
        }

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let scheduler = Self {
            config,
            zone,
            probe,
            reconciler,
            event_tx: tx,
        };

        Ok((scheduler, rx))
    }

    /// Run until shutdown is signalled
    ///
    /// Never returns because of reconciliation failures; those only drive
    /// the backoff delay.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let backoff_policy = &self.config.backoff;
        let mut backoff = backoff_policy.initial;

        self.set_state(SchedulerState::Running);
        let report = self.tick().await;
        if let Some(e) = report.first_error() {
            warn!("initial run failed: {}", e);
        }

        'steady: loop {
            self.set_state(SchedulerState::Idle);
            if wait_or_shutdown(&mut shutdown, self.config.interval).await {
                break;
            }

            self.set_state(SchedulerState::Running);
            let mut report = self.tick().await;
            let mut attempt = 0u32;

            while report.failed() {
                attempt += 1;
                if let Some(e) = report.first_error() {
                    warn!("{}, retry after: {:?}", e, backoff);
                }

                self.set_state(SchedulerState::Backoff);
                self.emit_event(SchedulerEvent::BackoffScheduled {
                    attempt,
                    delay: backoff,
                });
                if wait_or_shutdown(&mut shutdown, backoff).await {
                    break 'steady;
                }
                backoff = backoff_policy.next(backoff);

                self.set_state(SchedulerState::Running);
                report = self.tick().await;
            }

            if attempt > 0 && backoff_policy.reset_on_success {
                debug!("Recovered after {} retries, backoff reset", attempt);
                backoff = backoff_policy.initial;
            }
        }

        info!("Quitting...");
        self.set_state(SchedulerState::Stopped);
        self.emit_event(SchedulerEvent::Stopped {
            reason: "Shutdown signal".to_string(),
        });

        Ok(())
    }

    /// Reconcile every enabled family once
    pub async fn tick(&self) -> TickReport {
        let mut report = TickReport::default();

        for version in IpVersion::ALL {
            let Some(address) = self.desired_address(version).await else {
                if self.config.family(version).is_enabled() {
                    report.skipped.push(version);
                }
                continue;
            };

            let request = RecordRequest::new(self.config.hostname.clone(), address);
            let outcome = self.reconciler.reconcile(&self.zone, &request).await;

            match &outcome {
                ReconcileOutcome::Failed(e) => {
                    error!("{} reconcile for {} failed: {}", version, request.hostname, e);
                    self.emit_event(SchedulerEvent::ReconcileFailed {
                        version,
                        error: e.to_string(),
                    });
                }
                ok => {
                    info!(
                        "Update {} {} to {} ok ({})",
                        request.hostname,
                        version,
                        address,
                        ok.label()
                    );
                    self.emit_event(SchedulerEvent::Reconciled {
                        version,
                        address,
                        outcome: ok.label(),
                    });
                }
            }

            report.results.push(FamilyReport {
                version,
                address,
                outcome,
            });
        }

        report
    }

    /// Address to publish for `version`, or None to skip it this tick
    async fn desired_address(&self, version: IpVersion) -> Option<IpAddr> {
        match self.config.family(version) {
            FamilySetting::Disabled => None,
            FamilySetting::Static(ip) => Some(*ip),
            FamilySetting::Probe => match self.probe.probe(version).await {
                ProbeOutcome::Address(ip) if IpVersion::of(&ip) == version => Some(ip),
                ProbeOutcome::Address(ip) => {
                    warn!("{} probe returned {}, skipping", version, ip);
                    self.emit_event(SchedulerEvent::FamilySkipped {
                        version,
                        reason: format!("probe returned {}", ip),
                    });
                    None
                }
                ProbeOutcome::NotAvailable { reason } => {
                    debug!("{} not available: {}", version, reason);
                    self.emit_event(SchedulerEvent::FamilySkipped { version, reason });
                    None
                }
            },
        }
    }

    fn set_state(&self, state: SchedulerState) {
        self.emit_event(SchedulerEvent::StateChanged { state });
    }

    /// Emit a scheduler event, dropping it if the channel is full
    fn emit_event(&self, event: SchedulerEvent) {
        if let Err(mpsc::error::TrySendError::Full(_)) = self.event_tx.try_send(event) {
            warn!("Event channel full, dropping event");
        }
    }
}

/// Sleep for `duration`; returns true if shutdown came first
async fn wait_or_shutdown(shutdown: &mut watch::Receiver<bool>, duration: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        _ = shutdown_requested(shutdown) => true,
    }
}

/// Resolves once the flag is true or the sender is gone
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        let requested = *shutdown.borrow_and_update();
        if requested {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
