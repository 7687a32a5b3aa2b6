//! Reconciliation controller
//!
//! The controller drives one reconcile tick: gather desired state from the
//! source, gather current state through the registry, calculate a plan,
//! and hand the filtered changes back to the registry for application.
//!
//! ## Event Flow
//!
//! 1. Timer fires (or `run_once` is called directly)
//! 2. `Source::endpoints()` produces the desired snapshot
//! 3. `Registry::records()` produces the current snapshot with owner labels
//! 4. `Plan::calculate()` diffs the two under the configured policies
//! 5. `Registry::apply_changes()` filters and submits to the provider
//!
//! All reads happen before any writes; nothing survives in memory between
//! ticks except the suppression bookkeeping (last submitted plan and
//! failure backoff). At most one tick is active at a time: a tick that is
//! still running when the timer fires absorbs the missed firings.

use crate::config::ControllerConfig;
use crate::error::Result;
use crate::plan::{Changes, Plan, Policy};
use crate::registry::Registry;
use crate::traits::Source;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Smallest backoff after a failed apply; doubles per consecutive failure
/// up to the tick interval.
const MIN_BACKOFF: Duration = Duration::from_secs(5);

/// Events emitted by the controller for external monitoring
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    /// Controller started
    Started,

    /// A reconcile tick ran to completion
    TickCompleted {
        created: usize,
        updated: usize,
        deleted: usize,
    },

    /// A reconcile tick failed; the next tick retries from scratch
    TickFailed { error: String },

    /// The computed changes were not submitted this tick
    ApplySkipped { reason: String },

    /// Controller stopped
    Stopped { reason: String },
}

/// The reconcile loop.
///
/// ## Lifecycle
///
/// 1. Create with [`Controller::new`]
/// 2. Either call [`Controller::run_once`] for a single reconcile, or
///    [`Controller::run`] to tick on the configured interval until a
///    shutdown signal arrives
///
/// ## Threading
///
/// The controller is single-writer: it owns its source and registry and
/// runs at most one tick at a time. An in-flight tick is allowed to finish
/// when shutdown fires; the provider call is never interrupted mid-batch.
pub struct Controller {
    /// Desired-state source (already aggregated and deduplicated)
    source: Box<dyn Source>,

    /// Ownership registry wrapping the provider
    registry: Box<dyn Registry>,

    /// Policies applied to every plan, in order
    policies: Vec<Box<dyn Policy>>,

    /// Interval between reconcile ticks
    interval: Duration,

    /// Minimum interval between submitting identical plans (zero disables)
    min_change_interval: Duration,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<ControllerEvent>,

    /// Last submitted plan, for identical-plan suppression
    last_plan: Option<Changes>,

    /// When the last plan was submitted
    last_submit: Option<Instant>,

    /// Current failure backoff, doubling per consecutive failure
    backoff: Option<Duration>,

    /// Earliest moment the next apply may run after a failure
    next_attempt: Option<Instant>,
}

impl Controller {
    /// Create a new controller.
    ///
    /// Returns the controller together with the receiving end of its event
    /// channel.
    pub fn new(
        source: Box<dyn Source>,
        registry: Box<dyn Registry>,
        config: &ControllerConfig,
    ) -> Result<(Self, mpsc::Receiver<ControllerEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let controller = Self {
            source,
            registry,
            policies: vec![config.policy.to_policy()],
            interval: Duration::from_secs(config.interval_secs),
            min_change_interval: Duration::from_secs(config.min_change_interval_secs),
            event_tx: tx,
            last_plan: None,
            last_submit: None,
            backoff: None,
            next_attempt: None,
        };

        Ok((controller, rx))
    }

    /// Execute a single reconcile tick.
    ///
    /// Any step may fail; on failure the tick terminates without applying
    /// further changes and the error is returned for the caller to log.
    /// The next tick retries from scratch.
    pub async fn run_once(&mut self) -> Result<()> {
        let desired = self.source.endpoints().await.map_err(|e| {
            self.emit_event(ControllerEvent::TickFailed {
                error: e.to_string(),
            });
            e
        })?;
        let current = self.registry.records().await.map_err(|e| {
            self.emit_event(ControllerEvent::TickFailed {
                error: e.to_string(),
            });
            e
        })?;

        debug!(
            desired = desired.len(),
            current = current.len(),
            "calculating plan"
        );

        let registry = &self.registry;
        let comparator =
            move |name: &str, previous: &str, value: &str| registry.property_values_equal(name, previous, value);
        let changes = Plan {
            current: &current,
            desired: &desired,
            policies: &self.policies,
            property_comparator: Some(&comparator),
        }
        .calculate();

        if changes.is_empty() {
            debug!("zone is in sync, nothing to apply");
            self.last_plan = None;
            self.backoff = None;
            self.next_attempt = None;
            self.emit_event(ControllerEvent::TickCompleted {
                created: 0,
                updated: 0,
                deleted: 0,
            });
            return Ok(());
        }

        let now = Instant::now();

        if let Some(next_attempt) = self.next_attempt {
            if now < next_attempt {
                debug!("previous apply failed recently, backing off");
                self.emit_event(ControllerEvent::ApplySkipped {
                    reason: "backing off after failed apply".to_string(),
                });
                return Ok(());
            }
        }

        if !self.min_change_interval.is_zero() {
            if let (Some(last_plan), Some(last_submit)) = (&self.last_plan, self.last_submit) {
                if *last_plan == changes && now.duration_since(last_submit) < self.min_change_interval
                {
                    debug!("plan unchanged since last submission, suppressing");
                    self.emit_event(ControllerEvent::ApplySkipped {
                        reason: "plan identical to previous submission".to_string(),
                    });
                    return Ok(());
                }
            }
        }

        let summary = (
            changes.create.len(),
            changes.update_new.len(),
            changes.delete.len(),
        );
        self.last_plan = Some(changes.clone());
        self.last_submit = Some(now);

        match self.registry.apply_changes(&changes).await {
            Ok(()) => {
                self.backoff = None;
                self.next_attempt = None;
                info!(
                    created = summary.0,
                    updated = summary.1,
                    deleted = summary.2,
                    "applied changes"
                );
                self.emit_event(ControllerEvent::TickCompleted {
                    created: summary.0,
                    updated: summary.1,
                    deleted: summary.2,
                });
                Ok(())
            }
            Err(e) => {
                let backoff = self
                    .backoff
                    .map(|b| (b * 2).min(self.interval.max(MIN_BACKOFF)))
                    .unwrap_or(MIN_BACKOFF);
                self.backoff = Some(backoff);
                self.next_attempt = Some(now + backoff);
                warn!(backoff_secs = backoff.as_secs(), "apply failed, backing off");
                self.emit_event(ControllerEvent::TickFailed {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Run the reconcile loop until the process receives SIGINT.
    ///
    /// The first tick runs immediately; subsequent ticks follow the
    /// configured interval. Errors inside a tick are logged, never fatal.
    pub async fn run(&mut self) -> Result<()> {
        self.run_internal(None).await
    }

    /// Run the reconcile loop with an explicit shutdown signal.
    ///
    /// The daemon uses this to tie the loop to its own signal handling;
    /// tests use it for controlled shutdown. An in-flight tick completes
    /// before the loop exits.
    pub async fn run_with_shutdown(
        &mut self,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        self.run_internal(shutdown_rx).await
    }

    async fn run_internal(
        &mut self,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        self.emit_event(ControllerEvent::Started);

        let mut interval = tokio::time::interval(self.interval);
        // A tick that fires while a reconcile is still running is skipped,
        // not queued: ticks never overlap and never pile up.
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        if let Some(mut rx) = shutdown_rx {
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = self.run_once().await {
                            error!("reconcile failed: {}", e);
                        }
                    }

                    _ = &mut rx => {
                        info!("shutdown signal received");
                        self.emit_event(ControllerEvent::Stopped {
                            reason: "shutdown signal".to_string(),
                        });
                        break;
                    }
                }
            }
        } else {
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = self.run_once().await {
                            error!("reconcile failed: {}", e);
                        }
                    }

                    _ = tokio::signal::ctrl_c() => {
                        info!("shutdown signal received");
                        self.emit_event(ControllerEvent::Stopped {
                            reason: "shutdown signal".to_string(),
                        });
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    /// Emit a controller event without blocking the loop. A full channel
    /// drops the event with a warning.
    fn emit_event(&self, event: ControllerEvent) {
        if self.event_tx.try_send(event).is_err() {
            warn!("event channel full, dropping event");
        }
    }
}
