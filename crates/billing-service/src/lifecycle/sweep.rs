//! Renewal and expiry sweep.
//!
//! For every user with a billing record whose `expires` has passed:
//!
//! | record state          | effect                                          |
//! |-----------------------|-------------------------------------------------|
//! | on trial              | user deactivated, trial flag cleared            |
//! | cancellation pending  | user deactivated                                |
//! | paid plan             | `expires` pushed one calendar month, user active |
//! | free, not on trial    | nothing                                         |
//!
//! Records written by a run carry its [`SweepRunId`], so resuming a run
//! that was interrupted or failed part-way does not extend the same record
//! twice. [`next_run_id`] picks the id to resume with.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::sync::watch;

use billing_core::{BillingError, Plan, Result, SweepRunId, UserId};

use super::{add_months, LifecycleEngine};

/// What reconciling one owner did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepOutcome {
    /// Expired trial; user deactivated.
    TrialExpired,
    /// Expired after cancellation; user deactivated.
    CancellationDeactivated,
    /// Expired paid plan renewed for another month.
    GraceExtended,
    /// Nothing to do.
    Unchanged,
    /// Already handled earlier in this run.
    AlreadyReconciled,
    /// The user has no billing record.
    NoBilling,
    /// Not examined because shutdown was requested.
    Interrupted,
}

/// An owner the sweep could not reconcile.
#[derive(Debug, Clone, Serialize)]
pub struct SweepFailure {
    /// The owner.
    pub owner_id: UserId,
    /// What went wrong.
    pub error: String,
}

/// Aggregate result of one sweep run.
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    /// The run.
    pub run_id: SweepRunId,
    /// Owners examined (everything except interrupted ones).
    pub examined: usize,
    /// Trials that expired.
    pub trials_expired: usize,
    /// Cancelled subscriptions whose users were deactivated.
    pub cancellations_deactivated: usize,
    /// Paid plans renewed for a month.
    pub grace_extended: usize,
    /// Owners with nothing to do.
    pub unchanged: usize,
    /// Owners skipped because this run already handled them.
    pub already_reconciled: usize,
    /// Users without a billing record.
    pub no_billing: usize,
    /// Owners left for the next run because of shutdown.
    pub interrupted: usize,
    /// Owners that failed.
    pub failures: Vec<SweepFailure>,
}

impl SweepReport {
    fn new(run_id: SweepRunId) -> Self {
        Self {
            run_id,
            examined: 0,
            trials_expired: 0,
            cancellations_deactivated: 0,
            grace_extended: 0,
            unchanged: 0,
            already_reconciled: 0,
            no_billing: 0,
            interrupted: 0,
            failures: Vec::new(),
        }
    }

    fn record(&mut self, outcome: SweepOutcome) {
        if outcome != SweepOutcome::Interrupted {
            self.examined += 1;
        }
        match outcome {
            SweepOutcome::TrialExpired => self.trials_expired += 1,
            SweepOutcome::CancellationDeactivated => self.cancellations_deactivated += 1,
            SweepOutcome::GraceExtended => self.grace_extended += 1,
            SweepOutcome::Unchanged => self.unchanged += 1,
            SweepOutcome::AlreadyReconciled => self.already_reconciled += 1,
            SweepOutcome::NoBilling => self.no_billing += 1,
            SweepOutcome::Interrupted => self.interrupted += 1,
        }
    }

    fn record_failure(&mut self, owner_id: UserId, error: &BillingError) {
        self.examined += 1;
        self.failures.push(SweepFailure {
            owner_id,
            error: error.to_string(),
        });
    }

    /// Whether every owner was examined without failure.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.interrupted == 0
    }
}

impl LifecycleEngine {
    /// Reconcile every user's billing state.
    ///
    /// Owners are processed concurrently, up to
    /// [`super::EngineSettings::sweep_concurrency`] at a time. A failure for
    /// one owner is recorded and the sweep moves on. Once `shutdown` reads
    /// `true`, owners not yet started are reported as interrupted.
    ///
    /// # Errors
    ///
    /// Returns an error only if the user list cannot be read.
    pub async fn sweep(
        &self,
        run: SweepRunId,
        shutdown: Option<&watch::Receiver<bool>>,
    ) -> Result<SweepReport> {
        let started = Instant::now();
        let users = self.store.list_users()?;
        let concurrency = self.settings.sweep_concurrency.max(1);

        tracing::info!(run_id = %run, users = users.len(), concurrency, "Billing sweep started");

        let mut results = stream::iter(users)
            .map(|user| async move {
                if shutdown.is_some_and(|rx| *rx.borrow()) {
                    return (user.id, Ok(SweepOutcome::Interrupted));
                }
                (user.id, self.reconcile_owner(&user.id, run).await)
            })
            .buffer_unordered(concurrency);

        let mut report = SweepReport::new(run);
        while let Some((owner, result)) = results.next().await {
            match result {
                Ok(outcome) => report.record(outcome),
                Err(err) => {
                    tracing::error!(
                        run_id = %run,
                        owner_id = %owner,
                        error = %err,
                        "Failed to reconcile billing"
                    );
                    report.record_failure(owner, &err);
                }
            }
        }

        log_sweep_report(&report, started.elapsed());
        Ok(report)
    }

    /// Apply the expiry rules to one owner.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown user or a dangling billing link, or
    /// a storage error.
    pub async fn reconcile_owner(&self, owner: &UserId, run: SweepRunId) -> Result<SweepOutcome> {
        let _guard = self.locks.acquire(owner).await;

        let mut user = self.user(owner)?;
        let Some(billing_id) = user.billing_record_id else {
            return Ok(SweepOutcome::NoBilling);
        };
        let mut record = self.store.get_billing(&billing_id)?;

        if record.last_sweep_run == Some(run) {
            return Ok(SweepOutcome::AlreadyReconciled);
        }
        if !record.is_expired(Utc::now()) {
            return Ok(SweepOutcome::Unchanged);
        }

        if record.is_on_trial {
            // User first: if the record write fails, the next run retries.
            user.is_active = false;
            self.store.put_user(&user)?;

            record.is_on_trial = false;
            record.last_sweep_run = Some(run);
            self.store.update_billing(record)?;

            tracing::info!(owner_id = %owner, "Trial expired, user deactivated");
            return Ok(SweepOutcome::TrialExpired);
        }

        if record.is_cancel {
            if !user.is_active {
                return Ok(SweepOutcome::Unchanged);
            }
            user.is_active = false;
            self.store.put_user(&user)?;

            tracing::info!(owner_id = %owner, "Cancelled subscription expired, user deactivated");
            return Ok(SweepOutcome::CancellationDeactivated);
        }

        if record.plan != Plan::Free {
            let previous = record.expires;
            record.expires = add_months(previous, 1)?;
            record.last_sweep_run = Some(run);
            let record = self.store.update_billing(record)?;

            user.is_active = true;
            self.store.put_user(&user)?;

            tracing::info!(
                owner_id = %owner,
                previous = %previous,
                expires = %record.expires,
                "Paid plan extended by one month"
            );
            return Ok(SweepOutcome::GraceExtended);
        }

        Ok(SweepOutcome::Unchanged)
    }
}

fn log_sweep_report(report: &SweepReport, elapsed: Duration) {
    let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
    if report.failures.is_empty() {
        tracing::info!(
            run_id = %report.run_id,
            examined = report.examined,
            trials_expired = report.trials_expired,
            cancellations_deactivated = report.cancellations_deactivated,
            grace_extended = report.grace_extended,
            already_reconciled = report.already_reconciled,
            interrupted = report.interrupted,
            elapsed_ms,
            "Billing sweep completed"
        );
    } else {
        tracing::warn!(
            run_id = %report.run_id,
            examined = report.examined,
            trials_expired = report.trials_expired,
            cancellations_deactivated = report.cancellations_deactivated,
            grace_extended = report.grace_extended,
            failed = report.failures.len(),
            interrupted = report.interrupted,
            elapsed_ms,
            "Billing sweep completed with failures"
        );
    }
}

/// Id for the next sweep: the previous run's id if it left owners behind,
/// otherwise a fresh one.
#[must_use]
pub fn next_run_id(previous: Option<&SweepReport>) -> SweepRunId {
    match previous {
        Some(report) if !report.is_clean() => report.run_id,
        _ => SweepRunId::generate(),
    }
}

/// Run a sweep every `every` until `shutdown` flips to `true`.
///
/// The first sweep runs one full interval after start. A run that had
/// failures is resumed once under the same id on the next tick; after that
/// the loop moves on to a fresh run so stamped records renew again.
pub async fn run_periodic(
    engine: Arc<LifecycleEngine>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut last: Option<SweepReport> = None;
    let mut resumed = false;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }

        let previous = if resumed { None } else { last.as_ref() };
        let run = next_run_id(previous);
        resumed = previous.is_some_and(|report| report.run_id == run);
        if resumed {
            tracing::info!(run_id = %run, "Resuming unfinished billing sweep");
        }

        match engine.sweep(run, Some(&shutdown)).await {
            Ok(report) => last = Some(report),
            Err(err) => tracing::error!(run_id = %run, error = %err, "Billing sweep failed"),
        }
    }

    tracing::info!("Billing sweep loop stopped");
}
