//! Periodic check for jobs that will never come back.

use std::sync::Arc;
use std::time::Duration;

use hypergrid_scheduler::Scheduler;
use tokio::time::MissedTickBehavior;
use tracing::{error, warn};

pub async fn run(scheduler: Arc<Scheduler>, period: Duration, lease_warn_after: chrono::Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut stall_reported = false;

    loop {
        ticker.tick().await;
        if scheduler.product().is_some() {
            break;
        }
        inspect(&scheduler, lease_warn_after, &mut stall_reported);
    }
}

/// One watchdog tick. Returns true when it reported the stall.
fn inspect(
    scheduler: &Scheduler,
    lease_warn_after: chrono::Duration,
    stall_reported: &mut bool,
) -> bool {
    for lease in scheduler.overdue_leases(lease_warn_after) {
        warn!(
            job_id = %lease.job_id,
            session = %lease.session,
            age_seconds = lease.age_seconds,
            "lease overdue"
        );
    }

    if *stall_reported || !scheduler.is_stalled() {
        return false;
    }
    let stranded = scheduler.stranded();
    let missing = scheduler.results().missing();
    error!(
        ?stranded,
        missing = missing.len(),
        "run stalled: every job has left the queue but results are missing"
    );
    *stall_reported = true;
    true
}
