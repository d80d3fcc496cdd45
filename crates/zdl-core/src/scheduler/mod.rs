//! Admission of pending tasks into a bounded pool of workers.
//!
//! One scheduling loop owns every running worker in a `JoinSet`. It wakes on
//! an explicit kick (enqueue, start request, settings change) or when a worker
//! finishes, and then runs an admission round: claim as many of the oldest
//! pending tasks as the concurrency cap allows and spawn a worker for each.
//! Kicks that arrive while a round is running are coalesced into the next
//! round instead of starting a second one.

mod artifact;
mod guard;
mod worker;

pub use artifact::{find_artifact, output_template, ARTIFACT_EXTENSIONS};
pub use worker::{failure_message, WorkerContext};

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;

/// Request for an admission round. The optional sender receives the number of
/// tasks admitted by the round that served it.
type Kick = Option<oneshot::Sender<usize>>;

/// Handle used to wake the scheduling loop. Cheap to clone.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    tx: mpsc::UnboundedSender<Kick>,
}

impl SchedulerHandle {
    /// Fire-and-forget wake-up.
    pub fn kick(&self) {
        if self.tx.send(None).is_err() {
            tracing::debug!("scheduler loop is gone; kick dropped");
        }
    }

    /// Wake the loop and wait for the admission round that serves this call.
    /// Returns how many tasks that round admitted (0 when the backlog was
    /// empty or every slot was taken).
    pub async fn kick_and_wait(&self) -> usize {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(Some(ack_tx)).is_err() {
            return 0;
        }
        ack_rx.await.unwrap_or(0)
    }
}

/// Start the scheduling loop on the current runtime.
pub fn spawn_scheduler(ctx: Arc<WorkerContext>) -> SchedulerHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(scheduling_loop(ctx, rx));
    SchedulerHandle { tx }
}

async fn scheduling_loop(ctx: Arc<WorkerContext>, mut rx: mpsc::UnboundedReceiver<Kick>) {
    let mut workers = JoinSet::new();
    loop {
        let mut acks = Vec::new();
        tokio::select! {
            kick = rx.recv() => match kick {
                Some(ack) => acks.extend(ack),
                None => break,
            },
            Some(res) = workers.join_next(), if !workers.is_empty() => {
                if let Err(e) = res {
                    tracing::warn!(error = %e, "worker task ended abnormally");
                }
            }
        }
        // Coalesce everything queued behind the wake-up into this round.
        while let Ok(ack) = rx.try_recv() {
            acks.extend(ack);
        }

        let admitted = admit(&ctx, &mut workers);
        for ack in acks {
            let _ = ack.send(admitted);
        }
    }

    // Every handle is gone; let running workers reach their terminal state.
    while let Some(res) = workers.join_next().await {
        if let Err(e) = res {
            tracing::warn!(error = %e, "worker task ended abnormally");
        }
    }
}

/// One admission round. Loops until no slot is free or no task is pending.
fn admit(ctx: &Arc<WorkerContext>, workers: &mut JoinSet<()>) -> usize {
    let mut admitted = 0;
    loop {
        let slots = ctx.store.free_slots();
        if slots == 0 {
            break;
        }
        let claimed = ctx.store.claim_pending(slots);
        if claimed.is_empty() {
            break;
        }
        for task in claimed {
            tracing::debug!(task_id = %task.id, slots, "admitting task");
            workers.spawn(worker::run_worker(Arc::clone(ctx), task));
            admitted += 1;
        }
    }
    admitted
}
