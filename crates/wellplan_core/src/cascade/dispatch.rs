//! Background dispatch of deletion requests.

use super::executor::{execute, DeletionError, DeletionReport, DeletionTarget};
use crate::logging::sanitize_message;
use crate::store::{ContextOrigin, StoreContainer};
use log::{error, info};
use std::any::Any;
use std::fmt::{Display, Formatter};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

const MAX_PANIC_MESSAGE_CHARS: usize = 160;

/// Name prefix of every background deletion thread.
pub(crate) const DELETION_THREAD_PREFIX: &str = "wellplan-deletion-";

/// Handle identifying one dispatched deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeletionTicket(u64);

impl DeletionTicket {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl Display for DeletionTicket {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "deletion-{}", self.0)
    }
}

/// Completion handed back from a background deletion.
#[derive(Debug)]
pub struct DeletionOutcome {
    pub ticket: DeletionTicket,
    pub target: DeletionTarget,
    pub result: Result<DeletionReport, DeletionError>,
}

impl DeletionOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Runs each deletion on its own short-lived thread and isolated context.
pub struct DeletionDispatcher<C: StoreContainer> {
    container: Arc<C>,
    next_ticket: AtomicU64,
}

impl<C: StoreContainer> DeletionDispatcher<C> {
    pub fn new(container: Arc<C>) -> Self {
        Self {
            container,
            next_ticket: AtomicU64::new(1),
        }
    }

    /// Starts a background deletion and returns immediately.
    ///
    /// `on_complete` runs exactly once on the background thread (or inline if
    /// the thread cannot be spawned). It receives every failure as a value;
    /// panics inside the task never cross this boundary.
    pub fn dispatch<F>(&self, target: DeletionTarget, on_complete: F) -> DeletionTicket
    where
        F: FnOnce(DeletionOutcome) + Send + 'static,
    {
        let ticket = DeletionTicket(self.next_ticket.fetch_add(1, Ordering::Relaxed));
        let container = Arc::clone(&self.container);
        let callback = Arc::new(Mutex::new(Some(on_complete)));
        let task_callback = Arc::clone(&callback);
        let task_target = target.clone();

        info!(
            "event=deletion_dispatch module=cascade status=start ticket={} kind={} ids={}",
            ticket.value(),
            target.kind().label(),
            target.ids().len()
        );

        let spawned = std::thread::Builder::new()
            .name(format!("{DELETION_THREAD_PREFIX}{}", ticket.value()))
            .spawn(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| {
                    let mut context = container.open_context(ContextOrigin::Background)?;
                    execute(&mut context, &task_target)
                }))
                .unwrap_or_else(|payload| {
                    let message = panic_message(payload.as_ref());
                    error!(
                        "event=deletion_task module=cascade status=error ticket={} error_code=task_panicked",
                        ticket.value()
                    );
                    Err(DeletionError::Panicked(message))
                });
                complete(
                    &task_callback,
                    DeletionOutcome {
                        ticket,
                        target: task_target,
                        result,
                    },
                );
            });

        if let Err(err) = spawned {
            report_spawn_failure(&callback, ticket, target, &err);
        }

        ticket
    }
}

/// Completes a request whose thread never started. The target was not touched.
fn report_spawn_failure<F>(
    slot: &Mutex<Option<F>>,
    ticket: DeletionTicket,
    target: DeletionTarget,
    err: &std::io::Error,
) where
    F: FnOnce(DeletionOutcome),
{
    error!(
        "event=deletion_dispatch module=cascade status=error ticket={} error_code=spawn_failed error={}",
        ticket.value(),
        err
    );
    complete(
        slot,
        DeletionOutcome {
            ticket,
            target,
            result: Err(DeletionError::SpawnFailed(err.to_string())),
        },
    );
}

fn complete<F>(slot: &Mutex<Option<F>>, outcome: DeletionOutcome)
where
    F: FnOnce(DeletionOutcome),
{
    let callback = slot
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .take();
    if let Some(callback) = callback {
        callback(outcome);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let message = if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    };
    sanitize_message(&message, MAX_PANIC_MESSAGE_CHARS)
}
