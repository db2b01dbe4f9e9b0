//! Per-window command queues.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tabhost_common::WindowId;
use tokio::sync::{mpsc, oneshot};

use crate::protocol::Command;

/// One entry of a window queue.
#[derive(Debug)]
pub(super) enum Job {
    Run(Command),
    /// Answered once every job queued before it has finished.
    Barrier(oneshot::Sender<()>),
}

struct Queue {
    id: u64,
    tx: mpsc::UnboundedSender<Job>,
}

type Queues = HashMap<WindowId, Queue>;

/// Maps each window to the sender of its single-writer queue.
#[derive(Default)]
pub(super) struct Router {
    queues: Mutex<Queues>,
    next_id: AtomicU64,
}

impl Router {
    fn lock(&self) -> MutexGuard<'_, Queues> {
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue `command` for `window_id`. Calls `spawn` with the new queue's
    /// id and receiver when the window has no live queue yet.
    pub(super) fn enqueue<F>(&self, window_id: WindowId, command: Command, spawn: F)
    where
        F: FnOnce(u64, mpsc::UnboundedReceiver<Job>),
    {
        let mut queues = self.lock();
        let job = match queues.get(&window_id) {
            Some(queue) => match queue.tx.send(Job::Run(command)) {
                Ok(()) => return,
                Err(mpsc::error::SendError(job)) => job,
            },
            None => Job::Run(command),
        };
        let (tx, rx) = mpsc::unbounded_channel();
        // The receiver is alive, so this cannot fail.
        let _ = tx.send(job);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        queues.insert(window_id, Queue { id, tx });
        drop(queues);
        spawn(id, rx);
    }

    /// Remove queue `id` of `window_id` if nothing is waiting in `rx`.
    /// Returns whether the worker owning `rx` should stop.
    pub(super) fn retire(
        &self,
        window_id: WindowId,
        id: u64,
        rx: &mpsc::UnboundedReceiver<Job>,
    ) -> bool {
        let mut queues = self.lock();
        let ours = queues.get(&window_id).is_some_and(|queue| queue.id == id);
        if ours && rx.is_empty() {
            queues.remove(&window_id);
            true
        } else {
            false
        }
    }

    /// One barrier per live queue.
    pub(super) fn barriers(&self) -> Vec<oneshot::Receiver<()>> {
        self.lock()
            .values()
            .filter_map(|queue| {
                let (done, wait) = oneshot::channel();
                queue.tx.send(Job::Barrier(done)).ok().map(|()| wait)
            })
            .collect()
    }

    /// Drop the queue of a closed window. Jobs already queued still run.
    pub(super) fn forget(&self, window_id: WindowId) {
        self.lock().remove(&window_id);
    }

    pub(super) fn clear(&self) {
        self.lock().clear();
    }

    pub(super) fn len(&self) -> usize {
        self.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use tabhost_common::TabId;

    use super::*;

    fn close(tab: &str) -> Command {
        Command::CloseTab {
            tab_id: TabId::from(tab),
        }
    }

    fn command(job: Job) -> Command {
        match job {
            Job::Run(command) => command,
            Job::Barrier(_) => panic!("unexpected barrier"),
        }
    }

    #[test]
    fn first_command_spawns_a_queue() {
        let router = Router::default();
        let mut spawned = Vec::new();
        router.enqueue(WindowId(1), close("a"), |_, rx| spawned.push(rx));
        router.enqueue(WindowId(1), close("b"), |_, _| panic!("queue already exists"));
        assert_eq!(router.len(), 1);

        let mut rx = spawned.pop().unwrap();
        assert_eq!(command(rx.try_recv().unwrap()), close("a"));
        assert_eq!(command(rx.try_recv().unwrap()), close("b"));
    }

    #[test]
    fn dead_queue_is_replaced() {
        let router = Router::default();
        router.enqueue(WindowId(1), close("a"), |_, rx| drop(rx));
        let mut spawned = Vec::new();
        router.enqueue(WindowId(1), close("b"), |_, rx| spawned.push(rx));
        assert_eq!(command(spawned.pop().unwrap().try_recv().unwrap()), close("b"));
    }

    #[test]
    fn barriers_go_to_live_queues_only() {
        let router = Router::default();
        let mut live = Vec::new();
        router.enqueue(WindowId(1), close("a"), |_, rx| live.push(rx));
        router.enqueue(WindowId(2), close("b"), |_, rx| drop(rx));

        assert_eq!(router.barriers().len(), 1);
        let mut rx = live.pop().unwrap();
        rx.try_recv().unwrap();
        assert!(matches!(rx.try_recv().unwrap(), Job::Barrier(_)));
    }

    #[test]
    fn forget_removes_the_queue() {
        let router = Router::default();
        router.enqueue(WindowId(1), close("a"), |_, rx| drop(rx));
        router.enqueue(WindowId(2), close("b"), |_, rx| drop(rx));
        router.forget(WindowId(1));
        assert_eq!(router.len(), 1);
        router.clear();
        assert_eq!(router.len(), 0);
    }

    #[test]
    fn idle_queue_retires() {
        let router = Router::default();
        let mut spawned = Vec::new();
        router.enqueue(WindowId(1), close("a"), |id, rx| spawned.push((id, rx)));
        let (id, mut rx) = spawned.pop().unwrap();

        assert!(!router.retire(WindowId(1), id, &rx), "a job is still queued");
        rx.try_recv().unwrap();
        assert!(router.retire(WindowId(1), id, &rx));
        assert_eq!(router.len(), 0);
    }

    #[test]
    fn retire_leaves_a_newer_queue_alone() {
        let router = Router::default();
        let mut spawned = Vec::new();
        router.enqueue(WindowId(1), close("a"), |id, rx| spawned.push((id, rx)));
        router.forget(WindowId(1));
        router.enqueue(WindowId(1), close("b"), |_, rx| drop(rx));

        let (old, mut rx) = spawned.pop().unwrap();
        rx.try_recv().unwrap();
        assert!(!router.retire(WindowId(1), old, &rx));
        assert_eq!(router.len(), 1);
    }
}
