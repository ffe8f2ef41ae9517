//! The sequential task executor. At most one task is ever in flight; everything
//! else waits its turn in arrival order.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use futures::channel::oneshot;
use futures::future::LocalBoxFuture;
use slotmap::SlotMap;

slotmap::new_key_type! {
    /// Handle returned when registering a listener, used to unregister it.
    pub struct ListenerKey;
}

/// How spawned futures get driven. The browser build passes
/// `wasm_bindgen_futures::spawn_local`; tests pass a `LocalPool` spawner.
pub type Spawner = Rc<dyn Fn(LocalBoxFuture<'static, ()>)>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueueStatus {
    /// Nothing queued, nothing running.
    Idle,
    /// A task is executing (or about to).
    Busy,
}

/// How a task ended. `Cancelled` is reserved for tasks superseded before they
/// started; callers must not treat it as an application error.
#[derive(Debug)]
pub enum TaskOutcome<T, E> {
    Completed(T),
    Failed(E),
    Cancelled,
}

impl<T, E> TaskOutcome<T, E> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

type StatusListener = Rc<dyn Fn(QueueStatus)>;

struct QueuedTask<T, E> {
    key: Option<String>,
    run: Box<dyn FnOnce() -> LocalBoxFuture<'static, Result<T, E>>>,
    done: oneshot::Sender<TaskOutcome<T, E>>,
}

struct Inner<T, E> {
    tasks: VecDeque<QueuedTask<T, E>>,
    status: QueueStatus,
    draining: bool,
    listeners: SlotMap<ListenerKey, StatusListener>,
}

/// Strictly serialized FIFO executor with cancellation of not-yet-started
/// tasks and status broadcast.
///
/// Single-threaded by design: state lives behind `Rc<RefCell<_>>` and no
/// borrow is ever held across an `.await`, so the usual "borrow while locked"
/// panics can't happen.
pub struct TaskQueue<T, E> {
    inner: Rc<RefCell<Inner<T, E>>>,
    spawner: Spawner,
}

impl<T, E> Clone for TaskQueue<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
            spawner: Rc::clone(&self.spawner),
        }
    }
}

impl<T: 'static, E: 'static> TaskQueue<T, E> {
    pub fn new(spawner: Spawner) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                tasks: VecDeque::new(),
                status: QueueStatus::Idle,
                draining: false,
                listeners: SlotMap::with_key(),
            })),
            spawner,
        }
    }

    pub fn status(&self) -> QueueStatus {
        self.inner.borrow().status
    }

    /// Number of tasks waiting to start (excludes the in-flight one).
    pub fn pending_len(&self) -> usize {
        self.inner.borrow().tasks.len()
    }

    /// Whether the task registered under `key` is still waiting to start, and
    /// therefore still cancellable.
    pub fn is_pending(&self, key: &str) -> bool {
        self.inner
            .borrow()
            .tasks
            .iter()
            .any(|task| task.key.as_deref() == Some(key))
    }

    /// Queue a task. `run` is only invoked when the task's turn arrives, so it
    /// can (and should) derive its payload from the freshest state available
    /// at that moment. The returned handle resolves once the task settles.
    pub fn enqueue<F>(&self, key: Option<String>, run: F) -> TaskHandle<T, E>
    where
        F: FnOnce() -> LocalBoxFuture<'static, Result<T, E>>,
        F: 'static,
    {
        let (done, receiver) = oneshot::channel();
        let spawn_drain = {
            let mut inner = self.inner.borrow_mut();
            inner.tasks.push_back(QueuedTask {
                key,
                run: Box::new(run),
                done,
            });
            if inner.draining {
                false
            } else {
                inner.draining = true;
                true
            }
        };

        if spawn_drain {
            let inner = Rc::clone(&self.inner);
            (self.spawner)(Box::pin(drain(inner)));
        }

        TaskHandle { receiver }
    }

    /// Cancel the not-yet-started task registered under `key`. Its handle
    /// resolves `Cancelled` and the task never runs. Returns `false` when no
    /// such task is waiting — in particular, the in-flight task cannot be
    /// cancelled and always runs to settlement.
    pub fn cancel(&self, key: &str) -> bool {
        let task = {
            let mut inner = self.inner.borrow_mut();
            let position = inner
                .tasks
                .iter()
                .position(|task| task.key.as_deref() == Some(key));
            position.and_then(|position| inner.tasks.remove(position))
        };

        match task {
            Some(task) => {
                let _ = task.done.send(TaskOutcome::Cancelled);
                true
            }
            None => false,
        }
    }

    pub fn register_listener(&self, listener: impl Fn(QueueStatus) + 'static) -> ListenerKey {
        self.inner.borrow_mut().listeners.insert(Rc::new(listener))
    }

    pub fn unregister_listener(&self, key: ListenerKey) {
        self.inner.borrow_mut().listeners.remove(key);
    }
}

/// Runs tasks until the queue is empty. Exactly one drain loop is alive while
/// `draining` is set; `enqueue` spawns a new one otherwise.
async fn drain<T, E>(inner: Rc<RefCell<Inner<T, E>>>) {
    loop {
        let next = { inner.borrow_mut().tasks.pop_front() };

        let Some(task) = next else {
            let listeners = {
                let mut inner = inner.borrow_mut();
                inner.draining = false;
                transition(&mut inner, QueueStatus::Idle)
            };
            notify(listeners, QueueStatus::Idle);
            break;
        };

        let listeners = {
            let mut inner = inner.borrow_mut();
            transition(&mut inner, QueueStatus::Busy)
        };
        notify(listeners, QueueStatus::Busy);

        let result = (task.run)().await;
        let outcome = match result {
            Ok(value) => TaskOutcome::Completed(value),
            Err(error) => TaskOutcome::Failed(error),
        };
        // The caller may have dropped its handle; that's fine.
        let _ = task.done.send(outcome);
    }
}

fn transition<T, E>(inner: &mut Inner<T, E>, status: QueueStatus) -> Vec<StatusListener> {
    if inner.status == status {
        return Vec::new();
    }
    inner.status = status;
    inner.listeners.values().cloned().collect()
}

// Listeners are invoked after the internal borrow is released, so they are
// free to re-enter the queue (enqueue, cancel, ...).
fn notify(listeners: Vec<StatusListener>, status: QueueStatus) {
    for listener in listeners {
        listener(status);
    }
}

/// Resolves with the task's outcome once it settles (or was cancelled).
pub struct TaskHandle<T, E> {
    receiver: oneshot::Receiver<TaskOutcome<T, E>>,
}

impl<T, E> TaskHandle<T, E> {
    pub async fn outcome(self) -> TaskOutcome<T, E> {
        // A dropped queue counts as cancellation.
        self.receiver.await.unwrap_or(TaskOutcome::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use futures::executor::LocalPool;
    use futures::task::LocalSpawnExt;

    fn pool_and_queue() -> (LocalPool, TaskQueue<u32, String>) {
        let pool = LocalPool::new();
        let spawner = pool.spawner();
        let spawner: Spawner = Rc::new(move |future| {
            spawner.spawn_local(future).expect("spawn");
        });
        let queue = TaskQueue::new(spawner);
        (pool, queue)
    }

    #[test]
    fn test_tasks_run_in_fifo_order() {
        let (mut pool, queue) = pool_and_queue();
        let order = Rc::new(RefCell::new(Vec::new()));

        for n in 0..3u32 {
            let order = Rc::clone(&order);
            queue.enqueue(None, move || {
                Box::pin(async move {
                    order.borrow_mut().push(n);
                    Ok(n)
                })
            });
        }

        pool.run_until_stalled();
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
        assert_eq!(queue.status(), QueueStatus::Idle);
    }

    #[test]
    fn test_at_most_one_task_in_flight() {
        let (mut pool, queue) = pool_and_queue();
        let in_flight = Rc::new(Cell::new(0usize));
        let max_in_flight = Rc::new(Cell::new(0usize));
        let mut gates = Vec::new();

        for n in 0..3u32 {
            let (gate_tx, gate_rx) = oneshot::channel::<()>();
            gates.push(gate_tx);
            let in_flight = Rc::clone(&in_flight);
            let max_in_flight = Rc::clone(&max_in_flight);
            queue.enqueue(None, move || {
                Box::pin(async move {
                    in_flight.set(in_flight.get() + 1);
                    max_in_flight.set(max_in_flight.get().max(in_flight.get()));
                    let _ = gate_rx.await;
                    in_flight.set(in_flight.get() - 1);
                    Ok(n)
                })
            });
        }

        // Release the gates one by one; the queue must never overlap tasks.
        pool.run_until_stalled();
        for gate in gates {
            let _ = gate.send(());
            pool.run_until_stalled();
        }

        assert_eq!(max_in_flight.get(), 1);
        assert_eq!(queue.status(), QueueStatus::Idle);
    }

    #[test]
    fn test_cancel_before_start_skips_the_task() {
        let (mut pool, queue) = pool_and_queue();
        let ran = Rc::new(Cell::new(false));

        let ran_clone = Rc::clone(&ran);
        let handle = queue.enqueue(Some("doomed".to_string()), move || {
            Box::pin(async move {
                ran_clone.set(true);
                Ok(1)
            })
        });

        assert!(queue.is_pending("doomed"));
        assert!(queue.cancel("doomed"));
        assert!(!queue.is_pending("doomed"));

        let outcome = Rc::new(RefCell::new(None));
        let outcome_clone = Rc::clone(&outcome);
        pool.spawner()
            .spawn_local(async move {
                *outcome_clone.borrow_mut() = Some(handle.outcome().await);
            })
            .unwrap();
        pool.run_until_stalled();

        assert!(!ran.get());
        assert!(matches!(
            *outcome.borrow(),
            Some(TaskOutcome::Cancelled)
        ));
    }

    #[test]
    fn test_in_flight_task_cannot_be_cancelled() {
        let (mut pool, queue) = pool_and_queue();
        let (gate_tx, gate_rx) = oneshot::channel::<()>();

        queue.enqueue(Some("running".to_string()), move || {
            Box::pin(async move {
                let _ = gate_rx.await;
                Ok(1)
            })
        });

        pool.run_until_stalled();
        // The task started; it is no longer pending and no longer cancellable.
        assert!(!queue.is_pending("running"));
        assert!(!queue.cancel("running"));
        assert_eq!(queue.status(), QueueStatus::Busy);

        let _ = gate_tx.send(());
        pool.run_until_stalled();
        assert_eq!(queue.status(), QueueStatus::Idle);
    }

    #[test]
    fn test_status_transitions_are_broadcast() {
        let (mut pool, queue) = pool_and_queue();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let seen_clone = Rc::clone(&seen);
        queue.register_listener(move |status| {
            seen_clone.borrow_mut().push(status);
        });

        queue.enqueue(None, || Box::pin(async { Ok(1) }));
        queue.enqueue(None, || Box::pin(async { Ok(2) }));
        pool.run_until_stalled();

        // Busy once when work starts, Idle once when everything drained —
        // no chatter between back-to-back tasks.
        assert_eq!(*seen.borrow(), vec![QueueStatus::Busy, QueueStatus::Idle]);
    }

    #[test]
    fn test_unregistered_listener_stops_receiving() {
        let (mut pool, queue) = pool_and_queue();
        let seen = Rc::new(Cell::new(0usize));

        let seen_clone = Rc::clone(&seen);
        let key = queue.register_listener(move |_| {
            seen_clone.set(seen_clone.get() + 1);
        });
        queue.unregister_listener(key);

        queue.enqueue(None, || Box::pin(async { Ok(1) }));
        pool.run_until_stalled();

        assert_eq!(seen.get(), 0);
    }

    #[test]
    fn test_failure_propagates_to_the_handle() {
        let (mut pool, queue) = pool_and_queue();

        let handle = queue.enqueue(None, || {
            Box::pin(async { Err("remote said no".to_string()) })
        });

        let outcome = Rc::new(RefCell::new(None));
        let outcome_clone = Rc::clone(&outcome);
        pool.spawner()
            .spawn_local(async move {
                *outcome_clone.borrow_mut() = Some(handle.outcome().await);
            })
            .unwrap();
        pool.run_until_stalled();

        assert!(matches!(
            outcome.borrow().as_ref(),
            Some(TaskOutcome::Failed(message)) if message == "remote said no"
        ));
        // Failures don't stall the queue.
        assert_eq!(queue.status(), QueueStatus::Idle);
    }

    #[test]
    fn test_enqueue_while_busy_extends_the_current_drain() {
        let (mut pool, queue) = pool_and_queue();
        let (gate_tx, gate_rx) = oneshot::channel::<()>();
        let order = Rc::new(RefCell::new(Vec::new()));

        let order_first = Rc::clone(&order);
        queue.enqueue(None, move || {
            Box::pin(async move {
                let _ = gate_rx.await;
                order_first.borrow_mut().push("first");
                Ok(1)
            })
        });
        pool.run_until_stalled();

        // Queue a second task while the first is mid-flight.
        let order_second = Rc::clone(&order);
        queue.enqueue(None, move || {
            Box::pin(async move {
                order_second.borrow_mut().push("second");
                Ok(2)
            })
        });

        let _ = gate_tx.send(());
        pool.run_until_stalled();

        assert_eq!(*order.borrow(), vec!["first", "second"]);
    }
}
