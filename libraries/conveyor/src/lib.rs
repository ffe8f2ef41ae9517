//! This is a library for keeping a remote, order-sensitive resource in sync with
//! a client that wants to edit it instantly, even while offline for a moment.
//! It was created for Trolley's cart, so it doesn't include much that was not
//! needed for that project.
//!
//! Queueing strategy:
//! 1. Every edit the user makes becomes a task. Tasks are appended to a journal
//!    that is written through to a durable blob store, so a reload never loses
//!    an unconfirmed edit.
//! 2. Tasks run strictly one at a time, in the order they were enqueued. The
//!    remote resource is order-sensitive (it can be addressed by position), so
//!    running two edits concurrently or out of order would corrupt it.
//! 3. A task that hasn't started yet can be cancelled, which is how redundant
//!    edits get folded together: the superseded task never reaches the network
//!    and its caller sees a distinguished "cancelled" outcome instead.
//! 4. When the journal drains, the client knows the remote copy is
//!    authoritative again.
//!
//! Sounds simple, but there are a few tricky parts that this library handles.

pub mod journal;
pub mod queue;

#[cfg(target_arch = "wasm32")]
#[cfg(feature = "local-storage")]
pub mod local_storage;

pub use journal::{BlobStore, Journal, MemoryStore, RewriteRefs, StoreError};
pub use queue::{ListenerKey, QueueStatus, Spawner, TaskHandle, TaskOutcome, TaskQueue};

/// An event worth telling the operations backend about. These are
/// fire-and-forget and never block returning a result to the caller.
#[derive(Clone, Debug)]
pub struct TelemetryEvent {
    /// Which part of the engine produced the event, e.g. `"CartMutations"`.
    pub workflow: &'static str,
    /// What happened, e.g. `"add-items-mutation"`.
    pub instance: &'static str,
    pub detail: String,
}

/// Sink for unrecoverable errors (persistence failures, rejected mutations).
pub trait Telemetry {
    fn log(&self, event: TelemetryEvent);
}

/// Default sink that forwards everything to the `log` crate.
pub struct LogTelemetry;

impl Telemetry for LogTelemetry {
    fn log(&self, event: TelemetryEvent) {
        log::error!("[{}/{}] {}", event.workflow, event.instance, event.detail);
    }
}
