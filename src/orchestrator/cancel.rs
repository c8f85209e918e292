//! Cancellation tokens and the per-pane, per-kind in-flight table.

use std::collections::HashMap;

use tokio::sync::watch;

use crate::model::types::PaneId;

/// Which of the two pane requests a token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Logs,
    Histogram,
}

impl RequestKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestKind::Logs => "logs",
            RequestKind::Histogram => "histogram",
        }
    }
}

/// Receiving side handed to the transport with each request.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the request is cancelled. Never resolves if the issuing
    /// side goes away without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        let closed = rx.wait_for(|cancelled| *cancelled).await.is_err();
        if closed {
            std::future::pending::<()>().await;
        }
    }

    /// A token that never fires, for one-off calls outside the orchestrator.
    pub fn never() -> Self {
        let (_, rx) = watch::channel(false);
        Self { rx }
    }
}

/// Sending side kept by the in-flight table.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Fresh handle/token pair for one request.
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelToken { rx })
}

#[derive(Debug)]
struct Slot {
    seq: u64,
    handle: CancelHandle,
}

/// At most one outstanding request per `(pane, kind)`.
///
/// Issuing a request cancels and replaces whatever occupied the slot; a
/// completion only counts if its sequence number still owns the slot.
#[derive(Debug, Default)]
pub struct InFlight {
    next_seq: u64,
    slots: HashMap<(PaneId, RequestKind), Slot>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the previous request in the slot and register a new one.
    pub fn issue(&mut self, pane: &PaneId, kind: RequestKind) -> (u64, CancelToken) {
        self.next_seq += 1;
        let seq = self.next_seq;
        let (handle, token) = cancel_pair();
        if let Some(previous) = self.slots.insert((pane.clone(), kind), Slot { seq, handle }) {
            previous.handle.cancel();
        }
        (seq, token)
    }

    pub fn cancel(&mut self, pane: &PaneId, kind: RequestKind) -> bool {
        match self.slots.remove(&(pane.clone(), kind)) {
            Some(slot) => {
                slot.handle.cancel();
                true
            }
            None => false,
        }
    }

    pub fn cancel_pane(&mut self, pane: &PaneId) {
        self.cancel(pane, RequestKind::Logs);
        self.cancel(pane, RequestKind::Histogram);
    }

    pub fn is_current(&self, pane: &PaneId, kind: RequestKind, seq: u64) -> bool {
        self.slots
            .get(&(pane.clone(), kind))
            .is_some_and(|slot| slot.seq == seq)
    }

    /// Release the slot if `seq` still owns it. Returns whether it did.
    pub fn finish(&mut self, pane: &PaneId, kind: RequestKind, seq: u64) -> bool {
        if self.is_current(pane, kind, seq) {
            self.slots.remove(&(pane.clone(), kind));
            true
        } else {
            false
        }
    }

    /// Number of outstanding requests.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
