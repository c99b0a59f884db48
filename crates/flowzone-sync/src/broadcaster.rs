//! Snapshot-or-patch state broadcasting.

use crate::config::BroadcastConfig;
use crate::error::Result;
use crate::message::StateMessage;
use crate::patch::diff;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, trace};

/// Message sink for broadcasts, typically a WebSocket fan-out.
///
/// Delivery is at most once; a client that misses a patch recovers through
/// a later full snapshot.
pub trait Transport: Send {
    fn send(&mut self, message: &str);
}

impl<F> Transport for F
where
    F: FnMut(&str) + Send,
{
    fn send(&mut self, message: &str) {
        self(message)
    }
}

/// What a call to [`StateBroadcaster::broadcast_state_update`] sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Broadcast {
    /// Nothing changed; nothing was sent.
    Unchanged,
    Full { revision_id: u64 },
    Patch {
        revision_id: u64,
        op_count: usize,
        bytes: usize,
    },
}

impl Broadcast {
    pub fn revision_id(&self) -> Option<u64> {
        match *self {
            Broadcast::Unchanged => None,
            Broadcast::Full { revision_id } | Broadcast::Patch { revision_id, .. } => {
                Some(revision_id)
            }
        }
    }
}

struct Inner {
    transport: Option<Box<dyn Transport>>,
    previous: Option<Value>,
    revision_id: u64,
}

/// Sends the state tree to the UI as full snapshots or minimal patches.
///
/// Every message carries a revision id one higher than the last. One
/// broadcast runs at a time; the retained snapshot and the transport share
/// a single lock, so messages reach the transport in revision order.
pub struct StateBroadcaster {
    config: BroadcastConfig,
    inner: Mutex<Inner>,
}

impl StateBroadcaster {
    pub fn new(config: BroadcastConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                transport: None,
                previous: None,
                revision_id: 0,
            }),
        }
    }

    pub fn config(&self) -> &BroadcastConfig {
        &self.config
    }

    pub fn set_transport(&self, transport: impl Transport + 'static) {
        self.inner.lock().transport = Some(Box::new(transport));
    }

    pub fn clear_transport(&self) {
        self.inner.lock().transport = None;
    }

    /// Revision id of the last message, 0 before the first.
    pub fn revision_id(&self) -> u64 {
        self.inner.lock().revision_id
    }

    /// Last snapshot sent, if any.
    pub fn last_snapshot(&self) -> Option<Value> {
        self.inner.lock().previous.clone()
    }

    /// Always send the whole tree. Used for new clients and for clients that
    /// detected a revision gap.
    pub fn broadcast_full_state<S: Serialize + ?Sized>(&self, snapshot: &S) -> Result<u64> {
        let data = serde_json::to_value(snapshot)?;
        let mut inner = self.inner.lock();
        send_full(&mut inner, data)
    }

    /// Send what changed since the last broadcast.
    ///
    /// Falls back to a full snapshot when there is no previous snapshot,
    /// when the root changed shape, or when the patch exceeds `max_ops` ops
    /// or `max_patch_bytes` bytes.
    pub fn broadcast_state_update<S: Serialize + ?Sized>(&self, snapshot: &S) -> Result<Broadcast> {
        let next = serde_json::to_value(snapshot)?;
        let mut inner = self.inner.lock();

        let ops = match inner.previous.as_ref() {
            None => {
                debug!("no previous snapshot, sending full state");
                let revision_id = send_full(&mut inner, next)?;
                return Ok(Broadcast::Full { revision_id });
            }
            Some(previous) if *previous == next => return Ok(Broadcast::Unchanged),
            Some(previous) => diff(previous, &next),
        };

        if ops.is_empty() {
            debug!("root changed shape, sending full state");
            let revision_id = send_full(&mut inner, next)?;
            return Ok(Broadcast::Full { revision_id });
        }

        let bytes = serde_json::to_string(&ops)?.len();
        if ops.len() > self.config.max_ops || bytes > self.config.max_patch_bytes {
            debug!(
                op_count = ops.len(),
                bytes, "patch over threshold, sending full state"
            );
            let revision_id = send_full(&mut inner, next)?;
            return Ok(Broadcast::Full { revision_id });
        }

        let op_count = ops.len();
        let revision_id = inner.revision_id + 1;
        let text = StateMessage::Patch { revision_id, ops }.to_json()?;
        debug!(revision_id, op_count, bytes, "sending state patch");
        deliver(&mut inner, &text);
        inner.revision_id = revision_id;
        inner.previous = Some(next);
        Ok(Broadcast::Patch {
            revision_id,
            op_count,
            bytes,
        })
    }
}

impl Default for StateBroadcaster {
    fn default() -> Self {
        Self::new(BroadcastConfig::default())
    }
}

fn send_full(inner: &mut Inner, data: Value) -> Result<u64> {
    let revision_id = inner.revision_id + 1;
    let message = StateMessage::Full { revision_id, data };
    let text = message.to_json()?;
    deliver(inner, &text);
    inner.revision_id = revision_id;
    if let StateMessage::Full { data, .. } = message {
        inner.previous = Some(data);
    }
    Ok(revision_id)
}

fn deliver(inner: &mut Inner, text: &str) {
    match inner.transport.as_mut() {
        Some(transport) => transport.send(text),
        None => trace!(bytes = text.len(), "no transport, dropping state message"),
    }
}
