//! Offline request queue.
//!
//! While the client is offline (and queueing is enabled), requests are parked
//! here in FIFO order. The online flag lives under the same lock as the queue,
//! so a request can never be parked after the queue has been drained.

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::clients::errors::ApiError;
use crate::clients::http_request::Submission;
use crate::clients::http_response::Payload;

/// Network reachability as reported by the host application.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    /// Requests are sent immediately.
    Online,
    /// Requests are queued, if offline queueing is enabled.
    Offline,
}

impl Connectivity {
    /// Returns `true` for [`Connectivity::Online`].
    #[must_use]
    pub const fn is_online(self) -> bool {
        matches!(self, Self::Online)
    }
}

/// A request parked while offline, with the channel its caller is waiting on.
pub(crate) struct QueuedRequest {
    pub(crate) submission: Submission,
    pub(crate) queued_at: DateTime<Utc>,
    pub(crate) responder: oneshot::Sender<Result<Payload, ApiError>>,
}

impl QueuedRequest {
    pub(crate) fn new(
        submission: Submission,
        responder: oneshot::Sender<Result<Payload, ApiError>>,
    ) -> Self {
        Self {
            submission,
            queued_at: Utc::now(),
            responder,
        }
    }
}

impl fmt::Debug for QueuedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueuedRequest")
            .field("method", &self.submission.method)
            .field("path", &self.submission.path)
            .field("queued_at", &self.queued_at)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
struct QueueState {
    online: bool,
    queue: VecDeque<QueuedRequest>,
}

#[derive(Debug)]
pub(crate) struct OfflineQueue {
    state: Mutex<QueueState>,
}

impl OfflineQueue {
    pub(crate) fn new(connectivity: Connectivity) -> Self {
        Self {
            state: Mutex::new(QueueState {
                online: connectivity.is_online(),
                queue: VecDeque::new(),
            }),
        }
    }

    pub(crate) fn is_online(&self) -> bool {
        self.state.lock().online
    }

    pub(crate) fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Parks the request built by `make` if currently offline.
    ///
    /// Returns `false` without calling `make` when online.
    pub(crate) fn try_enqueue<F>(&self, make: F) -> bool
    where
        F: FnOnce() -> QueuedRequest,
    {
        let mut state = self.state.lock();
        if state.online {
            return false;
        }
        state.queue.push_back(make());
        true
    }

    /// Marks the client offline. Returns `true` if this was a transition.
    pub(crate) fn go_offline(&self) -> bool {
        let mut state = self.state.lock();
        let changed = state.online;
        state.online = false;
        changed
    }

    /// Marks the client online and takes the queued requests.
    ///
    /// Returns whether this was a transition, and the snapshot to replay.
    pub(crate) fn go_online(&self) -> (bool, VecDeque<QueuedRequest>) {
        let mut state = self.state.lock();
        let changed = !state.online;
        state.online = true;
        (changed, std::mem::take(&mut state.queue))
    }

    /// Puts unreplayed requests back in front of the queue, keeping order.
    ///
    /// Fails, returning the batch, if the client is online again.
    pub(crate) fn requeue_front(
        &self,
        mut batch: VecDeque<QueuedRequest>,
    ) -> Result<usize, VecDeque<QueuedRequest>> {
        let mut state = self.state.lock();
        if state.online {
            return Err(batch);
        }
        let count = batch.len();
        batch.append(&mut state.queue);
        state.queue = batch;
        Ok(count)
    }

    /// Removes every queued request.
    pub(crate) fn drain(&self) -> VecDeque<QueuedRequest> {
        std::mem::take(&mut self.state.lock().queue)
    }
}
