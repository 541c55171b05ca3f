//! Fixed-interval status poll timer.
//!
//! One timer belongs to one generation. Each tick issues its own status call,
//! so a hung call never holds back the next tick. Results are posted back to
//! the owning session as [`Event::PollFinished`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::controller::Event;
use super::proxy_client::ProxyApi;

/// What a timer polls for.
#[derive(Debug, Clone)]
pub struct PollRequest {
    pub epoch: u64,
    pub model_id: String,
    pub task_id: String,
    pub api_key: Option<String>,
}

/// A running poll timer. Dropping it cancels the timer.
pub struct PollTimer {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
    epoch: u64,
}

impl PollTimer {
    /// Arm a timer whose first tick fires one `period` from now.
    pub fn start(
        api: Arc<dyn ProxyApi>,
        request: PollRequest,
        period: Duration,
        events: mpsc::UnboundedSender<Event>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let epoch = request.epoch;
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        tokio::spawn(poll_once(
                            api.clone(),
                            request.clone(),
                            token.clone(),
                            events.clone(),
                        ));
                    }
                }
            }
            tracing::debug!(task_id = %request.task_id, "Poll timer stopped");
        });

        Self {
            cancel,
            handle,
            epoch,
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled() && !self.handle.is_finished()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Drop for PollTimer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn poll_once(
    api: Arc<dyn ProxyApi>,
    request: PollRequest,
    token: CancellationToken,
    events: mpsc::UnboundedSender<Event>,
) {
    let result = api
        .status(&request.model_id, &request.task_id, request.api_key.as_deref())
        .await;
    // answers arriving after cancellation belong to a cleared timer
    if token.is_cancelled() {
        return;
    }
    let _ = events.send(Event::PollFinished {
        epoch: request.epoch,
        result,
    });
}
