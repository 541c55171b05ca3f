//! Session: owns the client state and carries out its effects.
//!
//! All state changes go through [`ClientState::update`]. Network effects are
//! awaited in place; poll results arrive from the timer over a channel and
//! are applied one at a time by [`Session::next_event`].

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use super::controller::{ClientState, Effect, Event, Phase, POLL_INTERVAL};
use super::key_store::ApiKeyStore;
use super::poller::{PollRequest, PollTimer};
use super::proxy_client::ProxyApi;

pub struct Session {
    state: ClientState,
    api: Arc<dyn ProxyApi>,
    key_store: Option<ApiKeyStore>,
    timer: Option<PollTimer>,
    poll_interval: Duration,
    events_tx: mpsc::UnboundedSender<Event>,
    events_rx: mpsc::UnboundedReceiver<Event>,
}

impl Session {
    pub fn new(api: Arc<dyn ProxyApi>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            state: ClientState::default(),
            api,
            key_store: None,
            timer: None,
            poll_interval: POLL_INTERVAL,
            events_tx,
            events_rx,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Attach persistent key storage and load the saved key from it.
    pub async fn with_key_store(mut self, store: ApiKeyStore) -> Self {
        if let Some(key) = store.api_key().await {
            self.state.update(Event::ApiKeyLoaded(key));
        }
        self.key_store = Some(store);
        self
    }

    pub fn state(&self) -> &ClientState {
        &self.state
    }

    /// Whether a poll timer is currently armed.
    pub fn is_timer_active(&self) -> bool {
        self.timer.as_ref().is_some_and(PollTimer::is_active)
    }

    /// Apply an event and everything that follows from its effects.
    pub async fn dispatch(&mut self, event: Event) {
        let mut queue = VecDeque::from([event]);
        while let Some(event) = queue.pop_front() {
            for effect in self.state.update(event) {
                if let Some(next) = self.execute(effect).await {
                    queue.push_back(next);
                }
            }
        }
    }

    /// Wait for the next timer event and apply it.
    ///
    /// Returns `false` when no timer is running, so nothing can arrive.
    pub async fn next_event(&mut self) -> bool {
        if !self.is_timer_active() {
            return false;
        }
        match self.events_rx.recv().await {
            Some(event) => {
                self.dispatch(event).await;
                true
            }
            None => false,
        }
    }

    /// Apply timer events until the current generation settles.
    ///
    /// `on_update` sees the state after every applied event.
    pub async fn run_until_settled<F>(&mut self, mut on_update: F) -> Phase
    where
        F: FnMut(&ClientState),
    {
        while self.state.is_polling() {
            if !self.next_event().await {
                break;
            }
            on_update(&self.state);
        }
        self.state.phase()
    }

    async fn execute(&mut self, effect: Effect) -> Option<Event> {
        match effect {
            Effect::Upload {
                model_epoch,
                field,
                file,
            } => {
                tracing::info!(field = %field, file_name = %file.file_name, "Uploading file");
                let result = self.api.upload(&file).await;
                Some(Event::UploadFinished {
                    model_epoch,
                    field,
                    file_name: file.file_name,
                    result,
                })
            }
            Effect::Generate {
                epoch,
                body,
                api_key,
            } => {
                let result = self.api.generate(&body, api_key.as_deref()).await;
                Some(Event::GenerateFinished { epoch, result })
            }
            Effect::StartPolling {
                epoch,
                model_id,
                task_id,
                api_key,
            } => {
                self.stop_timer();
                // drop results queued by the previous timer
                while self.events_rx.try_recv().is_ok() {}
                self.timer = Some(PollTimer::start(
                    self.api.clone(),
                    PollRequest {
                        epoch,
                        model_id,
                        task_id,
                        api_key,
                    },
                    self.poll_interval,
                    self.events_tx.clone(),
                ));
                None
            }
            Effect::StopPolling => {
                self.stop_timer();
                None
            }
            Effect::PersistApiKey(key) => {
                match &self.key_store {
                    Some(store) => {
                        if let Err(e) = store.set_api_key(&key).await {
                            tracing::warn!(error = %e, "Failed to persist API key");
                        }
                    }
                    None => tracing::debug!("No key store attached; API key kept in memory"),
                }
                None
            }
        }
    }

    fn stop_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            tracing::debug!(epoch = timer.epoch(), "Cancelling poll timer");
            timer.cancel();
        }
    }
}
