//! Generation lifecycle state machine.
//!
//! `ClientState` owns the form, the current task, upload states and history.
//! It is only mutated through [`ClientState::update`], which returns the
//! effects (network calls, timer changes) the caller must carry out. Results
//! of those effects come back in as events tagged with the epoch they were
//! issued under, so answers for a superseded generation are dropped.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;

use super::error::ClientError;
use super::form::{self, FieldView, FormValues};
use super::proxy_client::UploadFile;
use super::task::{GenerationTask, HistoryEntry, TaskStatus, UploadState};
use crate::models::{get_all_models, get_model_by_id, ModelDescriptor};

/// Period of the status poll timer.
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Consecutive poll failures after which the task is given up.
pub const MAX_POLL_ERRORS: u32 = 10;

const POLL_GIVE_UP_MESSAGE: &str = "Failed to check status after several attempts";

/// Where the client is in the generate → poll → display lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Submitting,
    Polling,
    Completed,
    Failed,
}

/// Inputs to the state machine: user actions and results of effects.
#[derive(Debug)]
pub enum Event {
    SelectModel(String),
    SetField {
        name: String,
        value: Value,
    },
    UploadRequested {
        field: String,
        file: UploadFile,
    },
    UploadFinished {
        model_epoch: u64,
        field: String,
        file_name: String,
        result: Result<String, ClientError>,
    },
    GenerateRequested,
    GenerateFinished {
        epoch: u64,
        result: Result<Value, ClientError>,
    },
    PollFinished {
        epoch: u64,
        result: Result<Value, ClientError>,
    },
    ApiKeyEdited(String),
    ApiKeySaved,
    ApiKeyLoaded(String),
}

/// Work requested by the state machine.
#[derive(Debug)]
pub enum Effect {
    Upload {
        model_epoch: u64,
        field: String,
        file: UploadFile,
    },
    Generate {
        epoch: u64,
        body: Value,
        api_key: Option<String>,
    },
    StartPolling {
        epoch: u64,
        model_id: String,
        task_id: String,
        api_key: Option<String>,
    },
    StopPolling,
    PersistApiKey(String),
}

#[derive(Debug, Clone)]
pub struct ClientState {
    model: &'static ModelDescriptor,
    form: FormValues,
    uploads: HashMap<String, UploadState>,
    task: Option<GenerationTask>,
    history: Vec<HistoryEntry>,
    error: Option<String>,
    phase: Phase,
    poll_errors: u32,
    api_key: String,
    api_key_saved: bool,
    /// Bumped when a generation starts or the model changes
    epoch: u64,
    /// Bumped when the model changes
    model_epoch: u64,
    /// Prompt of the generation being submitted
    pending_prompt: Option<String>,
}

impl Default for ClientState {
    fn default() -> Self {
        Self::with_model(&get_all_models()[0])
    }
}

impl ClientState {
    pub fn with_model(model: &'static ModelDescriptor) -> Self {
        Self {
            model,
            form: form::default_values(model),
            uploads: HashMap::new(),
            task: None,
            history: Vec::new(),
            error: None,
            phase: Phase::Idle,
            poll_errors: 0,
            api_key: String::new(),
            api_key_saved: false,
            epoch: 0,
            model_epoch: 0,
            pending_prompt: None,
        }
    }

    // ── accessors ───────────────────────────────────────────────────────────

    pub fn model(&self) -> &'static ModelDescriptor {
        self.model
    }

    pub fn form(&self) -> &FormValues {
        &self.form
    }

    pub fn uploads(&self) -> &HashMap<String, UploadState> {
        &self.uploads
    }

    pub fn task(&self) -> Option<&GenerationTask> {
        self.task.as_ref()
    }

    /// Completed generations, newest first.
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn poll_errors(&self) -> u32 {
        self.poll_errors
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn api_key_saved(&self) -> bool {
        self.api_key_saved
    }

    /// A generation is being submitted or polled.
    pub fn is_busy(&self) -> bool {
        matches!(self.phase, Phase::Submitting | Phase::Polling)
    }

    pub fn is_polling(&self) -> bool {
        self.phase == Phase::Polling
    }

    pub fn render(&self) -> Vec<FieldView> {
        form::render(self.model, &self.form, &self.uploads)
    }

    // ── transitions ─────────────────────────────────────────────────────────

    /// Apply one event and return the effects to run.
    pub fn update(&mut self, event: Event) -> Vec<Effect> {
        match event {
            Event::SelectModel(id) => self.select_model(&id),
            Event::SetField { name, value } => {
                self.form.insert(name, value);
                Vec::new()
            }
            Event::UploadRequested { field, file } => self.start_upload(field, file),
            Event::UploadFinished {
                model_epoch,
                field,
                file_name,
                result,
            } => {
                self.finish_upload(model_epoch, field, &file_name, result);
                Vec::new()
            }
            Event::GenerateRequested => self.start_generate(),
            Event::GenerateFinished { epoch, result } => self.finish_generate(epoch, result),
            Event::PollFinished { epoch, result } => self.finish_poll(epoch, result),
            Event::ApiKeyEdited(key) => {
                self.api_key = key;
                self.api_key_saved = false;
                Vec::new()
            }
            Event::ApiKeySaved => {
                self.api_key_saved = true;
                vec![Effect::PersistApiKey(self.api_key.clone())]
            }
            Event::ApiKeyLoaded(key) => {
                if !key.is_empty() {
                    self.api_key = key;
                    self.api_key_saved = true;
                }
                Vec::new()
            }
        }
    }

    fn select_model(&mut self, id: &str) -> Vec<Effect> {
        let Some(model) = get_model_by_id(id) else {
            self.error = Some(format!("Unknown model: {}", id));
            return Vec::new();
        };
        if model.id == self.model.id {
            return Vec::new();
        }

        tracing::debug!(model = %model.id, "Switching model");
        self.model = model;
        self.form = form::default_values(model);
        self.uploads.clear();
        self.task = None;
        self.error = None;
        self.phase = Phase::Idle;
        self.poll_errors = 0;
        self.pending_prompt = None;
        self.epoch += 1;
        self.model_epoch += 1;
        vec![Effect::StopPolling]
    }

    fn start_upload(&mut self, field: String, file: UploadFile) -> Vec<Effect> {
        if self.uploads.get(&field).is_some_and(|u| u.uploading) {
            return Vec::new();
        }
        self.uploads
            .insert(field.clone(), UploadState::started(&file.file_name));
        vec![Effect::Upload {
            model_epoch: self.model_epoch,
            field,
            file,
        }]
    }

    fn finish_upload(
        &mut self,
        model_epoch: u64,
        field: String,
        file_name: &str,
        result: Result<String, ClientError>,
    ) {
        if model_epoch != self.model_epoch {
            tracing::debug!(field = %field, "Dropping upload result for a previous model");
            return;
        }
        match result {
            Ok(url) => {
                self.form.insert(field.clone(), Value::String(url));
                self.uploads.insert(field, UploadState::succeeded(file_name));
            }
            Err(e) => {
                let message = match e {
                    ClientError::Transport(_) => "Upload failed: connection error".to_string(),
                    other => other.to_string(),
                };
                self.uploads
                    .insert(field, UploadState::failed(file_name, message));
            }
        }
    }

    fn start_generate(&mut self) -> Vec<Effect> {
        if self.is_busy() {
            return Vec::new();
        }

        self.error = None;
        self.task = None;
        self.poll_errors = 0;
        self.epoch += 1;
        let mut effects = vec![Effect::StopPolling];

        let sanitized = form::sanitize_form(&self.form);
        let missing = form::missing_required(self.model, &sanitized);
        if !missing.is_empty() {
            self.error = Some(format!("Missing required fields: {}", missing.join(", ")));
            self.phase = Phase::Idle;
            return effects;
        }

        self.pending_prompt = sanitized
            .get("prompt")
            .map(form::value_text)
            .filter(|p| !p.is_empty());

        let mut body = serde_json::Map::new();
        body.insert("model".to_string(), Value::String(self.model.id.to_string()));
        body.extend(sanitized);

        self.phase = Phase::Submitting;
        effects.push(Effect::Generate {
            epoch: self.epoch,
            body: Value::Object(body),
            api_key: self.request_key(),
        });
        effects
    }

    fn finish_generate(&mut self, epoch: u64, result: Result<Value, ClientError>) -> Vec<Effect> {
        if epoch != self.epoch || self.phase != Phase::Submitting {
            return Vec::new();
        }

        let body = match result {
            Ok(body) => body,
            Err(e) => {
                self.error = Some(e.to_string());
                self.phase = Phase::Idle;
                return Vec::new();
            }
        };

        let data = payload(&body);
        let Some(task_id) = data.get("task_id").and_then(id_text) else {
            self.error = Some("No task ID returned".to_string());
            self.phase = Phase::Idle;
            return Vec::new();
        };
        let status = data
            .get("status")
            .and_then(Value::as_str)
            .map(TaskStatus::from_remote)
            .unwrap_or(TaskStatus::Created);

        tracing::info!(task_id = %task_id, model = %self.model.id, "Generation submitted");
        self.task = Some(GenerationTask {
            task_id: task_id.clone(),
            model_id: self.model.id.to_string(),
            model_name: self.model.name.to_string(),
            status,
            generated: Vec::new(),
            error: None,
            prompt: self.pending_prompt.take(),
        });
        self.phase = Phase::Polling;

        vec![Effect::StartPolling {
            epoch: self.epoch,
            model_id: self.model.id.to_string(),
            task_id,
            api_key: self.request_key(),
        }]
    }

    fn finish_poll(&mut self, epoch: u64, result: Result<Value, ClientError>) -> Vec<Effect> {
        if epoch != self.epoch || self.phase != Phase::Polling {
            return Vec::new();
        }
        let Some(task) = self.task.as_mut() else {
            return Vec::new();
        };

        let body = match result {
            Ok(body) => body,
            Err(e) => {
                self.poll_errors += 1;
                tracing::warn!(attempt = self.poll_errors, error = %e, "Poll error");
                if self.poll_errors < MAX_POLL_ERRORS {
                    return Vec::new();
                }
                task.status = TaskStatus::Failed;
                task.error = Some(
                    e.proxy_message()
                        .filter(|m| !m.is_empty())
                        .unwrap_or(POLL_GIVE_UP_MESSAGE)
                        .to_string(),
                );
                self.phase = Phase::Failed;
                return vec![Effect::StopPolling];
            }
        };

        self.poll_errors = 0;
        let data = payload(&body);
        task.status = data
            .get("status")
            .and_then(Value::as_str)
            .map(TaskStatus::from_remote)
            .unwrap_or(TaskStatus::Unknown);
        task.generated = data
            .get("generated")
            .and_then(Value::as_array)
            .map(|urls| {
                urls.iter()
                    .filter_map(Value::as_str)
                    .filter(|u| !u.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        task.error = None;

        if task.status.is_success() {
            tracing::info!(task_id = %task.task_id, results = task.generated.len(), "Generation completed");
            if let Some(url) = task.first_result() {
                self.history.insert(
                    0,
                    HistoryEntry {
                        model_name: task.model_name.clone(),
                        prompt: task.prompt.clone().unwrap_or_default(),
                        video_url: url.to_string(),
                        created_at: Utc::now(),
                    },
                );
            }
            self.phase = Phase::Completed;
            vec![Effect::StopPolling]
        } else if task.status.is_failure() {
            tracing::warn!(task_id = %task.task_id, status = %task.status, "Generation failed");
            self.phase = Phase::Failed;
            vec![Effect::StopPolling]
        } else {
            Vec::new()
        }
    }

    fn request_key(&self) -> Option<String> {
        Some(self.api_key.trim().to_string()).filter(|k| !k.is_empty())
    }
}

/// The upstream wraps results in `data`; some replies are bare.
fn payload(body: &Value) -> &Value {
    match body.get("data") {
        Some(data) if !data.is_null() => data,
        _ => body,
    }
}

fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
