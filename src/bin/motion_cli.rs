//! Terminal front end for the motion proxy.
//!
//! Renders the model forms, uploads local media, submits a generation and
//! follows it until the result video is ready.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use motion_proxy::client::form::{FieldView, Widget};
use motion_proxy::client::{
    form, ApiKeyStore, ClientState, Event, HttpProxyClient, Phase, Session, UploadFile,
};
use motion_proxy::models::{get_all_models, get_model_by_id};
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "motion-cli", version, about = "Motion-transfer video generation client")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Base URL of the motion proxy
    #[arg(long, env = "MOTION_PROXY_URL", default_value = "http://127.0.0.1:3000", global = true)]
    server: String,

    /// Directory holding the saved API key
    #[arg(long, env = "MOTION_CLI_DIR", default_value = ".motion-cli", global = true)]
    state_dir: PathBuf,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List models and the fields of their forms
    Models {
        /// Only show this model
        #[arg(long)]
        model: Option<String>,
    },

    /// Save the API key sent with generate and status calls
    SetKey { key: String },

    /// Generate a motion-transfer video and wait for the result
    Generate(GenerateArgs),
}

#[derive(Debug, Args)]
struct GenerateArgs {
    /// Model id (see `models`)
    #[arg(long, default_value = "kling-v2-6-motion-control-pro")]
    model: String,

    /// Character image: a public URL or a local file to upload
    #[arg(long)]
    image: Option<String>,

    /// Reference video: a public URL or a local file to upload
    #[arg(long)]
    video: Option<String>,

    #[arg(long)]
    prompt: Option<String>,

    /// `video` or `image`
    #[arg(long)]
    orientation: Option<String>,

    #[arg(long)]
    cfg_scale: Option<String>,

    /// Any other field, as `name=value`
    #[arg(long = "set", value_name = "NAME=VALUE")]
    fields: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "motion_proxy=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Models { model } => list_models(model.as_deref()),
        Command::SetKey { key } => {
            let mut session = open_session(&cli.server, &cli.state_dir).await;
            session.dispatch(Event::ApiKeyEdited(key)).await;
            session.dispatch(Event::ApiKeySaved).await;
            println!("API key saved in {}", cli.state_dir.display());
            Ok(())
        }
        Command::Generate(args) => generate(&cli.server, &cli.state_dir, args).await,
    }
}

async fn open_session(server: &str, state_dir: &Path) -> Session {
    let api = Arc::new(HttpProxyClient::new(server));
    Session::new(api)
        .with_key_store(ApiKeyStore::open(state_dir).await)
        .await
}

fn list_models(only: Option<&str>) -> Result<()> {
    let models = match only {
        Some(id) => vec![get_model_by_id(id).with_context(|| format!("Unknown model: {}", id))?],
        None => get_all_models().iter().collect(),
    };
    for model in models {
        let badge = model.badge.map(|b| format!(" [{}]", b)).unwrap_or_default();
        println!("{}{}  ({})", model.name, badge, model.id);
        println!("  {}", model.description);
        let state = ClientState::with_model(model);
        for view in state.render() {
            println!("  {}", describe_field(&view));
        }
        println!();
    }
    Ok(())
}

fn describe_field(view: &FieldView) -> String {
    let marker = if view.required { "*" } else { "" };
    let detail = match &view.widget {
        Widget::Text { value, .. } | Widget::Textarea { value, .. } => format!("text = {:?}", value),
        Widget::Url { value, accept, .. } => {
            format!("url = {:?} (or upload {})", value, accept.join(", "))
        }
        Widget::Select { options } => options
            .iter()
            .map(|o| {
                if o.selected {
                    format!("[{}]", o.value)
                } else {
                    o.value.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(" | "),
        Widget::Number {
            value, min, max, step, ..
        } => format!(
            "number = {} (min {:?}, max {:?}, step {:?})",
            value.map(|v| v.to_string()).unwrap_or_default(),
            min,
            max,
            step
        ),
        Widget::Toggle { active } => format!("toggle = {}", active),
    };
    let help = view.help_text.map(|h| format!(" ({})", h)).unwrap_or_default();
    format!("{}{} ({}): {}{}", view.name, marker, view.label, detail, help)
}

async fn generate(server: &str, state_dir: &Path, args: GenerateArgs) -> Result<()> {
    let mut session = open_session(server, state_dir).await;
    session.dispatch(Event::SelectModel(args.model.clone())).await;
    if let Some(error) = session.state().error() {
        bail!("{}", error);
    }
    let model = session.state().model();

    for (field, source) in [("image_url", &args.image), ("video_url", &args.video)] {
        if let Some(source) = source {
            set_media(&mut session, field, source).await?;
        }
    }

    let mut inputs: Vec<(String, String)> = Vec::new();
    if let Some(prompt) = args.prompt {
        inputs.push(("prompt".to_string(), prompt));
    }
    if let Some(orientation) = args.orientation {
        inputs.push(("character_orientation".to_string(), orientation));
    }
    if let Some(cfg) = args.cfg_scale {
        inputs.push(("cfg_scale".to_string(), cfg));
    }
    for pair in &args.fields {
        let (name, value) = pair
            .split_once('=')
            .with_context(|| format!("Expected NAME=VALUE, got {:?}", pair))?;
        inputs.push((name.to_string(), value.to_string()));
    }
    for (name, raw) in inputs {
        let field = model
            .field(&name)
            .with_context(|| format!("{} has no field {:?}", model.name, name))?;
        session
            .dispatch(Event::SetField {
                name,
                value: form::coerce_input(field, &raw),
            })
            .await;
    }

    session.dispatch(Event::GenerateRequested).await;
    if let Some(error) = session.state().error() {
        bail!("{}", error);
    }
    let task = session
        .state()
        .task()
        .context("Generation was not started")?;
    println!("Task {} submitted ({})", task.task_id, task.status);

    let mut last_status = task.status;
    let phase = session
        .run_until_settled(|state| {
            if let Some(task) = state.task() {
                if task.status != last_status {
                    println!("Status: {} ({})", task.status, task.status.display_class());
                    last_status = task.status;
                }
            }
        })
        .await;

    let state = session.state();
    match (phase, state.task()) {
        (Phase::Completed, Some(task)) => {
            match task.first_result() {
                Some(url) => println!("Video ready: {}", url),
                None => println!("Task {} completed without a result URL", task.task_id),
            }
            for entry in state.history() {
                println!(
                    "  history: {} | {} | {} | {}",
                    entry.created_at.to_rfc3339(),
                    entry.model_name,
                    if entry.prompt.is_empty() { "No prompt" } else { &entry.prompt },
                    entry.video_url
                );
            }
            Ok(())
        }
        (_, Some(task)) => bail!(
            "Task {} ended with {}: {}",
            task.task_id,
            task.status,
            task.error.as_deref().unwrap_or("no details")
        ),
        (_, None) => bail!("{}", state.error().unwrap_or("Generation was abandoned")),
    }
}

/// Put a URL into `field`, uploading `source` first when it is a local path.
async fn set_media(session: &mut Session, field: &str, source: &str) -> Result<()> {
    if source.starts_with("https://") || source.starts_with("http://") {
        session
            .dispatch(Event::SetField {
                name: field.to_string(),
                value: json!(source),
            })
            .await;
        return Ok(());
    }

    let file = UploadFile::from_path(Path::new(source))
        .await
        .with_context(|| format!("Failed to read {}", source))?;
    println!("Uploading {} ({} bytes)...", file.file_name, file.data.len());
    session
        .dispatch(Event::UploadRequested {
            field: field.to_string(),
            file,
        })
        .await;

    match session.state().uploads().get(field) {
        Some(upload) if upload.succeeded => {
            let url = session.state().form().get(field).map(form::value_text);
            println!("Uploaded: {}", url.unwrap_or_default());
            Ok(())
        }
        Some(upload) => bail!("Upload of {} failed: {}", source, upload.progress),
        None => bail!("Upload of {} did not start", source),
    }
}
