//! Form values, input sanitizing and rendering from the model schema.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{Map, Value};

use super::task::UploadState;
use crate::models::{FieldDescriptor, FieldKind, ModelDescriptor};

/// Current values of the form, keyed by field name.
pub type FormValues = Map<String, Value>;

const IMAGE_ACCEPT: &[&str] = &["image/jpeg", "image/png", "image/webp"];
const VIDEO_ACCEPT: &[&str] = &["video/mp4", "video/quicktime", "video/webm", "video/x-m4v"];

/// Quote characters stripped from around pasted values.
const QUOTES: [char; 3] = ['`', '"', '\''];

/// Values of every field that declares a default.
pub fn default_values(model: &ModelDescriptor) -> FormValues {
    model
        .fields
        .iter()
        .filter_map(|f| f.default_value.map(|v| (f.name.to_string(), v.to_json())))
        .collect()
}

/// Trim a string value and strip one layer of matching surrounding quotes.
///
/// Non-string values are returned unchanged.
pub fn sanitize_value(value: &Value) -> Value {
    let Value::String(raw) = value else {
        return value.clone();
    };
    let mut cleaned = raw.trim();
    if QUOTES
        .iter()
        .any(|q| cleaned.starts_with(*q) && cleaned.ends_with(*q))
    {
        // quotes are single-byte, so slicing stays on char boundaries
        cleaned = cleaned.get(1..cleaned.len() - 1).unwrap_or("").trim();
    }
    Value::String(cleaned.to_string())
}

pub fn sanitize_form(form: &FormValues) -> FormValues {
    form.iter()
        .map(|(k, v)| (k.clone(), sanitize_value(v)))
        .collect()
}

/// Labels of required fields that have no usable value.
pub fn missing_required(model: &ModelDescriptor, form: &FormValues) -> Vec<&'static str> {
    model
        .fields
        .iter()
        .filter(|f| f.required)
        .filter(|f| form.get(f.name).map(is_blank).unwrap_or(true))
        .map(|f| f.label)
        .collect()
}

fn is_blank(value: &Value) -> bool {
    value_text(value).trim().is_empty()
}

/// Text shown for a value in an input box.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Turn raw user input into the value stored for `field`.
///
/// Number fields store a JSON number when the input parses, an empty string
/// when it is blank. Toggles accept the usual boolean spellings.
pub fn coerce_input(field: &FieldDescriptor, raw: &str) -> Value {
    match field.kind {
        FieldKind::Number => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Value::String(String::new());
            }
            trimmed
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(raw.to_string()))
        }
        FieldKind::Boolean => Value::Bool(matches!(
            raw.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )),
        _ => Value::String(raw.to_string()),
    }
}

/// MIME types offered by the file picker of a URL field.
pub fn accept_types(field_name: &str) -> &'static [&'static str] {
    if field_name.contains("image") {
        IMAGE_ACCEPT
    } else {
        VIDEO_ACCEPT
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Rendering
// ─────────────────────────────────────────────────────────────────────────────

/// One rendered form field.
#[derive(Debug, Clone, Serialize)]
pub struct FieldView {
    pub name: &'static str,
    pub label: &'static str,
    pub required: bool,
    pub help_text: Option<&'static str>,
    pub widget: Widget,
}

#[derive(Debug, Clone, Serialize)]
pub struct OptionView {
    pub label: &'static str,
    pub value: String,
    pub selected: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Widget {
    Text {
        value: String,
        placeholder: Option<&'static str>,
    },
    Textarea {
        value: String,
        placeholder: Option<&'static str>,
    },
    Url {
        value: String,
        placeholder: Option<&'static str>,
        accept: &'static [&'static str],
        upload: Option<UploadState>,
    },
    Select {
        options: Vec<OptionView>,
    },
    Number {
        value: Option<f64>,
        min: Option<f64>,
        max: Option<f64>,
        step: Option<f64>,
        placeholder: &'static str,
    },
    Toggle {
        active: bool,
    },
}

/// Render every field of `model` with the current values and upload states.
pub fn render(
    model: &ModelDescriptor,
    form: &FormValues,
    uploads: &HashMap<String, UploadState>,
) -> Vec<FieldView> {
    model
        .fields
        .iter()
        .map(|field| FieldView {
            name: field.name,
            label: field.label,
            required: field.required,
            help_text: field.help_text,
            widget: render_widget(field, form.get(field.name), uploads.get(field.name)),
        })
        .collect()
}

fn render_widget(
    field: &FieldDescriptor,
    value: Option<&Value>,
    upload: Option<&UploadState>,
) -> Widget {
    let text = value.map(value_text).unwrap_or_default();
    match field.kind {
        FieldKind::Boolean => Widget::Toggle {
            active: matches!(value, Some(Value::Bool(true)))
                || matches!(value, Some(Value::String(s)) if s == "true"),
        },
        FieldKind::Select => {
            let current = value
                .filter(|v| !v.is_null())
                .map(value_text)
                .or_else(|| field.default_value.map(|d| value_text(&d.to_json())))
                .unwrap_or_default();
            let options = field
                .options
                .iter()
                .map(|opt| {
                    let value = value_text(&opt.value.to_json());
                    OptionView {
                        label: opt.label,
                        selected: value == current,
                        value,
                    }
                })
                .collect();
            Widget::Select { options }
        }
        FieldKind::Textarea => Widget::Textarea {
            value: text,
            placeholder: field.placeholder,
        },
        FieldKind::Number => Widget::Number {
            value: value.and_then(|v| match v {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            }),
            min: field.min,
            max: field.max,
            step: field.step,
            placeholder: field.placeholder.unwrap_or("Enter value"),
        },
        FieldKind::Url => Widget::Url {
            value: text,
            placeholder: field.placeholder,
            accept: accept_types(field.name),
            upload: upload.cloned(),
        },
        FieldKind::Text => Widget::Text {
            value: text,
            placeholder: field.placeholder,
        },
    }
}
