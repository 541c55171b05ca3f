//! Model registry.
//!
//! Static table of the generation models the proxy knows about. Each entry
//! carries its upstream endpoints and the form schema the client renders.

use serde::Serialize;

/// Widget kind of a form field.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Single-line text
    Text,
    /// Multi-line text
    Textarea,
    /// URL input; the client also offers a file upload for it
    Url,
    /// One of a fixed list of options
    Select,
    /// Number with optional bounds
    Number,
    /// On/off toggle
    Boolean,
}

/// A literal value usable as a field default or select option value.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    Text(&'static str),
    Number(f64),
    Bool(bool),
}

impl FieldValue {
    pub fn to_json(self) -> serde_json::Value {
        match self {
            Self::Text(s) => serde_json::Value::String(s.to_string()),
            Self::Number(n) => serde_json::json!(n),
            Self::Bool(b) => serde_json::Value::Bool(b),
        }
    }
}

/// A label/value pair of a select field.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SelectOption {
    pub label: &'static str,
    pub value: FieldValue,
}

/// Declarative description of one form field.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub label: &'static str,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help_text: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<FieldValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    #[serde(skip_serializing_if = "no_options")]
    pub options: &'static [SelectOption],
}

fn no_options(options: &&'static [SelectOption]) -> bool {
    options.is_empty()
}

impl FieldDescriptor {
    const fn base(name: &'static str, label: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            label,
            kind,
            required: false,
            placeholder: None,
            help_text: None,
            default_value: None,
            min: None,
            max: None,
            step: None,
            options: &[],
        }
    }
}

/// A remote generation capability with its endpoints and input schema.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDescriptor {
    pub id: &'static str,
    pub name: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge: Option<&'static str>,
    #[serde(rename = "type")]
    pub category: &'static str,
    pub endpoint: &'static str,
    pub status_endpoint: &'static str,
    pub description: &'static str,
    pub fields: &'static [FieldDescriptor],
}

impl ModelDescriptor {
    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&'static FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Registry table
// ─────────────────────────────────────────────────────────────────────────────

const ORIENTATION_OPTIONS: &[SelectOption] = &[
    SelectOption {
        label: "Video — matches reference video orientation (max 30s)",
        value: FieldValue::Text("video"),
    },
    SelectOption {
        label: "Image — matches character image orientation (max 10s)",
        value: FieldValue::Text("image"),
    },
];

/// Fields shared by both motion-control tiers.
const MOTION_CONTROL_FIELDS: &[FieldDescriptor] = &[
    FieldDescriptor {
        required: true,
        placeholder: Some("https://example.com/character.jpg"),
        help_text: Some("Publicly accessible URL · JPG/PNG/WEBP · min 300×300px · max 10MB"),
        ..FieldDescriptor::base("image_url", "Character Image URL", FieldKind::Url)
    },
    FieldDescriptor {
        required: true,
        placeholder: Some("https://example.com/motion.mp4"),
        help_text: Some("MP4/MOV/WEBM/M4V · 3–30 seconds · publicly accessible"),
        ..FieldDescriptor::base("video_url", "Reference Video URL", FieldKind::Url)
    },
    FieldDescriptor {
        placeholder: Some("Describe the desired motion..."),
        help_text: Some("Max 2500 characters"),
        ..FieldDescriptor::base("prompt", "Prompt (Optional)", FieldKind::Textarea)
    },
    FieldDescriptor {
        default_value: Some(FieldValue::Text("video")),
        options: ORIENTATION_OPTIONS,
        ..FieldDescriptor::base("character_orientation", "Output Orientation", FieldKind::Select)
    },
    FieldDescriptor {
        default_value: Some(FieldValue::Number(0.5)),
        min: Some(0.0),
        max: Some(1.0),
        step: Some(0.1),
        help_text: Some("Higher = stronger prompt adherence (0.0 – 1.0)"),
        ..FieldDescriptor::base("cfg_scale", "CFG Scale", FieldKind::Number)
    },
];

static MODELS: &[ModelDescriptor] = &[
    ModelDescriptor {
        id: "kling-v2-6-motion-control-pro",
        name: "Kling Motion Control Pro",
        badge: Some("PRO"),
        category: "video-effects",
        endpoint: "/v1/ai/video/kling-v2-6-motion-control-pro",
        status_endpoint: "/v1/ai/image-to-video/kling-v2-6",
        description: "Transfer motion from a reference video to a character image — preserves appearance with Pro quality",
        fields: MOTION_CONTROL_FIELDS,
    },
    ModelDescriptor {
        id: "kling-v2-6-motion-control-std",
        name: "Kling Motion Control Standard",
        badge: Some("STD"),
        category: "video-effects",
        endpoint: "/v1/ai/video/kling-v2-6-motion-control-std",
        status_endpoint: "/v1/ai/image-to-video/kling-v2-6",
        description: "Standard quality motion transfer — faster processing, more affordable",
        fields: MOTION_CONTROL_FIELDS,
    },
];

/// Find a model by its id.
pub fn get_model_by_id(id: &str) -> Option<&'static ModelDescriptor> {
    MODELS.iter().find(|m| m.id == id)
}

/// All models, in display order.
pub fn get_all_models() -> &'static [ModelDescriptor] {
    MODELS
}
