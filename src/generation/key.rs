//! Keys and values of generated step content.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::generator::GenerationKind;

/// One instruction step of one manual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StepId {
    pub manual_id: i32,
    pub step_number: i32,
}

impl StepId {
    pub fn new(manual_id: i32, step_number: i32) -> Self {
        Self {
            manual_id,
            step_number,
        }
    }

    /// The step that follows this one in the same manual, if numbering allows one.
    pub fn next(self) -> Option<Self> {
        let step_number = self.step_number.checked_add(1)?;
        Some(Self::new(self.manual_id, step_number))
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.manual_id, self.step_number)
    }
}

/// Named piece of generated content. Each field has its own cache slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Description,
    Tools,
    ImageUrl,
    ColorizedImageUrl,
    OrientationText,
}

impl Field {
    /// Column the field is persisted under in the steps collection.
    pub fn column(self) -> &'static str {
        match self {
            Self::Description => "description",
            Self::Tools => "tools",
            Self::ImageUrl => "image_url",
            Self::ColorizedImageUrl => "colorized_image_url",
            Self::OrientationText => "orientation_text",
        }
    }

    /// Generator call that produces this field.
    ///
    /// `ImageUrl` is provisioned by upload, never generated.
    pub fn generation_kind(self) -> Option<GenerationKind> {
        match self {
            Self::Description => Some(GenerationKind::Description),
            Self::Tools => Some(GenerationKind::ToolList),
            Self::ImageUrl => None,
            Self::ColorizedImageUrl => Some(GenerationKind::ColorizeImage),
            Self::OrientationText => Some(GenerationKind::OrientationCompare),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// Identifies one unit of deduplicated generation work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GenerationKey {
    pub step: StepId,
    pub field: Field,
}

impl GenerationKey {
    pub fn new(manual_id: i32, step_number: i32, field: Field) -> Self {
        Self {
            step: StepId::new(manual_id, step_number),
            field,
        }
    }
}

impl fmt::Display for GenerationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.step, self.field)
    }
}

/// "Does the step need a deliberate re-orientation before the next one?"
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrientationHint {
    pub show_popup: bool,
    pub message: String,
}

impl OrientationHint {
    /// No popup, no message.
    pub fn safe_default() -> Self {
        Self::default()
    }

    /// Decode the stored JSON text. Anything malformed counts as no signal.
    pub fn from_stored(text: &str) -> Self {
        match serde_json::from_str::<Self>(text) {
            Ok(hint) if hint.show_popup => hint,
            _ => Self::safe_default(),
        }
    }

    /// Encode as the JSON text kept in the store.
    pub fn to_stored(&self) -> String {
        // Serializing a bool and a string cannot fail
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"show_popup":false,"message":""}"#.into())
    }
}

/// Cached value of one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
    Url(String),
    Orientation(OrientationHint),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) | Self::Url(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_orientation(&self) -> Option<&OrientationHint> {
        match self {
            Self::Orientation(hint) => Some(hint),
            _ => None,
        }
    }
}
