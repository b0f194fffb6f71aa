//! External content generation.
//!
//! Everything expensive (vision-model descriptions, tool inference,
//! colorization, orientation comparison) goes through the [`Generator`]
//! capability. The rest of the service never knows which model runs.

#[cfg(test)]
pub mod fake;
mod prompts;
mod replicate;

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

pub use replicate::ReplicateGenerator;

/// Kind of generation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenerationKind {
    Description,
    ToolList,
    Checklist,
    ColorizeImage,
    OrientationCompare,
}

impl fmt::Display for GenerationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Description => "description",
            Self::ToolList => "tool-list",
            Self::Checklist => "checklist",
            Self::ColorizeImage => "colorize-image",
            Self::OrientationCompare => "orientation-compare",
        })
    }
}

/// Context a generation call needs. Supplied by whoever triggers the
/// generation; workers never look it up again.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationInputs {
    /// Diagram URLs. Orientation comparison takes the current step first,
    /// then the next one.
    pub image_urls: Vec<String>,

    /// Previously generated text the call builds on (e.g. the description
    /// a checklist is derived from).
    pub prior_text: Option<String>,
}

impl GenerationInputs {
    pub fn image(url: impl Into<String>) -> Self {
        Self {
            image_urls: vec![url.into()],
            prior_text: None,
        }
    }

    pub fn images(current: impl Into<String>, next: impl Into<String>) -> Self {
        Self {
            image_urls: vec![current.into(), next.into()],
            prior_text: None,
        }
    }

    #[must_use]
    pub fn with_prior_text(mut self, text: impl Into<String>) -> Self {
        self.prior_text = Some(text.into());
        self
    }

    /// The step's own diagram.
    pub fn primary_image(&self) -> Option<&str> {
        self.image_urls.first().map(String::as_str)
    }
}

/// Failure of the external generation call.
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("generator is not configured (REPLICATE_API_TOKEN unset)")]
    NotConfigured,

    #[error("{kind} needs {what}")]
    MissingInput {
        kind: GenerationKind,
        what: &'static str,
    },

    #[error("request to generator failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("generator returned {status}: {message}")]
    Upstream { status: String, message: String },

    #[error("generator returned no output")]
    EmptyOutput,
}

/// Capability performing the expensive content generation.
///
/// The raw output is kind-specific: free text, JSON text, or an image URL.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        kind: GenerationKind,
        inputs: &GenerationInputs,
    ) -> Result<String, GeneratorError>;
}
