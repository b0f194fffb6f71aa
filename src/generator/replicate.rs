//! Replicate-hosted model backend.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::prompts;
use super::{GenerationInputs, GenerationKind, Generator, GeneratorError};

const API_BASE: &str = "https://api.replicate.com/v1";

/// Delay between polls of a prediction that outlived `Prefer: wait`.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Generator calling models hosted on Replicate.
#[derive(Clone)]
pub struct ReplicateGenerator {
    client: reqwest::Client,
    api_token: Option<String>,
    text_model: String,
    image_model: String,
}

/// Subset of a Replicate prediction we care about.
#[derive(Debug, Deserialize)]
struct Prediction {
    status: String,
    #[serde(default)]
    output: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    urls: Option<PredictionUrls>,
}

#[derive(Debug, Deserialize)]
struct PredictionUrls {
    get: String,
}

impl Prediction {
    fn is_terminal(&self) -> bool {
        matches!(self.status.as_str(), "succeeded" | "failed" | "canceled")
    }
}

impl ReplicateGenerator {
    /// Create a generator. Without a token every call fails with
    /// [`GeneratorError::NotConfigured`].
    pub fn new(api_token: Option<String>, text_model: String, image_model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_token,
            text_model,
            image_model,
        }
    }

    fn model_for(&self, kind: GenerationKind) -> &str {
        match kind {
            GenerationKind::ColorizeImage => &self.image_model,
            _ => &self.text_model,
        }
    }

    /// Model input document for one call.
    fn build_input(kind: GenerationKind, inputs: &GenerationInputs) -> Result<Value, GeneratorError> {
        match kind {
            GenerationKind::ColorizeImage => {
                let image = inputs.primary_image().ok_or(GeneratorError::MissingInput {
                    kind,
                    what: "a source image",
                })?;
                Ok(json!({ "input_image": image }))
            }
            GenerationKind::OrientationCompare => {
                if inputs.image_urls.len() < 2 {
                    return Err(GeneratorError::MissingInput {
                        kind,
                        what: "the current and the next step image",
                    });
                }
                let (system_prompt, prompt) = prompts::for_kind(kind, None);
                Ok(json!({
                    "system_prompt": system_prompt,
                    "prompt": prompt,
                    "image_input": &inputs.image_urls[..2],
                    "max_output_tokens": prompts::ORIENTATION_MAX_OUTPUT_TOKENS,
                }))
            }
            GenerationKind::Checklist => {
                let description = inputs.prior_text.as_deref().ok_or(GeneratorError::MissingInput {
                    kind,
                    what: "a step description",
                })?;
                let (system_prompt, prompt) = prompts::for_kind(kind, Some(description));
                Ok(json!({
                    "system_prompt": system_prompt,
                    "prompt": prompt,
                }))
            }
            GenerationKind::Description | GenerationKind::ToolList => {
                let image = inputs.primary_image().ok_or(GeneratorError::MissingInput {
                    kind,
                    what: "a source image",
                })?;
                let (system_prompt, prompt) = prompts::for_kind(kind, None);
                Ok(json!({
                    "system_prompt": system_prompt,
                    "prompt": prompt,
                    "image_input": [image],
                }))
            }
        }
    }

    /// Flatten prediction output into the raw text handed back to callers.
    ///
    /// Text models stream tokens as an array of strings; image models
    /// return one URL or an array of URLs.
    fn flatten_output(kind: GenerationKind, output: Value) -> Result<String, GeneratorError> {
        let text = match output {
            Value::String(s) => s,
            Value::Array(items) => {
                let parts = items.into_iter().filter_map(|v| match v {
                    Value::String(s) => Some(s),
                    _ => None,
                });
                if kind == GenerationKind::ColorizeImage {
                    parts.take(1).collect()
                } else {
                    parts.collect()
                }
            }
            Value::Null => String::new(),
            other => other.to_string(),
        };

        if text.trim().is_empty() {
            return Err(GeneratorError::EmptyOutput);
        }
        Ok(text)
    }

    async fn fetch(&self, token: &str, url: &str) -> Result<Prediction, GeneratorError> {
        let prediction = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await?
            .error_for_status()?
            .json::<Prediction>()
            .await?;
        Ok(prediction)
    }
}

#[async_trait]
impl Generator for ReplicateGenerator {
    async fn generate(
        &self,
        kind: GenerationKind,
        inputs: &GenerationInputs,
    ) -> Result<String, GeneratorError> {
        let token = self.api_token.as_deref().ok_or(GeneratorError::NotConfigured)?;
        let model = self.model_for(kind);
        let input = Self::build_input(kind, inputs)?;

        debug!("Replicate {} call on {}", kind, model);

        let mut prediction = self
            .client
            .post(format!("{API_BASE}/models/{model}/predictions"))
            .bearer_auth(token)
            .header("Prefer", "wait")
            .json(&json!({ "input": input }))
            .send()
            .await?
            .error_for_status()?
            .json::<Prediction>()
            .await?;

        while !prediction.is_terminal() {
            let Some(poll_url) = prediction.urls.as_ref().map(|u| u.get.clone()) else {
                return Err(GeneratorError::Upstream {
                    status: prediction.status,
                    message: "prediction has no polling URL".into(),
                });
            };
            tokio::time::sleep(POLL_INTERVAL).await;
            prediction = self.fetch(token, &poll_url).await?;
        }

        if prediction.status != "succeeded" {
            let message = prediction
                .error
                .map(|e| match e {
                    Value::String(s) => s,
                    other => other.to_string(),
                })
                .unwrap_or_else(|| "no error message".into());
            return Err(GeneratorError::Upstream {
                status: prediction.status,
                message,
            });
        }

        Self::flatten_output(kind, prediction.output.unwrap_or(Value::Null))
    }
}
