//! Locating a step's source diagram.
//!
//! A step exists for the API only if it has a diagram: either a stored
//! `image_url` or a `manuals/<id>/step<n>.png` file under the static dir.

use std::path::PathBuf;

use tracing::debug;
use url::Url;

use crate::generation::{CacheStore, Lookup, StepId};

#[derive(Debug, Clone)]
pub struct SourceLocator {
    static_dir: PathBuf,
    app_url: Url,
}

impl SourceLocator {
    pub fn new(static_dir: PathBuf, app_url: Url) -> Self {
        Self {
            static_dir,
            app_url,
        }
    }

    /// Diagram URL for `step`, `None` when the step does not exist.
    ///
    /// A step known only from its file is provisioned in the store, so
    /// generated fields have a row to land on.
    pub async fn resolve(&self, store: &CacheStore, step: StepId) -> Option<String> {
        if let Lookup::Found(row) = store.find_step(step).await
            && !row.image_url.is_empty()
        {
            return Some(row.image_url);
        }

        let relative = format!("manuals/{}/step{}.png", step.manual_id, step.step_number);
        let path = self.static_dir.join(&relative);
        match tokio::fs::try_exists(&path).await {
            Ok(true) => {
                let url = format!("{}/{}", self.app_url.as_str().trim_end_matches('/'), relative);
                store.ensure_entity_exists(step, &url, None).await;
                Some(url)
            }
            Ok(false) => None,
            Err(e) => {
                debug!("Cannot check {}: {}", path.display(), e);
                None
            }
        }
    }
}
