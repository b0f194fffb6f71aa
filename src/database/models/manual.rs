//! Manual model.

use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// An assembly manual: a named group of ordered steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manual {
    /// MongoDB document ID
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    /// Public manual ID (indexed, unique)
    pub manual_id: i32,

    /// Human-readable name
    pub name: String,

    /// URL slug (unique)
    pub slug: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Colored product reference image
    #[serde(default)]
    pub product_image_url: Option<String>,
}

impl Manual {
    /// Create a manual with the placeholder name and slug used when a step
    /// is provisioned before its manual.
    pub fn placeholder(manual_id: i32) -> Self {
        Self {
            id: None,
            manual_id,
            name: format!("Manual {manual_id}"),
            slug: format!("manual-{manual_id}"),
            description: None,
            product_image_url: None,
        }
    }
}

/// Listing entry returned by the manuals endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManualSummary {
    pub id: i32,
    pub name: String,
    pub slug: String,
}

impl From<&Manual> for ManualSummary {
    fn from(manual: &Manual) -> Self {
        Self {
            id: manual.manual_id,
            name: manual.name.clone(),
            slug: manual.slug.clone(),
        }
    }
}
