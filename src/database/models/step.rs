//! Step model.

use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::generation::{Field, FieldValue, OrientationHint, StepId};

/// One instruction step with its generated fields.
///
/// Generated fields stay `None` until a worker writes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// MongoDB document ID
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    /// Owning manual (must exist)
    pub manual_id: i32,

    pub step_number: i32,

    /// Source diagram
    pub image_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colorized_image_url: Option<String>,

    /// JSON text of an [`OrientationHint`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orientation_text: Option<String>,
}

impl Step {
    /// Create a bare step row with only its diagram.
    pub fn new(step: StepId, image_url: impl Into<String>) -> Self {
        Self {
            id: None,
            manual_id: step.manual_id,
            step_number: step.step_number,
            image_url: image_url.into(),
            description: None,
            tools: None,
            colorized_image_url: None,
            orientation_text: None,
        }
    }

    pub fn step_id(&self) -> StepId {
        StepId::new(self.manual_id, self.step_number)
    }

    /// Current value of a field, if present.
    pub fn field(&self, field: Field) -> Option<FieldValue> {
        match field {
            Field::Description => self.description.clone().map(FieldValue::Text),
            Field::Tools => self.tools.clone().map(FieldValue::List),
            Field::ImageUrl => {
                (!self.image_url.is_empty()).then(|| FieldValue::Url(self.image_url.clone()))
            }
            Field::ColorizedImageUrl => self.colorized_image_url.clone().map(FieldValue::Url),
            Field::OrientationText => self
                .orientation_text
                .as_deref()
                .map(|text| FieldValue::Orientation(OrientationHint::from_stored(text))),
        }
    }

    /// Overwrite a field.
    pub fn set_field(&mut self, field: Field, value: &FieldValue) {
        match (field, value) {
            (Field::Description, FieldValue::Text(text)) => self.description = Some(text.clone()),
            (Field::Tools, FieldValue::List(items)) => self.tools = Some(items.clone()),
            (Field::ImageUrl, FieldValue::Url(url)) => self.image_url = url.clone(),
            (Field::ColorizedImageUrl, FieldValue::Url(url)) => {
                self.colorized_image_url = Some(url.clone())
            }
            (Field::OrientationText, FieldValue::Orientation(hint)) => {
                self.orientation_text = Some(hint.to_stored())
            }
            _ => {}
        }
    }
}

/// Listing entry returned by the steps endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepSummary {
    pub step_number: i32,
    pub image_url: String,
    pub description: Option<String>,
}

impl From<&Step> for StepSummary {
    fn from(step: &Step) -> Self {
        Self {
            step_number: step.step_number,
            image_url: step.image_url.clone(),
            description: step.description.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_roundtrip_through_row() {
        let mut step = Step::new(StepId::new(1, 2), "http://localhost:4000/manuals/1/step2.png");
        assert!(step.field(Field::Description).is_none());
        assert!(step.field(Field::ImageUrl).is_some());

        let hint = OrientationHint {
            show_popup: true,
            message: "Turn the cabinet on its back".into(),
        };
        step.set_field(Field::OrientationText, &FieldValue::Orientation(hint.clone()));
        assert_eq!(
            step.field(Field::OrientationText),
            Some(FieldValue::Orientation(hint))
        );
    }

    #[test]
    fn test_mismatched_value_is_ignored() {
        let mut step = Step::new(StepId::new(1, 1), "x");
        step.set_field(Field::Tools, &FieldValue::Text("hammer".into()));
        assert!(step.tools.is_none());
    }
}
