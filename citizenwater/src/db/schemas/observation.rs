//! Observation document schema

use bson::{doc, oid::ObjectId, DateTime, Document};
use citizenwater_core::{CitizenId, CoreError, Observation};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for observations
pub const OBSERVATION_COLLECTION: &str = "observations";

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ObservationDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    /// Public observation id (UUID)
    pub observation_id: String,

    pub citizen_id: String,

    pub postcode: String,

    pub temperature: Option<f64>,
    pub ph: Option<f64>,
    pub alkalinity: Option<f64>,
    pub turbidity: Option<f64>,

    #[serde(default)]
    pub observations: Vec<String>,

    #[serde(default)]
    pub image_paths: Vec<String>,

    /// Submission time
    pub timestamp: DateTime,

    pub valid: bool,

    pub complete: bool,
}

impl From<Observation> for ObservationDoc {
    fn from(observation: Observation) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            observation_id: observation.id,
            citizen_id: observation.citizen_id.to_string(),
            postcode: observation.postcode,
            temperature: observation.temperature,
            ph: observation.ph,
            alkalinity: observation.alkalinity,
            turbidity: observation.turbidity,
            observations: observation.observations,
            image_paths: observation.image_paths,
            timestamp: DateTime::from_chrono(observation.timestamp),
            valid: observation.valid,
            complete: observation.complete,
        }
    }
}

impl TryFrom<ObservationDoc> for Observation {
    type Error = CoreError;

    fn try_from(doc: ObservationDoc) -> Result<Self, Self::Error> {
        Ok(Self {
            id: doc.observation_id,
            citizen_id: CitizenId::parse(&doc.citizen_id)?,
            postcode: doc.postcode,
            temperature: doc.temperature,
            ph: doc.ph,
            alkalinity: doc.alkalinity,
            turbidity: doc.turbidity,
            observations: doc.observations,
            image_paths: doc.image_paths,
            timestamp: doc.timestamp.to_chrono(),
            valid: doc.valid,
            complete: doc.complete,
        })
    }
}

impl IntoIndexes for ObservationDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "observation_id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("observation_id_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "citizen_id": 1, "timestamp": 1 },
                Some(
                    IndexOptions::builder()
                        .name("citizen_timestamp_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "postcode": 1 },
                Some(
                    IndexOptions::builder()
                        .name("postcode_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for ObservationDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
