//! Observation source for ledger rebuilds
//!
//! The rewards service rebuilds rows from a citizen's valid observations. In
//! a combined process those come straight from the local store; a standalone
//! rewards service fetches them from the observation service.

use citizenwater_core::{CitizenId, Observation, ObservationStore};
use std::sync::Arc;

use crate::types::ServiceError;

pub enum ObservationSource {
    Local(Arc<dyn ObservationStore>),
    Remote {
        client: reqwest::Client,
        observations_url: String,
    },
    Unavailable,
}

impl ObservationSource {
    pub fn describe(&self) -> String {
        match self {
            ObservationSource::Local(_) => "local store".to_string(),
            ObservationSource::Remote {
                observations_url, ..
            } => observations_url.clone(),
            ObservationSource::Unavailable => "unavailable".to_string(),
        }
    }

    async fn fetch(
        client: &reqwest::Client,
        base: &str,
        path: &str,
    ) -> Result<Vec<Observation>, ServiceError> {
        let url = format!("{}/api/observations{}", base.trim_end_matches('/'), path);
        let response = client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(ServiceError::Upstream(format!(
                "observation service answered {}",
                response.status()
            )));
        }

        Ok(response.json::<Vec<Observation>>().await?)
    }

    /// Valid observations for one citizen, oldest first
    pub async fn valid_by_citizen(
        &self,
        citizen_id: &CitizenId,
    ) -> Result<Vec<Observation>, ServiceError> {
        match self {
            ObservationSource::Local(store) => Ok(store.list_valid_by_citizen(citizen_id).await?),
            ObservationSource::Remote {
                client,
                observations_url,
            } => {
                let path = format!(
                    "/citizen/{}/valid",
                    urlencoding::encode(citizen_id.as_str())
                );
                Self::fetch(client, observations_url, &path).await
            }
            ObservationSource::Unavailable => Err(unavailable()),
        }
    }

    /// Every valid observation, oldest first
    pub async fn all_valid(&self) -> Result<Vec<Observation>, ServiceError> {
        match self {
            ObservationSource::Local(store) => Ok(store.list_valid().await?),
            ObservationSource::Remote {
                client,
                observations_url,
            } => Self::fetch(client, observations_url, "/valid").await,
            ObservationSource::Unavailable => Err(unavailable()),
        }
    }
}

fn unavailable() -> ServiceError {
    ServiceError::Upstream("Observation service is not configured".into())
}
