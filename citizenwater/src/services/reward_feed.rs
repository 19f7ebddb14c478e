//! Reward feed: tells the ledger about newly stored observations
//!
//! When the observation and rewards services share a process the ledger is
//! called directly; otherwise the rewards service is called over HTTP. A failed
//! notification never fails the submission that triggered it.

use citizenwater_core::{Observation, RewardLedger};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::types::ServiceError;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ObservationEvent {
    is_complete: bool,
}

pub enum RewardFeed {
    /// Ledger in this process
    Local(Arc<RewardLedger>),
    /// Rewards service at `rewards_url`
    Remote {
        client: reqwest::Client,
        rewards_url: String,
    },
    Disabled,
}

impl RewardFeed {
    pub fn describe(&self) -> String {
        match self {
            RewardFeed::Local(_) => "local ledger".to_string(),
            RewardFeed::Remote { rewards_url, .. } => rewards_url.clone(),
            RewardFeed::Disabled => "disabled".to_string(),
        }
    }

    /// Credit a stored observation to its citizen
    pub async fn notify(&self, observation: &Observation) -> Result<(), ServiceError> {
        if !observation.valid {
            return Ok(());
        }

        match self {
            RewardFeed::Local(ledger) => {
                ledger
                    .record_observation(&observation.citizen_id, observation.complete)
                    .await?;
            }
            RewardFeed::Remote {
                client,
                rewards_url,
            } => {
                let url = format!(
                    "{}/api/rewards/citizen/{}/observation",
                    rewards_url.trim_end_matches('/'),
                    urlencoding::encode(observation.citizen_id.as_str())
                );

                let response = client
                    .post(&url)
                    .json(&ObservationEvent {
                        is_complete: observation.complete,
                    })
                    .send()
                    .await?;

                if !response.status().is_success() {
                    return Err(ServiceError::Upstream(format!(
                        "rewards service answered {}",
                        response.status()
                    )));
                }
            }
            RewardFeed::Disabled => {
                debug!(observation_id = %observation.id, "Reward feed disabled, skipping");
            }
        }

        Ok(())
    }

    /// Notify, logging instead of failing
    pub async fn notify_or_log(&self, observation: &Observation) {
        if let Err(e) = self.notify(observation).await {
            warn!(
                observation_id = %observation.id,
                citizen_id = %observation.citizen_id,
                error = %e,
                "Failed to credit observation to rewards"
            );
        }
    }
}
