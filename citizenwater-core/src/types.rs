//! Domain types shared by every citizen water service
//!
//! Citizen identifiers, badges, the per-citizen reward ledger row and
//! water-quality observations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Longest accepted citizen identifier
pub const MAX_CITIZEN_ID_LEN: usize = 100;

/// Points awarded for any valid observation
pub const BASE_OBSERVATION_POINTS: i64 = 10;

/// Extra points awarded when the observation is also complete
pub const COMPLETE_OBSERVATION_BONUS: i64 = 10;

/// Label reported as the next badge once Gold is reached
pub const MAXIMUM_LEVEL: &str = "Maximum Level";

// =============================================================================
// CitizenId
// =============================================================================

/// Opaque citizen identifier shared by the auth, observation and rewards stores.
///
/// The identifier is never checked against another store; it is only trimmed
/// and bounded so that every service keys its rows the same way.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CitizenId(String);

impl CitizenId {
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CoreError::InvalidCitizenId("citizen id is required".into()));
        }
        if trimmed.chars().count() > MAX_CITIZEN_ID_LEN {
            return Err(CoreError::InvalidCitizenId(format!(
                "citizen id must be at most {} characters",
                MAX_CITIZEN_ID_LEN
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Generate a fresh identifier for a newly registered citizen
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CitizenId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CitizenId> for String {
    fn from(id: CitizenId) -> Self {
        id.0
    }
}

impl FromStr for CitizenId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for CitizenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Badge
// =============================================================================

/// Badge levels, ordered from lowest to highest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[derive(Default)]
pub enum Badge {
    #[default]
    None,
    Bronze,
    Silver,
    Gold,
}

impl Badge {
    /// Every level, lowest first
    pub const ALL: [Badge; 4] = [Badge::None, Badge::Bronze, Badge::Silver, Badge::Gold];

    /// Points required to hold this badge
    pub fn threshold(self) -> i64 {
        match self {
            Badge::None => 0,
            Badge::Bronze => 100,
            Badge::Silver => 200,
            Badge::Gold => 500,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Badge::None => "None",
            Badge::Bronze => "Bronze",
            Badge::Silver => "Silver",
            Badge::Gold => "Gold",
        }
    }

    /// Badge a citizen with `points` is working towards, if any remain
    pub fn next_for(points: i64) -> Option<Badge> {
        [Badge::Bronze, Badge::Silver, Badge::Gold]
            .into_iter()
            .find(|badge| points < badge.threshold())
    }

    /// Name of the next badge, or "Maximum Level" past Gold
    pub fn next_badge_name(points: i64) -> &'static str {
        Self::next_for(points).map_or(MAXIMUM_LEVEL, Badge::as_str)
    }

    /// Points still needed for the next badge, 0 past Gold
    pub fn points_to_next_badge(points: i64) -> i64 {
        Self::next_for(points).map_or(0, |badge| badge.threshold() - points)
    }
}

impl fmt::Display for Badge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Badge {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Badge::None),
            "bronze" => Ok(Badge::Bronze),
            "silver" => Ok(Badge::Silver),
            "gold" => Ok(Badge::Gold),
            other => Err(CoreError::UnknownBadge(other.to_string())),
        }
    }
}

// =============================================================================
// CitizenReward
// =============================================================================

/// One ledger row per citizen.
///
/// Serialized with the derived `nextBadge` / `pointsToNextBadge` fields; those
/// are ignored when reading a row back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(into = "RewardView")]
pub struct CitizenReward {
    pub citizen_id: CitizenId,
    pub total_points: i64,
    pub valid_observations: u64,
    pub complete_observations: u64,
    /// Badges in the order they were earned
    #[serde(default)]
    pub badges: Vec<Badge>,
    #[serde(default)]
    pub current_badge: Badge,
}

impl CitizenReward {
    pub fn new(citizen_id: CitizenId) -> Self {
        Self {
            citizen_id,
            total_points: 0,
            valid_observations: 0,
            complete_observations: 0,
            badges: Vec::new(),
            current_badge: Badge::None,
        }
    }

    /// Credit one valid observation and re-run badge evaluation.
    ///
    /// The row is left untouched when the credit would overflow the total.
    pub fn apply_observation(&mut self, is_complete: bool) -> Result<Option<Badge>, CoreError> {
        let earned = if is_complete {
            BASE_OBSERVATION_POINTS + COMPLETE_OBSERVATION_BONUS
        } else {
            BASE_OBSERVATION_POINTS
        };
        self.total_points = checked_total(self.total_points, earned)?;

        self.valid_observations = self.valid_observations.saturating_add(1);
        if is_complete {
            self.complete_observations = self.complete_observations.saturating_add(1);
        }

        Ok(self.evaluate_badges())
    }

    /// Award at most one badge: the highest crossed threshold not yet held.
    ///
    /// Thresholds are checked top-down, so a single jump from below Bronze to
    /// Gold awards Gold only. The current badge never moves down, even when a
    /// lower tier is picked up afterwards.
    pub fn evaluate_badges(&mut self) -> Option<Badge> {
        let awarded = [Badge::Gold, Badge::Silver, Badge::Bronze]
            .into_iter()
            .find(|&badge| self.total_points >= badge.threshold() && !self.has_badge(badge))?;

        self.badges.push(awarded);
        if awarded > self.current_badge {
            self.current_badge = awarded;
        }
        Some(awarded)
    }

    /// Raw point adjustment; badges are left as they are
    pub fn add_points(&mut self, delta: i64) -> Result<(), CoreError> {
        self.total_points = checked_total(self.total_points, delta)?;
        Ok(())
    }

    /// Apply an administrative adjustment; badges are left as they are
    pub fn apply_adjustment(&mut self, adjustment: &RewardAdjustment) -> Result<(), CoreError> {
        let total = checked_total(self.total_points, adjustment.points)?;

        self.total_points = total;
        if let Some(valid) = adjustment.valid_observations.filter(|n| *n > 0) {
            self.valid_observations = self.valid_observations.saturating_add(valid as u64);
        }
        if let Some(complete) = adjustment.complete_observations.filter(|n| *n > 0) {
            self.complete_observations = self.complete_observations.saturating_add(complete as u64);
        }
        Ok(())
    }

    /// Zero every counter and forget earned badges
    pub fn reset(&mut self) {
        let citizen_id = self.citizen_id.clone();
        *self = Self::new(citizen_id);
    }

    pub fn has_badge(&self, badge: Badge) -> bool {
        self.badges.contains(&badge)
    }

    pub fn next_badge(&self) -> &'static str {
        Badge::next_badge_name(self.total_points)
    }

    pub fn points_to_next_badge(&self) -> i64 {
        Badge::points_to_next_badge(self.total_points)
    }
}

/// New point total, or an error if it would leave the `i64` range or go negative
fn checked_total(total: i64, delta: i64) -> Result<i64, CoreError> {
    match total.checked_add(delta) {
        Some(sum) if sum >= 0 => Ok(sum),
        _ => Err(CoreError::PointsOutOfRange { total, delta }),
    }
}

/// Wire shape of a [`CitizenReward`]
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RewardView {
    citizen_id: CitizenId,
    total_points: i64,
    valid_observations: u64,
    complete_observations: u64,
    badges: Vec<Badge>,
    current_badge: Badge,
    next_badge: &'static str,
    points_to_next_badge: i64,
}

impl From<CitizenReward> for RewardView {
    fn from(reward: CitizenReward) -> Self {
        let next_badge = reward.next_badge();
        let points_to_next_badge = reward.points_to_next_badge();
        Self {
            citizen_id: reward.citizen_id,
            total_points: reward.total_points,
            valid_observations: reward.valid_observations,
            complete_observations: reward.complete_observations,
            badges: reward.badges,
            current_badge: reward.current_badge,
            next_badge,
            points_to_next_badge,
        }
    }
}

/// Administrative reward adjustment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardAdjustment {
    pub points: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_observations: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complete_observations: Option<i64>,
}

// =============================================================================
// Observations
// =============================================================================

/// Raw observation as submitted by a citizen, before validation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationSubmission {
    #[serde(default)]
    pub citizen_id: Option<String>,
    #[serde(default)]
    pub postcode: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub ph: Option<f64>,
    #[serde(default)]
    pub alkalinity: Option<f64>,
    #[serde(default)]
    pub turbidity: Option<f64>,
    /// Free-text visual observation tags, in submission order
    #[serde(default)]
    pub observations: Vec<String>,
    #[serde(default)]
    pub image_paths: Vec<String>,
}

/// A stored water-quality observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub id: String,
    pub citizen_id: CitizenId,
    pub postcode: String,
    pub temperature: Option<f64>,
    pub ph: Option<f64>,
    pub alkalinity: Option<f64>,
    pub turbidity: Option<f64>,
    #[serde(default)]
    pub observations: Vec<String>,
    #[serde(default)]
    pub image_paths: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub valid: bool,
    pub complete: bool,
}

impl Observation {
    /// Validate a submission and stamp it as a new observation.
    ///
    /// Invalid submissions are rejected and never become observations.
    pub fn from_submission(
        submission: ObservationSubmission,
        now: DateTime<Utc>,
    ) -> Result<Self, CoreError> {
        if let Some(failure) = crate::validator::validation_failure(&submission) {
            return Err(CoreError::InvalidObservation(failure));
        }

        let complete = crate::validator::check_complete(&submission);
        let citizen_id = CitizenId::parse(submission.citizen_id.as_deref().unwrap_or_default())?;
        let postcode = submission
            .postcode
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string();

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            citizen_id,
            postcode,
            temperature: submission.temperature,
            ph: submission.ph,
            alkalinity: submission.alkalinity,
            turbidity: submission.turbidity,
            observations: submission.observations,
            image_paths: submission.image_paths,
            timestamp: now,
            valid: true,
            complete,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn citizen(id: &str) -> CitizenId {
        CitizenId::parse(id).unwrap()
    }

    #[test]
    fn test_citizen_id_trims_and_bounds() {
        assert_eq!(citizen("  abc  ").as_str(), "abc");
        tokio_test::assert_err!(CitizenId::parse("   "));
        tokio_test::assert_ok!(CitizenId::parse(&"x".repeat(MAX_CITIZEN_ID_LEN)));
        tokio_test::assert_err!(CitizenId::parse(&"x".repeat(MAX_CITIZEN_ID_LEN + 1)));
    }

    #[test]
    fn test_citizen_id_rejects_blank_json() {
        let parsed: Result<CitizenId, _> = serde_json::from_str("\"  \"");
        assert!(parsed.is_err());

        let parsed: CitizenId = serde_json::from_str("\"citizen-1\"").unwrap();
        assert_eq!(parsed, citizen("citizen-1"));
    }

    #[test]
    fn test_badge_parse_is_case_insensitive() {
        assert_eq!("gold".parse::<Badge>().unwrap(), Badge::Gold);
        assert_eq!("SILVER".parse::<Badge>().unwrap(), Badge::Silver);
        assert_eq!(" Bronze ".parse::<Badge>().unwrap(), Badge::Bronze);
        assert_eq!("none".parse::<Badge>().unwrap(), Badge::None);
        assert!("platinum".parse::<Badge>().is_err());
    }

    #[test]
    fn test_next_badge_progression() {
        assert_eq!(Badge::next_badge_name(0), "Bronze");
        assert_eq!(Badge::points_to_next_badge(0), 100);
        assert_eq!(Badge::next_badge_name(150), "Silver");
        assert_eq!(Badge::points_to_next_badge(150), 50);
        assert_eq!(Badge::next_badge_name(200), "Gold");
        assert_eq!(Badge::points_to_next_badge(499), 1);
        assert_eq!(Badge::next_badge_name(500), MAXIMUM_LEVEL);
        assert_eq!(Badge::points_to_next_badge(900), 0);
    }

    #[test]
    fn test_single_jump_awards_gold_only() {
        let mut reward = CitizenReward::new(citizen("c1"));
        reward.add_points(490).unwrap();
        assert_eq!(reward.apply_observation(false).unwrap(), Some(Badge::Gold));

        assert_eq!(reward.total_points, 500);
        assert_eq!(reward.badges, vec![Badge::Gold]);
        assert_eq!(reward.current_badge, Badge::Gold);
    }

    #[test]
    fn test_current_badge_never_moves_down() {
        let mut reward = CitizenReward::new(citizen("c1"));
        reward.add_points(490).unwrap();
        reward.apply_observation(false).unwrap();

        // Silver is still unheld, so the next event picks it up
        assert_eq!(reward.apply_observation(false).unwrap(), Some(Badge::Silver));
        assert_eq!(reward.badges, vec![Badge::Gold, Badge::Silver]);
        assert_eq!(reward.current_badge, Badge::Gold);
    }

    #[test]
    fn test_add_points_skips_badge_evaluation() {
        let mut reward = CitizenReward::new(citizen("c1"));
        reward.add_points(250).unwrap();

        assert_eq!(reward.total_points, 250);
        assert!(reward.badges.is_empty());
        assert_eq!(reward.current_badge, Badge::None);
    }

    #[test]
    fn test_adjustment_ignores_non_positive_counts() {
        let mut reward = CitizenReward::new(citizen("c1"));
        reward.apply_adjustment(&RewardAdjustment {
            points: 40,
            valid_observations: Some(3),
            complete_observations: Some(-2),
        })
        .unwrap();

        assert_eq!(reward.total_points, 40);
        assert_eq!(reward.valid_observations, 3);
        assert_eq!(reward.complete_observations, 0);
        assert!(reward.badges.is_empty());
    }

    #[test]
    fn test_reward_json_carries_next_badge() {
        let mut reward = CitizenReward::new(citizen("c1"));
        reward.apply_observation(true).unwrap();

        let json = serde_json::to_value(&reward).unwrap();
        assert_eq!(json["citizenId"], "c1");
        assert_eq!(json["totalPoints"], 20);
        assert_eq!(json["currentBadge"], "None");
        assert_eq!(json["nextBadge"], "Bronze");
        assert_eq!(json["pointsToNextBadge"], 80);

        let back: CitizenReward = serde_json::from_value(json).unwrap();
        assert_eq!(back, reward);
    }

    #[test]
    fn test_overflowing_credit_leaves_row_untouched() {
        let mut reward = CitizenReward::new(citizen("c1"));
        reward.add_points(i64::MAX).unwrap();

        assert!(matches!(
            reward.apply_observation(true),
            Err(CoreError::PointsOutOfRange { .. })
        ));
        tokio_test::assert_err!(reward.add_points(1));
        tokio_test::assert_err!(reward.apply_adjustment(&RewardAdjustment {
            points: i64::MAX,
            valid_observations: Some(1),
            complete_observations: None,
        }));

        assert_eq!(reward.total_points, i64::MAX);
        assert_eq!(reward.valid_observations, 0);
        assert!(reward.badges.is_empty());
    }

    #[test]
    fn test_negative_total_is_rejected() {
        let mut reward = CitizenReward::new(citizen("c1"));
        reward.add_points(30).unwrap();

        tokio_test::assert_err!(reward.add_points(-31));
        tokio_test::assert_ok!(reward.add_points(-30));
        assert_eq!(reward.total_points, 0);
    }
}
