//! Leaderboard ranking over a ledger snapshot
//!
//! Citizens are ordered by total points, highest first. Equal totals fall
//! back to citizen id ascending so that the order is reproducible.

use serde::Serialize;

use crate::types::{Badge, CitizenId, CitizenReward};

/// Default size of the bounded leaderboard
pub const DEFAULT_TOP_N: usize = 10;

pub struct Leaderboard {
    ranked: Vec<CitizenReward>,
}

impl Leaderboard {
    pub fn new(mut rewards: Vec<CitizenReward>) -> Self {
        rewards.sort_by(|a, b| {
            b.total_points
                .cmp(&a.total_points)
                .then_with(|| a.citizen_id.cmp(&b.citizen_id))
        });
        Self { ranked: rewards }
    }

    pub fn len(&self) -> usize {
        self.ranked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }

    pub fn full(&self) -> &[CitizenReward] {
        &self.ranked
    }

    pub fn top_n(&self, n: usize) -> &[CitizenReward] {
        &self.ranked[..n.min(self.ranked.len())]
    }

    /// 1-based position, or None if the citizen has no ledger row
    pub fn rank_of(&self, citizen_id: &CitizenId) -> Option<usize> {
        self.ranked
            .iter()
            .position(|r| &r.citizen_id == citizen_id)
            .map(|index| index + 1)
    }

    /// Citizens whose current badge is `badge`, in leaderboard order
    pub fn by_badge(&self, badge: Badge) -> Vec<CitizenReward> {
        self.filtered(|r| r.current_badge == badge)
    }

    pub fn with_min_points(&self, min_points: i64) -> Vec<CitizenReward> {
        self.filtered(|r| r.total_points >= min_points)
    }

    pub fn with_min_observations(&self, min_observations: u64) -> Vec<CitizenReward> {
        self.filtered(|r| r.valid_observations >= min_observations)
    }

    fn filtered<F: Fn(&CitizenReward) -> bool>(&self, keep: F) -> Vec<CitizenReward> {
        self.ranked.iter().filter(|r| keep(r)).cloned().collect()
    }

    pub fn badge_distribution(&self) -> BadgeDistribution {
        let mut distribution = BadgeDistribution::default();
        for reward in &self.ranked {
            match reward.current_badge {
                Badge::None => distribution.none += 1,
                Badge::Bronze => distribution.bronze += 1,
                Badge::Silver => distribution.silver += 1,
                Badge::Gold => distribution.gold += 1,
            }
        }
        distribution
    }

    pub fn statistics(&self) -> LeaderboardStatistics {
        let total_citizens = self.ranked.len() as u64;
        let total_points: i64 = self.ranked.iter().map(|r| r.total_points).sum();
        let total_observations: u64 = self.ranked.iter().map(|r| r.valid_observations).sum();

        let average_points = if total_citizens == 0 {
            0.0
        } else {
            (total_points as f64 / total_citizens as f64 * 100.0).round() / 100.0
        };

        LeaderboardStatistics {
            total_citizens,
            total_points,
            total_observations,
            average_points,
            badge_distribution: self.badge_distribution(),
        }
    }
}

/// Citizen count per current badge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BadgeDistribution {
    pub none: u64,
    pub bronze: u64,
    pub silver: u64,
    pub gold: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardStatistics {
    pub total_citizens: u64,
    pub total_points: i64,
    pub total_observations: u64,
    pub average_points: f64,
    pub badge_distribution: BadgeDistribution,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reward(id: &str, points: i64, observations: u64, badge: Badge) -> CitizenReward {
        let mut reward = CitizenReward::new(CitizenId::parse(id).unwrap());
        reward.total_points = points;
        reward.valid_observations = observations;
        reward.current_badge = badge;
        reward
    }

    fn board() -> Leaderboard {
        Leaderboard::new(vec![
            reward("dee", 50, 5, Badge::None),
            reward("amy", 500, 40, Badge::Gold),
            reward("cat", 100, 10, Badge::Bronze),
            reward("bob", 200, 20, Badge::Silver),
        ])
    }

    fn ids(rewards: &[CitizenReward]) -> Vec<&str> {
        rewards.iter().map(|r| r.citizen_id.as_str()).collect()
    }

    #[test]
    fn test_top_n_orders_by_points() {
        let board = board();
        assert_eq!(ids(board.top_n(3)), vec!["amy", "bob", "cat"]);
        assert_eq!(board.top_n(10).len(), 4);
        assert!(board.top_n(0).is_empty());
    }

    #[test]
    fn test_ties_break_on_citizen_id() {
        let board = Leaderboard::new(vec![
            reward("zed", 100, 1, Badge::Bronze),
            reward("abe", 100, 1, Badge::Bronze),
            reward("max", 300, 1, Badge::Silver),
        ]);
        assert_eq!(ids(board.full()), vec!["max", "abe", "zed"]);
    }

    #[test]
    fn test_rank_of() {
        let board = board();
        assert_eq!(board.rank_of(&CitizenId::parse("amy").unwrap()), Some(1));
        assert_eq!(board.rank_of(&CitizenId::parse("dee").unwrap()), Some(4));
        assert_eq!(board.rank_of(&CitizenId::parse("nobody").unwrap()), None);
    }

    #[test]
    fn test_filters() {
        let board = board();
        assert_eq!(ids(&board.by_badge(Badge::Silver)), vec!["bob"]);
        assert_eq!(ids(&board.with_min_points(100)), vec!["amy", "bob", "cat"]);
        assert_eq!(ids(&board.with_min_observations(20)), vec!["amy", "bob"]);
    }

    #[test]
    fn test_statistics() {
        let stats = board().statistics();
        assert_eq!(stats.total_citizens, 4);
        assert_eq!(stats.total_points, 850);
        assert_eq!(stats.total_observations, 75);
        assert_eq!(stats.average_points, 212.5);
        assert_eq!(
            stats.badge_distribution,
            BadgeDistribution {
                none: 1,
                bronze: 1,
                silver: 1,
                gold: 1
            }
        );

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["badgeDistribution"]["gold"], 1);
        assert_eq!(json["averagePoints"], 212.5);
    }

    #[test]
    fn test_empty_statistics() {
        let stats = Leaderboard::new(Vec::new()).statistics();
        assert_eq!(stats.total_citizens, 0);
        assert_eq!(stats.average_points, 0.0);
    }
}
