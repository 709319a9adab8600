//! Gamification: action points, badges and leaderboards

use super::{page_limit, Caller, Marketplace};
use crate::errors::{CoreError, CoreResult, StoreError};
use crate::types::{Entity, Filter, Order, RecordQuery, Scope, Table, TenantId, UserId};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

/// Actions that earn gamification points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    BookingCompleted,
    ReviewPosted,
    ReferralCompleted,
    ProfileCompleted,
}

impl Action {
    pub fn points(&self) -> i64 {
        match self {
            Action::BookingCompleted => 50,
            Action::ReviewPosted => 20,
            Action::ReferralCompleted => 100,
            Action::ProfileCompleted => 30,
        }
    }
}

/// One award of points
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointsEvent {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub action: Action,
    pub points: i64,
    pub created_at: DateTime<Utc>,
}

impl Entity for PointsEvent {
    const TABLE: Table = Table::GamificationPoints;

    fn id(&self) -> Uuid {
        self.id
    }

    fn tenant_id(&self) -> Option<TenantId> {
        Some(self.tenant_id)
    }
}

/// What has to happen before a badge is earned
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Criterion {
    ActionCount(Action, u64),
    TotalPoints(i64),
}

#[derive(Debug, Clone, Copy)]
pub struct BadgeDefinition {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub criterion: Criterion,
}

pub const BADGES: &[BadgeDefinition] = &[
    BadgeDefinition {
        key: "first_booking",
        name: "First Booking",
        description: "Completed a first booking",
        criterion: Criterion::ActionCount(Action::BookingCompleted, 1),
    },
    BadgeDefinition {
        key: "regular",
        name: "Regular",
        description: "Completed 10 bookings",
        criterion: Criterion::ActionCount(Action::BookingCompleted, 10),
    },
    BadgeDefinition {
        key: "devoted",
        name: "Devoted",
        description: "Completed 25 bookings",
        criterion: Criterion::ActionCount(Action::BookingCompleted, 25),
    },
    BadgeDefinition {
        key: "critic",
        name: "Critic",
        description: "Posted 5 reviews",
        criterion: Criterion::ActionCount(Action::ReviewPosted, 5),
    },
    BadgeDefinition {
        key: "ambassador",
        name: "Ambassador",
        description: "Referred 3 friends",
        criterion: Criterion::ActionCount(Action::ReferralCompleted, 3),
    },
    BadgeDefinition {
        key: "centurion",
        name: "Centurion",
        description: "Collected 1000 points",
        criterion: Criterion::TotalPoints(1_000),
    },
];

/// A badge held by a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserBadge {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub badge: String,
    pub earned_at: DateTime<Utc>,
}

impl Entity for UserBadge {
    const TABLE: Table = Table::UserBadges;

    fn id(&self) -> Uuid {
        self.id
    }

    fn tenant_id(&self) -> Option<TenantId> {
        Some(self.tenant_id)
    }
}

impl UserBadge {
    /// One row per (user, badge): the id is derived from both
    pub fn new(tenant_id: TenantId, user_id: UserId, badge: &str) -> Self {
        Self {
            id: Uuid::new_v5(&user_id, badge.as_bytes()),
            tenant_id,
            user_id,
            badge: badge.to_string(),
            earned_at: Utc::now(),
        }
    }
}

/// Aggregated activity used to evaluate badge criteria
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivityStats {
    pub counts: HashMap<Action, u64>,
    pub total_points: i64,
}

impl ActivityStats {
    pub fn from_events<'a>(events: impl IntoIterator<Item = &'a PointsEvent>) -> Self {
        let mut stats = Self::default();
        for event in events {
            *stats.counts.entry(event.action).or_insert(0) += 1;
            stats.total_points += event.points;
        }
        stats
    }

    pub fn satisfies(&self, criterion: &Criterion) -> bool {
        match criterion {
            Criterion::ActionCount(action, needed) => self.counts.get(action).copied().unwrap_or(0) >= *needed,
            Criterion::TotalPoints(needed) => self.total_points >= *needed,
        }
    }
}

/// Badges whose criteria `stats` meets
pub fn badges_satisfied(stats: &ActivityStats) -> Vec<&'static BadgeDefinition> {
    BADGES.iter().filter(|badge| stats.satisfies(&badge.criterion)).collect()
}

/// Leaderboard window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Week,
    Month,
    All,
}

impl Period {
    /// Start of the window ending at `now`
    pub fn since(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Period::Week => Some(now - Duration::days(7)),
            Period::Month => Some(now - Duration::days(30)),
            Period::All => None,
        }
    }
}

impl std::str::FromStr for Period {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "week" => Ok(Period::Week),
            "month" => Ok(Period::Month),
            "all" => Ok(Period::All),
            _ => Err(CoreError::Validation(format!("Invalid period: {}", s))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub user_id: UserId,
    pub points: i64,
    pub last_awarded_at: DateTime<Utc>,
}

/// Sum points per user and dense-rank them.
///
/// Ordering is points descending, then earliest last award, then user id.
pub fn rank_leaderboard(events: &[PointsEvent], limit: usize) -> Vec<LeaderboardEntry> {
    let mut totals: HashMap<UserId, (i64, DateTime<Utc>)> = HashMap::new();
    for event in events {
        let entry = totals.entry(event.user_id).or_insert((0, event.created_at));
        entry.0 += event.points;
        if event.created_at > entry.1 {
            entry.1 = event.created_at;
        }
    }

    let mut rows: Vec<(UserId, i64, DateTime<Utc>)> =
        totals.into_iter().map(|(user, (points, last))| (user, points, last)).collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)).then(a.0.cmp(&b.0)));

    let mut rank = 0;
    let mut previous: Option<i64> = None;
    rows.into_iter()
        .take(limit)
        .map(|(user_id, points, last_awarded_at)| {
            if previous != Some(points) {
                rank += 1;
                previous = Some(points);
            }
            LeaderboardEntry {
                rank,
                user_id,
                points,
                last_awarded_at,
            }
        })
        .collect()
}

/// Result of awarding an action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Award {
    pub event: PointsEvent,
    pub new_badges: Vec<UserBadge>,
}

/// Badge catalog entry with the caller's progress
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BadgeStatus {
    pub key: String,
    pub name: String,
    pub description: String,
    pub earned_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointsSummary {
    pub total: i64,
    pub recent: Vec<PointsEvent>,
}

impl Marketplace {
    /// Record points for an action and award any badge it unlocks
    pub async fn award_action(&self, tenant: TenantId, user_id: UserId, action: Action) -> CoreResult<Award> {
        let event = PointsEvent {
            id: Uuid::new_v4(),
            tenant_id: tenant,
            user_id,
            action,
            points: action.points(),
            created_at: Utc::now(),
        };
        let event = self.insert_entity(&Scope::Tenant(tenant), &event).await?;
        debug!("User {} earned {} points for {:?}", user_id, event.points, action);

        let new_badges = self.evaluate_badges(tenant, user_id).await?;
        Ok(Award { event, new_badges })
    }

    /// Award every newly satisfied badge, each at most once
    pub async fn evaluate_badges(&self, tenant: TenantId, user_id: UserId) -> CoreResult<Vec<UserBadge>> {
        let scope = Scope::Tenant(tenant);
        let events: Vec<PointsEvent> = self
            .select_entities(&scope, RecordQuery::new().eq("user_id", user_id))
            .await?;
        let held: Vec<UserBadge> = self
            .select_entities(&scope, RecordQuery::new().eq("user_id", user_id))
            .await?;

        let stats = ActivityStats::from_events(&events);
        let mut awarded = Vec::new();
        for badge in badges_satisfied(&stats) {
            if held.iter().any(|b| b.badge == badge.key) {
                continue;
            }
            match self.insert_entity(&scope, &UserBadge::new(tenant, user_id, badge.key)).await {
                Ok(row) => {
                    info!("User {} earned badge {}", user_id, badge.key);
                    awarded.push(row);
                }
                // Lost a race with a concurrent evaluation
                Err(CoreError::Store(StoreError::ConstraintViolation(_))) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(awarded)
    }

    /// Catalog with the caller's earned dates
    pub async fn user_badges(&self, caller: &Caller) -> CoreResult<Vec<BadgeStatus>> {
        let held: Vec<UserBadge> = self
            .select_entities(&Scope::Tenant(caller.tenant()?), RecordQuery::new().eq("user_id", caller.user_id))
            .await?;

        Ok(BADGES
            .iter()
            .map(|badge| BadgeStatus {
                key: badge.key.to_string(),
                name: badge.name.to_string(),
                description: badge.description.to_string(),
                earned_at: held.iter().find(|b| b.badge == badge.key).map(|b| b.earned_at),
            })
            .collect())
    }

    /// Total points and the most recent awards for the caller
    pub async fn points_summary(&self, caller: &Caller) -> CoreResult<PointsSummary> {
        let scope = Scope::Tenant(caller.tenant()?);
        let events: Vec<PointsEvent> = self
            .select_entities(
                &scope,
                RecordQuery::new()
                    .eq("user_id", caller.user_id)
                    .order_by("created_at", Order::Desc),
            )
            .await?;
        let total = events.iter().map(|e| e.points).sum();
        Ok(PointsSummary {
            total,
            recent: events.into_iter().take(20).collect(),
        })
    }

    pub async fn leaderboard(&self, caller: &Caller, period: Option<&str>, limit: Option<u32>) -> CoreResult<Vec<LeaderboardEntry>> {
        let period: Period = period.unwrap_or("all").parse()?;
        let mut query = RecordQuery::new();
        if let Some(since) = period.since(Utc::now()) {
            query = query.filter(Filter::gte("created_at", since));
        }
        let events: Vec<PointsEvent> = self.select_entities(&Scope::Tenant(caller.tenant()?), query).await?;
        Ok(rank_leaderboard(&events, page_limit(limit) as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(user: UserId, action: Action, at: DateTime<Utc>) -> PointsEvent {
        PointsEvent {
            id: Uuid::new_v4(),
            tenant_id: TenantId(Uuid::nil()),
            user_id: user,
            action,
            points: action.points(),
            created_at: at,
        }
    }

    #[test]
    fn test_badge_criteria() {
        let user = Uuid::new_v4();
        let now = Utc::now();
        let events: Vec<PointsEvent> = (0..10).map(|_| event(user, Action::BookingCompleted, now)).collect();
        let stats = ActivityStats::from_events(&events);
        assert_eq!(stats.total_points, 500);

        let keys: Vec<&str> = badges_satisfied(&stats).iter().map(|b| b.key).collect();
        assert_eq!(keys, vec!["first_booking", "regular"]);
    }

    #[test]
    fn test_centurion_by_points() {
        let user = Uuid::new_v4();
        let now = Utc::now();
        let events: Vec<PointsEvent> = (0..10).map(|_| event(user, Action::ReferralCompleted, now)).collect();
        let keys: Vec<&str> = badges_satisfied(&ActivityStats::from_events(&events))
            .iter()
            .map(|b| b.key)
            .collect();
        assert_eq!(keys, vec!["ambassador", "centurion"]);
    }

    #[test]
    fn test_leaderboard_dense_rank_and_ties() {
        let now = Utc::now();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();

        let events = vec![
            event(a, Action::BookingCompleted, now - Duration::hours(3)),
            event(b, Action::BookingCompleted, now - Duration::hours(1)),
            event(c, Action::ReviewPosted, now),
        ];
        let board = rank_leaderboard(&events, 10);

        assert_eq!(board.len(), 3);
        // a and b tie on points; a's last award is earlier
        assert_eq!((board[0].user_id, board[0].rank), (a, 1));
        assert_eq!((board[1].user_id, board[1].rank), (b, 1));
        assert_eq!((board[2].user_id, board[2].rank), (c, 2));

        assert_eq!(rank_leaderboard(&events, 1).len(), 1);
    }

    #[test]
    fn test_period_parsing() {
        assert_eq!("week".parse::<Period>().unwrap(), Period::Week);
        assert!("year".parse::<Period>().is_err());
        assert!(Period::All.since(Utc::now()).is_none());
    }
}
