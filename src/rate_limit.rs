use std::{fmt::Debug, time::Duration};

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel, Set,
};

use crate::entity::rate_limit::{ActiveModel as RateLimitActiveModel, Entity as RateLimitEntity};

/// Pause before answering a rejected request.
pub const REJECT_DELAY: Duration = Duration::from_millis(50);

/// Per-action admission limits used by the handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit {
    pub prefix: &'static str,
    pub max: i32,
    pub window_secs: i64,
}

impl Limit {
    pub const CHECKOUT: Limit = Limit {
        prefix: "checkout",
        max: 10,
        window_secs: 60,
    };
    pub const WEBHOOK: Limit = Limit {
        prefix: "webhook",
        max: 5,
        window_secs: 60,
    };
    pub const STATUS: Limit = Limit {
        prefix: "status",
        max: 20,
        window_secs: 60,
    };
}

/// Storage backend for fixed-window counters.
#[async_trait]
pub trait RateLimitStore: Debug + Send + Sync {
    /// Records one call for `prefix:ip` at unix time `now` and returns
    /// whether it is admitted.
    async fn check_at(
        &self,
        ip: &str,
        prefix: &str,
        limit: i32,
        window_secs: i64,
        now: i64,
    ) -> Result<bool, DbErr>;

    /// [`check_at`](RateLimitStore::check_at) with the wall clock.
    async fn check(&self, ip: &str, limit: Limit) -> Result<bool, DbErr> {
        self.check_at(
            ip,
            limit.prefix,
            limit.max,
            limit.window_secs,
            chrono::Utc::now().timestamp(),
        )
        .await
    }
}

/// Fixed-window limiter persisted in the `rate_limits` table.
///
/// Each key holds a `count` and the epoch second `reset` at which its window
/// ends. The first call for a key, or the first call after `reset`, opens a
/// new window with `count = 1`. Later calls are admitted while
/// `count < limit`.
///
/// # Concurrency
///
/// The lookup and the write are separate statements. Two requests for the
/// same key that interleave can both read `count < limit` and both be
/// admitted, so a burst may exceed `limit`. Serialized callers always see
/// exactly `limit` admissions per window.
#[derive(Debug, Clone)]
pub struct DbRateLimitStore {
    conn: DatabaseConnection,
}

impl DbRateLimitStore {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl RateLimitStore for DbRateLimitStore {
    async fn check_at(
        &self,
        ip: &str,
        prefix: &str,
        limit: i32,
        window_secs: i64,
        now: i64,
    ) -> Result<bool, DbErr> {
        let key = format!("{prefix}:{ip}");

        let Some(existing) = RateLimitEntity::find_by_id(key.clone()).one(&self.conn).await? else {
            RateLimitActiveModel {
                key: Set(key),
                count: Set(1),
                reset: Set(now + window_secs),
            }
            .insert(&self.conn)
            .await?;
            return Ok(true);
        };

        if now > existing.reset {
            let mut active_model = existing.into_active_model();
            active_model.count = Set(1);
            active_model.reset = Set(now + window_secs);
            active_model.update(&self.conn).await?;
            return Ok(true);
        }

        if existing.count >= limit {
            return Ok(false);
        }

        let count = existing.count + 1;
        let mut active_model = existing.into_active_model();
        active_model.count = Set(count);
        active_model.update(&self.conn).await?;

        Ok(true)
    }
}
