use chrono::Utc;
use sea_orm::{
    prelude::DateTimeWithTimeZone, ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr,
    EntityTrait, IntoActiveModel, Iterable, QueryFilter, Set, SqlErr,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::entity::video::{self, ActiveModel as VideoActiveModel, Entity as VideoEntity, VideoStatus};

/// A paid order about to be recorded.
#[derive(Debug, Clone)]
pub struct NewVideo {
    pub session_id: String,
    pub message: String,
    pub character: String,
    pub email: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Result of [`VideoStore::create_paid`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Created {
    Inserted(video::Model),
    /// A row for the session already existed; nothing was written.
    Duplicate,
}

/// What the rendering workflow reports for an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Finished { video_url: String },
    Failed,
}

impl Outcome {
    fn status(&self) -> VideoStatus {
        match self {
            Outcome::Finished { .. } => VideoStatus::Finished,
            Outcome::Failed => VideoStatus::Error,
        }
    }
}

/// Result of [`VideoStore::complete`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Updated(video::Model),
    NotFound,
    /// The row is already in a terminal state.
    Rejected(VideoStatus),
}

/// Video order rows.
#[derive(Debug, Clone)]
pub struct VideoStore {
    conn: DatabaseConnection,
}

impl VideoStore {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn find(&self, id: Uuid) -> Result<Option<video::Model>, DbErr> {
        VideoEntity::find_by_id(id).one(&self.conn).await
    }

    pub async fn find_by_session(&self, session_id: &str) -> Result<Option<video::Model>, DbErr> {
        VideoEntity::find()
            .filter(video::Column::SessionId.eq(session_id))
            .one(&self.conn)
            .await
    }

    /// Finds a video that is ready to be served: finished, with a storage key.
    pub async fn find_ready(&self, id: Uuid) -> Result<Option<(video::Model, String)>, DbErr> {
        Ok(self.find(id).await?.and_then(|model| {
            if model.status != VideoStatus::Finished {
                return None;
            }
            let key = model.video_url.clone().filter(|key| !key.is_empty())?;
            Some((model, key))
        }))
    }

    /// Records a paid order unless one already exists for its session.
    ///
    /// The existence check and the insert are separate statements. A retry
    /// that slips between them hits the unique index on `session_id` and is
    /// reported as [`Created::Duplicate`].
    pub async fn create_paid(&self, new: NewVideo) -> Result<Created, DbErr> {
        if self.find_by_session(&new.session_id).await?.is_some() {
            return Ok(Created::Duplicate);
        }

        let model = VideoActiveModel {
            id: Set(Uuid::new_v4()),
            session_id: Set(new.session_id),
            message: Set(new.message),
            character: Set(new.character),
            email: Set(new.email),
            status: Set(VideoStatus::Paid),
            video_url: Set(None),
            expires_at: Set(None),
            ip_address: Set(new.ip_address),
            user_agent: Set(new.user_agent),
            created_at: Set(Utc::now().into()),
        };

        match model.insert(&self.conn).await {
            Ok(model) => Ok(Created::Inserted(model)),
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                warn!("Concurrent insert for an existing session, ignoring");
                Ok(Created::Duplicate)
            }
            Err(e) => Err(e),
        }
    }

    /// Stores when the most recently issued signed URL for `id` expires.
    pub async fn record_signed_url(
        &self,
        model: video::Model,
        expires_at: DateTimeWithTimeZone,
    ) -> Result<(), DbErr> {
        let mut active_model = model.into_active_model();
        active_model.expires_at = Set(Some(expires_at));
        active_model.update(&self.conn).await?;
        Ok(())
    }

    /// Moves a `paid` order to `finished` or `error`.
    ///
    /// The status guard is part of the `UPDATE`, so of two racing callbacks
    /// only one changes the row.
    pub async fn complete(&self, session_id: &str, outcome: Outcome) -> Result<Completion, DbErr> {
        let next = outcome.status();
        let open: Vec<VideoStatus> = VideoStatus::iter()
            .filter(|status| status.can_become(next))
            .collect();

        let mut changes = VideoActiveModel {
            status: Set(next),
            ..Default::default()
        };
        if let Outcome::Finished { video_url } = outcome {
            changes.video_url = Set(Some(video_url));
        }

        let result = VideoEntity::update_many()
            .set(changes)
            .filter(video::Column::SessionId.eq(session_id))
            .filter(video::Column::Status.is_in(open))
            .exec(&self.conn)
            .await?;

        let Some(current) = self.find_by_session(session_id).await? else {
            return Ok(Completion::NotFound);
        };

        if result.rows_affected == 0 {
            return Ok(Completion::Rejected(current.status));
        }

        info!("Video {} is now {:?}", current.id, current.status);
        Ok(Completion::Updated(current))
    }
}
