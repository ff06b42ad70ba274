//! Video order entity model.
//!
//! A row is created by the payment webhook once a checkout session is paid,
//! and completed by the rendering automation when the video is uploaded.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Sea-ORM entity model representing one paid video order.
///
/// | Column     | Type               | Description                                |
/// |------------|--------------------|--------------------------------------------|
/// | id         | UUID (Primary Key) | Public video id used by the player         |
/// | session_id | TEXT (Unique)      | Checkout session id from the provider      |
/// | message    | TEXT               | Sanitized customer message                 |
/// | character  | TEXT               | Sanitized character slug                   |
/// | email      | TEXT               | Customer email reported by the provider    |
/// | status     | TEXT               | `paid`, `finished` or `error`              |
/// | video_url  | TEXT NULL          | Object storage key once rendered           |
/// | expires_at | TIMESTAMPTZ NULL   | Expiry of the last signed URL handed out   |
/// | ip_address | TEXT NULL          | Client IP captured at checkout             |
/// | user_agent | TEXT NULL          | Client user agent captured at checkout     |
/// | created_at | TIMESTAMPTZ        | Row creation time                          |
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "videos")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Provider session id; webhook retries are deduplicated on it.
    #[sea_orm(unique, column_type = "Text")]
    pub session_id: String,

    #[sea_orm(column_type = "Text")]
    pub message: String,
    pub character: String,
    pub email: String,
    pub status: VideoStatus,

    /// Storage key inside the configured bucket, not a URL despite the name.
    pub video_url: Option<String>,
    pub expires_at: Option<DateTimeWithTimeZone>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTimeWithTimeZone,
}

/// Rendering state of a video order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    #[sea_orm(string_value = "paid")]
    Paid,
    #[sea_orm(string_value = "finished")]
    Finished,
    #[sea_orm(string_value = "error")]
    Error,
}

impl VideoStatus {
    /// Whether a row in `self` may move to `next`.
    ///
    /// Only `paid` is open; `finished` and `error` are terminal.
    pub fn can_become(self, next: VideoStatus) -> bool {
        matches!(
            (self, next),
            (VideoStatus::Paid, VideoStatus::Finished) | (VideoStatus::Paid, VideoStatus::Error)
        )
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::VideoStatus::*;

    #[test]
    fn only_paid_can_transition() {
        assert!(Paid.can_become(Finished));
        assert!(Paid.can_become(Error));
        assert!(!Paid.can_become(Paid));
        assert!(!Finished.can_become(Error));
        assert!(!Finished.can_become(Paid));
        assert!(!Error.can_become(Finished));
    }
}
