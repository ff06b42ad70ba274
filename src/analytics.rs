use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, DbErr, Set};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    entity::{analytics_event, page_view},
    request::ClientMeta,
};

/// Append-only writer for analytics rows.
#[derive(Debug, Clone)]
pub struct AnalyticsStore {
    conn: DatabaseConnection,
}

impl AnalyticsStore {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Records `event_name`, lifting `path`, `character` and `length` out
    /// of `metadata` into their own columns.
    pub async fn record_event(
        &self,
        event_name: &str,
        session_id: Option<String>,
        metadata: Option<Value>,
        client: &ClientMeta,
    ) -> Result<(), DbErr> {
        let field = |name: &str| {
            metadata
                .as_ref()
                .and_then(|m| m.get(name))
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let message_length = metadata
            .as_ref()
            .and_then(|m| m.get("length"))
            .and_then(Value::as_i64)
            .filter(|&n| n != 0)
            .and_then(|n| i32::try_from(n).ok());

        analytics_event::ActiveModel {
            id: Set(Uuid::new_v4()),
            event_name: Set(event_name.to_string()),
            session_id: Set(session_id.filter(|s| !s.is_empty())),
            path: Set(field("path")),
            character: Set(field("character")),
            message_length: Set(message_length),
            metadata: Set(metadata.filter(|m| !m.is_null())),
            ip: Set(client.ip.clone()),
            ua: Set(client.user_agent.clone()),
            created_at: Set(Utc::now().into()),
        }
        .insert(&self.conn)
        .await?;

        Ok(())
    }

    pub async fn record_view(
        &self,
        path: &str,
        session_id: Option<String>,
        client: &ClientMeta,
    ) -> Result<(), DbErr> {
        page_view::ActiveModel {
            id: Set(Uuid::new_v4()),
            path: Set(path.to_string()),
            session_id: Set(session_id.filter(|s| !s.is_empty())),
            ip: Set(client.ip.clone()),
            ua: Set(client.user_agent.clone()),
            created_at: Set(Utc::now().into()),
        }
        .insert(&self.conn)
        .await?;

        Ok(())
    }
}
