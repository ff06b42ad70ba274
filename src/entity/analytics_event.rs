use sea_orm::entity::prelude::*;

/// A named client or server event, e.g. `stripe_session_created`.
///
/// `path`, `character` and `message_length` are lifted out of `metadata`
/// at insert time so they can be queried without JSON operators.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "analytics_events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub event_name: String,
    pub session_id: Option<String>,
    pub path: Option<String>,
    pub character: Option<String>,
    pub message_length: Option<i32>,
    pub metadata: Option<Json>,
    pub ip: String,
    pub ua: String,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
