//! Rate limit entity model.

use sea_orm::entity::prelude::*;

/// One fixed-window counter.
///
/// | Column | Type               | Description                          |
/// |--------|--------------------|--------------------------------------|
/// | key    | TEXT (Primary Key) | `action:ip`                          |
/// | count  | INTEGER            | Admissions recorded in this window   |
/// | reset  | BIGINT             | Window end, unix epoch seconds       |
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "rate_limits")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub key: String,
    pub count: i32,
    pub reset: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
