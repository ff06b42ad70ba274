use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(RateLimits::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(RateLimits::Key).text().not_null().primary_key())
                    .col(ColumnDef::new(RateLimits::Count).integer().not_null())
                    .col(ColumnDef::new(RateLimits::Reset).big_integer().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Videos::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Videos::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Videos::SessionId).text().not_null().unique_key())
                    .col(ColumnDef::new(Videos::Message).text().not_null())
                    .col(ColumnDef::new(Videos::Character).string().not_null())
                    .col(ColumnDef::new(Videos::Email).string().not_null())
                    .col(ColumnDef::new(Videos::Status).text().not_null())
                    .col(ColumnDef::new(Videos::VideoUrl).string().null())
                    .col(ColumnDef::new(Videos::ExpiresAt).timestamp_with_time_zone().null())
                    .col(ColumnDef::new(Videos::IpAddress).string().null())
                    .col(ColumnDef::new(Videos::UserAgent).string().null())
                    .col(
                        ColumnDef::new(Videos::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AnalyticsEvents::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(AnalyticsEvents::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(AnalyticsEvents::EventName).string().not_null())
                    .col(ColumnDef::new(AnalyticsEvents::SessionId).string().null())
                    .col(ColumnDef::new(AnalyticsEvents::Path).string().null())
                    .col(ColumnDef::new(AnalyticsEvents::Character).string().null())
                    .col(ColumnDef::new(AnalyticsEvents::MessageLength).integer().null())
                    .col(ColumnDef::new(AnalyticsEvents::Metadata).json_binary().null())
                    .col(ColumnDef::new(AnalyticsEvents::Ip).string().not_null())
                    .col(ColumnDef::new(AnalyticsEvents::Ua).string().not_null())
                    .col(
                        ColumnDef::new(AnalyticsEvents::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AnalyticsPageViews::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(AnalyticsPageViews::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(AnalyticsPageViews::Path).string().not_null())
                    .col(ColumnDef::new(AnalyticsPageViews::SessionId).string().null())
                    .col(ColumnDef::new(AnalyticsPageViews::Ip).string().not_null())
                    .col(ColumnDef::new(AnalyticsPageViews::Ua).string().not_null())
                    .col(
                        ColumnDef::new(AnalyticsPageViews::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AnalyticsPageViews::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AnalyticsEvents::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Videos::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RateLimits::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum RateLimits {
    Table,
    Key,
    Count,
    Reset,
}

#[derive(DeriveIden)]
enum Videos {
    Table,
    Id,
    SessionId,
    Message,
    Character,
    Email,
    Status,
    VideoUrl,
    ExpiresAt,
    IpAddress,
    UserAgent,
    CreatedAt,
}

#[derive(DeriveIden)]
enum AnalyticsEvents {
    Table,
    Id,
    EventName,
    SessionId,
    Path,
    Character,
    MessageLength,
    Metadata,
    Ip,
    Ua,
    CreatedAt,
}

#[derive(DeriveIden)]
enum AnalyticsPageViews {
    Table,
    Id,
    Path,
    SessionId,
    Ip,
    Ua,
    CreatedAt,
}
