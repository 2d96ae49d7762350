//! Initial migration to create the content record store.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ContentRecords::Table)
                    .if_not_exists()
                    // Internal
                    .col(
                        ColumnDef::new(ContentRecords::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    // Feed identity
                    .col(
                        ColumnDef::new(ContentRecords::ExternalId)
                            .big_integer()
                            .not_null(),
                    )
                    // Content
                    .col(text_col(ContentRecords::Kind))
                    .col(text_col(ContentRecords::Title))
                    .col(text_col(ContentRecords::Description))
                    .col(timestamp_col(ContentRecords::Date))
                    .col(text_col(ContentRecords::Location))
                    .col(text_col(ContentRecords::Language))
                    .col(text_col(ContentRecords::CanonicalUrl))
                    .col(timestamp_col(ContentRecords::LastModified))
                    .col(text_col(ContentRecords::Body))
                    .col(text_col(ContentRecords::Summary))
                    // Lead media
                    .col(
                        ColumnDef::new(ContentRecords::MediaId)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(text_col(ContentRecords::MediaKind))
                    .col(text_col(ContentRecords::MediaTitle))
                    .col(timestamp_col(ContentRecords::MediaDate))
                    .col(text_col(ContentRecords::MediaLanguage))
                    .col(text_col(ContentRecords::MediaImageUrl))
                    .col(timestamp_col(ContentRecords::MediaLastModified))
                    // Tracking
                    .col(
                        ColumnDef::new(ContentRecords::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ContentRecords::ModifiedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // The merge upsert conflicts on this index; it must be unique.
        manager
            .create_index(
                Index::create()
                    .name("idx_content_records_external_id")
                    .table(ContentRecords::Table)
                    .col(ContentRecords::ExternalId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_content_records_last_modified")
                    .table(ContentRecords::Table)
                    .col(ContentRecords::LastModified)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_content_records_media_last_modified")
                    .table(ContentRecords::Table)
                    .col(ContentRecords::MediaLastModified)
                    .to_owned(),
            )
            .await?;

        // Cursor for the polling change feed.
        manager
            .create_index(
                Index::create()
                    .name("idx_content_records_modified_at")
                    .table(ContentRecords::Table)
                    .col(ContentRecords::ModifiedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ContentRecords::Table).to_owned())
            .await
    }
}

fn text_col(column: ContentRecords) -> ColumnDef {
    ColumnDef::new(column)
        .text()
        .not_null()
        .default("")
        .to_owned()
}

fn timestamp_col(column: ContentRecords) -> ColumnDef {
    ColumnDef::new(column)
        .timestamp_with_time_zone()
        .null()
        .to_owned()
}

#[derive(DeriveIden)]
#[sea_orm(iden = "content_records")]
enum ContentRecords {
    Table,
    Id,
    ExternalId,
    Kind,
    Title,
    Description,
    Date,
    Location,
    Language,
    CanonicalUrl,
    LastModified,
    Body,
    Summary,
    MediaId,
    MediaKind,
    MediaTitle,
    MediaDate,
    MediaLanguage,
    MediaImageUrl,
    MediaLastModified,
    CreatedAt,
    ModifiedAt,
}
