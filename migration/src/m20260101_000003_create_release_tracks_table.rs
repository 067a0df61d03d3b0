use sea_orm_migration::prelude::*;

use crate::m20260101_000002_create_releases_table::Releases;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ReleaseTracks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ReleaseTracks::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ReleaseTracks::ReleaseId).big_integer().not_null())
                    .col(ColumnDef::new(ReleaseTracks::TrackTitle).text().not_null())
                    .col(
                        ColumnDef::new(ReleaseTracks::NormalizedTrackTitle)
                            .text()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(ReleaseTracks::Table, ReleaseTracks::ReleaseId)
                            .to(Releases::Table, Releases::ReleaseId)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_release_tracks_release_id")
                    .table(ReleaseTracks::Table)
                    .col(ReleaseTracks::ReleaseId)
                    .to_owned(),
            )
            .await?;

        // GIN + pg_trgm index for fuzzy track-title matching (spec §4.5, §6).
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE INDEX IF NOT EXISTS release_tracks_trgm_idx ON release_tracks \
                 USING GIN (normalized_track_title gin_trgm_ops)",
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ReleaseTracks::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum ReleaseTracks {
    Table,
    Id,
    ReleaseId,
    TrackTitle,
    NormalizedTrackTitle,
}
