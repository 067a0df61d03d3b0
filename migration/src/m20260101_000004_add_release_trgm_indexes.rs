use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let conn = manager.get_connection();
        conn.execute_unprepared(
            "CREATE INDEX IF NOT EXISTS releases_title_trgm_idx ON releases \
             USING GIN ((data->>'title') gin_trgm_ops)",
        )
        .await?;
        conn.execute_unprepared(
            "CREATE INDEX IF NOT EXISTS releases_artist_trgm_idx ON releases \
             USING GIN ((data->>'artist') gin_trgm_ops)",
        )
        .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let conn = manager.get_connection();
        conn.execute_unprepared("DROP INDEX IF EXISTS releases_title_trgm_idx").await?;
        conn.execute_unprepared("DROP INDEX IF EXISTS releases_artist_trgm_idx").await?;
        Ok(())
    }
}
