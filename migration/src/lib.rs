pub use sea_orm_migration::prelude::*;

mod m20260101_000001_enable_pg_trgm;
mod m20260101_000002_create_releases_table;
mod m20260101_000003_create_release_tracks_table;
mod m20260101_000004_add_release_trgm_indexes;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260101_000001_enable_pg_trgm::Migration),
            Box::new(m20260101_000002_create_releases_table::Migration),
            Box::new(m20260101_000003_create_release_tracks_table::Migration),
            Box::new(m20260101_000004_add_release_trgm_indexes::Migration),
        ]
    }
}
