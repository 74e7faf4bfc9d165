//! Import Progress Tracking
//!
//! Records that an imported assembly has been registered in the metadata
//! database.

use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use sqlx::postgres::PgPool;

use super::validate_table_name;
use crate::error::Result;

#[async_trait]
pub trait ImportProgressStore: Send + Sync {
    /// Marks the assembly of a species import as registered.
    async fn mark_assembly_registered(&self, species: &str, assembly_accession: &str) -> Result<()>;
}

/// Progress table in the metadata database.
pub struct PgImportProgress {
    pool: PgPool,
    table: String,
}

impl PgImportProgress {
    pub fn new(pool: PgPool, table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        validate_table_name(&table)?;
        Ok(Self { pool, table })
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl ImportProgressStore for PgImportProgress {
    async fn mark_assembly_registered(&self, species: &str, assembly_accession: &str) -> Result<()> {
        let sql = format!(
            "UPDATE {} SET evapro_updated = true, last_updated = $1 \
             WHERE database_name = $2 AND assembly_accession = $3",
            self.table
        );

        let result = sqlx::query(&sql)
            .bind(Utc::now())
            .bind(species)
            .bind(assembly_accession)
            .execute(&self.pool)
            .await?;

        debug!(
            "Updated {} progress rows for {} / {}",
            result.rows_affected(),
            species,
            assembly_accession
        );
        Ok(())
    }
}
