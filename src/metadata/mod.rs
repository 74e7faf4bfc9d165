//! Metadata Module
//!
//! Read access to the release inventory and write access to the import
//! progress table, both in the relational metadata store.
//!
//! Each operation goes through a trait so callers can run against an
//! in-memory double; the `Pg*` types are the production implementations.

pub mod inventory;
pub mod progress;

use log::info;
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::PostgresProfile;
use crate::error::{ReleaseError, Result};

pub use inventory::{
    ensure_release_assembly, get_release_assemblies_for_taxonomy,
    get_target_mongo_instance_for_taxonomy, InventoryRow, PgInventory, ReleaseInventory,
};
pub use progress::{ImportProgressStore, PgImportProgress};

/// Opens a single-connection pool against a metadata profile.
///
/// One operation at a time is all any caller needs; the pool is closed
/// explicitly by its owner when done.
pub async fn connect(profile: &PostgresProfile) -> Result<PgPool> {
    info!(
        "Connecting to metadata database {} on {}:{}",
        profile.database, profile.host, profile.port
    );

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect_with(profile.connect_options())
        .await?;
    Ok(pool)
}

/// Rejects anything but `[A-Za-z0-9_]` segments joined by at most one `.`.
///
/// Table names come from configuration and are interpolated into SQL, so
/// they are checked before use.
pub fn validate_table_name(table: &str) -> Result<&str> {
    let segments: Vec<&str> = table.split('.').collect();
    let valid = segments.len() <= 2
        && segments.iter().all(|segment| {
            !segment.is_empty()
                && segment.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        });

    if valid {
        Ok(table)
    } else {
        Err(ReleaseError::InvalidTableName(table.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_table_name() {
        assert!(validate_table_name("release_species_inventory").is_ok());
        assert!(validate_table_name("dbsnp_ensembl_species.release_species_inventory").is_ok());

        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("a.b.c").is_err());
        assert!(validate_table_name("inventory; drop table x").is_err());
        assert!(validate_table_name("schema.").is_err());
    }
}
