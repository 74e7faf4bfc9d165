//! Release Species Inventory
//!
//! Maps taxonomies to their release assemblies and to the temporary
//! document-store instance holding their release data. The inventory is
//! owned by another process; nothing here writes to it.

use std::collections::BTreeSet;

use async_trait::async_trait;
use log::debug;
use sqlx::postgres::PgPool;

use super::validate_table_name;
use crate::error::{ReleaseError, Result};

/// One row of the inventory table.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct InventoryRow {
    pub taxonomy_id: i32,
    pub assembly_accession: String,
    pub tempmongo_instance: Option<String>,
}

/// Source of inventory rows.
#[async_trait]
pub trait ReleaseInventory: Send + Sync {
    /// All rows for a taxonomy, in no particular order.
    async fn rows_for_taxonomy(&self, table: &str, taxonomy_id: i32) -> Result<Vec<InventoryRow>>;
}

/// Distinct release assemblies of a taxonomy, sorted.
///
/// No matching rows is not an error: the taxonomy simply has nothing to
/// release.
pub async fn get_release_assemblies_for_taxonomy(
    taxonomy_id: i32,
    table: &str,
    inventory: &dyn ReleaseInventory,
) -> Result<Vec<String>> {
    let rows = inventory.rows_for_taxonomy(table, taxonomy_id).await?;
    let assemblies: BTreeSet<String> = rows.into_iter().map(|row| row.assembly_accession).collect();

    debug!(
        "Taxonomy {} has {} release assemblies",
        taxonomy_id,
        assemblies.len()
    );
    Ok(assemblies.into_iter().collect())
}

/// Fails unless `assembly_accession` is a release assembly of the taxonomy.
pub async fn ensure_release_assembly(
    taxonomy_id: i32,
    assembly_accession: &str,
    table: &str,
    inventory: &dyn ReleaseInventory,
) -> Result<()> {
    let assemblies = get_release_assemblies_for_taxonomy(taxonomy_id, table, inventory).await?;
    if assemblies.iter().any(|a| a == assembly_accession) {
        Ok(())
    } else {
        Err(ReleaseError::NotReleaseAssembly {
            taxonomy_id,
            assembly: assembly_accession.to_string(),
        })
    }
}

/// The single temporary instance serving a taxonomy.
///
/// Fails when no instance is registered or when the rows disagree.
pub async fn get_target_mongo_instance_for_taxonomy(
    taxonomy_id: i32,
    table: &str,
    inventory: &dyn ReleaseInventory,
) -> Result<String> {
    let rows = inventory.rows_for_taxonomy(table, taxonomy_id).await?;
    let instances: BTreeSet<String> = rows
        .into_iter()
        .filter_map(|row| row.tempmongo_instance)
        .collect();

    let mut instances = instances.into_iter();
    match (instances.next(), instances.next()) {
        (None, _) => Err(ReleaseError::NoTargetInstance(taxonomy_id)),
        (Some(instance), None) => Ok(instance),
        (Some(first), Some(second)) => {
            let mut all = vec![first, second];
            all.extend(instances);
            Err(ReleaseError::AmbiguousTargetInstance {
                taxonomy_id,
                instances: all,
            })
        }
    }
}

/// Inventory backed by the metadata database.
pub struct PgInventory {
    pool: PgPool,
}

impl PgInventory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl ReleaseInventory for PgInventory {
    async fn rows_for_taxonomy(&self, table: &str, taxonomy_id: i32) -> Result<Vec<InventoryRow>> {
        let sql = format!(
            "SELECT taxonomy_id, assembly_accession, tempmongo_instance \
             FROM {} WHERE taxonomy_id = $1",
            validate_table_name(table)?
        );

        let rows = sqlx::query_as::<_, InventoryRow>(&sql)
            .bind(taxonomy_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Inventory held in memory.
    pub(crate) struct StaticInventory {
        pub rows: Vec<InventoryRow>,
    }

    impl StaticInventory {
        pub(crate) fn new(rows: &[(i32, &str, &str)]) -> Self {
            Self {
                rows: rows
                    .iter()
                    .map(|(taxonomy_id, accession, instance)| InventoryRow {
                        taxonomy_id: *taxonomy_id,
                        assembly_accession: accession.to_string(),
                        tempmongo_instance: Some(instance.to_string()),
                    })
                    .collect(),
            }
        }
    }

    #[async_trait]
    impl ReleaseInventory for StaticInventory {
        async fn rows_for_taxonomy(
            &self,
            table: &str,
            taxonomy_id: i32,
        ) -> Result<Vec<InventoryRow>> {
            validate_table_name(table)?;
            Ok(self
                .rows
                .iter()
                .filter(|row| row.taxonomy_id == taxonomy_id)
                .cloned()
                .collect())
        }
    }

    const TABLE: &str = "dbsnp_ensembl_species.release_species_inventory";

    #[tokio::test]
    async fn test_no_rows_means_no_assemblies() {
        let inventory = StaticInventory::new(&[(9913, "GCA_1.1", "tempmongo-1")]);
        let assemblies = get_release_assemblies_for_taxonomy(9606, TABLE, &inventory)
            .await
            .unwrap();
        assert!(assemblies.is_empty());
    }

    #[tokio::test]
    async fn test_assemblies_are_distinct_and_sorted() {
        let inventory = StaticInventory::new(&[
            (9913, "GCA_2.1", "tempmongo-1"),
            (9913, "GCA_1.1", "tempmongo-1"),
            (9913, "GCA_2.1", "tempmongo-1"),
            (9823, "GCA_9.9", "tempmongo-2"),
        ]);
        let assemblies = get_release_assemblies_for_taxonomy(9913, TABLE, &inventory)
            .await
            .unwrap();
        assert_eq!(assemblies, vec!["GCA_1.1", "GCA_2.1"]);
    }

    #[tokio::test]
    async fn test_single_target_instance() {
        let inventory = StaticInventory::new(&[
            (9913, "GCA_1.1", "tempmongo-1"),
            (9913, "GCA_2.1", "tempmongo-1"),
        ]);
        let instance = get_target_mongo_instance_for_taxonomy(9913, TABLE, &inventory)
            .await
            .unwrap();
        assert_eq!(instance, "tempmongo-1");
    }

    #[tokio::test]
    async fn test_multiple_target_instances_rejected() {
        let inventory = StaticInventory::new(&[
            (9913, "GCA_1.1", "tempmongo-1"),
            (9913, "GCA_2.1", "tempmongo-2"),
        ]);
        let err = get_target_mongo_instance_for_taxonomy(9913, TABLE, &inventory)
            .await
            .unwrap_err();
        match err {
            ReleaseError::AmbiguousTargetInstance { instances, .. } => {
                assert_eq!(instances, vec!["tempmongo-1", "tempmongo-2"]);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_target_instance() {
        let inventory = StaticInventory {
            rows: vec![InventoryRow {
                taxonomy_id: 9913,
                assembly_accession: "GCA_1.1".to_string(),
                tempmongo_instance: None,
            }],
        };
        let err = get_target_mongo_instance_for_taxonomy(9913, TABLE, &inventory)
            .await
            .unwrap_err();
        assert!(matches!(err, ReleaseError::NoTargetInstance(9913)));
    }

    #[tokio::test]
    async fn test_ensure_release_assembly() {
        let inventory = StaticInventory::new(&[
            (9913, "GCA_1.1", "tempmongo-1"),
            (9823, "GCA_9.9", "tempmongo-2"),
        ]);
        assert!(ensure_release_assembly(9913, "GCA_1.1", TABLE, &inventory)
            .await
            .is_ok());

        let err = ensure_release_assembly(9913, "GCA_9.9", TABLE, &inventory)
            .await
            .unwrap_err();
        match err {
            ReleaseError::NotReleaseAssembly {
                taxonomy_id,
                assembly,
            } => {
                assert_eq!(taxonomy_id, 9913);
                assert_eq!(assembly, "GCA_9.9");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_bad_table_name_propagates() {
        let inventory = StaticInventory::new(&[]);
        let result = get_release_assemblies_for_taxonomy(9913, "x; drop", &inventory).await;
        assert!(matches!(result, Err(ReleaseError::InvalidTableName(_))));
    }
}
