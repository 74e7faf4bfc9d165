//! Accessioning Data Copy
//!
//! Copies the accessioning collections of each release assembly from the
//! production document store to the temporary instance serving the
//! taxonomy. Each collection is dumped with an assembly filter and then
//! restored through a local port forwarded to the instance.
//!
//! The forward is stopped exactly once whatever the outcome, and the
//! outcome is reported as a process exit status rather than an error.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::{error, info, warn};
use serde_json::json;

use crate::config::private::PRODUCTION_PROFILE;
use crate::config::release::normalized_accession;
use crate::config::{MongoProfile, PrivateConfig};
use crate::error::{ReleaseError, Result};
use crate::execution::{available_local_port, CommandSpec, PortForward, ProcessRunner, MONGO_PORT};
use crate::metadata::{
    get_release_assemblies_for_taxonomy, get_target_mongo_instance_for_taxonomy, ReleaseInventory,
};

/// Database holding the production accessioning collections.
pub const SHARDED_DB_NAME: &str = "eva_accession_sharded";

/// Exit status reported when any part of the copy fails.
pub const COPY_FAILURE_EXIT_CODE: i32 = -1;

/// Accessioning collections and the attribute holding their assembly.
pub const COLLECTION_ASSEMBLY_ATTRIBUTES: [(&str, &str); 8] = [
    ("dbsnpSubmittedVariantEntity", "seq"),
    ("dbsnpSubmittedVariantOperationEntity", "inactiveObjects.seq"),
    ("submittedVariantEntity", "seq"),
    ("submittedVariantOperationEntity", "inactiveObjects.seq"),
    ("dbsnpClusteredVariantEntity", "asm"),
    ("dbsnpClusteredVariantOperationEntity", "inactiveObjects.asm"),
    ("clusteredVariantEntity", "asm"),
    ("clusteredVariantOperationEntity", "inactiveObjects.asm"),
];

/// What to copy, as given on the command line.
#[derive(Debug, Clone)]
pub struct CopyRequest {
    pub taxonomy_id: i32,
    /// Copy only this assembly instead of every release assembly
    pub assembly_accession: Option<String>,
    /// Collection names to copy; empty means all of them
    pub collections: Vec<String>,
    pub inventory_table: String,
    pub dump_dir: PathBuf,
}

/// Collections to copy, keyed and therefore ordered by name.
pub fn select_collections(requested: &[String]) -> Result<BTreeMap<&'static str, &'static str>> {
    let all: BTreeMap<&'static str, &'static str> =
        COLLECTION_ASSEMBLY_ATTRIBUTES.iter().copied().collect();

    if requested.is_empty() {
        return Ok(all);
    }

    requested
        .iter()
        .map(|name| {
            all.get_key_value(name.as_str())
                .map(|(k, v)| (*k, *v))
                .ok_or_else(|| ReleaseError::UnknownCollection(name.clone()))
        })
        .collect()
}

/// Filter selecting the documents of one assembly.
pub fn assembly_filter(attribute: &str, assembly: &str) -> String {
    json!({ attribute: { "$in": [assembly] } }).to_string()
}

/// Dump and restore commands moving one collection of one assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionCopy {
    pub collection: String,
    pub query: String,
    pub dump: CommandSpec,
    pub restore: CommandSpec,
}

/// Plans the copy of every selected collection for one assembly.
pub fn plan_collection_copies(
    mongo: &MongoProfile,
    local_port: u16,
    assembly: &str,
    collections: &BTreeMap<&'static str, &'static str>,
    dump_dir: &Path,
) -> Result<Vec<CollectionCopy>> {
    let host = mongo.primary_host()?;
    let normalized = normalized_accession(assembly);
    let dump_output_dir = dump_dir.join(format!("dump_{}", normalized));
    let target_db = format!("acc_{}", normalized);

    let copies = collections
        .iter()
        .map(|(collection, attribute)| {
            let query = assembly_filter(attribute, assembly);

            let dump = CommandSpec::new("mongodump")
                .option("--db", SHARDED_DB_NAME)
                .option("--host", host)
                .option("--username", mongo.username.as_str())
                .option("--password", mongo.password.as_str())
                .option("--authenticationDatabase", mongo.authentication_database.as_str())
                .option("--collection", *collection)
                .option("--query", query.as_str())
                .option("--out", dump_output_dir.display().to_string());

            let bson = dump_output_dir
                .join(SHARDED_DB_NAME)
                .join(format!("{}.bson", collection));
            let restore = CommandSpec::new("mongorestore")
                .option("--db", target_db.as_str())
                .option("--dir", bson.display().to_string())
                .option("--collection", *collection)
                .option("--port", local_port.to_string());

            CollectionCopy {
                collection: collection.to_string(),
                query,
                dump,
                restore,
            }
        })
        .collect();

    Ok(copies)
}

/// Copies every selected collection of every assembly, stopping at the
/// first failing dump or restore.
pub fn mongo_data_copy_to_remote_host(
    runner: &dyn ProcessRunner,
    local_port: u16,
    mongo: &MongoProfile,
    assemblies: &[String],
    collections: &BTreeMap<&'static str, &'static str>,
    dump_dir: &Path,
) -> Result<()> {
    for assembly in assemblies {
        info!("Beginning data copy for assembly: {}", assembly);

        for copy in plan_collection_copies(mongo, local_port, assembly, collections, dump_dir)? {
            info!(
                "Running export of {}.{} in production with query {}",
                SHARDED_DB_NAME, copy.collection, copy.query
            );
            runner.run_checked(&copy.dump)?;
            runner.run_checked(&copy.restore)?;
        }
    }
    Ok(())
}

async fn copy_through_forward<'r>(
    request: &CopyRequest,
    private_config: &PrivateConfig,
    inventory: &dyn ReleaseInventory,
    runner: &'r dyn ProcessRunner,
    target_instance: &mut Option<String>,
    forward: &mut Option<PortForward<'r>>,
) -> Result<()> {
    let collections = select_collections(&request.collections)?;
    let mongo = private_config.mongo_profile(PRODUCTION_PROFILE)?;

    let instance = get_target_mongo_instance_for_taxonomy(
        request.taxonomy_id,
        &request.inventory_table,
        inventory,
    )
    .await?;
    *target_instance = Some(instance.clone());

    let release_assemblies = get_release_assemblies_for_taxonomy(
        request.taxonomy_id,
        &request.inventory_table,
        inventory,
    )
    .await?;
    let assemblies = match &request.assembly_accession {
        Some(accession) if release_assemblies.contains(accession) => vec![accession.clone()],
        Some(accession) => {
            return Err(ReleaseError::NotReleaseAssembly {
                taxonomy_id: request.taxonomy_id,
                assembly: accession.clone(),
            })
        }
        None => release_assemblies,
    };

    let local_port = available_local_port(MONGO_PORT)?;
    let opened = forward.insert(PortForward::open(runner, &instance, MONGO_PORT, local_port)?);
    info!("Beginning data copy to remote MongoDB host {}...", instance);

    mongo_data_copy_to_remote_host(
        runner,
        opened.local_port(),
        mongo,
        &assemblies,
        &collections,
        &request.dump_dir,
    )
}

/// Copies the accessioning collections of a taxonomy to its temporary
/// instance and returns the exit status for the process.
pub async fn copy_accessioning_collections_to_embassy(
    request: &CopyRequest,
    private_config: &PrivateConfig,
    inventory: &dyn ReleaseInventory,
    runner: &dyn ProcessRunner,
) -> i32 {
    let mut target_instance = None;
    let mut forward = None;

    let result = copy_through_forward(
        request,
        private_config,
        inventory,
        runner,
        &mut target_instance,
        &mut forward,
    )
    .await;

    let exit_code = match result {
        Ok(()) => 0,
        Err(e) => {
            error!(
                "Encountered an error while copying species data to Embassy for taxonomy {} \
                 on instance {}: {}",
                request.taxonomy_id,
                target_instance.as_deref().unwrap_or("<unresolved>"),
                e
            );
            COPY_FAILURE_EXIT_CODE
        }
    };

    if let Some(forward) = forward {
        if let Err(e) = forward.close() {
            warn!("Port forwarding could not be stopped: {}", e);
        }
    }

    info!("Copy process completed with exit_code: {}", exit_code);
    exit_code
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::runner::tests::FakeRunner;
    use crate::metadata::inventory::tests::StaticInventory;

    const TABLE: &str = "dbsnp_ensembl_species.release_species_inventory";

    fn private_config() -> PrivateConfig {
        PrivateConfig::from_yaml(
            r#"
mongo:
  production:
    hosts: ["mongos-1.example.org:27017"]
    username: accessioner
    password: secret
"#,
        )
        .unwrap()
    }

    fn request(dump_dir: &Path) -> CopyRequest {
        CopyRequest {
            taxonomy_id: 9913,
            assembly_accession: None,
            collections: vec![],
            inventory_table: TABLE.to_string(),
            dump_dir: dump_dir.to_path_buf(),
        }
    }

    #[test]
    fn test_all_collections_in_lexicographic_order() {
        let collections = select_collections(&[]).unwrap();
        let names: Vec<&str> = collections.keys().copied().collect();
        assert_eq!(
            names,
            vec![
                "clusteredVariantEntity",
                "clusteredVariantOperationEntity",
                "dbsnpClusteredVariantEntity",
                "dbsnpClusteredVariantOperationEntity",
                "dbsnpSubmittedVariantEntity",
                "dbsnpSubmittedVariantOperationEntity",
                "submittedVariantEntity",
                "submittedVariantOperationEntity",
            ]
        );
    }

    #[test]
    fn test_select_subset_and_unknown() {
        let subset = select_collections(&[
            "submittedVariantEntity".to_string(),
            "dbsnpClusteredVariantEntity".to_string(),
        ])
        .unwrap();
        assert_eq!(
            subset.keys().copied().collect::<Vec<_>>(),
            vec!["dbsnpClusteredVariantEntity", "submittedVariantEntity"]
        );

        let err = select_collections(&["variants".to_string()]).unwrap_err();
        assert!(matches!(err, ReleaseError::UnknownCollection(_)));
    }

    #[test]
    fn test_assembly_filter() {
        assert_eq!(
            assembly_filter("inactiveObjects.seq", "GCA_1.1"),
            r#"{"inactiveObjects.seq":{"$in":["GCA_1.1"]}}"#
        );
    }

    #[test]
    fn test_planned_queries_follow_collection_order() {
        let config = private_config();
        let mongo = config.mongo_profile(PRODUCTION_PROFILE).unwrap();
        let collections = select_collections(&[]).unwrap();

        let copies =
            plan_collection_copies(mongo, 27018, "GCA_1.1", &collections, Path::new("/dumps"))
                .unwrap();
        let queries: Vec<&str> = copies.iter().map(|c| c.query.as_str()).collect();
        assert_eq!(
            queries,
            vec![
                r#"{"asm":{"$in":["GCA_1.1"]}}"#,
                r#"{"inactiveObjects.asm":{"$in":["GCA_1.1"]}}"#,
                r#"{"asm":{"$in":["GCA_1.1"]}}"#,
                r#"{"inactiveObjects.asm":{"$in":["GCA_1.1"]}}"#,
                r#"{"seq":{"$in":["GCA_1.1"]}}"#,
                r#"{"inactiveObjects.seq":{"$in":["GCA_1.1"]}}"#,
                r#"{"seq":{"$in":["GCA_1.1"]}}"#,
                r#"{"inactiveObjects.seq":{"$in":["GCA_1.1"]}}"#,
            ]
        );
    }

    #[test]
    fn test_dump_and_restore_arguments() {
        let config = private_config();
        let mongo = config.mongo_profile(PRODUCTION_PROFILE).unwrap();
        let collections = select_collections(&["submittedVariantEntity".to_string()]).unwrap();

        let copies =
            plan_collection_copies(mongo, 27018, "GCA_1.1", &collections, Path::new("/dumps"))
                .unwrap();
        let copy = &copies[0];

        assert_eq!(copy.dump.option_value("--host"), Some("mongos-1.example.org"));
        assert_eq!(copy.dump.option_value("--db"), Some(SHARDED_DB_NAME));
        assert_eq!(copy.dump.option_value("--authenticationDatabase"), Some("admin"));
        assert_eq!(copy.dump.option_value("--out"), Some("/dumps/dump_GCA_1_1"));

        assert_eq!(copy.restore.option_value("--db"), Some("acc_GCA_1_1"));
        assert_eq!(copy.restore.option_value("--port"), Some("27018"));
        assert_eq!(
            copy.restore.option_value("--dir"),
            Some("/dumps/dump_GCA_1_1/eva_accession_sharded/submittedVariantEntity.bson")
        );
    }

    #[tokio::test]
    async fn test_successful_copy_closes_forward() {
        let dir = tempfile::tempdir().unwrap();
        let runner = FakeRunner::default();
        let inventory = StaticInventory::new(&[
            (9913, "GCA_1.1", "tempmongo-1"),
            (9913, "GCA_2.1", "tempmongo-1"),
        ]);

        let exit_code = copy_accessioning_collections_to_embassy(
            &request(dir.path()),
            &private_config(),
            &inventory,
            &runner,
        )
        .await;

        assert_eq!(exit_code, 0);
        // 2 assemblies x 8 collections x (dump + restore)
        assert_eq!(runner.runs.lock().unwrap().len(), 32);
        assert_eq!(runner.terminated.lock().unwrap().len(), 1);

        let spawned = runner.spawned.lock().unwrap();
        assert_eq!(spawned.len(), 1);
        assert_eq!(spawned[0].args.last().map(String::as_str), Some("tempmongo-1"));
    }

    #[tokio::test]
    async fn test_dump_failure_exits_nonzero_and_terminates_forward_once() {
        let dir = tempfile::tempdir().unwrap();
        let runner = FakeRunner::failing("mongodump", 1);
        let inventory = StaticInventory::new(&[(9913, "GCA_1.1", "tempmongo-1")]);

        let exit_code = copy_accessioning_collections_to_embassy(
            &request(dir.path()),
            &private_config(),
            &inventory,
            &runner,
        )
        .await;

        assert_eq!(exit_code, COPY_FAILURE_EXIT_CODE);
        assert_eq!(runner.run_programs(), vec!["mongodump"]);

        let terminated = runner.terminated.lock().unwrap();
        assert_eq!(terminated.len(), 1);
        assert_eq!(terminated[0], 4001);
    }

    #[tokio::test]
    async fn test_single_assembly_request() {
        let dir = tempfile::tempdir().unwrap();
        let runner = FakeRunner::default();
        let inventory = StaticInventory::new(&[
            (9913, "GCA_1.1", "tempmongo-1"),
            (9913, "GCA_2.1", "tempmongo-1"),
        ]);
        let mut request = request(dir.path());
        request.assembly_accession = Some("GCA_2.1".to_string());
        request.collections = vec!["clusteredVariantEntity".to_string()];

        let exit_code =
            copy_accessioning_collections_to_embassy(&request, &private_config(), &inventory, &runner)
                .await;

        assert_eq!(exit_code, 0);
        let runs = runner.runs.lock().unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[1].option_value("--db"), Some("acc_GCA_2_1"));
    }

    #[tokio::test]
    async fn test_foreign_assembly_is_not_copied() {
        let dir = tempfile::tempdir().unwrap();
        let runner = FakeRunner::default();
        let inventory = StaticInventory::new(&[
            (9913, "GCA_1.1", "tempmongo-1"),
            (9823, "GCA_9.9", "tempmongo-2"),
        ]);
        let mut request = request(dir.path());
        request.assembly_accession = Some("GCA_9.9".to_string());

        let exit_code =
            copy_accessioning_collections_to_embassy(&request, &private_config(), &inventory, &runner)
                .await;

        assert_eq!(exit_code, COPY_FAILURE_EXIT_CODE);
        assert!(runner.runs.lock().unwrap().is_empty());
        assert!(runner.spawned.lock().unwrap().is_empty());
        assert!(runner.terminated.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unresolved_instance_fails_without_forward() {
        let dir = tempfile::tempdir().unwrap();
        let runner = FakeRunner::default();
        let inventory = StaticInventory::new(&[]);

        let exit_code = copy_accessioning_collections_to_embassy(
            &request(dir.path()),
            &private_config(),
            &inventory,
            &runner,
        )
        .await;

        assert_eq!(exit_code, COPY_FAILURE_EXIT_CODE);
        assert!(runner.spawned.lock().unwrap().is_empty());
        assert!(runner.terminated.lock().unwrap().is_empty());
    }
}
