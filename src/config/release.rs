//! Release Properties
//!
//! Common settings shared by every assembly of a release, loaded from a
//! JSON file, and the per-assembly properties derived from them.
//!
//! # Example JSON Format
//!
//! ```json
//! {
//!   "private-config-file": "/secure/private.yml",
//!   "release-species-inventory-table": "dbsnp_ensembl_species.release_species_inventory",
//!   "release-folder": "/nfs/release/3",
//!   "release-jar-path": "/opt/release/accession-release.jar",
//!   "job-repo-url": "jdbc:postgresql://pgsql.example.org:5432/jobrepo",
//!   "bgzip-path": "/usr/bin/bgzip",
//!   "tabix-path": "/usr/bin/tabix",
//!   "bcftools-path": "/usr/bin/bcftools",
//!   "vcf-sort-script-path": "/usr/bin/vcf-sort",
//!   "vcf-validator-path": "/opt/vcf_validator",
//!   "assembly-checker-path": "/opt/vcf_assembly_checker",
//!   "nextflow-binary-path": "/opt/nextflow",
//!   "nextflow-config-path": "/opt/release/nextflow.config"
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{ReleaseError, Result};
use crate::workflow::model::ReleaseArg;

/// Default inventory table mapping taxonomies to release assemblies.
pub const DEFAULT_INVENTORY_TABLE: &str = "dbsnp_ensembl_species.release_species_inventory";

/// Default memory, in GB, given to each workflow process.
pub const DEFAULT_MEMORY_GB: u32 = 8;

/// Name of the dump folder inside each assembly release folder.
const DUMP_FOLDER_NAME: &str = "dumps";

/// Lazily-resolved path of the binary that runs workflow stages.
///
/// Generated workflows call back into this executable, one subcommand per
/// stage, so it must be reachable from wherever the engine runs them.
pub static STAGE_RUNNER_PATH: Lazy<PathBuf> = Lazy::new(|| match std::env::current_exe() {
    Ok(path) => path,
    Err(e) => {
        warn!("Could not resolve current executable ({}), relying on PATH", e);
        PathBuf::from(env!("CARGO_PKG_NAME"))
    }
});

/// Replaces every character outside `[A-Za-z0-9_]` with `_`.
///
/// Used wherever an accession becomes part of a file, process or
/// database name, e.g. `GCA_000003025.6` -> `GCA_000003025_6`.
pub fn normalized_accession(accession: &str) -> String {
    accession
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Settings common to every assembly of a release.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct CommonReleaseProperties {
    pub private_config_file: PathBuf,

    #[serde(default = "default_inventory_table")]
    pub release_species_inventory_table: String,

    pub release_folder: PathBuf,
    pub release_jar_path: PathBuf,
    pub job_repo_url: String,
    pub bgzip_path: PathBuf,
    pub tabix_path: PathBuf,
    pub bcftools_path: PathBuf,
    pub vcf_sort_script_path: PathBuf,
    pub vcf_validator_path: PathBuf,
    pub assembly_checker_path: PathBuf,
    pub nextflow_binary_path: PathBuf,
    pub nextflow_config_path: PathBuf,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_runner_path: Option<PathBuf>,
}

fn default_inventory_table() -> String {
    DEFAULT_INVENTORY_TABLE.to_string()
}

impl CommonReleaseProperties {
    /// Loads the common release properties from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading release properties from: {}", path.display());

        let content = fs::read_to_string(path).map_err(|source| ReleaseError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|source| ReleaseError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The binary invoked by every workflow stage.
    pub fn stage_runner(&self) -> &Path {
        self.stage_runner_path
            .as_deref()
            .unwrap_or(STAGE_RUNNER_PATH.as_path())
    }
}

/// Release properties for one assembly.
///
/// Built from an owned copy of the common properties; nothing written
/// here leaks back into the shared settings.
#[derive(Debug, Clone)]
pub struct AssemblyReleaseProperties {
    pub common: CommonReleaseProperties,
    pub taxonomy_id: i32,
    pub assembly_accession: String,
    pub memory_gb: u32,
    /// `<release-folder>/<accession>`
    pub assembly_release_folder: PathBuf,
    /// `<assembly-release-folder>/dumps`
    pub dump_dir: PathBuf,
}

impl AssemblyReleaseProperties {
    /// Derives the per-assembly properties without touching the filesystem.
    pub fn new(
        common: &CommonReleaseProperties,
        taxonomy_id: i32,
        assembly_accession: &str,
        memory_gb: u32,
    ) -> Self {
        let assembly_release_folder = common.release_folder.join(assembly_accession);
        let dump_dir = assembly_release_folder.join(DUMP_FOLDER_NAME);

        Self {
            common: common.clone(),
            taxonomy_id,
            assembly_accession: assembly_accession.to_string(),
            memory_gb,
            assembly_release_folder,
            dump_dir,
        }
    }

    /// Derives the per-assembly properties and creates their folders.
    ///
    /// Folders that already exist are left alone.
    pub fn prepare(
        common: &CommonReleaseProperties,
        taxonomy_id: i32,
        assembly_accession: &str,
        memory_gb: u32,
    ) -> Result<Self> {
        let properties = Self::new(common, taxonomy_id, assembly_accession, memory_gb);

        fs::create_dir_all(&properties.assembly_release_folder)?;
        fs::create_dir_all(&properties.dump_dir)?;
        debug!(
            "Prepared release folders under {}",
            properties.assembly_release_folder.display()
        );

        Ok(properties)
    }

    pub fn normalized_accession(&self) -> String {
        normalized_accession(&self.assembly_accession)
    }

    /// `<assembly-release-folder>/<normalized accession>_release_workflow.nf`
    pub fn workflow_file_path(&self) -> PathBuf {
        self.assembly_release_folder
            .join(format!("{}_release_workflow.nf", self.normalized_accession()))
    }

    /// Log file every stage of this assembly appends to.
    pub fn log_file_path(&self) -> PathBuf {
        self.assembly_release_folder
            .join(format!("release_{}.log", self.normalized_accession()))
    }

    /// Value passed on the command line for a stage argument.
    pub fn argument_value(&self, arg: ReleaseArg) -> String {
        let common = &self.common;
        match arg {
            ReleaseArg::PrivateConfigFile => path_string(&common.private_config_file),
            ReleaseArg::TaxonomyId => self.taxonomy_id.to_string(),
            ReleaseArg::AssemblyAccession => self.assembly_accession.clone(),
            ReleaseArg::ReleaseSpeciesInventoryTable => {
                common.release_species_inventory_table.clone()
            }
            ReleaseArg::DumpDir => path_string(&self.dump_dir),
            ReleaseArg::ReleaseFolder => path_string(&common.release_folder),
            ReleaseArg::ReleaseJarPath => path_string(&common.release_jar_path),
            ReleaseArg::JobRepoUrl => common.job_repo_url.clone(),
            ReleaseArg::Memory => self.memory_gb.to_string(),
            ReleaseArg::BgzipPath => path_string(&common.bgzip_path),
            ReleaseArg::TabixPath => path_string(&common.tabix_path),
            ReleaseArg::BcftoolsPath => path_string(&common.bcftools_path),
            ReleaseArg::VcfSortScriptPath => path_string(&common.vcf_sort_script_path),
            ReleaseArg::VcfValidatorPath => path_string(&common.vcf_validator_path),
            ReleaseArg::AssemblyCheckerPath => path_string(&common.assembly_checker_path),
        }
    }
}

fn path_string(path: &Path) -> String {
    path.display().to_string()
}
