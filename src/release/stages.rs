//! Release Stage Drivers
//!
//! The stages that follow the data copy in a release workflow. Each one
//! only assembles command lines for external tools (the release jar,
//! `vcf-sort`, `bgzip`, `tabix`, `bcftools`, the validators) and runs them
//! through a [`ProcessRunner`].

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::config::private::DEVELOPMENT_PROFILE;
use crate::config::release::normalized_accession;
use crate::config::PrivateConfig;
use crate::error::{ReleaseError, Result};
use crate::execution::{
    available_local_port, shell_quote, CommandSpec, PortForward, ProcessRunner, MONGO_PORT,
};
use crate::metadata::{
    ensure_release_assembly, get_target_mongo_instance_for_taxonomy, ReleaseInventory,
};

/// Kinds of release file produced for every assembly.
pub const RELEASE_KINDS: [&str; 2] = ["current_ids", "merged_ids"];

/// Sources merged into each release file.
const RELEASE_SOURCES: [&str; 2] = ["dbsnp", "eva"];

/// Batch job run by the release jar.
const RELEASE_JOB_NAME: &str = "ACCESSION_RELEASE_JOB";

/// Folder holding one assembly's release files.
pub fn assembly_folder(release_folder: &Path, accession: &str) -> PathBuf {
    release_folder.join(accession)
}

/// `<folder>/<accession>_<kind>.vcf`
pub fn release_file(release_folder: &Path, accession: &str, kind: &str) -> PathBuf {
    assembly_folder(release_folder, accession).join(format!("{}_{}.vcf", accession, kind))
}

/// Tools used to sort, compress and index VCF files.
#[derive(Debug, Clone)]
pub struct CompressionTools {
    pub bgzip_path: PathBuf,
    pub tabix_path: PathBuf,
    pub vcf_sort_script_path: PathBuf,
}

impl CompressionTools {
    /// Sorts and bgzips `vcf` next to itself, indexes it, and returns the
    /// compressed path.
    fn sort_compress_index(&self, runner: &dyn ProcessRunner, vcf: &Path) -> Result<PathBuf> {
        let compressed = PathBuf::from(format!("{}.gz", vcf.display()));

        let pipeline = format!(
            "set -o pipefail; {} -c {} | {} -c > {}",
            shell_quote(&self.vcf_sort_script_path.display().to_string()),
            shell_quote(&vcf.display().to_string()),
            shell_quote(&self.bgzip_path.display().to_string()),
            shell_quote(&compressed.display().to_string()),
        );
        runner.run_checked(&CommandSpec::shell(pipeline))?;

        let index = CommandSpec::from_path(&self.tabix_path)
            .arg("-f")
            .option("-p", "vcf")
            .arg(compressed.display().to_string());
        runner.run_checked(&index)?;

        Ok(compressed)
    }
}

/// Arguments of the release stage.
#[derive(Debug, Clone)]
pub struct AssemblyReleaseRequest {
    pub taxonomy_id: i32,
    pub assembly_accession: String,
    pub inventory_table: String,
    pub release_folder: PathBuf,
    pub release_jar_path: PathBuf,
    pub job_repo_url: String,
    pub memory_gb: u32,
}

/// Command running the release job against a forwarded instance.
pub fn release_job_command(
    request: &AssemblyReleaseRequest,
    private_config: &PrivateConfig,
    local_port: u16,
) -> Result<CommandSpec> {
    let job_repo = private_config.postgres_profile(DEVELOPMENT_PROFILE)?;
    let output_folder = assembly_folder(&request.release_folder, &request.assembly_accession);

    let mut command = CommandSpec::new("java")
        .arg(format!("-Xmx{}g", request.memory_gb))
        .option("-jar", request.release_jar_path.display().to_string())
        .arg(format!("--spring.batch.job.names={}", RELEASE_JOB_NAME))
        .arg(format!(
            "--parameters.assemblyAccession={}",
            request.assembly_accession
        ))
        .arg(format!("--parameters.outputFolder={}", output_folder.display()))
        .arg("--spring.data.mongodb.host=localhost")
        .arg(format!("--spring.data.mongodb.port={}", local_port))
        .arg(format!(
            "--spring.data.mongodb.database=acc_{}",
            normalized_accession(&request.assembly_accession)
        ))
        .arg(format!("--spring.datasource.url={}", request.job_repo_url))
        .arg(format!("--spring.datasource.username={}", job_repo.username));

    if let Some(password) = &job_repo.password {
        command = command.arg(format!("--spring.datasource.password={}", password));
    }

    Ok(command)
}

/// Runs the release job for one assembly against its temporary instance.
///
/// The assembly must be one of the taxonomy's release assemblies.
pub async fn run_release_for_assembly(
    request: &AssemblyReleaseRequest,
    private_config: &PrivateConfig,
    inventory: &dyn ReleaseInventory,
    runner: &dyn ProcessRunner,
) -> Result<()> {
    ensure_release_assembly(
        request.taxonomy_id,
        &request.assembly_accession,
        &request.inventory_table,
        inventory,
    )
    .await?;

    let instance = get_target_mongo_instance_for_taxonomy(
        request.taxonomy_id,
        &request.inventory_table,
        inventory,
    )
    .await?;

    fs::create_dir_all(assembly_folder(
        &request.release_folder,
        &request.assembly_accession,
    ))?;

    let local_port = available_local_port(MONGO_PORT)?;
    let forward = PortForward::open(runner, &instance, MONGO_PORT, local_port)?;

    info!(
        "Running release for {} from {}",
        request.assembly_accession, instance
    );
    let result = release_job_command(request, private_config, forward.local_port())
        .and_then(|command| runner.run_checked(&command));

    if let Err(e) = forward.close() {
        warn!("Port forwarding could not be stopped: {}", e);
    }
    result
}

/// Merges the dbSNP and EVA release files of each kind.
///
/// Returns the merged files written. Kinds with no input files are
/// skipped with a warning.
pub fn merge_dbsnp_eva_release_files(
    tools: &CompressionTools,
    bcftools_path: &Path,
    accession: &str,
    release_folder: &Path,
    runner: &dyn ProcessRunner,
) -> Result<Vec<PathBuf>> {
    let folder = assembly_folder(release_folder, accession);
    let mut merged = Vec::new();

    for kind in RELEASE_KINDS {
        let mut inputs = Vec::new();
        for source in RELEASE_SOURCES {
            let input = folder.join(format!("{}_{}_{}.vcf", accession, source, kind));
            if input.exists() {
                inputs.push(tools.sort_compress_index(runner, &input)?);
            } else {
                warn!("Release file {} not found, skipping", input.display());
            }
        }

        if inputs.is_empty() {
            warn!("No {} release files for {}", kind, accession);
            continue;
        }

        let output = release_file(release_folder, accession, kind);
        let concat = CommandSpec::from_path(bcftools_path)
            .arg("concat")
            .arg("--allow-overlaps")
            .option("--rm-dups", "all")
            .option("-O", "v")
            .option("-o", output.display().to_string())
            .args(inputs.iter().map(|p| p.display().to_string()));
        runner.run_checked(&concat)?;

        info!("Merged {} release file: {}", kind, output.display());
        merged.push(output);
    }

    Ok(merged)
}

/// Sorts, compresses and indexes each merged release file.
pub fn sort_bgzip_tabix_release_files(
    tools: &CompressionTools,
    accession: &str,
    release_folder: &Path,
    runner: &dyn ProcessRunner,
) -> Result<Vec<PathBuf>> {
    let mut compressed = Vec::new();

    for kind in RELEASE_KINDS {
        let vcf = release_file(release_folder, accession, kind);
        if !vcf.exists() {
            warn!("Merged release file {} not found, skipping", vcf.display());
            continue;
        }
        compressed.push(tools.sort_compress_index(runner, &vcf)?);
    }

    Ok(compressed)
}

/// Arguments of the validation stage.
#[derive(Debug, Clone)]
pub struct ValidationRequest {
    pub taxonomy_id: i32,
    pub assembly_accession: String,
    pub inventory_table: String,
    pub release_folder: PathBuf,
    pub vcf_validator_path: PathBuf,
    pub assembly_checker_path: PathBuf,
}

/// Validator and assembly checker invocations for one compressed file.
pub fn validation_commands(request: &ValidationRequest, vcf_gz: &Path) -> [CommandSpec; 2] {
    let folder = assembly_folder(&request.release_folder, &request.assembly_accession);
    let report_dir = folder.join("validation").display().to_string();
    let accession = &request.assembly_accession;

    let validator = CommandSpec::from_path(&request.vcf_validator_path)
        .option("-i", vcf_gz.display().to_string())
        .option("-o", report_dir.as_str());

    let checker = CommandSpec::from_path(&request.assembly_checker_path)
        .option("-i", vcf_gz.display().to_string())
        .option("-f", folder.join(format!("{}.fa", accession)).display().to_string())
        .option(
            "-a",
            folder
                .join(format!("{}_assembly_report.txt", accession))
                .display()
                .to_string(),
        )
        .option("-o", report_dir.as_str())
        .option("-r", "summary,text")
        .arg("--require-genbank");

    [validator, checker]
}

/// Validates the compressed release files of an assembly.
///
/// The assembly must be one of the taxonomy's release assemblies.
pub async fn validate_release_vcf_files(
    request: &ValidationRequest,
    inventory: &dyn ReleaseInventory,
    runner: &dyn ProcessRunner,
) -> Result<()> {
    ensure_release_assembly(
        request.taxonomy_id,
        &request.assembly_accession,
        &request.inventory_table,
        inventory,
    )
    .await?;

    let folder = assembly_folder(&request.release_folder, &request.assembly_accession);
    fs::create_dir_all(folder.join("validation"))?;

    let mut validated = 0;
    for kind in RELEASE_KINDS {
        let vcf_gz = PathBuf::from(format!(
            "{}.gz",
            release_file(&request.release_folder, &request.assembly_accession, kind).display()
        ));
        if !vcf_gz.exists() {
            warn!("Compressed release file {} not found", vcf_gz.display());
            continue;
        }

        for command in validation_commands(request, &vcf_gz) {
            runner.run_checked(&command)?;
        }
        info!("Validated {}", vcf_gz.display());
        validated += 1;
    }

    if validated == 0 {
        return Err(ReleaseError::NoReleaseFiles(
            request.assembly_accession.clone(),
        ));
    }
    Ok(())
}
