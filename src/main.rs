//! variant-release CLI Entry Point
//!
//! One subcommand per entry point and per release stage. The stage
//! subcommands are what the generated workflows invoke.
//!
//! # Usage
//!
//! ```bash
//! # Generate and launch the release workflows of a taxonomy
//! variant-release run-release-for-species \
//!     --common-release-properties-file release.json --taxonomy-id 9913
//!
//! # Register imported assemblies
//! variant-release finalize-import -s pig_9823 --scientific-name sus_scrofa \
//!     -a 150,Sscrofa11.1,GCA_000003025.6 -p private.yml
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::{debug, error};

use variant_release::config::private::DEVELOPMENT_PROFILE;
use variant_release::config::release::{DEFAULT_INVENTORY_TABLE, DEFAULT_MEMORY_GB};
use variant_release::import::{finalize_import, AssemblyInfo, FinalizeRequest};
use variant_release::metadata::{self, PgImportProgress, PgInventory};
use variant_release::release::{
    copy_accessioning_collections_to_embassy, merge_dbsnp_eva_release_files,
    run_release_for_assembly, run_release_for_species, sort_bgzip_tabix_release_files,
    validate_release_vcf_files, AssemblyReleaseRequest, CompressionTools, CopyRequest,
    ValidationRequest, COPY_FAILURE_EXIT_CODE,
};
use variant_release::{
    CommonReleaseProperties, PrivateConfig, Result, SystemRunner, APP_NAME, VERSION,
};

#[derive(Parser, Debug)]
#[command(name = APP_NAME, version = VERSION, about = "Accessioned variant release orchestration")]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate and launch a release workflow for every assembly of a taxonomy
    RunReleaseForSpecies {
        #[arg(long)]
        common_release_properties_file: PathBuf,
        #[arg(long)]
        taxonomy_id: i32,
        /// Memory in GB for each release process
        #[arg(long, default_value_t = DEFAULT_MEMORY_GB)]
        memory: u32,
    },

    /// Copy accessioning collections to the taxonomy's temporary instance
    CopyAccessioningCollectionsToEmbassy {
        #[arg(long)]
        private_config_file: PathBuf,
        #[arg(long)]
        taxonomy_id: i32,
        #[arg(long)]
        assembly_accession: Option<String>,
        /// Collection to copy; all of them when omitted
        #[arg(short = 'c', long = "collection")]
        collections: Vec<String>,
        #[arg(long, default_value = DEFAULT_INVENTORY_TABLE)]
        release_species_inventory_table: String,
        #[arg(long)]
        dump_dir: PathBuf,
    },

    /// Run the release job for an assembly
    RunReleaseForAssembly {
        #[arg(long)]
        private_config_file: PathBuf,
        #[arg(long)]
        taxonomy_id: i32,
        #[arg(long)]
        assembly_accession: String,
        #[arg(long, default_value = DEFAULT_INVENTORY_TABLE)]
        release_species_inventory_table: String,
        #[arg(long)]
        release_folder: PathBuf,
        #[arg(long)]
        release_jar_path: PathBuf,
        #[arg(long)]
        job_repo_url: String,
        #[arg(long, default_value_t = DEFAULT_MEMORY_GB)]
        memory: u32,
    },

    /// Merge the dbSNP and EVA release files of an assembly
    MergeDbsnpEvaReleaseFiles {
        #[command(flatten)]
        tools: ToolArgs,
        #[arg(long)]
        bcftools_path: PathBuf,
        #[arg(long)]
        assembly_accession: String,
        #[arg(long)]
        release_folder: PathBuf,
    },

    /// Sort, compress and index the merged release files of an assembly
    SortBgzipTabixReleaseFiles {
        #[command(flatten)]
        tools: ToolArgs,
        #[arg(long)]
        assembly_accession: String,
        #[arg(long)]
        release_folder: PathBuf,
    },

    /// Validate the compressed release files of an assembly
    ValidateReleaseVcfFiles {
        #[arg(long)]
        private_config_file: PathBuf,
        #[arg(long)]
        taxonomy_id: i32,
        #[arg(long)]
        assembly_accession: String,
        #[arg(long, default_value = DEFAULT_INVENTORY_TABLE)]
        release_species_inventory_table: String,
        #[arg(long)]
        release_folder: PathBuf,
        #[arg(long)]
        vcf_validator_path: PathBuf,
        #[arg(long)]
        assembly_checker_path: PathBuf,
    },

    /// Register imported assemblies and update the import progress table
    FinalizeImport {
        /// Species code, e.g. pig_9823
        #[arg(short, long)]
        species: String,
        /// Scientific name, e.g. sus_scrofa
        #[arg(long)]
        scientific_name: String,
        /// One or more BUILD,ASSEMBLY_NAME,ACCESSION triples
        #[arg(short = 'a', long, num_args = 1.., required = true)]
        assembly_info: Vec<AssemblyInfo>,
        #[arg(short = 'p', long)]
        private_config_file: PathBuf,
    },
}

#[derive(clap::Args, Debug)]
struct ToolArgs {
    #[arg(long)]
    bgzip_path: PathBuf,
    #[arg(long)]
    tabix_path: PathBuf,
    #[arg(long)]
    vcf_sort_script_path: PathBuf,
}

impl From<ToolArgs> for CompressionTools {
    fn from(args: ToolArgs) -> Self {
        Self {
            bgzip_path: args.bgzip_path,
            tabix_path: args.tabix_path,
            vcf_sort_script_path: args.vcf_sort_script_path,
        }
    }
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

/// Inventory reader on the development metadata profile.
async fn open_inventory(private_config: &PrivateConfig) -> Result<PgInventory> {
    let profile = private_config.postgres_profile(DEVELOPMENT_PROFILE)?;
    Ok(PgInventory::new(metadata::connect(profile).await?))
}

/// Process exit status for a copy outcome; `-1` reports as 255.
fn copy_exit_status(code: i32) -> u8 {
    code as u8
}

async fn copy_collections(
    private_config_file: PathBuf,
    request: CopyRequest,
) -> ExitCode {
    let setup = async {
        let private_config = PrivateConfig::load(&private_config_file)?;
        let inventory = open_inventory(&private_config).await?;
        Ok::<_, variant_release::ReleaseError>((private_config, inventory))
    };

    let code = match setup.await {
        Ok((private_config, inventory)) => {
            let code = copy_accessioning_collections_to_embassy(
                &request,
                &private_config,
                &inventory,
                &SystemRunner,
            )
            .await;
            inventory.close().await;
            code
        }
        Err(e) => {
            error!(
                "Could not start the copy for taxonomy {}: {}",
                request.taxonomy_id, e
            );
            COPY_FAILURE_EXIT_CODE
        }
    };

    ExitCode::from(copy_exit_status(code))
}

/// Main application logic.
async fn run(command: Command) -> Result<ExitCode> {
    match command {
        Command::RunReleaseForSpecies {
            common_release_properties_file,
            taxonomy_id,
            memory,
        } => {
            let common = CommonReleaseProperties::load(&common_release_properties_file)?;
            let private_config = PrivateConfig::load(&common.private_config_file)?;
            let inventory = open_inventory(&private_config).await?;

            let result =
                run_release_for_species(&common, taxonomy_id, memory, &inventory, &SystemRunner)
                    .await;
            inventory.close().await;
            result?;
        }

        Command::CopyAccessioningCollectionsToEmbassy {
            private_config_file,
            taxonomy_id,
            assembly_accession,
            collections,
            release_species_inventory_table,
            dump_dir,
        } => {
            let request = CopyRequest {
                taxonomy_id,
                assembly_accession,
                collections,
                inventory_table: release_species_inventory_table,
                dump_dir,
            };
            return Ok(copy_collections(private_config_file, request).await);
        }

        Command::RunReleaseForAssembly {
            private_config_file,
            taxonomy_id,
            assembly_accession,
            release_species_inventory_table,
            release_folder,
            release_jar_path,
            job_repo_url,
            memory,
        } => {
            let private_config = PrivateConfig::load(&private_config_file)?;
            let inventory = open_inventory(&private_config).await?;
            let request = AssemblyReleaseRequest {
                taxonomy_id,
                assembly_accession,
                inventory_table: release_species_inventory_table,
                release_folder,
                release_jar_path,
                job_repo_url,
                memory_gb: memory,
            };

            let result =
                run_release_for_assembly(&request, &private_config, &inventory, &SystemRunner)
                    .await;
            inventory.close().await;
            result?;
        }

        Command::MergeDbsnpEvaReleaseFiles {
            tools,
            bcftools_path,
            assembly_accession,
            release_folder,
        } => {
            merge_dbsnp_eva_release_files(
                &tools.into(),
                &bcftools_path,
                &assembly_accession,
                &release_folder,
                &SystemRunner,
            )?;
        }

        Command::SortBgzipTabixReleaseFiles {
            tools,
            assembly_accession,
            release_folder,
        } => {
            sort_bgzip_tabix_release_files(
                &tools.into(),
                &assembly_accession,
                &release_folder,
                &SystemRunner,
            )?;
        }

        Command::ValidateReleaseVcfFiles {
            private_config_file,
            taxonomy_id,
            assembly_accession,
            release_species_inventory_table,
            release_folder,
            vcf_validator_path,
            assembly_checker_path,
        } => {
            let private_config = PrivateConfig::load(&private_config_file)?;
            let inventory = open_inventory(&private_config).await?;
            let request = ValidationRequest {
                taxonomy_id,
                assembly_accession,
                inventory_table: release_species_inventory_table,
                release_folder,
                vcf_validator_path,
                assembly_checker_path,
            };

            let result = validate_release_vcf_files(&request, &inventory, &SystemRunner).await;
            inventory.close().await;
            result?;
        }

        Command::FinalizeImport {
            species,
            scientific_name,
            assembly_info,
            private_config_file,
        } => {
            let private_config = PrivateConfig::load(&private_config_file)?;
            let import = private_config.import()?;
            let pool =
                metadata::connect(private_config.postgres_profile(DEVELOPMENT_PROFILE)?).await?;
            let progress = PgImportProgress::new(pool, import.import_progress_table.as_str())?;

            let request = FinalizeRequest {
                species,
                scientific_name,
                assemblies: assembly_info,
            };
            let result = finalize_import(&request, &private_config, &progress, &SystemRunner).await;
            progress.close().await;

            let updated = result?;
            debug!("Progress updated for {:?}", updated);
        }
    }

    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose);
    debug!("{} v{}", APP_NAME, VERSION);

    match run(cli.command).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!();
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_exit_status() {
        assert_eq!(copy_exit_status(0), 0);
        assert_eq!(copy_exit_status(COPY_FAILURE_EXIT_CODE), 255);
    }

    #[test]
    fn test_stage_flags_parse() {
        let cli = Cli::try_parse_from([
            "variant-release",
            "copy-accessioning-collections-to-embassy",
            "--private-config-file",
            "/secure/private.yml",
            "--taxonomy-id",
            "9913",
            "--assembly-accession",
            "GCA_1.1",
            "--release-species-inventory-table",
            "dbsnp_ensembl_species.release_species_inventory",
            "--dump-dir",
            "/nfs/release/GCA_1.1/dumps",
        ])
        .unwrap();

        match cli.command {
            Command::CopyAccessioningCollectionsToEmbassy {
                taxonomy_id,
                assembly_accession,
                collections,
                ..
            } => {
                assert_eq!(taxonomy_id, 9913);
                assert_eq!(assembly_accession.as_deref(), Some("GCA_1.1"));
                assert!(collections.is_empty());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
