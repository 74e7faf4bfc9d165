//! Release Dispatch
//!
//! Generates one workflow file per release assembly of a taxonomy and
//! launches each with the workflow engine as an independent background
//! job.

use std::path::{Path, PathBuf};

use log::info;

use crate::config::CommonReleaseProperties;
use crate::error::Result;
use crate::execution::{CommandSpec, ProcessRunner};
use crate::metadata::{get_release_assemblies_for_taxonomy, ReleaseInventory};
use crate::workflow::prepare_release_workflow_file_for_assembly;

/// `<workflow stem>.report.html` next to the workflow file.
pub fn report_file_path(workflow_file: &Path) -> PathBuf {
    let stem = workflow_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    workflow_file.with_file_name(format!("{}.report.html", stem))
}

/// Engine invocation running a workflow file in the background.
pub fn workflow_launch_command(
    common: &CommonReleaseProperties,
    workflow_file: &Path,
) -> CommandSpec {
    CommandSpec::from_path(&common.nextflow_binary_path)
        .arg("run")
        .arg(workflow_file.display().to_string())
        .option("-c", common.nextflow_config_path.display().to_string())
        .option("-with-report", report_file_path(workflow_file).display().to_string())
        .arg("-bg")
}

/// Writes and launches the release workflow of every assembly of a
/// taxonomy.
///
/// Returns the workflow files launched. A taxonomy with no release
/// assemblies launches nothing.
pub async fn run_release_for_species(
    common: &CommonReleaseProperties,
    taxonomy_id: i32,
    memory_gb: u32,
    inventory: &dyn ReleaseInventory,
    runner: &dyn ProcessRunner,
) -> Result<Vec<PathBuf>> {
    let assemblies = get_release_assemblies_for_taxonomy(
        taxonomy_id,
        &common.release_species_inventory_table,
        inventory,
    )
    .await?;

    if assemblies.is_empty() {
        info!("No release assemblies found for taxonomy {}", taxonomy_id);
    }

    let mut launched = Vec::with_capacity(assemblies.len());
    for assembly in &assemblies {
        let workflow_file =
            prepare_release_workflow_file_for_assembly(common, taxonomy_id, assembly, memory_gb)?;

        let command = workflow_launch_command(common, &workflow_file);
        info!(
            "Running workflow file {} with the following command:\n\n {} \n\n\
             Use the above command with -resume if this workflow needs to be resumed in the future",
            workflow_file.display(),
            command
        );
        runner.spawn_detached(&command)?;

        launched.push(workflow_file);
    }

    Ok(launched)
}
