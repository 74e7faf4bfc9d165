//! Workflow Generation
//!
//! Builds the per-assembly stage chain from the release properties and
//! writes it as a Nextflow file inside the assembly release folder.

use std::fs;
use std::path::PathBuf;

use log::{debug, info};

use super::model::{
    ReleaseWorkflow, StageCommand, WorkflowProcess, FIRST_INPUT_FLAG, RELEASE_STAGES,
};
use super::nextflow::render_nextflow;
use crate::config::{AssemblyReleaseProperties, CommonReleaseProperties};
use crate::error::Result;

/// Name of the completion flag emitted by the `index`-th process (1-based).
fn output_flag_name(index: usize) -> String {
    format!("flag{}", index)
}

/// Builds the chained release workflow for one assembly.
///
/// The output flag of each process becomes the input flag of the next;
/// the first process starts from [`FIRST_INPUT_FLAG`].
pub fn build_release_workflow(properties: &AssemblyReleaseProperties) -> ReleaseWorkflow {
    let normalized = properties.normalized_accession();
    let program = properties.common.stage_runner().display().to_string();
    let log_file = properties.log_file_path();

    let mut previous_flag = FIRST_INPUT_FLAG.to_string();
    let mut processes = Vec::with_capacity(RELEASE_STAGES.len());

    for (index, stage) in RELEASE_STAGES.iter().enumerate() {
        let output_flag = output_flag_name(index + 1);

        let command = StageCommand {
            program: program.clone(),
            subcommand: stage.subcommand(),
            arguments: stage
                .args
                .iter()
                .map(|arg| (arg.name(), properties.argument_value(*arg)))
                .collect(),
            log_file: log_file.clone(),
        };

        processes.push(WorkflowProcess {
            name: format!("{}_{}", stage.name, normalized),
            memory_gb: properties.memory_gb,
            input_flag: std::mem::replace(&mut previous_flag, output_flag.clone()),
            output_flag,
            command,
        });
    }

    ReleaseWorkflow {
        assembly_accession: properties.assembly_accession.clone(),
        processes,
    }
}

/// Writes the workflow file for an assembly and returns its path.
///
/// An existing file is overwritten.
pub fn generate_workflow_file_for_assembly(properties: &AssemblyReleaseProperties) -> Result<PathBuf> {
    let workflow = build_release_workflow(properties);
    workflow.validate()?;

    let path = properties.workflow_file_path();
    fs::write(&path, render_nextflow(&workflow))?;

    debug!(
        "Wrote {} processes for {}",
        workflow.processes.len(),
        workflow.assembly_accession
    );
    info!("Generated workflow file: {}", path.display());
    Ok(path)
}

/// Prepares the release folders for an assembly and writes its workflow.
pub fn prepare_release_workflow_file_for_assembly(
    common: &CommonReleaseProperties,
    taxonomy_id: i32,
    assembly_accession: &str,
    memory_gb: u32,
) -> Result<PathBuf> {
    let properties =
        AssemblyReleaseProperties::prepare(common, taxonomy_id, assembly_accession, memory_gb)?;
    generate_workflow_file_for_assembly(&properties)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::release::tests::sample_common;
    use std::path::Path;

    #[test]
    fn test_flags_chain_through_stages() {
        let common = sample_common(Path::new("/nfs/release"));
        let properties = AssemblyReleaseProperties::new(&common, 9913, "GCA_1.1", 8);
        let workflow = build_release_workflow(&properties);

        assert_eq!(workflow.processes.len(), 5);
        assert_eq!(workflow.processes[0].input_flag, "true");
        for pair in workflow.processes.windows(2) {
            assert_eq!(pair[0].output_flag, pair[1].input_flag);
        }
        assert_eq!(workflow.processes[4].output_flag, "flag5");
        assert!(workflow.validate().is_ok());
    }

    #[test]
    fn test_process_names_use_normalized_accession() {
        let common = sample_common(Path::new("/nfs/release"));
        let properties = AssemblyReleaseProperties::new(&common, 9913, "GCA_000003025.6", 8);
        let workflow = build_release_workflow(&properties);

        assert_eq!(
            workflow.processes[0].name,
            "copy_accessioning_collections_to_embassy_GCA_000003025_6"
        );
        assert!(workflow.processes.iter().all(|p| !p.name.contains('.')));
    }

    #[test]
    fn test_commands_carry_stage_arguments() {
        let common = sample_common(Path::new("/nfs/release"));
        let properties = AssemblyReleaseProperties::new(&common, 9913, "GCA_1.1", 16);
        let workflow = build_release_workflow(&properties);

        let copy = &workflow.processes[0].command;
        assert_eq!(copy.program, "/opt/bin/variant-release");
        assert_eq!(copy.subcommand, "copy-accessioning-collections-to-embassy");
        assert_eq!(
            copy.arguments,
            vec![
                ("private-config-file", "/secure/private.yml".to_string()),
                ("taxonomy-id", "9913".to_string()),
                ("assembly-accession", "GCA_1.1".to_string()),
                (
                    "release-species-inventory-table",
                    "dbsnp_ensembl_species.release_species_inventory".to_string()
                ),
                ("dump-dir", "/nfs/release/GCA_1.1/dumps".to_string()),
            ]
        );

        let release = &workflow.processes[1];
        assert_eq!(release.memory_gb, 16);
        assert!(release
            .command
            .arguments
            .contains(&("memory", "16".to_string())));
    }

    #[test]
    fn test_generate_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let common = sample_common(dir.path());

        let path = prepare_release_workflow_file_for_assembly(&common, 9913, "GCA_1.1", 8).unwrap();
        assert_eq!(path, dir.path().join("GCA_1.1").join("GCA_1_1_release_workflow.nf"));

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("#!/usr/bin/env nextflow"));
        assert_eq!(content.matches("\nprocess ").count(), 5);
        assert!(content.contains("val flag from true"));
        assert!(content.contains("val true into flag5"));
    }

    #[test]
    fn test_generate_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let common = sample_common(dir.path());

        let path = prepare_release_workflow_file_for_assembly(&common, 9913, "GCA_1.1", 8).unwrap();
        std::fs::write(&path, "stale").unwrap();

        prepare_release_workflow_file_for_assembly(&common, 9913, "GCA_1.1", 8).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("stale"));
    }
}
