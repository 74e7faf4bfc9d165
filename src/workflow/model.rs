//! Release Workflow Model
//!
//! The fixed sequence of release stages and the intermediate
//! representation a per-assembly workflow is built into before rendering.
//!
//! Stages run strictly in declared order. The engine has no notion of the
//! order itself: each process waits on a completion flag emitted by the
//! process before it, and the first process waits on the literal `true`.

use std::path::PathBuf;

use crate::error::{ReleaseError, Result};
use crate::execution::shell_quote;

/// Input flag of the first process in every workflow.
pub const FIRST_INPUT_FLAG: &str = "true";

/// Named argument a stage receives on its command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReleaseArg {
    PrivateConfigFile,
    TaxonomyId,
    AssemblyAccession,
    ReleaseSpeciesInventoryTable,
    DumpDir,
    ReleaseFolder,
    ReleaseJarPath,
    JobRepoUrl,
    Memory,
    BgzipPath,
    TabixPath,
    BcftoolsPath,
    VcfSortScriptPath,
    VcfValidatorPath,
    AssemblyCheckerPath,
}

impl ReleaseArg {
    /// Flag name, without the leading dashes.
    pub fn name(self) -> &'static str {
        match self {
            Self::PrivateConfigFile => "private-config-file",
            Self::TaxonomyId => "taxonomy-id",
            Self::AssemblyAccession => "assembly-accession",
            Self::ReleaseSpeciesInventoryTable => "release-species-inventory-table",
            Self::DumpDir => "dump-dir",
            Self::ReleaseFolder => "release-folder",
            Self::ReleaseJarPath => "release-jar-path",
            Self::JobRepoUrl => "job-repo-url",
            Self::Memory => "memory",
            Self::BgzipPath => "bgzip-path",
            Self::TabixPath => "tabix-path",
            Self::BcftoolsPath => "bcftools-path",
            Self::VcfSortScriptPath => "vcf-sort-script-path",
            Self::VcfValidatorPath => "vcf-validator-path",
            Self::AssemblyCheckerPath => "assembly-checker-path",
        }
    }
}

/// A release stage and the arguments it requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageDescriptor {
    pub name: &'static str,
    pub args: &'static [ReleaseArg],
}

impl StageDescriptor {
    /// CLI subcommand running this stage.
    pub fn subcommand(&self) -> String {
        self.name.replace('_', "-")
    }
}

/// Stages of a release, in execution order.
pub const RELEASE_STAGES: [StageDescriptor; 5] = [
    StageDescriptor {
        name: "copy_accessioning_collections_to_embassy",
        args: &[
            ReleaseArg::PrivateConfigFile,
            ReleaseArg::TaxonomyId,
            ReleaseArg::AssemblyAccession,
            ReleaseArg::ReleaseSpeciesInventoryTable,
            ReleaseArg::DumpDir,
        ],
    },
    StageDescriptor {
        name: "run_release_for_assembly",
        args: &[
            ReleaseArg::PrivateConfigFile,
            ReleaseArg::TaxonomyId,
            ReleaseArg::AssemblyAccession,
            ReleaseArg::ReleaseSpeciesInventoryTable,
            ReleaseArg::ReleaseFolder,
            ReleaseArg::ReleaseJarPath,
            ReleaseArg::JobRepoUrl,
            ReleaseArg::Memory,
        ],
    },
    StageDescriptor {
        name: "merge_dbsnp_eva_release_files",
        args: &[
            ReleaseArg::BgzipPath,
            ReleaseArg::TabixPath,
            ReleaseArg::BcftoolsPath,
            ReleaseArg::VcfSortScriptPath,
            ReleaseArg::AssemblyAccession,
            ReleaseArg::ReleaseFolder,
        ],
    },
    StageDescriptor {
        name: "sort_bgzip_tabix_release_files",
        args: &[
            ReleaseArg::BgzipPath,
            ReleaseArg::TabixPath,
            ReleaseArg::VcfSortScriptPath,
            ReleaseArg::AssemblyAccession,
            ReleaseArg::ReleaseFolder,
        ],
    },
    StageDescriptor {
        name: "validate_release_vcf_files",
        args: &[
            ReleaseArg::PrivateConfigFile,
            ReleaseArg::TaxonomyId,
            ReleaseArg::AssemblyAccession,
            ReleaseArg::ReleaseSpeciesInventoryTable,
            ReleaseArg::ReleaseFolder,
            ReleaseArg::VcfValidatorPath,
            ReleaseArg::AssemblyCheckerPath,
        ],
    },
];

/// Fully resolved invocation of one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageCommand {
    /// Binary providing the stage subcommands
    pub program: String,
    pub subcommand: String,
    /// `(flag name, value)` pairs in declared order
    pub arguments: Vec<(&'static str, String)>,
    /// Log file stdout and stderr are appended to
    pub log_file: PathBuf,
}

impl StageCommand {
    /// Shell line run by the engine, with output appended to the log file.
    pub fn script_line(&self) -> String {
        let mut line = format!("({} {}", shell_quote(&self.program), self.subcommand);
        for (name, value) in &self.arguments {
            line.push_str(&format!(" --{} {}", name, shell_quote(value)));
        }
        line.push_str(&format!(
            " 1>> {} 2>&1)",
            shell_quote(&self.log_file.display().to_string())
        ));
        line
    }
}

/// One engine process block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowProcess {
    pub name: String,
    pub memory_gb: u32,
    pub input_flag: String,
    pub output_flag: String,
    pub command: StageCommand,
}

/// The complete stage chain for one assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseWorkflow {
    pub assembly_accession: String,
    pub processes: Vec<WorkflowProcess>,
}

impl ReleaseWorkflow {
    /// Checks that the processes form a single chain of completion flags.
    pub fn validate(&self) -> Result<()> {
        let first = self
            .processes
            .first()
            .ok_or_else(|| ReleaseError::InvalidWorkflow("workflow has no processes".into()))?;

        if first.input_flag != FIRST_INPUT_FLAG {
            return Err(ReleaseError::InvalidWorkflow(format!(
                "first process '{}' waits on '{}' instead of '{}'",
                first.name, first.input_flag, FIRST_INPUT_FLAG
            )));
        }

        for pair in self.processes.windows(2) {
            let (previous, next) = (&pair[0], &pair[1]);
            if previous.output_flag != next.input_flag {
                return Err(ReleaseError::InvalidWorkflow(format!(
                    "process '{}' waits on '{}' but '{}' emits '{}'",
                    next.name, next.input_flag, previous.name, previous.output_flag
                )));
            }
        }

        let mut outputs: Vec<&str> = self.processes.iter().map(|p| p.output_flag.as_str()).collect();
        outputs.sort_unstable();
        if outputs.windows(2).any(|w| w[0] == w[1]) {
            return Err(ReleaseError::InvalidWorkflow(
                "output flags are not unique".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn process(name: &str, input: &str, output: &str) -> WorkflowProcess {
        WorkflowProcess {
            name: name.to_string(),
            memory_gb: 8,
            input_flag: input.to_string(),
            output_flag: output.to_string(),
            command: StageCommand {
                program: "variant-release".to_string(),
                subcommand: name.replace('_', "-"),
                arguments: vec![],
                log_file: PathBuf::from("/tmp/release.log"),
            },
        }
    }

    #[test]
    fn test_stage_order() {
        let names: Vec<&str> = RELEASE_STAGES.iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            vec![
                "copy_accessioning_collections_to_embassy",
                "run_release_for_assembly",
                "merge_dbsnp_eva_release_files",
                "sort_bgzip_tabix_release_files",
                "validate_release_vcf_files",
            ]
        );
    }

    #[test]
    fn test_copy_stage_arguments() {
        let names: Vec<&str> = RELEASE_STAGES[0].args.iter().map(|a| a.name()).collect();
        assert_eq!(
            names,
            vec![
                "private-config-file",
                "taxonomy-id",
                "assembly-accession",
                "release-species-inventory-table",
                "dump-dir",
            ]
        );
    }

    #[test]
    fn test_subcommand_name() {
        assert_eq!(
            RELEASE_STAGES[2].subcommand(),
            "merge-dbsnp-eva-release-files"
        );
    }

    #[test]
    fn test_script_line_quotes_and_redirects() {
        let command = StageCommand {
            program: "/opt/bin/variant-release".to_string(),
            subcommand: "sort-bgzip-tabix-release-files".to_string(),
            arguments: vec![
                ("assembly-accession", "GCA_1.1".to_string()),
                ("release-folder", "/nfs/my release".to_string()),
            ],
            log_file: PathBuf::from("/nfs/release/GCA_1.1/release_GCA_1_1.log"),
        };

        assert_eq!(
            command.script_line(),
            "(/opt/bin/variant-release sort-bgzip-tabix-release-files \
             --assembly-accession GCA_1.1 --release-folder '/nfs/my release' \
             1>> /nfs/release/GCA_1.1/release_GCA_1_1.log 2>&1)"
        );
    }

    #[test]
    fn test_validate_accepts_chain() {
        let workflow = ReleaseWorkflow {
            assembly_accession: "GCA_1.1".to_string(),
            processes: vec![
                process("a", "true", "flag1"),
                process("b", "flag1", "flag2"),
            ],
        };
        assert!(workflow.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_broken_chain() {
        let workflow = ReleaseWorkflow {
            assembly_accession: "GCA_1.1".to_string(),
            processes: vec![
                process("a", "true", "flag1"),
                process("b", "flag3", "flag2"),
            ],
        };
        assert!(workflow.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_start_and_empty() {
        let workflow = ReleaseWorkflow {
            assembly_accession: "GCA_1.1".to_string(),
            processes: vec![process("a", "flag0", "flag1")],
        };
        assert!(workflow.validate().is_err());

        let empty = ReleaseWorkflow {
            assembly_accession: "GCA_1.1".to_string(),
            processes: vec![],
        };
        assert!(empty.validate().is_err());
    }
}
