//! Import Finalization
//!
//! Registers freshly imported assemblies with the metadata database and
//! records the registration in the import progress table.

use std::fmt;
use std::str::FromStr;

use log::{info, warn};

use crate::config::PrivateConfig;
use crate::error::{ReleaseError, Result};
use crate::execution::{CommandSpec, ProcessRunner};
use crate::metadata::ImportProgressStore;

/// Characters not allowed in a document-store database name.
const INVALID_DB_NAME_CHARS: &[char] = &['/', '\\', '.', '"', '$', '*', '<', '>', ':', '|', '?', ' '];

/// One `BUILD,ASSEMBLY_NAME,ACCESSION` triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyInfo {
    pub build: String,
    pub assembly_name: String,
    pub assembly_accession: String,
}

impl FromStr for AssemblyInfo {
    type Err = ReleaseError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        match parts.as_slice() {
            [build, name, accession]
                if !build.is_empty() && !name.is_empty() && !accession.is_empty() =>
            {
                Ok(Self {
                    build: build.to_string(),
                    assembly_name: name.to_string(),
                    assembly_accession: accession.to_string(),
                })
            }
            _ => Err(ReleaseError::InvalidAssemblyInfo(s.to_string())),
        }
    }
}

impl fmt::Display for AssemblyInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{}",
            self.build, self.assembly_name, self.assembly_accession
        )
    }
}

/// Assembly name with every character invalid in a database name removed.
pub fn assembly_code(assembly_name: &str) -> String {
    assembly_name
        .chars()
        .filter(|c| !INVALID_DB_NAME_CHARS.contains(c))
        .collect()
}

/// Short name used by the metadata database: the scientific name up to
/// its first underscore.
pub fn eva_name(scientific_name: &str) -> &str {
    scientific_name.split('_').next().unwrap_or(scientific_name)
}

/// What to finalize, as given on the command line.
#[derive(Debug, Clone)]
pub struct FinalizeRequest {
    /// Species code, e.g. `pig_9823`
    pub species: String,
    /// e.g. `sus_scrofa`
    pub scientific_name: String,
    pub assemblies: Vec<AssemblyInfo>,
}

/// Registration script invocation for one assembly.
pub fn insert_assembly_command(
    request: &FinalizeRequest,
    assembly: &AssemblyInfo,
    private_config: &PrivateConfig,
) -> Result<CommandSpec> {
    let import = private_config.import()?;
    let evapro = private_config.evapro()?;

    Ok(CommandSpec::new(import.python3_path.as_str())
        .arg(import.insert_assembly_script_path.as_str())
        .option("-a", assembly.assembly_accession.as_str())
        .option("-c", assembly_code(&assembly.assembly_name))
        .option("--host", evapro.host.as_str())
        .option("-u", evapro.user.as_str())
        .option("-d", evapro.database.as_str())
        .option("-t", request.scientific_name.as_str())
        .option("-e", eva_name(&request.scientific_name))
        .arg("--from-dbsnp"))
}

/// Registers every assembly and marks the successful ones in the
/// progress table.
///
/// An assembly whose registration fails is skipped: its progress row is
/// left untouched and only a warning is logged. Returns the accessions
/// whose progress row was updated.
pub async fn finalize_import(
    request: &FinalizeRequest,
    private_config: &PrivateConfig,
    progress: &dyn ImportProgressStore,
    runner: &dyn ProcessRunner,
) -> Result<Vec<String>> {
    let mut updated = Vec::new();

    for assembly in &request.assemblies {
        let command = insert_assembly_command(request, assembly, private_config)?;
        let code = runner.run(&command)?;

        if code != 0 {
            // TODO: surface failed registrations in the exit status once
            // operators confirm nothing relies on the skip
            warn!(
                "Registration of {} exited with status {}, progress not updated",
                assembly.assembly_accession, code
            );
            continue;
        }

        progress
            .mark_assembly_registered(&request.species, &assembly.assembly_accession)
            .await?;
        info!(
            "Marked {} as registered for {}",
            assembly.assembly_accession, request.species
        );
        updated.push(assembly.assembly_accession.clone());
    }

    Ok(updated)
}
