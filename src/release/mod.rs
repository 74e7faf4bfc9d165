//! Release Module
//!
//! Drivers for each stage of an assembly release and the dispatcher that
//! launches a release workflow per assembly.
//!
//! - [`species`]: writes and launches the workflows of a taxonomy
//! - [`copy`]: copies accessioning data to the temporary instance
//! - [`stages`]: release job, merge, sort/compress and validation

pub mod copy;
pub mod species;
pub mod stages;

pub use copy::{copy_accessioning_collections_to_embassy, CopyRequest, COPY_FAILURE_EXIT_CODE};
pub use species::run_release_for_species;
pub use stages::{
    merge_dbsnp_eva_release_files, run_release_for_assembly, sort_bgzip_tabix_release_files,
    validate_release_vcf_files, AssemblyReleaseRequest, CompressionTools, ValidationRequest,
};
