//! Release Workflow Module
//!
//! Describes the release pipeline of a single assembly and writes it out
//! for the external workflow engine.
//!
//! # Structure
//!
//! - [`model`]: stage descriptors and the workflow representation
//! - [`generator`]: builds the stage chain and writes the workflow file
//! - [`nextflow`]: renders the representation as Nextflow source

pub mod generator;
pub mod model;
pub mod nextflow;

pub use generator::{
    build_release_workflow, generate_workflow_file_for_assembly,
    prepare_release_workflow_file_for_assembly,
};
pub use model::{ReleaseArg, ReleaseWorkflow, StageDescriptor, WorkflowProcess, RELEASE_STAGES};
pub use nextflow::render_nextflow;
