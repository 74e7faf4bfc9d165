//! variant-release - Accessioned Variant Release Orchestration
//!
//! Prepares and launches the release pipeline of every assembly of a
//! taxonomy. Each assembly gets its own Nextflow workflow chaining five
//! stages: copying accessioning data to a temporary document store,
//! running the release job, merging, compressing and validating the
//! release files.
//!
//! # Architecture
//!
//! - [`config`]: private credentials and release properties
//! - [`metadata`]: release inventory and import progress in Postgres
//! - [`execution`]: external processes and `ssh` port forwards
//! - [`workflow`]: stage chain model and Nextflow file generation
//! - [`release`]: the dispatcher and each stage's driver
//! - [`import`]: post-import assembly registration
//!
//! # Example
//!
//! ```rust,no_run
//! use variant_release::config::CommonReleaseProperties;
//! use variant_release::metadata::{connect, PgInventory};
//! use variant_release::config::PrivateConfig;
//! use variant_release::execution::SystemRunner;
//! use variant_release::release::run_release_for_species;
//!
//! # async fn launch() -> variant_release::Result<()> {
//! let common = CommonReleaseProperties::load("release.json")?;
//! let private = PrivateConfig::load(&common.private_config_file)?;
//! let pool = connect(private.postgres_profile("development")?).await?;
//! let inventory = PgInventory::new(pool);
//!
//! run_release_for_species(&common, 9913, 8, &inventory, &SystemRunner).await?;
//! inventory.close().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod execution;
pub mod import;
pub mod metadata;
pub mod release;
pub mod workflow;

// Re-export commonly used types
pub use config::{AssemblyReleaseProperties, CommonReleaseProperties, PrivateConfig};
pub use error::{ReleaseError, Result};
pub use execution::{ProcessRunner, SystemRunner};
pub use workflow::prepare_release_workflow_file_for_assembly;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "variant-release";
