//! Configuration Module
//!
//! Loads the two configuration artifacts a release consumes:
//!
//! - [`private`]: credentials for the relational and document stores
//! - [`release`]: common release properties and their per-assembly form

pub mod private;
pub mod release;

pub use private::{MongoProfile, PostgresProfile, PrivateConfig};
pub use release::{AssemblyReleaseProperties, CommonReleaseProperties};
