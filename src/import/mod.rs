//! Import Module
//!
//! Sign-off task run after an accessioning import completes.

pub mod finalize;

pub use finalize::{assembly_code, finalize_import, AssemblyInfo, FinalizeRequest};
