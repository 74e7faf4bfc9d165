//! Process Execution Module
//!
//! Everything that leaves this process goes through here: external tool
//! invocations and the port forwards that make temporary instances
//! reachable.
//!
//! - [`runner`]: the [`ProcessRunner`] capability and its OS implementation
//! - [`tunnel`]: local port selection and `ssh` port forwarding

pub mod runner;
pub mod tunnel;

pub use runner::{shell_quote, CommandSpec, ProcessRunner, SystemRunner};
pub use tunnel::{available_local_port, PortForward, MONGO_PORT};
