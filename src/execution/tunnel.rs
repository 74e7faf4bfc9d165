//! Port Forwarding
//!
//! Relays a free local port to a service port on a remote instance through
//! a background `ssh` process. The forward is torn down exactly once, on
//! [`PortForward::close`] or when the guard is dropped.

use std::net::TcpListener;

use colored::Colorize;
use log::{info, warn};

use super::runner::{CommandSpec, ProcessRunner};
use crate::error::{ReleaseError, Result};

/// Service port of the document store on every instance.
pub const MONGO_PORT: u16 = 27017;

/// Returns the first port at or above `preferred` that can be bound locally.
pub fn available_local_port(preferred: u16) -> Result<u16> {
    (preferred..=u16::MAX)
        .find(|port| TcpListener::bind(("127.0.0.1", *port)).is_ok())
        .ok_or(ReleaseError::NoFreePort(preferred))
}

/// `ssh` invocation forwarding `local_port` to `remote_port` on `host`.
pub fn port_forward_command(host: &str, remote_port: u16, local_port: u16) -> CommandSpec {
    CommandSpec::new("ssh")
        .arg("-N")
        .option("-o", "ExitOnForwardFailure=yes")
        .option("-L", format!("{}:localhost:{}", local_port, remote_port))
        .arg(host)
}

/// A running port forward, owned by one copy or release operation.
pub struct PortForward<'r> {
    runner: &'r dyn ProcessRunner,
    pid: u32,
    host: String,
    local_port: u16,
    closed: bool,
}

impl<'r> PortForward<'r> {
    /// Starts forwarding `local_port` to `remote_port` on `host`.
    pub fn open(
        runner: &'r dyn ProcessRunner,
        host: &str,
        remote_port: u16,
        local_port: u16,
    ) -> Result<Self> {
        info!(
            "Forwarding remote port {} on {} to local port {}...",
            remote_port, host, local_port
        );
        let pid = runner.spawn_detached(&port_forward_command(host, remote_port, local_port))?;

        Ok(Self {
            runner,
            pid,
            host: host.to_string(),
            local_port,
            closed: false,
        })
    }

    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Terminates the forwarding process.
    pub fn close(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        self.runner.terminate(self.pid)?;
        eprintln!(
            "Killed port forwarding to {} with SIGTERM. {}",
            self.host,
            "IGNORE any OS message about the forwarding process being terminated"
                .red()
                .bold()
                .underline()
        );
        Ok(())
    }
}

impl Drop for PortForward<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!("Failed to stop port forwarding process {}: {}", self.pid, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::runner::tests::FakeRunner;

    #[test]
    fn test_available_local_port_skips_bound_port() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let taken = listener.local_addr().unwrap().port();

        let port = available_local_port(taken).unwrap();
        assert!(port > taken);
    }

    #[test]
    fn test_port_forward_command() {
        let cmd = port_forward_command("tempmongo-3", MONGO_PORT, 27018);
        assert_eq!(cmd.program, "ssh");
        assert_eq!(cmd.option_value("-L"), Some("27018:localhost:27017"));
        assert_eq!(cmd.args.last().map(String::as_str), Some("tempmongo-3"));
    }

    #[test]
    fn test_close_terminates_once() {
        let runner = FakeRunner::default();
        let forward = PortForward::open(&runner, "tempmongo-3", MONGO_PORT, 27018).unwrap();
        let pid = forward.pid();

        forward.close().unwrap();
        assert_eq!(*runner.terminated.lock().unwrap(), vec![pid]);
    }

    #[test]
    fn test_drop_terminates_once() {
        let runner = FakeRunner::default();
        {
            let forward = PortForward::open(&runner, "tempmongo-3", MONGO_PORT, 27018).unwrap();
            assert_eq!(forward.local_port(), 27018);
        }
        assert_eq!(runner.terminated.lock().unwrap().len(), 1);
        assert_eq!(runner.spawned.lock().unwrap().len(), 1);
    }
}
