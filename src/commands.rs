//! Commands understood by the HAProxy stats socket.

use std::fmt::{self, Display};
use std::io::{Result, Write};

use crate::requests::RateLimit;

/// One line sent to a stats socket.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Command {
    ShowStat,
    ShowInfo,
    ShowErrors,
    EnableFrontend(String),
    DisableFrontend(String),
    ShutdownFrontend(String),
    SetMaxconnFrontend {
        frontend: String,
        value: u64,
    },
    EnableServer {
        backend: String,
        server: String,
    },
    DisableServer {
        backend: String,
        server: String,
    },
    ShutdownSessionsServer {
        backend: String,
        server: String,
    },
    SetMaxconnServer {
        backend: String,
        server: String,
        value: u64,
    },
    SetWeight {
        backend: String,
        server: String,
        value: u64,
    },
    SetMaxconnGlobal(u64),
    SetRateLimit {
        limit: RateLimit,
        value: u64,
    },
    ClearCounters {
        all: bool,
    },
}

impl Command {
    /// Commands that change state. HAProxy answers these with an empty reply on success.
    pub fn is_mutating(&self) -> bool {
        !matches!(
            self,
            Command::ShowStat | Command::ShowInfo | Command::ShowErrors
        )
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Command::ShowStat => f.write_str("show stat"),
            Command::ShowInfo => f.write_str("show info"),
            Command::ShowErrors => f.write_str("show errors"),
            Command::EnableFrontend(name) => write!(f, "enable frontend {}", name),
            Command::DisableFrontend(name) => write!(f, "disable frontend {}", name),
            Command::ShutdownFrontend(name) => write!(f, "shutdown frontend {}", name),
            Command::SetMaxconnFrontend { frontend, value } => {
                write!(f, "set maxconn frontend {} {}", frontend, value)
            }
            Command::EnableServer { backend, server } => {
                write!(f, "enable server {}/{}", backend, server)
            }
            Command::DisableServer { backend, server } => {
                write!(f, "disable server {}/{}", backend, server)
            }
            Command::ShutdownSessionsServer { backend, server } => {
                write!(f, "shutdown sessions server {}/{}", backend, server)
            }
            Command::SetMaxconnServer {
                backend,
                server,
                value,
            } => write!(f, "set maxconn server {}/{} {}", backend, server, value),
            Command::SetWeight {
                backend,
                server,
                value,
            } => write!(f, "set weight {}/{} {}", backend, server, value),
            Command::SetMaxconnGlobal(value) => write!(f, "set maxconn global {}", value),
            Command::SetRateLimit { limit, value } => {
                write!(f, "set rate-limit {} global {}", limit, value)
            }
            Command::ClearCounters { all: false } => f.write_str("clear counters"),
            Command::ClearCounters { all: true } => f.write_str("clear counters all"),
        }
    }
}

/// Write `command` and the terminating newline.
pub fn write<W: Write>(w: &mut W, command: &Command) -> Result<()> {
    write!(w, "{}", command)?;
    end(w)
}

pub fn end<W: Write>(w: &mut W) -> Result<()> {
    w.write_all(b"\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_terminates_with_newline() {
        let mut buf = Vec::new();
        write(&mut buf, &Command::ShowStat).unwrap();
        assert_eq!(buf, b"show stat\n");
    }

    #[test]
    fn server_commands_use_backend_slash_server() {
        let command = Command::SetWeight {
            backend: "app".into(),
            server: "web1".into(),
            value: 50,
        };
        assert_eq!(command.to_string(), "set weight app/web1 50");
        assert_eq!(
            Command::ShutdownSessionsServer {
                backend: "app".into(),
                server: "web1".into()
            }
            .to_string(),
            "shutdown sessions server app/web1"
        );
    }

    #[test]
    fn global_commands() {
        assert_eq!(
            Command::SetRateLimit {
                limit: RateLimit::SslSessions,
                value: 100
            }
            .to_string(),
            "set rate-limit ssl-sessions global 100"
        );
        assert_eq!(
            Command::ClearCounters { all: true }.to_string(),
            "clear counters all"
        );
        assert!(!Command::ShowInfo.is_mutating());
        assert!(Command::SetMaxconnGlobal(10).is_mutating());
    }
}
