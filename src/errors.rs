//! Error types.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::models::EntityKind;

#[derive(Debug, Error)]
pub enum Error {
    /// The socket file is missing or HAProxy refused the connection.
    #[error("connection to {} failed: {source}", .socket.display())]
    Connection {
        socket: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Either the OS denied access to the socket file or HAProxy denied the command at the
    /// socket's CLI level.
    #[error("permission denied on {}: {reason}", .socket.display())]
    Permission { socket: PathBuf, reason: String },

    /// HAProxy rejected the command. Carries HAProxy's own reply.
    #[error("{} rejected the command: {message}", .socket.display())]
    Application { socket: PathBuf, message: String },

    /// No reply from the socket within the configured timeout.
    #[error("timed out waiting for {}", .socket.display())]
    Timeout { socket: PathBuf },

    /// Failure parsing response from HAProxy.
    #[error("failed to parse response: {0}")]
    Parse(String),

    /// Caller input rejected before any socket was contacted.
    #[error("invalid input: {0}")]
    Validation(String),

    /// The named entity is absent from every endpoint that answered.
    #[error("{kind} {name} was not found")]
    NotFound { kind: EntityKind, name: String },

    /// The socket directory does not contain any socket files.
    #[error("no HAProxy sockets found in {}", .dir.display())]
    NoSockets { dir: PathBuf },

    /// Every endpoint of a fan-out operation failed.
    #[error("all {} endpoints failed: {}", .0.len(), FailureList(.0))]
    AllEndpointsFailed(Vec<EndpointFailure>),

    /// The config file or the socket directory could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Error encountered while performing IO.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// Errors that only disqualify the endpoint they happened on. A fan-out collects these
    /// instead of raising them.
    pub fn is_endpoint_failure(&self) -> bool {
        matches!(
            self,
            Error::Connection { .. } | Error::Timeout { .. } | Error::Application { .. }
        )
    }
}

impl From<std::num::ParseIntError> for Error {
    fn from(err: std::num::ParseIntError) -> Self {
        Error::Parse(err.to_string())
    }
}

/// The failure of one endpoint during a fan-out.
#[derive(Debug)]
pub struct EndpointFailure {
    pub endpoint: PathBuf,
    pub error: Error,
}

impl fmt::Display for EndpointFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.endpoint.display(), self.error)
    }
}

struct FailureList<'a>(&'a [EndpointFailure]);

impl fmt::Display for FailureList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", failure)?;
        }
        Ok(())
    }
}
