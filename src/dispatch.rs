//! Apply state-changing actions to every process behind an entity.

use std::fmt::{self, Display};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::commands::Command;
use crate::errors::{EndpointFailure, Error};
use crate::instance::Haproxy;
use crate::models::{EntityHandle, EntityKind};
use crate::parsers;
use crate::requests::{non_negative, Action};

/// The outcome of a command on one socket.
#[derive(Debug)]
pub struct EndpointResult {
    pub endpoint: PathBuf,
    pub outcome: Result<(), Error>,
}

/// Per-socket outcomes of one applied action, sorted by socket path.
#[derive(Debug)]
pub struct ApplyReport {
    pub command: Command,
    pub results: Vec<EndpointResult>,
}

impl ApplyReport {
    /// True only if every socket accepted the command.
    pub fn is_success(&self) -> bool {
        self.results.iter().all(|result| result.outcome.is_ok())
    }

    pub fn succeeded(&self) -> usize {
        self.results
            .iter()
            .filter(|result| result.outcome.is_ok())
            .count()
    }

    /// Sockets to retry.
    pub fn failed_endpoints(&self) -> Vec<&Path> {
        self.results
            .iter()
            .filter(|result| result.outcome.is_err())
            .map(|result| result.endpoint.as_path())
            .collect()
    }

    fn into_failures(self) -> Vec<EndpointFailure> {
        self.results
            .into_iter()
            .filter_map(|result| match result.outcome {
                Ok(()) => None,
                Err(error) => Some(EndpointFailure {
                    endpoint: result.endpoint,
                    error,
                }),
            })
            .collect()
    }
}

#[derive(Clone, Copy, Debug)]
enum Target<'a> {
    Global,
    Frontend(&'a str),
    Backend(&'a str),
    Server { backend: &'a str, server: &'a str },
}

impl<'a> Target<'a> {
    fn of(handle: &'a EntityHandle) -> Self {
        match handle.kind() {
            EntityKind::Frontend => Target::Frontend(handle.name()),
            EntityKind::Backend => Target::Backend(handle.name()),
            EntityKind::Server => Target::Server {
                backend: handle.backend().unwrap_or_default(),
                server: handle.name(),
            },
        }
    }
}

impl Display for Target<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Target::Global => f.write_str("haproxy"),
            Target::Frontend(name) => write!(f, "frontend {}", name),
            Target::Backend(name) => write!(f, "backend {}", name),
            Target::Server { backend, server } => write!(f, "server {}/{}", backend, server),
        }
    }
}

/// The dispatch table: which action is valid for which target, and what HAProxy is sent.
fn command_for(target: Target<'_>, action: &Action) -> Result<Command, Error> {
    action.validate()?;

    let command = match (target, action) {
        (Target::Global, Action::SetMaxconn(value)) => {
            Command::SetMaxconnGlobal(non_negative(*value)?)
        }
        (Target::Global, Action::SetRateLimit(limit, value)) => Command::SetRateLimit {
            limit: *limit,
            value: non_negative(*value)?,
        },
        (Target::Global, Action::ClearCounters { all }) => Command::ClearCounters { all: *all },

        (Target::Frontend(name), Action::Enable) => Command::EnableFrontend(name.to_string()),
        (Target::Frontend(name), Action::Disable) => Command::DisableFrontend(name.to_string()),
        (Target::Frontend(name), Action::Shutdown) => Command::ShutdownFrontend(name.to_string()),
        (Target::Frontend(name), Action::SetMaxconn(value)) => Command::SetMaxconnFrontend {
            frontend: name.to_string(),
            value: non_negative(*value)?,
        },

        (Target::Server { backend, server }, action) => {
            let backend = backend.to_string();
            let server = server.to_string();
            match action {
                Action::Enable => Command::EnableServer { backend, server },
                Action::Disable => Command::DisableServer { backend, server },
                Action::Shutdown => Command::ShutdownSessionsServer { backend, server },
                Action::SetMaxconn(value) => Command::SetMaxconnServer {
                    backend,
                    server,
                    value: non_negative(*value)?,
                },
                Action::SetWeight(value) => Command::SetWeight {
                    backend,
                    server,
                    value: non_negative(*value)?,
                },
                _ => return Err(unsupported(target, action)),
            }
        }

        (target, action) => return Err(unsupported(target, action)),
    };
    Ok(command)
}

fn unsupported(target: Target<'_>, action: &Action) -> Error {
    Error::Validation(format!("{} is not supported for {}", action, target))
}

impl Haproxy {
    /// Apply `action` on every process hosting `handle`.
    ///
    /// Invalid actions and values fail before any socket is contacted. The report lists every
    /// socket's outcome; the call itself fails only if no socket accepted the command.
    ///
    /// # Examples
    /// ```no_run
    /// use hapadmin::config::Config;
    /// use hapadmin::models::EntityKind;
    /// use hapadmin::requests::Action;
    /// use hapadmin::Haproxy;
    ///
    /// let hap = Haproxy::new(&Config::default()).unwrap();
    /// let server = hap.get(EntityKind::Server, "app/web1").unwrap().value;
    /// let report = hap.apply(&server, &Action::Disable).unwrap();
    /// if !report.is_success() {
    ///     println!("retry on {:?}", report.failed_endpoints());
    /// }
    /// ```
    pub fn apply(&self, handle: &EntityHandle, action: &Action) -> Result<ApplyReport, Error> {
        let command = command_for(Target::of(handle), action)?;
        self.dispatch(command, &|path| handle.is_on(path))
    }

    /// Apply an instance-wide action (`set-maxconn`, `set-rate-limit`, `clear-counters`) on
    /// every process.
    pub fn apply_global(&self, action: &Action) -> Result<ApplyReport, Error> {
        let command = command_for(Target::Global, action)?;
        self.dispatch(command, &|_| true)
    }

    fn dispatch(
        &self,
        command: Command,
        filter: &dyn Fn(&Path) -> bool,
    ) -> Result<ApplyReport, Error> {
        let results = self.fan_out(filter, |endpoint| {
            let reply = endpoint.send(&command)?;
            parsers::parse_ack(endpoint.path(), &reply)
        });

        let mut report = ApplyReport {
            command,
            results: Vec::with_capacity(results.len()),
        };
        for (endpoint, outcome) in results {
            match outcome {
                Err(error) if !error.is_endpoint_failure() => return Err(error),
                Err(error) => {
                    debug!(socket = %endpoint.display(), %error, "command failed");
                    report.results.push(EndpointResult {
                        endpoint,
                        outcome: Err(error),
                    });
                }
                Ok(()) => report.results.push(EndpointResult {
                    endpoint,
                    outcome: Ok(()),
                }),
            }
        }

        if !report.results.is_empty() && report.succeeded() == 0 {
            return Err(Error::AllEndpointsFailed(report.into_failures()));
        }
        debug!(
            command = %report.command,
            succeeded = report.succeeded(),
            failed = report.results.len() - report.succeeded(),
            "applied command"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requests::RateLimit;

    #[test]
    fn frontend_table() {
        let target = Target::Frontend("www");
        assert_eq!(
            command_for(target, &Action::SetMaxconn(100)).unwrap().to_string(),
            "set maxconn frontend www 100"
        );
        assert_eq!(
            command_for(target, &Action::Shutdown).unwrap().to_string(),
            "shutdown frontend www"
        );
        assert!(command_for(target, &Action::SetWeight(1)).is_err());
    }

    #[test]
    fn server_table() {
        let target = Target::Server {
            backend: "app",
            server: "web1",
        };
        assert_eq!(
            command_for(target, &Action::Enable).unwrap().to_string(),
            "enable server app/web1"
        );
        assert_eq!(
            command_for(target, &Action::SetWeight(0)).unwrap().to_string(),
            "set weight app/web1 0"
        );
        assert!(command_for(target, &Action::ClearCounters { all: false }).is_err());
    }

    #[test]
    fn global_table() {
        assert_eq!(
            command_for(Target::Global, &Action::SetRateLimit(RateLimit::Connections, 5))
                .unwrap()
                .to_string(),
            "set rate-limit connections global 5"
        );
        assert!(command_for(Target::Global, &Action::Enable).is_err());
    }

    #[test]
    fn backends_accept_no_action() {
        for action in [
            Action::Enable,
            Action::Disable,
            Action::Shutdown,
            Action::SetMaxconn(1),
        ] {
            match command_for(Target::Backend("app"), &action) {
                Err(Error::Validation(msg)) => assert!(msg.contains("backend app")),
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn negative_values_are_rejected() {
        match command_for(Target::Frontend("www"), &Action::SetMaxconn(-1)) {
            Err(Error::Validation(_)) => {}
            other => panic!("unexpected {:?}", other),
        }
    }
}
