use std::fs;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use std::thread;

use tracing::debug;

use crate::commands::Command;
use crate::config::Config;
use crate::connection::{Endpoint, UnixSocketBuilder};
use crate::errors::{EndpointFailure, Error};
use crate::metrics;
use crate::models::Setting;
use crate::parsers;
use crate::requests::GlobalOption;
use crate::responses::{ErrorLog, Info};

/// A value combined from the endpoints that answered, plus the endpoints that did not.
#[derive(Debug)]
pub struct Aggregated<T> {
    pub value: T,
    pub failed: Vec<EndpointFailure>,
}

impl<T> Aggregated<T> {
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Aggregated<U> {
        Aggregated {
            value: f(self.value),
            failed: self.failed,
        }
    }

    pub fn try_map<U, F: FnOnce(T) -> Result<U, Error>>(self, f: F) -> Result<Aggregated<U>, Error> {
        Ok(Aggregated {
            value: f(self.value)?,
            failed: self.failed,
        })
    }

    /// Sockets that failed, sorted.
    pub fn failed_endpoints(&self) -> Vec<&Path> {
        self.failed.iter().map(|f| f.endpoint.as_path()).collect()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// A multi-process HAProxy, reached through the stats socket of each process.
///
/// # Examples
/// ```no_run
/// use hapadmin::config::Config;
/// use hapadmin::models::EntityKind;
/// use hapadmin::Haproxy;
///
/// let hap = Haproxy::new(&Config::with_socket_dir("/var/lib/haproxy")).unwrap();
/// let frontends = hap.discover(EntityKind::Frontend).unwrap();
/// for frontend in &frontends.value {
///     println!("{} {}", frontend.name(), frontend.status().unwrap());
/// }
/// ```
#[derive(Debug)]
pub struct Haproxy {
    endpoints: Vec<Endpoint>,
}

impl Haproxy {
    /// Enumerate the socket files in `config.socket_dir`.
    pub fn new(config: &Config) -> Result<Self, Error> {
        config.validate()?;
        let dir = &config.socket_dir;

        let mut paths = Vec::new();
        for entry in fs::read_dir(dir).map_err(|source| Error::ConfigRead {
            path: dir.clone(),
            source,
        })? {
            let entry = entry?;
            if entry.file_type()?.is_socket() {
                paths.push(entry.path());
            }
        }
        if paths.is_empty() {
            return Err(Error::NoSockets { dir: dir.clone() });
        }
        debug!(dir = %dir.display(), sockets = paths.len(), "discovered HAProxy sockets");

        Ok(Self::with_sockets(
            paths
                .into_iter()
                .map(|path| UnixSocketBuilder::new(path).timeout(config.timeout())),
        ))
    }

    /// Build an instance from explicit sockets. Order does not matter.
    pub fn with_sockets<I: IntoIterator<Item = UnixSocketBuilder>>(builders: I) -> Self {
        let mut endpoints: Vec<Endpoint> = builders.into_iter().map(Endpoint::new).collect();
        endpoints.sort_by(|a, b| a.path().cmp(b.path()));
        endpoints.dedup_by(|a, b| a.path() == b.path());
        Self { endpoints }
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// Run `task` concurrently on every endpoint accepted by `filter`.
    ///
    /// Results come back sorted by socket path regardless of completion order.
    pub(crate) fn fan_out<T, F>(
        &self,
        filter: &dyn Fn(&Path) -> bool,
        task: F,
    ) -> Vec<(PathBuf, Result<T, Error>)>
    where
        T: Send,
        F: Fn(&Endpoint) -> Result<T, Error> + Sync,
    {
        let task = &task;
        thread::scope(|scope| {
            let handles: Vec<_> = self
                .endpoints
                .iter()
                .filter(|endpoint| filter(endpoint.path()))
                .map(|endpoint| {
                    (
                        endpoint.path().to_path_buf(),
                        scope.spawn(move || task(endpoint)),
                    )
                })
                .collect();

            handles
                .into_iter()
                .map(|(path, handle)| {
                    let result = handle
                        .join()
                        .unwrap_or_else(|payload| std::panic::resume_unwind(payload));
                    (path, result)
                })
                .collect()
        })
    }

    /// Send `command` to the selected endpoints and parse each reply.
    pub(crate) fn query<T, P>(
        &self,
        filter: &dyn Fn(&Path) -> bool,
        command: Command,
        parse: P,
    ) -> Result<Aggregated<Vec<(PathBuf, T)>>, Error>
    where
        T: Send,
        P: Fn(&str) -> Result<T, Error> + Sync,
    {
        let results = self.fan_out(filter, |endpoint| {
            endpoint.send(&command).and_then(|reply| parse(&reply))
        });
        collect(results)
    }

    fn query_all<T, P>(&self, command: Command, parse: P) -> Result<Aggregated<Vec<(PathBuf, T)>>, Error>
    where
        T: Send,
        P: Fn(&str) -> Result<T, Error> + Sync,
    {
        self.query(&|_| true, command, parse)
    }

    /// `show info` of every process.
    pub fn info(&self) -> Result<Aggregated<Vec<(PathBuf, Info)>>, Error> {
        self.query_all(Command::ShowInfo, |reply| parsers::parse_info(reply.as_bytes()))
    }

    /// `show errors` of every process.
    pub fn errors(&self) -> Result<Aggregated<Vec<(PathBuf, ErrorLog)>>, Error> {
        self.query_all(Command::ShowErrors, |reply| {
            parsers::parse_errors(reply.as_bytes())
        })
    }

    /// A `show info` metric combined across processes.
    pub fn global_metric(&self, name: &str) -> Result<Aggregated<Option<u64>>, Error> {
        let metric = metrics::lookup_global(name)?;
        self.info()?.try_map(|infos| {
            let values = infos
                .iter()
                .map(|(_, info)| info.numeric(metric.name()))
                .collect::<Result<Vec<_>, Error>>()?;
            Ok(metric.aggregation().combine(values))
        })
    }

    /// Requests processed by all processes (`CumReq`).
    pub fn total_requests(&self) -> Result<Aggregated<Option<u64>>, Error> {
        self.global_metric("CumReq")
    }

    /// Connection limit of all processes together (`MaxConn`).
    pub fn maxconn(&self) -> Result<Aggregated<Option<u64>>, Error> {
        self.global_metric("MaxConn")
    }

    /// Current value of every writable global option, per process when processes disagree.
    pub fn options(&self) -> Result<Aggregated<Vec<(GlobalOption, Option<Setting<Option<u64>>>)>>, Error> {
        self.info()?.try_map(|infos| {
            GlobalOption::ALL
                .iter()
                .map(|&option| {
                    let values = infos
                        .iter()
                        .map(|(endpoint, info)| {
                            Ok((endpoint.clone(), info.numeric(option.info_key())?))
                        })
                        .collect::<Result<_, Error>>()?;
                    Ok((option, Setting::from_values(values)))
                })
                .collect()
        })
    }
}

/// Split fan-out results into successes and collected failures.
///
/// Permission and parse errors are raised as soon as they are seen; the aggregate fails only when
/// every endpoint failed.
pub(crate) fn collect<T>(
    results: Vec<(PathBuf, Result<T, Error>)>,
) -> Result<Aggregated<Vec<(PathBuf, T)>>, Error> {
    let mut value = Vec::new();
    let mut failed = Vec::new();

    for (endpoint, result) in results {
        match result {
            Ok(v) => value.push((endpoint, v)),
            Err(error) if error.is_endpoint_failure() => {
                debug!(socket = %endpoint.display(), %error, "endpoint failed");
                failed.push(EndpointFailure { endpoint, error });
            }
            Err(error) => return Err(error),
        }
    }

    if value.is_empty() && !failed.is_empty() {
        return Err(Error::AllEndpointsFailed(failed));
    }
    Ok(Aggregated { value, failed })
}
