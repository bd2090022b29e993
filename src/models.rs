use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::errors::Error;
use crate::metrics::Metric;
use crate::responses::{RowKind, StatRow};

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum EntityKind {
    Frontend,
    Backend,
    Server,
}

impl EntityKind {
    pub(crate) fn matches(self, row: RowKind) -> bool {
        matches!(
            (self, row),
            (EntityKind::Frontend, RowKind::Frontend)
                | (EntityKind::Backend, RowKind::Backend)
                | (EntityKind::Server, RowKind::Server)
        )
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            EntityKind::Frontend => "frontend",
            EntityKind::Backend => "backend",
            EntityKind::Server => "server",
        })
    }
}

impl FromStr for EntityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "frontend" => Ok(EntityKind::Frontend),
            "backend" => Ok(EntityKind::Backend),
            "server" => Ok(EntityKind::Server),
            _ => Err(Error::Validation(format!("unknown entity kind '{}'", s))),
        }
    }
}

/// Status of a frontend, backend or server as reported in the `status` column.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Status {
    /// `UP`, including the transitional `UP 1/3` forms.
    Up,
    /// `DOWN`, including the transitional `DOWN 1/2` forms.
    Down,
    /// A frontend accepting connections.
    Open,
    /// A frontend that reached its maxconn.
    Full,
    /// A stopped frontend.
    Stop,
    Maint,
    Drain,
    NoCheck,
    Other(String),
}

impl Status {
    /// `UP` for backends and servers, `OPEN` for frontends.
    pub fn is_up(&self) -> bool {
        matches!(self, Status::Up | Status::Open)
    }
}

impl FromStr for Status {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let word = s.split(' ').next().unwrap_or_default();
        Ok(match word {
            "UP" => Status::Up,
            "DOWN" => Status::Down,
            "OPEN" => Status::Open,
            "FULL" => Status::Full,
            "STOP" => Status::Stop,
            "MAINT" => Status::Maint,
            "DRAIN" => Status::Drain,
            _ if s == "no check" => Status::NoCheck,
            "" => return Err(Error::Parse("empty status".into())),
            _ => Status::Other(s.to_string()),
        })
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Status::Up => "UP",
            Status::Down => "DOWN",
            Status::Open => "OPEN",
            Status::Full => "FULL",
            Status::Stop => "STOP",
            Status::Maint => "MAINT",
            Status::Drain => "DRAIN",
            Status::NoCheck => "no check",
            Status::Other(other) => other.as_str(),
        })
    }
}

/// The status of an entity across all of its processes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Reconciled {
    Uniform(Status),
    Mixed(BTreeMap<PathBuf, Status>),
}

impl Reconciled {
    /// An up status on any process wins. Otherwise the common status if all processes agree,
    /// else `Mixed`.
    pub fn from_statuses(statuses: BTreeMap<PathBuf, Status>) -> Self {
        if let Some(up) = statuses.values().find(|status| status.is_up()) {
            return Reconciled::Uniform(up.clone());
        }
        let mut values = statuses.values();
        match values.next() {
            Some(first) if values.all(|status| status == first) => {
                Reconciled::Uniform(first.clone())
            }
            _ => Reconciled::Mixed(statuses),
        }
    }
}

impl Display for Reconciled {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Reconciled::Uniform(status) => status.fmt(f),
            Reconciled::Mixed(statuses) => {
                f.write_str("MIXED(")?;
                for (i, (endpoint, status)) in statuses.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}={}", endpoint.display(), status)?;
                }
                f.write_str(")")
            }
        }
    }
}

/// A configuration value read from every process.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Setting<T> {
    /// Every process reports the same value.
    Uniform(T),
    /// Processes disagree; the value of each.
    PerProcess(BTreeMap<PathBuf, T>),
}

impl<T: PartialEq> Setting<T> {
    pub fn from_values(values: BTreeMap<PathBuf, T>) -> Option<Self> {
        let uniform = {
            let mut iter = values.values();
            let first = iter.next()?;
            iter.all(|value| value == first)
        };
        if uniform {
            values.into_values().next().map(Setting::Uniform)
        } else {
            Some(Setting::PerProcess(values))
        }
    }
}

impl<T: Display> Display for Setting<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Setting::Uniform(value) => value.fmt(f),
            Setting::PerProcess(values) => {
                for (i, (endpoint, value)) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}={}", endpoint.display(), value)?;
                }
                Ok(())
            }
        }
    }
}

/// A frontend, backend or server as seen by every process that hosts it.
///
/// Handles are snapshots of one `show stat` round. `status`, `requests` and `maxconn` read that
/// snapshot; `Haproxy::status`, `Haproxy::metric` and `Haproxy::refresh` query the processes again.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EntityHandle {
    kind: EntityKind,
    name: String,
    backend: Option<String>,
    rows: BTreeMap<PathBuf, StatRow>,
}

impl EntityHandle {
    pub(crate) fn new(
        kind: EntityKind,
        name: String,
        backend: Option<String>,
        rows: BTreeMap<PathBuf, StatRow>,
    ) -> Self {
        Self {
            kind,
            name,
            backend,
            rows,
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The parent backend of a server.
    pub fn backend(&self) -> Option<&str> {
        self.backend.as_deref()
    }

    /// `backend/server` for servers, the plain name otherwise.
    pub fn qualified_name(&self) -> String {
        match &self.backend {
            Some(backend) => format!("{}/{}", backend, self.name),
            None => self.name.clone(),
        }
    }

    /// Sockets of the processes hosting this entity, sorted.
    pub fn endpoints(&self) -> impl Iterator<Item = &Path> {
        self.rows.keys().map(PathBuf::as_path)
    }

    pub fn is_on(&self, endpoint: &Path) -> bool {
        self.rows.contains_key(endpoint)
    }

    pub(crate) fn matches(&self, row: &StatRow) -> bool {
        if !self.kind.matches(row.kind()) {
            return false;
        }
        match &self.backend {
            Some(backend) => row.proxy() == backend && row.service() == self.name,
            None => row.proxy() == self.name,
        }
    }

    pub fn status(&self) -> Result<Reconciled, Error> {
        let statuses = self
            .rows
            .iter()
            .map(|(endpoint, row)| {
                let status = row
                    .get("status")
                    .ok_or_else(|| Error::Parse("stats lack a status column".into()))?;
                Ok((endpoint.clone(), Status::from_str(status)?))
            })
            .collect::<Result<BTreeMap<_, _>, Error>>()?;
        Ok(Reconciled::from_statuses(statuses))
    }

    /// Total requests across processes: `req_tot` for frontends, `stot` otherwise.
    pub fn requests(&self) -> Result<Option<u64>, Error> {
        let column = match self.kind {
            EntityKind::Frontend => "req_tot",
            EntityKind::Backend | EntityKind::Server => "stot",
        };
        self.combine(Metric::sum(column))
    }

    /// Proxy ID per process. Processes may number the same proxy differently.
    pub fn iid(&self) -> Result<BTreeMap<PathBuf, u64>, Error> {
        self.per_process("iid")
    }

    /// Server ID per process.
    pub fn sid(&self) -> Result<BTreeMap<PathBuf, u64>, Error> {
        self.per_process("sid")
    }

    /// HAProxy process numbers hosting this entity.
    pub fn processes(&self) -> Result<Vec<u64>, Error> {
        let mut processes: Vec<u64> = self.per_process("pid")?.into_values().collect();
        processes.sort_unstable();
        Ok(processes)
    }

    /// Configured session limit (`slim`).
    pub fn maxconn(&self) -> Result<Setting<Option<u64>>, Error> {
        let values = self
            .rows
            .iter()
            .map(|(endpoint, row)| Ok((endpoint.clone(), row.numeric("slim")?)))
            .collect::<Result<BTreeMap<_, _>, Error>>()?;
        Setting::from_values(values)
            .ok_or_else(|| Error::Parse(format!("{} has no rows", self.qualified_name())))
    }

    /// Apply a metric's aggregation to this snapshot's rows.
    pub fn combine(&self, metric: Metric) -> Result<Option<u64>, Error> {
        let values = self
            .rows
            .values()
            .map(|row| row.numeric(metric.name()))
            .collect::<Result<Vec<_>, Error>>()?;
        Ok(metric.aggregation().combine(values))
    }

    fn per_process(&self, column: &str) -> Result<BTreeMap<PathBuf, u64>, Error> {
        let mut values = BTreeMap::new();
        for (endpoint, row) in &self.rows {
            if let Some(value) = row.numeric(column)? {
                values.insert(endpoint.clone(), value);
            }
        }
        Ok(values)
    }
}

impl Display for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.qualified_name())
    }
}
