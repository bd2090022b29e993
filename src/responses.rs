//! Parse responses from HAProxy sockets.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use crate::errors::Error;

/// Service name HAProxy uses for a frontend's row.
pub const FRONTEND_SVNAME: &str = "FRONTEND";
/// Service name HAProxy uses for a backend's aggregate row.
pub const BACKEND_SVNAME: &str = "BACKEND";

/// What a `show stat` row describes.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum RowKind {
    Frontend,
    Backend,
    Server,
    Listener,
}

/// The output of `show stat`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StatsTable {
    pub columns: Arc<Vec<String>>,
    pub rows: Vec<StatRow>,
}

/// One `show stat` record. Values are kept as HAProxy sent them; an empty value means the metric
/// does not apply to this row.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StatRow {
    columns: Arc<Vec<String>>,
    values: Vec<String>,
}

impl StatRow {
    /// Build a row. The value count must match the column count.
    pub fn new(columns: Arc<Vec<String>>, values: Vec<String>) -> Result<Self, Error> {
        if columns.len() < 2 {
            return Err(Error::Parse("stats need pxname and svname columns".into()));
        }
        if values.len() != columns.len() {
            return Err(Error::Parse(format!(
                "expected {} fields, found {}",
                columns.len(),
                values.len()
            )));
        }
        Ok(Self { columns, values })
    }

    /// Proxy name (`pxname`).
    pub fn proxy(&self) -> &str {
        &self.values[0]
    }

    /// Service name (`svname`): `FRONTEND`, `BACKEND` or a server name.
    pub fn service(&self) -> &str {
        &self.values[1]
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn kind(&self) -> RowKind {
        if self.get("type") == Some("3") {
            return RowKind::Listener;
        }
        match self.service() {
            FRONTEND_SVNAME => RowKind::Frontend,
            BACKEND_SVNAME => RowKind::Backend,
            _ => RowKind::Server,
        }
    }

    /// Raw value of a column, or `None` if HAProxy did not send that column.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| self.values[i].as_str())
    }

    /// Numeric value of a column. Missing columns and empty values are `None`.
    pub fn numeric(&self, column: &str) -> Result<Option<u64>, Error> {
        parse_numeric(column, self.get(column))
    }

    /// Serialize the row the way HAProxy writes it, trailing comma included.
    pub fn to_csv_line(&self) -> String {
        let mut line = String::new();
        for value in &self.values {
            if value.contains(',') || value.contains('"') {
                line.push('"');
                line.push_str(&value.replace('"', "\"\""));
                line.push('"');
            } else {
                line.push_str(value);
            }
            line.push(',');
        }
        line
    }
}

/// The output of `show info` for one process.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Info {
    entries: BTreeMap<String, String>,
}

impl Info {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn numeric(&self, key: &str) -> Result<Option<u64>, Error> {
        parse_numeric(key, self.get(key))
    }

    /// HAProxy's process number for the socket that answered.
    pub fn process_num(&self) -> Result<Option<u64>, Error> {
        self.numeric("Process_num")
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, String)> for Info {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// The output of `show errors` for one process.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ErrorLog {
    /// Number of events HAProxy reports as captured.
    pub total: u32,
    /// Every line following the banner.
    pub lines: Vec<String>,
}

fn parse_numeric(column: &str, value: Option<&str>) -> Result<Option<u64>, Error> {
    match value {
        None | Some("") => Ok(None),
        Some(value) => u64::from_str(value).map(Some).map_err(|_| {
            Error::Parse(format!(
                "expected a number for {}, found '{}'",
                column, value
            ))
        }),
    }
}
