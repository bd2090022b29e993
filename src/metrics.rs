//! The fixed sets of metric names per entity kind, and how each one combines across processes.

use std::fmt::{self, Display};

use crate::errors::Error;
use crate::models::EntityKind;

/// How per-process values of a metric become one value.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Aggregation {
    /// Counters, gauges of current activity and per-process limits.
    Sum,
    /// Timings and weights, integer mean of the processes that report a value.
    Average,
    /// Values that describe the instance as a whole, such as uptime.
    Max,
}

impl Aggregation {
    /// Combine per-process values. Unavailable values are skipped; `None` if none is available.
    ///
    /// Sums saturate at `u64::MAX`. Averages are exact for any input.
    pub fn combine<I: IntoIterator<Item = Option<u64>>>(self, values: I) -> Option<u64> {
        let values: Vec<u64> = values.into_iter().flatten().collect();
        if values.is_empty() {
            return None;
        }
        let total: u128 = values.iter().map(|&value| u128::from(value)).sum();
        match self {
            Aggregation::Sum => Some(u64::try_from(total).unwrap_or(u64::MAX)),
            Aggregation::Average => {
                let mean = total / values.len() as u128;
                Some(u64::try_from(mean).unwrap_or(u64::MAX))
            }
            Aggregation::Max => values.into_iter().max(),
        }
    }
}

/// A validated metric name.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Metric {
    name: &'static str,
    aggregation: Aggregation,
}

impl Metric {
    pub const fn sum(name: &'static str) -> Self {
        Self {
            name,
            aggregation: Aggregation::Sum,
        }
    }

    pub const fn average(name: &'static str) -> Self {
        Self {
            name,
            aggregation: Aggregation::Average,
        }
    }

    pub const fn max(name: &'static str) -> Self {
        Self {
            name,
            aggregation: Aggregation::Max,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn aggregation(&self) -> Aggregation {
        self.aggregation
    }
}

impl Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name)
    }
}

pub const FRONTEND_METRICS: &[Metric] = &[
    Metric::sum("bin"),
    Metric::sum("bout"),
    Metric::sum("comp_byp"),
    Metric::sum("comp_in"),
    Metric::sum("comp_out"),
    Metric::sum("comp_rsp"),
    Metric::sum("dreq"),
    Metric::sum("dresp"),
    Metric::sum("ereq"),
    Metric::sum("hrsp_1xx"),
    Metric::sum("hrsp_2xx"),
    Metric::sum("hrsp_3xx"),
    Metric::sum("hrsp_4xx"),
    Metric::sum("hrsp_5xx"),
    Metric::sum("hrsp_other"),
    Metric::sum("rate"),
    Metric::sum("rate_lim"),
    Metric::sum("rate_max"),
    Metric::sum("req_rate"),
    Metric::sum("req_rate_max"),
    Metric::sum("req_tot"),
    Metric::sum("scur"),
    Metric::sum("slim"),
    Metric::sum("smax"),
    Metric::sum("stot"),
];

pub const BACKEND_METRICS: &[Metric] = &[
    Metric::sum("act"),
    Metric::sum("bck"),
    Metric::sum("bin"),
    Metric::sum("bout"),
    Metric::sum("chkdown"),
    Metric::sum("cli_abrt"),
    Metric::sum("comp_byp"),
    Metric::sum("comp_in"),
    Metric::sum("comp_out"),
    Metric::sum("comp_rsp"),
    Metric::average("ctime"),
    Metric::average("downtime"),
    Metric::sum("dreq"),
    Metric::sum("dresp"),
    Metric::sum("econ"),
    Metric::sum("eresp"),
    Metric::sum("hrsp_1xx"),
    Metric::sum("hrsp_2xx"),
    Metric::sum("hrsp_3xx"),
    Metric::sum("hrsp_4xx"),
    Metric::sum("hrsp_5xx"),
    Metric::sum("hrsp_other"),
    Metric::average("lastchg"),
    Metric::average("lastsess"),
    Metric::sum("lbtot"),
    Metric::sum("qcur"),
    Metric::sum("qmax"),
    Metric::average("qtime"),
    Metric::sum("rate"),
    Metric::sum("rate_max"),
    Metric::average("rtime"),
    Metric::sum("scur"),
    Metric::sum("slim"),
    Metric::sum("smax"),
    Metric::sum("srv_abrt"),
    Metric::sum("stot"),
    Metric::average("ttime"),
    Metric::average("weight"),
    Metric::sum("wredis"),
    Metric::sum("wretr"),
];

pub const SERVER_METRICS: &[Metric] = &[
    Metric::sum("act"),
    Metric::sum("bck"),
    Metric::sum("bin"),
    Metric::sum("bout"),
    Metric::average("check_duration"),
    Metric::sum("chkdown"),
    Metric::sum("chkfail"),
    Metric::sum("cli_abrt"),
    Metric::average("ctime"),
    Metric::average("downtime"),
    Metric::sum("dresp"),
    Metric::sum("econ"),
    Metric::sum("eresp"),
    Metric::sum("hrsp_1xx"),
    Metric::sum("hrsp_2xx"),
    Metric::sum("hrsp_3xx"),
    Metric::sum("hrsp_4xx"),
    Metric::sum("hrsp_5xx"),
    Metric::sum("hrsp_other"),
    Metric::average("lastchg"),
    Metric::average("lastsess"),
    Metric::sum("lbtot"),
    Metric::sum("qcur"),
    Metric::sum("qlimit"),
    Metric::sum("qmax"),
    Metric::average("qtime"),
    Metric::sum("rate"),
    Metric::sum("rate_max"),
    Metric::average("rtime"),
    Metric::sum("scur"),
    Metric::sum("slim"),
    Metric::sum("smax"),
    Metric::sum("srv_abrt"),
    Metric::sum("stot"),
    Metric::average("throttle"),
    Metric::average("ttime"),
    Metric::average("weight"),
    Metric::sum("wredis"),
    Metric::sum("wretr"),
];

/// Numeric `show info` keys.
pub const HAPROXY_METRICS: &[Metric] = &[
    Metric::sum("CompressBpsIn"),
    Metric::sum("CompressBpsOut"),
    Metric::sum("CompressBpsRateLim"),
    Metric::sum("ConnRate"),
    Metric::sum("ConnRateLimit"),
    Metric::sum("CumConns"),
    Metric::sum("CumReq"),
    Metric::sum("CumSslConns"),
    Metric::sum("CurrConns"),
    Metric::sum("CurrSslConns"),
    Metric::sum("Hard_maxconn"),
    Metric::average("Idle_pct"),
    Metric::sum("MaxConn"),
    Metric::sum("MaxConnRate"),
    Metric::sum("MaxSessRate"),
    Metric::sum("MaxSslConns"),
    Metric::sum("MaxSslRate"),
    Metric::sum("MaxZlibMemUsage"),
    Metric::sum("Maxpipes"),
    Metric::sum("Maxsock"),
    Metric::sum("Memmax_MB"),
    Metric::sum("PipesFree"),
    Metric::sum("PipesUsed"),
    Metric::sum("Run_queue"),
    Metric::sum("SessRate"),
    Metric::sum("SessRateLimit"),
    Metric::sum("SslBackendKeyRate"),
    Metric::sum("SslBackendMaxKeyRate"),
    Metric::sum("SslCacheLookups"),
    Metric::sum("SslCacheMisses"),
    Metric::sum("SslFrontendKeyRate"),
    Metric::sum("SslFrontendMaxKeyRate"),
    Metric::average("SslFrontendSessionReuse_pct"),
    Metric::sum("SslRate"),
    Metric::sum("SslRateLimit"),
    Metric::sum("Tasks"),
    Metric::sum("Ulimit-n"),
    Metric::max("Uptime_sec"),
    Metric::sum("ZlibMemUsage"),
];

/// Metric names valid for an entity kind.
pub fn metrics_for(kind: EntityKind) -> &'static [Metric] {
    match kind {
        EntityKind::Frontend => FRONTEND_METRICS,
        EntityKind::Backend => BACKEND_METRICS,
        EntityKind::Server => SERVER_METRICS,
    }
}

/// Validate a metric name for an entity kind.
///
/// # Examples
/// ```
/// use hapadmin::metrics::{lookup, Aggregation};
/// use hapadmin::models::EntityKind;
///
/// assert_eq!(lookup(EntityKind::Frontend, "req_tot").unwrap().aggregation(), Aggregation::Sum);
/// assert!(lookup(EntityKind::Frontend, "qtime").is_err());
/// ```
pub fn lookup(kind: EntityKind, name: &str) -> Result<Metric, Error> {
    find(metrics_for(kind), name)
        .ok_or_else(|| Error::Validation(format!("{} is not a valid {} metric", name, kind)))
}

/// Validate a `show info` metric name.
pub fn lookup_global(name: &str) -> Result<Metric, Error> {
    find(HAPROXY_METRICS, name)
        .ok_or_else(|| Error::Validation(format!("{} is not a valid haproxy metric", name)))
}

fn find(metrics: &[Metric], name: &str) -> Option<Metric> {
    metrics.iter().copied().find(|metric| metric.name == name)
}
