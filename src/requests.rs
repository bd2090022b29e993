//! Request types for HAProxy.

use std::fmt::{self, Display};
use std::str::FromStr;

use crate::errors::Error;

/// Global rate limits that HAProxy can change at runtime.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum RateLimit {
    /// Maximum new connections per second per process.
    Connections,
    /// Maximum new sessions per second per process.
    Sessions,
    /// Maximum new SSL sessions per second per process.
    SslSessions,
}

impl Display for RateLimit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            RateLimit::Connections => "connections",
            RateLimit::Sessions => "sessions",
            RateLimit::SslSessions => "ssl-sessions",
        })
    }
}

impl FromStr for RateLimit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "connections" => Ok(RateLimit::Connections),
            "sessions" => Ok(RateLimit::Sessions),
            "ssl-sessions" => Ok(RateLimit::SslSessions),
            _ => Err(Error::Validation(format!("unknown rate limit '{}'", s))),
        }
    }
}

/// An operation that changes HAProxy state.
///
/// Numeric values are signed so that callers can hand over unchecked input; every value is
/// validated as non-negative before anything is sent to a socket.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Action {
    Enable,
    Disable,
    /// Shut a frontend down, or kill every session of a server.
    Shutdown,
    SetMaxconn(i64),
    SetWeight(i64),
    SetRateLimit(RateLimit, i64),
    /// Clear the max values of statistics counters, or every counter when `all` is set.
    ClearCounters { all: bool },
}

impl Action {
    /// Names accepted by `Action::parse`.
    pub const NAMES: &'static [&'static str] = &[
        "enable",
        "disable",
        "shutdown",
        "set-maxconn",
        "set-weight",
        "set-rate-limit",
        "clear-counters",
    ];

    /// Build an action from its name and string arguments.
    ///
    /// # Examples
    /// ```
    /// use hapadmin::requests::{Action, RateLimit};
    ///
    /// assert_eq!(Action::parse("set-maxconn", &["500"]).unwrap(), Action::SetMaxconn(500));
    /// assert_eq!(
    ///     Action::parse("set-rate-limit", &["sessions", "20"]).unwrap(),
    ///     Action::SetRateLimit(RateLimit::Sessions, 20)
    /// );
    /// assert!(Action::parse("set-maxconn", &["-1"]).is_err());
    /// ```
    pub fn parse(name: &str, args: &[&str]) -> Result<Self, Error> {
        let action = match (name, args) {
            ("enable", []) => Action::Enable,
            ("disable", []) => Action::Disable,
            ("shutdown", []) => Action::Shutdown,
            ("set-maxconn", [value]) => Action::SetMaxconn(parse_value(value)?),
            ("set-weight", [value]) => Action::SetWeight(parse_value(value)?),
            ("set-rate-limit", [limit, value]) => {
                Action::SetRateLimit(RateLimit::from_str(limit)?, parse_value(value)?)
            }
            ("clear-counters", []) => Action::ClearCounters { all: false },
            ("clear-counters", ["all"]) => Action::ClearCounters { all: true },
            _ if Action::NAMES.iter().any(|known| *known == name) => {
                return Err(Error::Validation(format!(
                    "wrong arguments for '{}': {:?}",
                    name, args
                )))
            }
            _ => return Err(Error::Validation(format!("unknown action '{}'", name))),
        };
        action.validate()?;
        Ok(action)
    }

    /// Reject negative values.
    pub fn validate(&self) -> Result<(), Error> {
        match self {
            Action::SetMaxconn(value)
            | Action::SetWeight(value)
            | Action::SetRateLimit(_, value) => non_negative(*value).map(|_| ()),
            _ => Ok(()),
        }
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Action::Enable => f.write_str("enable"),
            Action::Disable => f.write_str("disable"),
            Action::Shutdown => f.write_str("shutdown"),
            Action::SetMaxconn(value) => write!(f, "set-maxconn {}", value),
            Action::SetWeight(value) => write!(f, "set-weight {}", value),
            Action::SetRateLimit(limit, value) => write!(f, "set-rate-limit {} {}", limit, value),
            Action::ClearCounters { all: false } => f.write_str("clear-counters"),
            Action::ClearCounters { all: true } => f.write_str("clear-counters all"),
        }
    }
}

/// Instance-wide options that can be read back from `show info` and written with an `Action`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum GlobalOption {
    Maxconn,
    RateLimitConn,
    RateLimitSess,
    RateLimitSslSess,
}

impl GlobalOption {
    pub const ALL: [GlobalOption; 4] = [
        GlobalOption::Maxconn,
        GlobalOption::RateLimitConn,
        GlobalOption::RateLimitSess,
        GlobalOption::RateLimitSslSess,
    ];

    pub fn name(self) -> &'static str {
        match self {
            GlobalOption::Maxconn => "maxconn",
            GlobalOption::RateLimitConn => "ratelimitconn",
            GlobalOption::RateLimitSess => "ratelimitsess",
            GlobalOption::RateLimitSslSess => "ratelimitsslsess",
        }
    }

    /// The `show info` key holding the current value.
    pub fn info_key(self) -> &'static str {
        match self {
            GlobalOption::Maxconn => "MaxConn",
            GlobalOption::RateLimitConn => "ConnRateLimit",
            GlobalOption::RateLimitSess => "SessRateLimit",
            GlobalOption::RateLimitSslSess => "SslRateLimit",
        }
    }

    /// The action that sets this option to `value`.
    pub fn action(self, value: i64) -> Action {
        match self {
            GlobalOption::Maxconn => Action::SetMaxconn(value),
            GlobalOption::RateLimitConn => Action::SetRateLimit(RateLimit::Connections, value),
            GlobalOption::RateLimitSess => Action::SetRateLimit(RateLimit::Sessions, value),
            GlobalOption::RateLimitSslSess => Action::SetRateLimit(RateLimit::SslSessions, value),
        }
    }
}

impl Display for GlobalOption {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GlobalOption {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GlobalOption::ALL
            .iter()
            .copied()
            .find(|option| option.name() == s)
            .ok_or_else(|| Error::Validation(format!("'{}' is not a valid option", s)))
    }
}

/// Check that a value can be sent to HAProxy.
pub(crate) fn non_negative(value: i64) -> Result<u64, Error> {
    u64::try_from(value)
        .map_err(|_| Error::Validation(format!("expected a non-negative integer, got {}", value)))
}

fn parse_value(s: &str) -> Result<i64, Error> {
    i64::from_str(s)
        .map_err(|_| Error::Validation(format!("expected a non-negative integer, got '{}'", s)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_parse_known_names() {
        assert_eq!(Action::parse("enable", &[]).unwrap(), Action::Enable);
        assert_eq!(Action::parse("shutdown", &[]).unwrap(), Action::Shutdown);
        assert_eq!(Action::parse("set-weight", &["0"]).unwrap(), Action::SetWeight(0));
        assert_eq!(
            Action::parse("clear-counters", &["all"]).unwrap(),
            Action::ClearCounters { all: true }
        );
    }

    #[test]
    fn action_parse_rejects_bad_input() {
        for (name, args) in [
            ("set-maxconn", vec!["-1"]),
            ("set-maxconn", vec!["ten"]),
            ("set-maxconn", vec![]),
            ("set-rate-limit", vec!["requests", "10"]),
            ("enable", vec!["now"]),
            ("reload", vec![]),
        ] {
            match Action::parse(name, &args) {
                Err(Error::Validation(_)) => {}
                other => panic!("{} {:?} gave {:?}", name, args, other),
            }
        }
    }

    #[test]
    fn action_validate_negative() {
        assert!(Action::SetMaxconn(-1).validate().is_err());
        assert!(Action::SetRateLimit(RateLimit::Sessions, -5).validate().is_err());
        assert!(Action::SetMaxconn(0).validate().is_ok());
    }

    #[test]
    fn global_option_from_str() {
        assert_eq!(
            GlobalOption::from_str("ratelimitsslsess").unwrap(),
            GlobalOption::RateLimitSslSess
        );
        assert!(GlobalOption::from_str("weight").is_err());
        assert_eq!(
            GlobalOption::RateLimitConn.action(10),
            Action::SetRateLimit(RateLimit::Connections, 10)
        );
    }
}
