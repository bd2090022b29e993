//! Manage a multi-process HAProxy over its stats sockets.
//!
//! HAProxy running with several processes exposes one stats socket per process. `Haproxy`
//! treats a directory of those sockets as one instance: reads are sent to every socket and
//! merged, and changes are applied on every process that hosts the entity.
//!
//! # Examples
//! ```no_run
//! use hapadmin::config::Config;
//! use hapadmin::models::EntityKind;
//! use hapadmin::requests::Action;
//! use hapadmin::Haproxy;
//!
//! let hap = Haproxy::new(&Config::with_socket_dir("/var/lib/haproxy")).unwrap();
//!
//! let www = hap.get(EntityKind::Frontend, "www").unwrap().value;
//! println!("{} requests", hap.metric(&www, "req_tot").unwrap().value.unwrap_or(0));
//!
//! let report = hap.apply(&www, &Action::SetMaxconn(5000)).unwrap();
//! assert!(report.is_success());
//! ```

pub mod commands;
pub mod config;
pub mod connection;
mod dispatch;
pub mod errors;
mod instance;
pub mod metrics;
pub mod models;
pub mod parsers;
mod registry;
pub mod requests;
pub mod responses;

pub use dispatch::{ApplyReport, EndpointResult};
pub use errors::Error;
pub use instance::{Aggregated, Haproxy};
