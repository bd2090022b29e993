//! Frontends, backends and servers merged across every process.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::commands::Command;
use crate::errors::Error;
use crate::instance::{Aggregated, Haproxy};
use crate::metrics;
use crate::models::{EntityHandle, EntityKind, Reconciled};
use crate::parsers;
use crate::responses::{StatRow, StatsTable};

impl Haproxy {
    fn stats(
        &self,
        filter: &dyn Fn(&Path) -> bool,
    ) -> Result<Aggregated<Vec<(PathBuf, StatsTable)>>, Error> {
        self.query(filter, Command::ShowStat, |reply| {
            parsers::parse_stats(reply.as_bytes())
        })
    }

    /// Every entity of `kind` found on any process.
    ///
    /// An entity that only some processes know about is still returned; its rows cover exactly
    /// those processes.
    pub fn discover(&self, kind: EntityKind) -> Result<Aggregated<Vec<EntityHandle>>, Error> {
        Ok(self
            .stats(&|_| true)?
            .map(|tables| group(kind, tables, |_| true)))
    }

    /// Look up one entity. Servers are named `backend/server`.
    pub fn get(&self, kind: EntityKind, name: &str) -> Result<Aggregated<EntityHandle>, Error> {
        let (backend, entity) = split_name(kind, name)?;
        let keep = |row: &StatRow| match backend {
            Some(backend) => row.proxy() == backend && row.service() == entity,
            None => row.proxy() == entity,
        };

        self.stats(&|_| true)?.try_map(|tables| {
            group(kind, tables, keep)
                .into_iter()
                .next()
                .ok_or_else(|| Error::NotFound {
                    kind,
                    name: name.to_string(),
                })
        })
    }

    /// The servers of a backend.
    pub fn servers_of(&self, backend: &EntityHandle) -> Result<Aggregated<Vec<EntityHandle>>, Error> {
        if backend.kind() != EntityKind::Backend {
            return Err(Error::Validation(format!("{} is not a backend", backend)));
        }
        Ok(self
            .stats(&|path| backend.is_on(path))?
            .map(|tables| {
                group(EntityKind::Server, tables, |row| row.proxy() == backend.name())
            }))
    }

    /// Re-read the stats of `handle`'s processes and return a handle with current rows.
    ///
    /// Fails with `NotFound` when every answering process dropped the entity.
    pub fn refresh(&self, handle: &EntityHandle) -> Result<Aggregated<EntityHandle>, Error> {
        self.stats(&|path| handle.is_on(path))?.try_map(|tables| {
            group(handle.kind(), tables, |row| handle.matches(row))
                .into_iter()
                .next()
                .ok_or_else(|| Error::NotFound {
                    kind: handle.kind(),
                    name: handle.qualified_name(),
                })
        })
    }

    /// Current status of `handle`, reconciled across its processes.
    pub fn status(&self, handle: &EntityHandle) -> Result<Aggregated<Reconciled>, Error> {
        self.refresh(handle)?.try_map(|fresh| fresh.status())
    }

    /// Read a metric of `handle` from fresh stats and combine it across its processes.
    ///
    /// The name is validated before any socket is contacted. `None` means no answering process
    /// has a value for it.
    pub fn metric(&self, handle: &EntityHandle, name: &str) -> Result<Aggregated<Option<u64>>, Error> {
        let metric = metrics::lookup(handle.kind(), name)?;
        self.refresh(handle)?.try_map(|fresh| fresh.combine(metric))
    }
}

/// Merge the rows of `kind` that pass `keep` into one handle per entity, sorted by name.
fn group<F>(kind: EntityKind, tables: Vec<(PathBuf, StatsTable)>, keep: F) -> Vec<EntityHandle>
where
    F: Fn(&StatRow) -> bool,
{
    let mut grouped: BTreeMap<(Option<String>, String), BTreeMap<PathBuf, StatRow>> =
        BTreeMap::new();

    for (endpoint, table) in tables {
        for row in table.rows {
            if !kind.matches(row.kind()) || !keep(&row) {
                continue;
            }
            let key = match kind {
                EntityKind::Server => (Some(row.proxy().to_string()), row.service().to_string()),
                EntityKind::Frontend | EntityKind::Backend => (None, row.proxy().to_string()),
            };
            grouped
                .entry(key)
                .or_default()
                .entry(endpoint.clone())
                .or_insert(row);
        }
    }

    grouped
        .into_iter()
        .map(|((backend, name), rows)| EntityHandle::new(kind, name, backend, rows))
        .collect()
}

fn split_name(kind: EntityKind, name: &str) -> Result<(Option<&str>, &str), Error> {
    match kind {
        EntityKind::Server => match name.split_once('/') {
            Some((backend, server)) if !backend.is_empty() && !server.is_empty() => {
                Ok((Some(backend), server))
            }
            _ => Err(Error::Validation(format!(
                "server '{}' must be named backend/server",
                name
            ))),
        },
        EntityKind::Frontend | EntityKind::Backend => Ok((None, name)),
    }
}
