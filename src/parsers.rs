//! Turn raw socket replies into typed records.
//!
//! Every parser reads from a `BufRead`, so a reply can be parsed straight from the socket or from
//! a buffered `&[u8]`.

use std::io::{self, BufRead};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use crate::errors::Error;
use crate::responses::{ErrorLog, Info, StatRow, StatsTable};

const TOTAL_EVENTS_PREFIX: &str = "Total events captured on";

/// Parse the CSV output of `show stat`.
///
/// The first line is the header (`# pxname,svname,...`). Every record must carry exactly as many
/// fields as the header names; HAProxy's trailing comma is accepted.
///
/// # Examples
/// ```
/// use hapadmin::parsers::parse_stats;
/// use hapadmin::responses::RowKind;
///
/// let reply = "# pxname,svname,scur,\nwww,FRONTEND,3,\n\n";
/// let table = parse_stats(reply.as_bytes()).unwrap();
/// assert_eq!(table.rows[0].kind(), RowKind::Frontend);
/// assert_eq!(table.rows[0].numeric("scur").unwrap(), Some(3));
/// ```
pub fn parse_stats<R: BufRead>(reader: R) -> Result<StatsTable, Error> {
    let mut lines = non_empty_lines(reader.lines());

    let header = lines
        .next()
        .ok_or_else(|| Error::Parse("empty stats response".into()))??;
    let header = header
        .strip_prefix("# ")
        .ok_or_else(|| Error::Parse(format!("missing stats header, found '{}'", header)))?;
    let mut columns = split_fields(header)?;
    if columns.last().map(String::is_empty).unwrap_or(false) {
        columns.pop();
    }
    if columns.len() < 2 {
        return Err(Error::Parse(format!("stats header too short: '{}'", header)));
    }
    let columns = Arc::new(columns);

    let rows = lines
        .enumerate()
        .map(|(n, line_res)| {
            let line = line_res?;
            let mut values = split_fields(&line)?;
            if values.len() == columns.len() + 1 && values.last().map(String::is_empty) == Some(true)
            {
                values.pop();
            }
            StatRow::new(Arc::clone(&columns), values)
                .map_err(|err| Error::Parse(format!("stats record {}: {}", n + 1, err)))
        })
        .collect::<Result<Vec<_>, Error>>()?;

    Ok(StatsTable { columns, rows })
}

/// Parse the `Key: Value` lines of `show info`.
pub fn parse_info<R: BufRead>(reader: R) -> Result<Info, Error> {
    non_empty_lines(reader.lines())
        .map(|line_res| {
            let line = line_res?;
            let (key, value) = line
                .split_once(':')
                .ok_or_else(|| Error::Parse(format!("info line without ':': '{}'", line)))?;
            Ok((key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Parse `show errors`: the captured-events banner followed by the captured events.
pub fn parse_errors<R: BufRead>(reader: R) -> Result<ErrorLog, Error> {
    let mut lines = non_empty_lines(reader.lines());

    let banner = lines
        .next()
        .ok_or_else(|| Error::Parse("empty errors response".into()))??;
    if !banner.starts_with(TOTAL_EVENTS_PREFIX) {
        return Err(Error::Parse(format!("unexpected errors banner '{}'", banner)));
    }
    let total = banner
        .rsplit(' ')
        .next()
        .ok_or_else(|| Error::Parse(banner.clone()))
        .and_then(|count| u32::from_str(count).map_err(Error::from))?;

    let lines = lines.collect::<Result<Vec<_>, io::Error>>()?;
    Ok(ErrorLog { total, lines })
}

/// Interpret the reply to a mutating command: nothing on success, HAProxy's message otherwise.
pub fn parse_ack(socket: &Path, response: &str) -> Result<(), Error> {
    let message = response.trim();
    if message.is_empty() {
        Ok(())
    } else {
        Err(Error::Application {
            socket: socket.to_path_buf(),
            message: message.to_string(),
        })
    }
}

/// Split one CSV record. Fields may be wrapped in double quotes, with `""` as an escaped quote.
fn split_fields(line: &str) -> Result<Vec<String>, Error> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut chars = line.chars().peekable();
    let mut quoted = false;

    while let Some(c) = chars.next() {
        match (quoted, c) {
            (true, '"') if chars.peek() == Some(&'"') => {
                chars.next();
                field.push('"');
            }
            (true, '"') => quoted = false,
            (false, '"') if field.is_empty() => quoted = true,
            (false, ',') => fields.push(std::mem::take(&mut field)),
            (_, c) => field.push(c),
        }
    }
    if quoted {
        return Err(Error::Parse(format!("unterminated quote in '{}'", line)));
    }
    fields.push(field);
    Ok(fields)
}

/// Skip any line that is empty.
fn non_empty_lines<B: BufRead>(lines: io::Lines<B>) -> impl Iterator<Item = Result<String, io::Error>> {
    lines.filter(|line_res| {
        line_res
            .as_ref()
            .map(|line| !line.trim().is_empty())
            .unwrap_or(true)
    })
}
