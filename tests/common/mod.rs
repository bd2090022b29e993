#![allow(dead_code)]

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use hapadmin::config::Config;
use hapadmin::Haproxy;

/// A fake per-process stats socket.
///
/// Every accepted connection reads one command line and answers with whatever `reply` returns.
/// `None` keeps the connection open without answering, so the client runs into its timeout.
pub struct MockSocket {
    pub path: PathBuf,
    commands: Arc<Mutex<Vec<String>>>,
}

impl MockSocket {
    pub fn spawn<F>(dir: &Path, name: &str, reply: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + 'static,
    {
        Self::serve(dir, name, move |command, mut stream| match reply(command) {
            Some(text) => {
                let _ = stream.write_all(text.as_bytes());
                None
            }
            None => Some(stream),
        })
    }

    /// A socket that answers every command with `reply`, one byte per `interval`.
    pub fn drip(dir: &Path, name: &str, reply: &str, interval: Duration) -> Self {
        let reply = reply.as_bytes().to_vec();
        Self::serve(dir, name, move |_, mut stream| {
            let reply = reply.clone();
            thread::spawn(move || {
                for byte in reply {
                    thread::sleep(interval);
                    if stream.write_all(&[byte]).is_err() {
                        break;
                    }
                }
            });
            None
        })
    }

    /// Accept connections and hand each command line with its stream to `handle`. A stream that
    /// `handle` returns is kept open for the lifetime of the socket.
    fn serve<F>(dir: &Path, name: &str, handle: F) -> Self
    where
        F: Fn(&str, UnixStream) -> Option<UnixStream> + Send + 'static,
    {
        let path = dir.join(name);
        let listener = UnixListener::bind(&path).unwrap();
        let commands = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&commands);

        thread::spawn(move || {
            let mut held = Vec::new();
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let mut line = String::new();
                if BufReader::new(&stream).read_line(&mut line).is_err() {
                    continue;
                }
                let command = line.trim_end().to_string();
                seen.lock().unwrap().push(command.clone());
                if let Some(stream) = handle(&command, stream) {
                    held.push(stream);
                }
            }
        });

        Self { path, commands }
    }

    /// A socket answering `show stat` with `stats` and acknowledging everything else.
    pub fn with_stats(dir: &Path, name: &str, stats: String) -> Self {
        Self::spawn(dir, name, move |command| {
            if command == "show stat" {
                Some(stats.clone())
            } else {
                Some(String::new())
            }
        })
    }

    /// Command lines received so far, in arrival order.
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    /// Received commands other than `show stat`.
    pub fn writes(&self) -> Vec<String> {
        self.commands()
            .into_iter()
            .filter(|command| command != "show stat")
            .collect()
    }
}

pub fn connect(dir: &Path) -> Haproxy {
    Haproxy::new(&Config {
        socket_dir: dir.to_path_buf(),
        timeout_ms: 300,
    })
    .unwrap()
}

pub const STAT_COLUMNS: &[&str] = &[
    "pxname", "svname", "qcur", "qmax", "scur", "smax", "slim", "stot", "bin", "bout", "dreq",
    "dresp", "ereq", "econ", "eresp", "wretr", "wredis", "status", "weight", "act", "bck",
    "chkfail", "chkdown", "lastchg", "downtime", "qlimit", "pid", "iid", "sid", "throttle",
    "lbtot", "tracked", "type", "rate", "rate_lim", "rate_max", "check_status", "check_code",
    "check_duration", "hrsp_1xx", "hrsp_2xx", "hrsp_3xx", "hrsp_4xx", "hrsp_5xx", "hrsp_other",
    "hanafail", "req_rate", "req_rate_max", "req_tot", "cli_abrt", "srv_abrt",
];

/// One `show stat` record; columns not named in `fields` are left empty.
pub fn stat_row(fields: &[(&str, &str)]) -> String {
    let values: Vec<&str> = STAT_COLUMNS
        .iter()
        .map(|column| {
            fields
                .iter()
                .find(|(name, _)| name == column)
                .map_or("", |(_, value)| *value)
        })
        .collect();
    format!("{},\n", values.join(","))
}

/// A full `show stat` reply.
pub fn stats(rows: &[String]) -> String {
    format!("# {},\n{}\n", STAT_COLUMNS.join(","), rows.concat())
}

pub fn frontend(name: &str, pid: &str, req_tot: &str) -> String {
    stat_row(&[
        ("pxname", name),
        ("svname", "FRONTEND"),
        ("scur", "1"),
        ("slim", "2000"),
        ("status", "OPEN"),
        ("pid", pid),
        ("iid", "2"),
        ("sid", "0"),
        ("type", "0"),
        ("req_tot", req_tot),
    ])
}

pub fn backend(name: &str, pid: &str, stot: &str) -> String {
    stat_row(&[
        ("pxname", name),
        ("svname", "BACKEND"),
        ("stot", stot),
        ("status", "UP"),
        ("pid", pid),
        ("iid", "3"),
        ("sid", "0"),
        ("type", "1"),
    ])
}

pub fn server(backend: &str, name: &str, pid: &str, status: &str, stot: &str) -> String {
    stat_row(&[
        ("pxname", backend),
        ("svname", name),
        ("stot", stot),
        ("status", status),
        ("weight", "1"),
        ("pid", pid),
        ("iid", "3"),
        ("sid", "1"),
        ("type", "2"),
    ])
}

/// A `show info` reply for process `pid`.
pub fn info(pid: &str, maxconn: &str, cum_req: &str) -> String {
    format!(
        "Name: HAProxy\nVersion: 1.8.8\nProcess_num: {pid}\nPid: 100{pid}\nUptime_sec: 1{pid}0\n\
         MaxConn: {maxconn}\nCumReq: {cum_req}\nConnRateLimit: 0\nSessRateLimit: 0\n\
         SslRateLimit: 0\n\n"
    )
}
