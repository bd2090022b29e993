use std::io::{self, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::commands::{self, Command};
use crate::errors::Error;

/// Bound on a whole command round-trip unless another one is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

const UNKNOWN_COMMAND: &str = "Unknown command";
const PERMISSION_DENIED: &str = "Permission denied";

/// Support connections to HAProxy over any stream using the same interface.
pub trait ConnectionBuilder {
    type Connection;

    /// Create a new connection to HAProxy.
    fn connect(&self) -> Result<Self::Connection, Error>;
}

/// Streams whose blocking reads can be bounded.
pub trait ReadTimeout {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()>;
}

impl ReadTimeout for UnixStream {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        UnixStream::set_read_timeout(self, timeout)
    }
}

/// Configuration for connecting to an HAProxy Unix Socket.
///
/// This allows configuration of the path for the Unix socket and the I/O timeout.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UnixSocketBuilder {
    /// The path of the Unix socket.
    path: PathBuf,
    timeout: Duration,
}

impl UnixSocketBuilder {
    /// Create a new `UnixSocketBuilder` to establish connections to HAProxy via Unix Socket.
    ///
    /// # Examples
    /// ```no_run
    /// use hapadmin::commands::Command;
    /// use hapadmin::connection::{ConnectionBuilder, UnixSocketBuilder};
    ///
    /// let socket_builder = UnixSocketBuilder::new("/var/lib/haproxy/stats1");
    /// let connection = socket_builder.connect().expect("Failed to connect");
    /// let reply = connection.send(&Command::ShowInfo).expect("Failed to query info");
    /// ```
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the time a command may take from connecting until the last byte of the reply.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConnectionBuilder for UnixSocketBuilder {
    type Connection = Connection<UnixStream>;

    /// The returned connection must finish its command within the timeout, counted from now.
    fn connect(&self) -> Result<Self::Connection, Error> {
        let deadline = Instant::now() + self.timeout;
        let socket = connect_within(&self.path, self.timeout)?;
        socket.set_write_timeout(Some(self.timeout))?;

        Ok(Connection::new(socket, self.path.clone(), deadline))
    }
}

/// A connection to HAProxy via any of the supported transports.
///
/// HAProxy closes the stats socket after answering one command, so `send` takes `self`. Use a
/// `ConnectionBuilder` to create connections for each use.
#[derive(Debug)]
pub struct Connection<T> {
    socket: T,
    path: PathBuf,
    deadline: Instant,
}

impl<T: Read + Write + ReadTimeout> Connection<T> {
    pub fn new(socket: T, path: PathBuf, deadline: Instant) -> Self {
        Self {
            socket,
            path,
            deadline,
        }
    }

    /// Send one command and read the reply until HAProxy closes the connection.
    ///
    /// The whole reply must arrive before the deadline, however it is split up; a socket that
    /// trickles bytes fails with `Error::Timeout` like a silent one. Replies that HAProxy uses
    /// to reject a command line (`Unknown command...`, `Permission denied`) become errors; any
    /// other reply is returned verbatim.
    pub fn send(mut self, command: &Command) -> Result<String, Error> {
        commands::write(&mut self.socket, command).map_err(|err| classify(&self.path, err))?;
        self.socket
            .flush()
            .map_err(|err| classify(&self.path, err))?;

        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let left = self.remaining()?;
            self.socket
                .set_read_timeout(Some(left))
                .map_err(|err| classify(&self.path, err))?;
            match self.socket.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(classify(&self.path, err)),
            }
        }
        let response = String::from_utf8_lossy(&buf).into_owned();

        check_rejection(&self.path, &response)?;
        Ok(response)
    }

    fn remaining(&self) -> Result<Duration, Error> {
        match self.deadline.checked_duration_since(Instant::now()) {
            Some(left) if !left.is_zero() => Ok(left),
            _ => Err(Error::Timeout {
                socket: self.path.clone(),
            }),
        }
    }
}

/// One per-process stats socket.
///
/// Commands to the same endpoint are serialized; HAProxy's socket answers strictly one request
/// at a time.
#[derive(Debug)]
pub struct Endpoint {
    builder: UnixSocketBuilder,
    lock: Mutex<()>,
}

impl Endpoint {
    pub fn new(builder: UnixSocketBuilder) -> Self {
        Self {
            builder,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        self.builder.path()
    }

    /// Open a connection, send `command`, read the full reply and close.
    pub fn send(&self, command: &Command) -> Result<String, Error> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        debug!(
            socket = %self.path().display(),
            %command,
            mutating = command.is_mutating(),
            "sending command"
        );
        let response = self.builder.connect()?.send(command)?;
        debug!(
            socket = %self.path().display(),
            bytes = response.len(),
            "received reply"
        );
        Ok(response)
    }
}

/// `UnixStream::connect` blocks while the listener's backlog is full and std offers no connect
/// timeout, so it runs on a helper thread.
///
/// On timeout the helper is abandoned: it stays blocked until the kernel accepts or refuses the
/// connection, then drops the stream. At most one helper per timed-out call can be pending.
fn connect_within(path: &Path, timeout: Duration) -> Result<UnixStream, Error> {
    let (tx, rx) = mpsc::channel();
    let target = path.to_path_buf();
    thread::Builder::new()
        .name("hapadmin-connect".into())
        .spawn(move || {
            let _ = tx.send(UnixStream::connect(target));
        })?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result.map_err(|err| classify(path, err)),
        Err(_) => Err(Error::Timeout {
            socket: path.to_path_buf(),
        }),
    }
}

fn check_rejection(socket: &Path, response: &str) -> Result<(), Error> {
    let message = response.trim();
    if message.starts_with(UNKNOWN_COMMAND) {
        return Err(Error::Application {
            socket: socket.to_path_buf(),
            message: message.lines().next().unwrap_or(message).to_string(),
        });
    }
    if message.starts_with(PERMISSION_DENIED) {
        return Err(Error::Permission {
            socket: socket.to_path_buf(),
            reason: message.to_string(),
        });
    }
    Ok(())
}

/// Map an I/O failure on `socket` into the error taxonomy.
fn classify(socket: &Path, err: io::Error) -> Error {
    let socket = socket.to_path_buf();
    match err.kind() {
        io::ErrorKind::PermissionDenied => Error::Permission {
            socket,
            reason: err.to_string(),
        },
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => Error::Timeout { socket },
        io::ErrorKind::NotFound
        | io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe => Error::Connection {
            socket,
            source: err,
        },
        _ => Error::Io(err),
    }
}
