mod common;

use std::time::{Duration, Instant};

use hapadmin::commands::Command;
use hapadmin::connection::{ConnectionBuilder, Endpoint, UnixSocketBuilder};
use hapadmin::parsers;
use hapadmin::Error;

use common::MockSocket;

#[test]
fn unix_socket_builder_sends_one_command() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockSocket::spawn(dir.path(), "stats1", |_| Some(common::info("1", "2000", "7")));

    let reply = UnixSocketBuilder::new(&mock.path)
        .connect()
        .unwrap()
        .send(&Command::ShowInfo)
        .unwrap();
    let info = parsers::parse_info(reply.as_bytes()).unwrap();

    assert_eq!(info.process_num().unwrap(), Some(1));
    assert_eq!(info.numeric("CumReq").unwrap(), Some(7));
    assert_eq!(mock.commands(), vec!["show info"]);
}

#[test]
fn missing_socket_is_a_connection_error() {
    let dir = tempfile::tempdir().unwrap();
    let endpoint = Endpoint::new(UnixSocketBuilder::new(dir.path().join("gone")));

    match endpoint.send(&Command::ShowStat) {
        Err(Error::Connection { socket, .. }) => assert_eq!(socket, dir.path().join("gone")),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn unknown_command_is_an_application_error() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockSocket::spawn(dir.path(), "stats1", |_| {
        Some("Unknown command. Please enter one of the following commands only :\n  help\n".into())
    });
    let endpoint = Endpoint::new(UnixSocketBuilder::new(&mock.path));

    match endpoint.send(&Command::ShowErrors) {
        Err(Error::Application { message, .. }) => assert!(message.starts_with("Unknown command")),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn permission_denied_is_a_permission_error() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockSocket::spawn(dir.path(), "stats1", |_| Some("Permission denied\n".into()));
    let endpoint = Endpoint::new(UnixSocketBuilder::new(&mock.path));

    assert!(matches!(
        endpoint.send(&Command::SetMaxconnGlobal(10)),
        Err(Error::Permission { .. })
    ));
}

#[test]
fn silent_socket_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockSocket::spawn(dir.path(), "stats1", |_| None);
    let endpoint =
        Endpoint::new(UnixSocketBuilder::new(&mock.path).timeout(Duration::from_millis(200)));

    let started = Instant::now();
    match endpoint.send(&Command::ShowStat) {
        Err(Error::Timeout { socket }) => assert_eq!(socket, mock.path),
        other => panic!("unexpected {:?}", other),
    }
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn trickling_reply_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockSocket::drip(
        dir.path(),
        "stats1",
        "Name: HAProxy\nPid: 1\n\n",
        Duration::from_millis(150),
    );
    let endpoint =
        Endpoint::new(UnixSocketBuilder::new(&mock.path).timeout(Duration::from_millis(200)));

    let started = Instant::now();
    match endpoint.send(&Command::ShowInfo) {
        Err(Error::Timeout { socket }) => assert_eq!(socket, mock.path),
        other => panic!("unexpected {:?}", other),
    }
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[test]
fn endpoint_reconnects_for_every_command() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockSocket::spawn(dir.path(), "stats1", |_| Some(String::new()));
    let endpoint = Endpoint::new(UnixSocketBuilder::new(&mock.path));

    endpoint.send(&Command::EnableFrontend("www".into())).unwrap();
    endpoint.send(&Command::DisableFrontend("www".into())).unwrap();

    assert_eq!(
        mock.commands(),
        vec!["enable frontend www", "disable frontend www"]
    );
}
