mod common;

use hapadmin::models::{EntityKind, Setting};
use hapadmin::requests::{Action, GlobalOption, RateLimit};
use hapadmin::Error;

use common::{backend, frontend, server, stats, MockSocket};

#[test]
fn negative_maxconn_contacts_no_socket() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockSocket::with_stats(dir.path(), "stats1", stats(&[frontend("www", "1", "5")]));
    let hap = common::connect(dir.path());
    let www = hap.get(EntityKind::Frontend, "www").unwrap().value;

    assert!(matches!(
        hap.apply(&www, &Action::SetMaxconn(-1)),
        Err(Error::Validation(_))
    ));
    assert!(mock.writes().is_empty());
}

#[test]
fn enable_server_only_where_it_lives() {
    let dir = tempfile::tempdir().unwrap();
    let first = MockSocket::with_stats(
        dir.path(),
        "stats1",
        stats(&[
            backend("app", "1", "0"),
            server("app", "web1", "1", "MAINT", "0"),
        ]),
    );
    let second = MockSocket::with_stats(dir.path(), "stats2", stats(&[frontend("www", "2", "1")]));
    let hap = common::connect(dir.path());

    let web1 = hap.get(EntityKind::Server, "app/web1").unwrap().value;
    let report = hap.apply(&web1, &Action::Enable).unwrap();

    assert!(report.is_success());
    assert_eq!(report.results.len(), 1);
    assert_eq!(first.writes(), vec!["enable server app/web1"]);
    assert!(second.writes().is_empty());
}

#[test]
fn partial_failure_names_failing_sockets() {
    let dir = tempfile::tempdir().unwrap();
    let rows = stats(&[frontend("www", "1", "5")]);
    let _ok = MockSocket::with_stats(dir.path(), "stats1", rows.clone());
    let refusing = MockSocket::spawn(dir.path(), "stats2", move |command| {
        if command == "show stat" {
            Some(rows.clone())
        } else {
            Some("Frontend is already disabled.\n".into())
        }
    });
    let hap = common::connect(dir.path());
    let www = hap.get(EntityKind::Frontend, "www").unwrap().value;

    let report = hap.apply(&www, &Action::Disable).unwrap();
    assert!(!report.is_success());
    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.failed_endpoints(), vec![refusing.path.as_path()]);
    assert_eq!(report.command.to_string(), "disable frontend www");
}

#[test]
fn every_socket_refusing_fails_the_call() {
    let dir = tempfile::tempdir().unwrap();
    let rows = stats(&[frontend("www", "1", "5")]);
    let _mocks: Vec<MockSocket> = ["stats1", "stats2"]
        .into_iter()
        .map(|name| {
            let rows = rows.clone();
            MockSocket::spawn(dir.path(), name, move |command| {
                if command == "show stat" {
                    Some(rows.clone())
                } else {
                    Some("No such frontend.\n".into())
                }
            })
        })
        .collect();
    let hap = common::connect(dir.path());
    let www = hap.get(EntityKind::Frontend, "www").unwrap().value;

    match hap.apply(&www, &Action::Shutdown) {
        Err(Error::AllEndpointsFailed(failures)) => {
            assert_eq!(failures.len(), 2);
            assert!(matches!(failures[0].error, Error::Application { .. }));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn backends_accept_no_action() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockSocket::with_stats(dir.path(), "stats1", stats(&[backend("app", "1", "0")]));
    let hap = common::connect(dir.path());
    let app = hap.get(EntityKind::Backend, "app").unwrap().value;

    assert!(matches!(
        hap.apply(&app, &Action::Disable),
        Err(Error::Validation(_))
    ));
    assert!(mock.writes().is_empty());
}

#[test]
fn global_actions_reach_every_process() {
    let dir = tempfile::tempdir().unwrap();
    let first = MockSocket::spawn(dir.path(), "stats1", |_| Some(String::new()));
    let second = MockSocket::spawn(dir.path(), "stats2", |_| Some(String::new()));
    let hap = common::connect(dir.path());

    let report = hap
        .apply_global(&Action::ClearCounters { all: true })
        .unwrap();
    assert!(report.is_success());

    let report = hap
        .apply_global(&GlobalOption::RateLimitSslSess.action(100))
        .unwrap();
    assert_eq!(report.results.len(), 2);

    for mock in [&first, &second] {
        assert_eq!(
            mock.commands(),
            vec![
                "clear counters all",
                "set rate-limit ssl-sessions global 100"
            ]
        );
    }
    assert!(matches!(
        hap.apply_global(&Action::SetRateLimit(RateLimit::Sessions, -5)),
        Err(Error::Validation(_))
    ));
}

#[test]
fn global_options_read_back_per_process() {
    let dir = tempfile::tempdir().unwrap();
    let _first = MockSocket::spawn(dir.path(), "stats1", |_| Some(common::info("1", "2000", "10")));
    let second = MockSocket::spawn(dir.path(), "stats2", |_| Some(common::info("2", "3000", "15")));
    let hap = common::connect(dir.path());

    assert_eq!(hap.total_requests().unwrap().value, Some(25));
    assert_eq!(hap.maxconn().unwrap().value, Some(5000));
    assert_eq!(hap.global_metric("Uptime_sec").unwrap().value, Some(120));

    let options = hap.options().unwrap().value;
    let (option, maxconn) = &options[0];
    assert_eq!(*option, GlobalOption::Maxconn);
    match maxconn {
        Some(Setting::PerProcess(values)) => {
            assert_eq!(values.get(&second.path), Some(&Some(3000)));
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(options[1].1, Some(Setting::Uniform(Some(0))));
}
