use std::path::Path;

use clap::Parser;

use super::*;

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn defaults_keep_the_ledger_in_memory() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert!(settings.ledger.journal_path.is_none());
    assert_eq!(settings.ledger.event_capacity, DEFAULT_EVENT_CAPACITY);
    assert_eq!(settings.query, QueryLimits::default());
    assert_eq!(settings.server.addr.port(), DEFAULT_PORT);
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn blank_journal_path_means_memory_only() {
    let mut raw = RawSettings::default();
    raw.ledger.journal_path = Some(PathBuf::new());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.ledger.journal_path.is_none());
}

#[test]
fn zero_event_capacity_is_rejected() {
    let mut raw = RawSettings::default();
    raw.apply_ledger_overrides(&LedgerOverrides {
        event_capacity: Some(0),
        ..Default::default()
    });

    let err = Settings::from_raw(raw).expect_err("capacity must be positive");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "ledger.event_capacity",
            ..
        }
    ));
}

#[test]
fn default_page_size_must_fit_under_the_maximum() {
    let mut raw = RawSettings::default();
    raw.query.default_page_size = Some(50);
    raw.query.max_page_size = Some(25);

    let err = Settings::from_raw(raw).expect_err("default above max");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "query.default_page_size",
            ..
        }
    ));
}

#[test]
fn lowered_maximum_caps_the_default() {
    let mut raw = RawSettings::default();
    raw.query.max_page_size = Some(5);

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.query.default_page_size, 5);
    assert_eq!(settings.query.max_page_size, 5);
}

#[test]
fn invalid_log_level_is_reported_with_its_key() {
    let mut raw = RawSettings::default();
    raw.logging.level = Some("chatty".to_string());

    let err = Settings::from_raw(raw).expect_err("unknown level");
    assert!(matches!(err, LoadError::Invalid { key: "logging.level", .. }));
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["marquee"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_invoke_arguments() {
    let args = CliArgs::parse_from([
        "marquee",
        "invoke",
        "--ledger-journal",
        "/tmp/marquee.jsonl",
        "ratings",
        "SubmitRating",
        "r1",
        "e1",
        "films",
        "bob",
        "-1",
    ]);

    match args.command.expect("invoke command") {
        Command::Invoke(invoke) => {
            assert_eq!(
                invoke.ledger.journal_path.as_deref(),
                Some(Path::new("/tmp/marquee.jsonl"))
            );
            assert_eq!(invoke.contract, "ratings");
            assert_eq!(invoke.operation, "SubmitRating");
            assert_eq!(invoke.args, ["r1", "e1", "films", "bob", "-1"]);
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_history_arguments() {
    let args = CliArgs::parse_from([
        "marquee",
        "history",
        "request",
        "tt1375666",
        "--limit",
        "5",
    ]);

    match args.command.expect("history command") {
        Command::History(history) => {
            assert_eq!(history.tag, "request");
            assert_eq!(history.components, ["tt1375666"]);
            assert_eq!(history.limit, Some(5));
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn history_requires_a_key_component() {
    let result = CliArgs::try_parse_from(["marquee", "history", "request"]);
    assert!(result.is_err());
}

#[test]
fn invoke_overrides_only_touch_the_ledger() {
    let args = CliArgs::parse_from([
        "marquee",
        "invoke",
        "--ledger-event-capacity",
        "8",
        "entries",
        "GetEntryCount",
        "films",
    ]);
    let mut raw = RawSettings::default();
    if let Some(Command::Invoke(invoke)) = args.command.as_ref() {
        raw.apply_ledger_overrides(&invoke.ledger);
    }

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.ledger.event_capacity, 8);
    assert_eq!(settings.server.addr.port(), DEFAULT_PORT);
}
