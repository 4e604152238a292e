//! 投递流程端到端测试
//!
//! 使用 ScriptedLink 模拟发射器回显，验证重试、校验与计数器提交。

mod common;

use common::*;
use rts_driver::{CounterError, CounterStore, DriverError, ParseError, Payload, Remote, RemoteBuilder};
use rts_link::MockLink;
use rts_protocol::{Action, CommandCode, Frame};
use std::sync::Arc;

#[test]
fn test_verified_send_commits_counter() {
    let dir = tempfile::tempdir().unwrap();
    let link = Arc::new(ScriptedLink::echoing());
    let remote = remote_with(link.clone(), &dir);
    remote.counters().save(remote.settings().device("figuier").unwrap(), 5).unwrap();

    let result = remote.execute("send('figuier', 'up')").unwrap();

    assert!(result.verified);
    assert!(result.counter_committed);
    assert_eq!(result.attempts, 1);
    assert_eq!(result.bytes_sent, b"A7 8A 8A 8F 9D A9 FF".to_vec());
    assert_eq!(result.shutter.as_deref(), Some("figuier"));
    assert!(matches!(result.payload, Payload::Rts(_)));
    assert_eq!(counter(&remote, "figuier"), 6);
    assert_eq!(link.writes(), vec![b"A7 8A 8A 8F 9D A9 FF".to_vec()]);
}

#[test]
fn test_override_leaves_counter_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let link = Arc::new(ScriptedLink::echoing());
    let remote = remote_with(link, &dir);

    let result = remote.execute("send('figuier', 'up', 2543)").unwrap();

    assert!(result.verified);
    assert!(!result.counter_committed);
    assert_eq!(counter(&remote, "figuier"), 0);
}

#[test]
fn test_silent_link_exhausts_attempts() {
    let dir = tempfile::tempdir().unwrap();
    let link = Arc::new(ScriptedLink::silent());
    let remote = remote_with(link.clone(), &dir);

    let result = remote.execute("send('figuier', 'down')").unwrap();

    assert!(!result.verified);
    assert!(!result.counter_committed);
    assert_eq!(result.attempts, 10);
    assert!(result.bytes_received.is_empty());
    assert_eq!(counter(&remote, "figuier"), 0);

    assert_eq!(link.writes().len(), 10);
    assert_eq!(link.count(&LinkEvent::Disconnect), 10);
    assert_eq!(link.count(&LinkEvent::Connect), 10);
}

#[test]
fn test_flaky_link_recovers() {
    let dir = tempfile::tempdir().unwrap();
    let link = Arc::new(ScriptedLink::flaky(3));
    let remote = remote_with(link.clone(), &dir);

    let result = remote.execute("send('volet framboisiers', 'my')").unwrap();

    assert!(result.verified);
    assert!(result.counter_committed);
    assert_eq!(result.attempts, 4);
    assert_eq!(counter(&remote, "volet framboisiers"), 1);
    // 每次失败后断开并重连
    assert_eq!(link.count(&LinkEvent::Disconnect), 3);
    assert_eq!(link.count(&LinkEvent::Connect), 3);
}

#[test]
fn test_failed_override_still_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let link = Arc::new(ScriptedLink::silent());
    let remote = remote_with(link, &dir);

    let result = remote.execute("send('figuier', 'up', 12)").unwrap();
    assert!(!result.verified);
    assert!(!result.counter_committed);
    assert_eq!(counter(&remote, "figuier"), 0);
}

#[test]
fn test_parse_error_never_transmits() {
    let dir = tempfile::tempdir().unwrap();
    let link = Arc::new(ScriptedLink::echoing());
    let remote = remote_with(link.clone(), &dir);

    for text in [
        "send('figuier')",
        "send('cerisier', 'up')",
        "send('figuier', 'open')",
        "hello",
        "senéx('figuier', 'up')",
    ] {
        assert!(
            matches!(remote.execute(text), Err(DriverError::Parse(_))),
            "{text}"
        );
    }
    assert!(link.writes().is_empty());
    assert_eq!(counter(&remote, "figuier"), 0);
}

#[test]
fn test_pulse_is_passthrough() {
    let dir = tempfile::tempdir().unwrap();
    let link = Arc::new(ScriptedLink::echoing());
    let remote = remote_with(link.clone(), &dir);

    let result = remote.execute("pulse(7, 250)").unwrap();

    assert!(result.verified);
    assert!(!result.counter_committed);
    assert_eq!(result.shutter, None);
    assert_eq!(result.payload, Payload::Pulse("pulse(7, 250)".to_string()));
    assert_eq!(link.writes(), vec![b"pulse(7, 250)".to_vec()]);
    assert_eq!(counter(&remote, "figuier"), 0);
}

#[test]
fn test_reset_precedes_every_write() {
    let dir = tempfile::tempdir().unwrap();
    let link = Arc::new(ScriptedLink::flaky(2));
    let remote = remote_with(link.clone(), &dir);

    remote.execute("send('figuier', 'up')").unwrap();

    let events = link.events();
    for (index, event) in events.iter().enumerate() {
        if matches!(event, LinkEvent::Write(_)) {
            assert_eq!(events[index - 1], LinkEvent::Reset);
            assert_eq!(events[index + 1], LinkEvent::Read);
        }
    }
}

#[test]
fn test_disconnected_link_connects_and_still_sends() {
    let dir = tempfile::tempdir().unwrap();
    let link = Arc::new(ScriptedLink::echoing().disconnected());
    let remote = remote_with(link.clone(), &dir);

    let result = remote.execute("send('figuier', 'up')").unwrap();

    let events = link.events();
    assert_eq!(events[0], LinkEvent::Check);
    assert_eq!(events[1], LinkEvent::Connect);
    // 连接失败不致命
    assert!(result.verified);
    assert_eq!(counter(&remote, "figuier"), 1);
}

#[test]
fn test_unreadable_counter_fails_before_transmit() {
    let dir = tempfile::tempdir().unwrap();
    let link = Arc::new(ScriptedLink::echoing());
    let remote = remote_with(link.clone(), &dir);
    let device = remote.settings().device("figuier").unwrap();
    std::fs::write(remote.counters().path_for(device), "not a number").unwrap();

    assert!(matches!(
        remote.execute("send('figuier', 'up')"),
        Err(DriverError::Counter(_))
    ));
    assert!(link.writes().is_empty());
}

#[test]
fn test_recipe_uses_consecutive_counters() {
    let dir = tempfile::tempdir().unwrap();
    let link = Arc::new(ScriptedLink::echoing());
    let remote = remote_with(link.clone(), &dir);

    let results = remote.execute_recipe("night_down").unwrap();

    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.verified && r.counter_committed));
    assert_eq!(counter(&remote, "figuier"), 2);
    assert_eq!(counter(&remote, "volet framboisiers"), 1);

    let expected = [
        Frame::for_action(Action::Named(CommandCode::Down), 0, 0x123456),
        Frame::for_action(Action::Named(CommandCode::Down), 0, 0xABCDEF),
        Frame::for_action(Action::Named(CommandCode::My), 1, 0x123456),
    ];
    let sent: Vec<Vec<u8>> = results.iter().map(|r| r.bytes_sent.clone()).collect();
    let expected: Vec<Vec<u8>> = expected.iter().map(Frame::wire_bytes).collect();
    assert_eq!(sent, expected);
    assert_eq!(link.writes(), expected);
}

#[test]
fn test_recipe_with_unreadable_counter_sends_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let link = Arc::new(ScriptedLink::echoing());
    let remote = remote_with(link.clone(), &dir);
    let device = remote.settings().device("volet framboisiers").unwrap();
    std::fs::write(remote.counters().path_for(device), "junk").unwrap();

    assert!(matches!(
        remote.execute_recipe("night_down"),
        Err(DriverError::Counter(CounterError::Unreadable { .. }))
    ));
    assert!(link.writes().is_empty());
    assert_eq!(counter(&remote, "figuier"), 0);
}

/// 每次写入后删除 figuier 的计数器文件，使提交失败
fn remote_losing_counter(dir: &tempfile::TempDir) -> (Arc<ScriptedLink>, Remote) {
    let settings = test_settings(dir);
    let path = CounterStore::new(settings.counters_path.clone()).path_for(settings.device("figuier").unwrap());
    let link = Arc::new(ScriptedLink::echoing().on_write(move || {
        let _ = std::fs::remove_file(&path);
    }));
    (link.clone(), remote_with(link, dir))
}

#[test]
fn test_commit_failure_after_verified_send() {
    let dir = tempfile::tempdir().unwrap();
    let (link, remote) = remote_losing_counter(&dir);

    let result = remote.execute("send('figuier', 'up')").unwrap();

    assert!(result.verified);
    assert!(!result.counter_committed);
    assert_eq!(result.attempts, 1);
    assert_eq!(link.writes().len(), 1);
    let device = remote.settings().device("figuier").unwrap();
    assert!(matches!(remote.counters().read(device), Err(CounterError::Missing { .. })));
}

#[test]
fn test_recipe_abort_keeps_completed_results() {
    let dir = tempfile::tempdir().unwrap();
    let (link, remote) = remote_losing_counter(&dir);

    match remote.execute_recipe("night_down") {
        Err(DriverError::RecipeAborted { recipe, completed, source }) => {
            assert_eq!(recipe, "night_down");
            assert_eq!(completed.len(), 2);
            assert!(completed[0].verified && !completed[0].counter_committed);
            assert!(completed[1].verified && completed[1].counter_committed);
            assert!(matches!(*source, DriverError::Counter(CounterError::Missing { .. })));
        },
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(link.writes().len(), 2);
    assert_eq!(counter(&remote, "volet framboisiers"), 1);
}

#[test]
fn test_closed_port_on_read_is_unverified() {
    let dir = tempfile::tempdir().unwrap();
    let link = Arc::new(ScriptedLink::port_lost());
    let remote = remote_with(link.clone(), &dir);

    let result = remote.execute("send('figuier', 'up')").unwrap();

    assert!(!result.verified);
    assert!(!result.counter_committed);
    assert_eq!(result.attempts, 10);
    assert!(result.bytes_received.is_empty());
    assert_eq!(link.count(&LinkEvent::Read), 10);
    assert_eq!(counter(&remote, "figuier"), 0);
}

#[test]
fn test_unknown_recipe() {
    let dir = tempfile::tempdir().unwrap();
    let link = Arc::new(ScriptedLink::echoing());
    let remote = remote_with(link.clone(), &dir);

    assert!(matches!(
        remote.execute_recipe("morning_up"),
        Err(DriverError::Parse(ParseError::UnknownRecipe(_)))
    ));
    assert!(link.writes().is_empty());
}

#[test]
fn test_multiple_commands_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let link = Arc::new(ScriptedLink::echoing());
    let remote = remote_with(link.clone(), &dir);

    assert!(matches!(
        remote.execute("send('figuier', 'up')\nsend('figuier', 'down')"),
        Err(DriverError::Parse(ParseError::MultipleCommands(2)))
    ));
    assert!(link.writes().is_empty());
}

#[test]
fn test_mock_remote_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let remote = RemoteBuilder::new()
        .settings(test_settings(&dir))
        .link(Arc::new(MockLink::new()))
        .delivery_config(fast_config())
        .build()
        .unwrap();

    for expected in 1..=3 {
        let result = remote.execute("send('figuier', 'stop')").unwrap();
        assert!(result.verified);
        assert_eq!(counter(&remote, "figuier"), expected);
    }
}
