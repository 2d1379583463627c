use std::time::Duration;

use pretty_assertions::assert_eq;
use test_log::test;
use tokio::sync::oneshot;

use super::testing::*;
use super::transaction_manager::{CommitReason, TxState};
use super::*;
use crate::layout_engine::{Direction, LayoutKind};
use crate::model::snapshot::NodeSnapshot;

fn ms(n: u64) -> Duration { Duration::from_millis(n) }

/// One 1000x800 output with `views` tiled side by side, every configure
/// acknowledged.
fn setup(views: u64) -> (Reactor, Backend, Instant) {
    let (mut reactor, mut backend) = Reactor::new_for_test();
    let t0 = Instant::now();
    settle(&mut reactor, &mut backend, output_added("DP-1", 1000.0, 800.0), t0);
    for n in 1..=views {
        settle(&mut reactor, &mut backend, mapped(n), t0);
    }
    (reactor, backend, t0)
}

/// DP-1 and DP-2 side by side, 1000x800 each, with workspaces "1" and "2".
fn two_outputs() -> (Reactor, Backend, Instant) {
    let (mut reactor, mut backend) = Reactor::new_for_test();
    let t0 = Instant::now();
    settle(&mut reactor, &mut backend, output_added("DP-1", 1000.0, 800.0), t0);
    let right = Event::OutputAdded {
        name: "DP-2".into(),
        rect: Rect::new(1000.0, 0.0, 1000.0, 800.0),
    };
    settle(&mut reactor, &mut backend, right, t0);
    (reactor, backend, t0)
}

/// Presents with their surfaces sorted and the rects left out.
fn surfaces_of(
    presented: &[(String, Vec<(SurfaceId, Rect)>, bool)],
) -> Vec<(String, Vec<SurfaceId>, bool)> {
    presented
        .iter()
        .map(|(output, views, damaged)| {
            let mut surfaces: Vec<_> = views.iter().map(|&(s, _)| s).collect();
            surfaces.sort();
            (output.clone(), surfaces, *damaged)
        })
        .collect()
}

#[test]
fn mapping_configures_the_new_view() {
    let (mut reactor, mut backend, t0) = setup(0);
    reactor.handle_event_at(mapped(1), t0);
    let requests = backend.requests();
    assert_eq!(
        vec![(SurfaceId(1), Size::new(996.0, 774.0))],
        configures(&requests).into_iter().map(|(s, _, size)| (s, size)).collect::<Vec<_>>()
    );
    assert_eq!(vec![(SurfaceId(1), true)], activations(&requests));
    assert_eq!(vec![(SurfaceId(1), true)], visibility(&requests));
    assert!(presents(&requests).is_empty());
}

#[test]
fn commits_when_the_client_acks() {
    let (mut reactor, mut backend, t0) = setup(0);
    reactor.handle_event_at(mapped(1), t0);
    let requests = backend.requests();
    let output = reactor.store.output_by_name("DP-1").unwrap();
    assert_eq!(TxState::Pending, reactor.transactions.state(output));

    for ack in acks(&requests) {
        reactor.handle_event_at(ack, t0 + ms(50));
    }
    assert_eq!(
        vec![(
            "DP-1".to_owned(),
            vec![(SurfaceId(1), Rect::new(2.0, 24.0, 996.0, 774.0))],
            false
        )],
        presents(&backend.requests())
    );
    let record = reactor.transactions.history().last().unwrap();
    assert_eq!(CommitReason::AllAcked, record.reason);
    assert_eq!(t0 + ms(50), record.at);
    assert_eq!(ms(50), record.elapsed);
    assert_eq!(TxState::Committed, reactor.transactions.state(output));
}

#[test]
fn commits_at_the_deadline_without_ack() {
    let (mut reactor, mut backend, t0) = setup(0);
    reactor.handle_event_at(mapped(1), t0);
    backend.requests();
    assert_eq!(Some(t0 + ms(200)), reactor.transactions.next_deadline());

    reactor.handle_event_at(Event::TransactionTimeout, t0 + ms(199));
    assert!(presents(&backend.requests()).is_empty());

    reactor.handle_event_at(Event::TransactionTimeout, t0 + ms(200));
    let presented = presents(&backend.requests());
    assert_eq!(1, presented.len());
    assert!(presented[0].2, "a timed out commit damages the output");
    let record = reactor.transactions.history().last().unwrap();
    assert_eq!(CommitReason::Timeout, record.reason);
    assert_eq!(t0 + ms(200), record.at);
    assert_eq!(vec![reactor.view_of(1)], record.stale);
}

#[test]
fn late_ack_after_timeout_is_ignored() {
    let (mut reactor, mut backend, t0) = setup(0);
    reactor.handle_event_at(mapped(1), t0);
    let requests = backend.requests();
    reactor.handle_event_at(Event::TransactionTimeout, t0 + ms(200));
    backend.requests();
    for ack in acks(&requests) {
        reactor.handle_event_at(ack, t0 + ms(250));
    }
    assert!(backend.requests().is_empty());
}

#[test]
fn one_batch_builds_one_transaction() {
    let (mut reactor, mut backend, t0) = setup(3);
    let before = reactor.transactions.history().count();

    // Close the third view and grow the first within one loop iteration.
    let v1 = reactor.view_of(1);
    let v3 = reactor.view_of(3);
    reactor.surfaces.remove(&SurfaceId(3));
    reactor.store.destroy(v3, false).unwrap();
    reactor.layout.resize(&mut reactor.store, v1, 50.0, Direction::Right).unwrap();
    let t1 = t0 + ms(10);
    reactor.finish_batch(t1);

    let requests = backend.requests();
    let mut configured: Vec<_> = configures(&requests).into_iter().map(|(s, _, _)| s).collect();
    configured.sort();
    assert_eq!(vec![SurfaceId(1), SurfaceId(2)], configured);
    let output = reactor.store.output_by_name("DP-1").unwrap();
    assert!(reactor.transactions.pending(output).unwrap().superseded.is_empty());

    for ack in acks(&requests) {
        reactor.handle_event_at(ack, t1);
    }
    let presented = presents(&backend.requests());
    assert_eq!(1, presented.len());
    assert_eq!(2, presented[0].1.len());
    assert_eq!(before + 1, reactor.transactions.history().count());
}

#[test]
fn unmapping_during_transaction_does_not_block_it() {
    let (mut reactor, mut backend, t0) = setup(1);
    reactor.handle_event_at(mapped(2), t0);
    let mapped_requests = backend.requests();
    assert_eq!(2, configures(&mapped_requests).len());

    reactor.handle_event_at(unmapped(2), t0 + ms(5));
    let requests = backend.requests();
    // Surface 1 goes back to the full width.
    assert_eq!(
        vec![Size::new(996.0, 774.0)],
        configures(&requests).into_iter().map(|(_, _, size)| size).collect::<Vec<_>>()
    );
    let mut presented = presents(&mapped_requests);
    presented.extend(presents(&requests));
    for ack in acks(&requests) {
        reactor.handle_event_at(ack, t0 + ms(10));
        presented.extend(presents(&backend.requests()));
    }
    assert_eq!(
        vec![(
            "DP-1".to_owned(),
            vec![(SurfaceId(1), Rect::new(2.0, 24.0, 996.0, 774.0))],
            false
        )],
        presented
    );
    let record = reactor.transactions.history().last().unwrap();
    assert_eq!(CommitReason::AllAcked, record.reason);
    let output = reactor.store.output_by_name("DP-1").unwrap();
    assert_eq!(TxState::Committed, reactor.transactions.state(output));
}

#[test]
fn unmapping_the_only_unacked_view_commits_the_rest() {
    let (mut reactor, mut backend, t0) = setup(2);
    reactor.handle_event_at(mapped(3), t0);
    let requests = backend.requests();
    assert_eq!(3, configures(&requests).len());

    // Surface 2 goes away instead of answering.
    for ack in acks(&requests) {
        if !matches!(ack, Event::ConfigureAck { surface: SurfaceId(2), .. }) {
            reactor.handle_event_at(ack, t0 + ms(5));
        }
    }
    let mut presented = presents(&requests);
    presented.extend(presents(&backend.requests()));
    assert!(presented.is_empty());

    reactor.handle_event_at(unmapped(2), t0 + ms(10));
    let requests = backend.requests();
    presented.extend(presents(&requests));
    for ack in acks(&requests) {
        reactor.handle_event_at(ack, t0 + ms(15));
        presented.extend(presents(&backend.requests()));
    }
    assert_eq!(
        vec![("DP-1".to_owned(), vec![SurfaceId(1), SurfaceId(3)], false)],
        surfaces_of(&presented)
    );
    let record = reactor.transactions.history().last().unwrap();
    assert_eq!(CommitReason::AllAcked, record.reason);
    assert_eq!(None, reactor.transactions.next_deadline());
}

#[test]
fn moving_a_view_to_another_output_mid_transaction() {
    let (mut reactor, mut backend, t0) = two_outputs();
    settle(&mut reactor, &mut backend, mapped(1), t0);
    reactor.handle_event_at(mapped(2), t0);
    backend.requests();
    let left = reactor.store.output_by_name("DP-1").unwrap();
    let right = reactor.store.output_by_name("DP-2").unwrap();
    assert_eq!(TxState::Pending, reactor.transactions.state(left));

    // Workspace "2" lives on DP-2.
    reactor.handle_event_at(command(Command::MoveToWorkspace("2".into())), t0 + ms(1));
    let requests = backend.requests();
    assert!(presents(&requests).is_empty());
    let mut configured: Vec<_> =
        configures(&requests).into_iter().map(|(s, _, size)| (s, size)).collect();
    configured.sort_by_key(|&(s, _)| s);
    assert_eq!(
        vec![(SurfaceId(1), Size::new(996.0, 774.0)), (SurfaceId(2), Size::new(996.0, 774.0))],
        configured
    );

    let mut presented = Vec::new();
    for ack in acks(&requests) {
        reactor.handle_event_at(ack, t0 + ms(20));
        presented.extend(presents(&backend.requests()));
    }
    presented.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(
        vec![
            (
                "DP-1".to_owned(),
                vec![(SurfaceId(1), Rect::new(2.0, 24.0, 996.0, 774.0))],
                false
            ),
            (
                "DP-2".to_owned(),
                vec![(SurfaceId(2), Rect::new(1002.0, 24.0, 996.0, 774.0))],
                false
            ),
        ],
        presented
    );
    let reasons: Vec<_> = reactor.transactions.history().map(|r| r.reason).collect();
    assert_eq!(vec![CommitReason::AllAcked; 2], reasons[reasons.len() - 2..].to_vec());
    assert_eq!(TxState::Committed, reactor.transactions.state(left));
    assert_eq!(TxState::Committed, reactor.transactions.state(right));
    assert_eq!(None, reactor.transactions.next_deadline());
}

#[test]
fn removing_an_output_mid_transaction() {
    let (mut reactor, mut backend, t0) = two_outputs();
    settle(&mut reactor, &mut backend, mapped(1), t0);
    settle(&mut reactor, &mut backend, command(Command::Workspace("2".into())), t0);
    settle(&mut reactor, &mut backend, mapped(2), t0);
    reactor.handle_event_at(mapped(3), t0);
    reactor.handle_event_at(command(Command::Workspace("1".into())), t0);
    backend.requests();
    reactor.handle_event_at(mapped(4), t0);
    let mapped_requests = backend.requests();
    let left = reactor.store.output_by_name("DP-1").unwrap();
    let right = reactor.store.output_by_name("DP-2").unwrap();
    assert_eq!(TxState::Pending, reactor.transactions.state(left));
    assert_eq!(TxState::Pending, reactor.transactions.state(right));

    // Workspace "2" moves onto DP-1 behind workspace "1".
    reactor.handle_event_at(Event::OutputRemoved { name: "DP-2".into() }, t0 + ms(1));
    let requests = backend.requests();
    assert!(configures(&requests).is_empty());
    assert!(presents(&requests).is_empty());
    let mut hidden = visibility(&requests);
    hidden.sort();
    assert_eq!(vec![(SurfaceId(2), false), (SurfaceId(3), false)], hidden);

    let mut presented = Vec::new();
    for ack in acks(&mapped_requests) {
        reactor.handle_event_at(ack, t0 + ms(2));
        presented.extend(presents(&backend.requests()));
    }
    assert_eq!(
        vec![("DP-1".to_owned(), vec![SurfaceId(1), SurfaceId(4)], false)],
        surfaces_of(&presented)
    );
    assert_eq!(CommitReason::AllAcked, reactor.transactions.history().last().unwrap().reason);

    let switch = command(Command::Workspace("2".into()));
    let shown = settle(&mut reactor, &mut backend, switch, t0 + ms(3));
    assert_eq!(
        vec![("DP-1".to_owned(), vec![SurfaceId(2), SurfaceId(3)], false)],
        surfaces_of(&presents(&shown))
    );
    assert_eq!(CommitReason::AllAcked, reactor.transactions.history().last().unwrap().reason);
    assert_eq!(None, reactor.transactions.next_deadline());
}

#[test]
fn tabs_show_only_the_focused_view() {
    let (mut reactor, mut backend, t0) = setup(2);
    let tabbed = layout(LayoutCommand::SetLayout(LayoutKind::Tabbed));
    let requests = settle(&mut reactor, &mut backend, tabbed, t0);
    assert_eq!(vec![(SurfaceId(1), false)], visibility(&requests));

    let left = layout(LayoutCommand::MoveFocus(Direction::Left));
    let requests = settle(&mut reactor, &mut backend, left, t0);
    let mut changes = visibility(&requests);
    changes.sort();
    assert_eq!(vec![(SurfaceId(1), true), (SurfaceId(2), false)], changes);
    assert_eq!(Some(reactor.view_of(1)), reactor.store.focused(reactor.default_seat));
}

#[test]
fn focus_moves_within_a_split_without_relayout() {
    let (mut reactor, mut backend, t0) = setup(2);
    reactor.handle_event_at(layout(LayoutCommand::MoveFocus(Direction::Left)), t0);
    let requests = backend.requests();
    let mut changes = activations(&requests);
    changes.sort();
    assert_eq!(vec![(SurfaceId(1), true), (SurfaceId(2), false)], changes);
    assert!(configures(&requests).is_empty());
    assert!(presents(&requests).is_empty());
}

#[test]
fn activation_is_shared_between_seats() {
    let mut config = Config::default();
    config.seats = vec!["seat0".into(), "seat1".into()];
    let (mut reactor, mut backend) = Reactor::new_for_test_with(config);
    let t0 = Instant::now();
    settle(&mut reactor, &mut backend, output_added("DP-1", 1000.0, 800.0), t0);
    settle(&mut reactor, &mut backend, mapped(1), t0);
    settle(&mut reactor, &mut backend, mapped(2), t0);

    let click = Event::Input { seat: Some("seat1".into()), surface: SurfaceId(1) };
    let requests = settle(&mut reactor, &mut backend, click, t0);
    // Surface 2 stays active: seat0 still focuses it.
    assert_eq!(vec![(SurfaceId(1), true)], activations(&requests));

    let unknown = Event::Input { seat: Some("seat9".into()), surface: SurfaceId(1) };
    reactor.handle_event_at(unknown, t0);
    assert!(backend.requests().is_empty());
}

#[test]
fn switching_workspaces_hides_and_cleans_up() {
    let (mut reactor, mut backend, t0) = setup(1);
    let requests = settle(&mut reactor, &mut backend, command(Command::Workspace("2".into())), t0);
    assert_eq!(vec![(SurfaceId(1), false)], visibility(&requests));
    assert!(reactor.store.workspace_by_name("2").is_some());

    let requests = settle(&mut reactor, &mut backend, command(Command::Workspace("1".into())), t0);
    assert_eq!(vec![(SurfaceId(1), true)], visibility(&requests));
    assert_eq!(None, reactor.store.workspace_by_name("2"));
    assert_eq!(Some(reactor.view_of(1)), reactor.store.focused(reactor.default_seat));
}

#[test]
fn move_to_workspace_keeps_focus_behind() {
    let (mut reactor, mut backend, t0) = setup(2);
    let requests =
        settle(&mut reactor, &mut backend, command(Command::MoveToWorkspace("3".into())), t0);
    assert_eq!(vec![(SurfaceId(2), false)], visibility(&requests));
    let ws3 = reactor.store.workspace_by_name("3").unwrap();
    assert_eq!(Some(ws3), reactor.store.graph().workspace_of(reactor.view_of(2)));
    assert_eq!(Some(reactor.view_of(1)), reactor.store.focused(reactor.default_seat));
}

#[test]
fn scratchpad_show_and_hide() {
    let (mut reactor, mut backend, t0) = setup(2);
    let requests = settle(&mut reactor, &mut backend, command(Command::MoveToScratchpad), t0);
    assert_eq!(vec![(SurfaceId(2), false)], visibility(&requests));
    assert_eq!(Some(reactor.view_of(1)), reactor.store.focused(reactor.default_seat));

    let requests = settle(&mut reactor, &mut backend, command(Command::ScratchpadShow), t0);
    assert_eq!(vec![(SurfaceId(2), true)], visibility(&requests));
    let v2 = reactor.view_of(2);
    assert!(reactor.store.graph().is_floating(reactor.store.parent(v2).unwrap()));
    assert_eq!(Some(v2), reactor.store.focused(reactor.default_seat));

    let requests = settle(&mut reactor, &mut backend, command(Command::ScratchpadShow), t0);
    assert_eq!(vec![(SurfaceId(2), false)], visibility(&requests));
}

#[test]
fn tiling_a_shown_scratchpad_window_takes_it_out() {
    let (mut reactor, mut backend, t0) = setup(2);
    settle(&mut reactor, &mut backend, command(Command::MoveToScratchpad), t0);
    settle(&mut reactor, &mut backend, command(Command::ScratchpadShow), t0);
    let requests = settle(&mut reactor, &mut backend, layout(LayoutCommand::ToggleFloating), t0);
    assert_eq!(2, configures(&requests).len());
    assert!(reactor.store.scratchpad().is_empty());

    // The window stays tiled; there is nothing left to show or hide.
    let requests = settle(&mut reactor, &mut backend, command(Command::ScratchpadShow), t0);
    assert!(visibility(&requests).is_empty());
    let v2 = reactor.view_of(2);
    assert!(!reactor.store.graph().is_floating(reactor.store.parent(v2).unwrap()));
}

#[test]
fn removed_output_parks_workspaces_until_next_output() {
    let (mut reactor, mut backend, t0) = setup(1);
    let removed = Event::OutputRemoved { name: "DP-1".into() };
    let requests = settle(&mut reactor, &mut backend, removed, t0);
    assert_eq!(vec![(SurfaceId(1), false)], visibility(&requests));
    assert!(reactor.store.outputs().is_empty());

    let added = output_added("HDMI-A-1", 1920.0, 1080.0);
    let requests = settle(&mut reactor, &mut backend, added, t0);
    assert_eq!(vec![(SurfaceId(1), true)], visibility(&requests));
    assert_eq!(
        vec![Size::new(1916.0, 1054.0)],
        configures(&requests).into_iter().map(|(_, _, size)| size).collect::<Vec<_>>()
    );
    let hdmi = reactor.store.output_by_name("HDMI-A-1").unwrap();
    assert_eq!(Some(hdmi), reactor.store.graph().output_of(reactor.view_of(1)));
}

#[test]
fn disabled_output_hides_its_views() {
    let (mut reactor, mut backend, t0) = setup(1);
    let off = Event::OutputChanged {
        name: "DP-1".into(),
        rect: Rect::new(0.0, 0.0, 1000.0, 800.0),
        enabled: false,
    };
    let requests = settle(&mut reactor, &mut backend, off, t0);
    assert_eq!(vec![(SurfaceId(1), false)], visibility(&requests));
}

#[test]
fn no_atomic_presents_immediately() {
    let (mut reactor, mut backend, t0) = setup(0);
    reactor.handle_event_at(command(Command::Debug(DebugCommand::NoAtomic(true))), t0);
    reactor.handle_event_at(mapped(1), t0);
    let requests = backend.requests();
    assert_eq!(1, configures(&requests).len());
    assert_eq!(1, presents(&requests).len());
    let record = reactor.transactions.history().last().unwrap();
    assert_eq!(CommitReason::NoAtomic, record.reason);
}

#[test]
fn wait_full_deadline_holds_acked_transactions() {
    let (mut reactor, mut backend, t0) = setup(0);
    reactor.handle_event_at(command(Command::Debug(DebugCommand::WaitFullDeadline(true))), t0);
    reactor.handle_event_at(mapped(1), t0);
    let requests = backend.requests();
    for ack in acks(&requests) {
        reactor.handle_event_at(ack, t0 + ms(1));
    }
    assert!(presents(&backend.requests()).is_empty());
    reactor.handle_event_at(Event::TransactionTimeout, t0 + ms(200));
    let presented = presents(&backend.requests());
    assert_eq!(1, presented.len());
    assert!(!presented[0].2);
}

#[test]
fn close_asks_the_client() {
    let (mut reactor, mut backend, t0) = setup(2);
    reactor.handle_event_at(command(Command::Close), t0);
    assert_eq!(vec![Request::Close { surface: SurfaceId(2) }], backend.requests());
    // Nothing changes until the client unmaps.
    assert!(reactor.store.contains(reactor.view_of(2)));
}

#[test]
fn invalid_commands_leave_the_tree_alone() {
    let (mut reactor, mut backend, t0) = setup(0);
    let before = NodeSnapshot::capture(&reactor.store, reactor.store.root());
    reactor.handle_event_at(layout(LayoutCommand::SetLayout(LayoutKind::Floating)), t0);
    let stray = Event::ConfigureAck {
        surface: SurfaceId(42),
        serial: None,
        size: Size::new(1.0, 1.0),
    };
    reactor.handle_event_at(stray, t0);
    assert!(backend.requests().is_empty());
    assert_eq!(before, NodeSnapshot::capture(&reactor.store, reactor.store.root()));
}

#[test]
fn queries_answer_without_recording() {
    let (mut reactor, _backend, t0) = setup(2);
    let (tx, mut rx) = oneshot::channel();
    reactor.handle_event_at(Event::Query(Query::Workspaces(tx)), t0);
    let workspaces = rx.try_recv().unwrap();
    assert_eq!(1, workspaces.len());
    assert_eq!("1", workspaces[0].name);
    assert_eq!(Some("DP-1".to_owned()), workspaces[0].output);
    assert_eq!(2, workspaces[0].windows);
    assert!(workspaces[0].visible && workspaces[0].focused);

    let (tx, mut rx) = oneshot::channel();
    reactor.handle_event_at(Event::Query(Query::Focused { seat: None, response: tx }), t0);
    let focused = rx.try_recv().unwrap().unwrap();
    assert_eq!(Some(2), focused.surface);

    let (tx, mut rx) = oneshot::channel();
    reactor.handle_event_at(Event::Query(Query::Transactions(tx)), t0);
    let transactions = rx.try_recv().unwrap();
    assert_eq!(TxState::Committed, transactions[0].state);
}

#[test]
fn replaying_a_recording_rebuilds_the_tree() {
    let temp = tempfile::NamedTempFile::new().unwrap();
    let path = temp.path().to_owned();
    let (tx, _rx) = actor::channel();
    let mut reactor = Reactor::new(Config::default(), Record::new_for_test(temp), tx);
    reactor.handle_event(output_added("DP-1", 1000.0, 800.0));
    reactor.handle_event(mapped(1));
    reactor.handle_event(mapped(2));
    reactor.handle_event(layout(LayoutCommand::SetLayout(LayoutKind::Stacked)));
    reactor.handle_event(command(Command::Workspace("2".into())));
    let (query, _) = oneshot::channel();
    reactor.handle_event(Event::Query(Query::Tree(query)));

    let mut requests = 0;
    let replayed = replay(&path, |_| requests += 1).unwrap();
    assert!(requests > 0);
    assert_eq!(
        NodeSnapshot::capture(&reactor.store, reactor.store.root()),
        NodeSnapshot::capture(replayed.store(), replayed.store().root())
    );
}

#[test(tokio::test(start_paused = true))]
async fn run_commits_on_timer() {
    let (mut reactor, mut backend) = Reactor::new_for_test();
    reactor.handle_event(output_added("DP-1", 1000.0, 800.0));
    backend.requests();
    let (events_tx, events_rx) = actor::channel();

    let driver = async move {
        events_tx.send(mapped(1));
        tokio::time::sleep(ms(199)).await;
        assert!(presents(&backend.requests()).is_empty());

        tokio::time::sleep(ms(2)).await;
        let presented = presents(&backend.requests());
        assert_eq!(1, presented.len());
        assert!(presented[0].2);
        drop(events_tx);
    };
    tokio::join!(reactor.run(events_rx), driver);
}
