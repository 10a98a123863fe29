mod support;

use logtrace_common::protocol::{BridgeMessage, ElementReport};
use logtrace_common::snapshot::{ElementSnapshot, Position, Rect};
use logtrace_core::bridge::{FrameBridge, HandshakeState, OriginMode, SETTLE_DELAY_MS};
use logtrace_core::session::TargetEvent;
use support::{FakeElement, FakeFrameHost, FrameOrigin, HostCall};

fn frame(origin: FrameOrigin) -> (FakeFrameHost, FrameBridge<FakeFrameHost>) {
    let host = FakeFrameHost::new(origin, Rect::new(50.0, 50.0, 400.0, 300.0));
    let bridge = FrameBridge::new(host.clone());
    (host, bridge)
}

fn loaded(origin: FrameOrigin) -> (FakeFrameHost, FrameBridge<FakeFrameHost>) {
    let (host, mut bridge) = frame(origin);
    bridge.on_frame_load(0);
    assert!(bridge.tick(SETTLE_DELAY_MS));
    host.clear_calls();
    (host, bridge)
}

fn report(tag: &str, id: &str, x: f64, y: f64) -> ElementReport {
    ElementReport {
        element_info: ElementSnapshot {
            tag: tag.into(),
            id: id.into(),
            ..ElementSnapshot::default()
        },
        mouse_position: Position::new(x, y),
    }
}

// ============================================================================
// Origin detection
// ============================================================================

#[test]
fn test_starts_unknown_and_activation_before_load_is_deferred() {
    let (host, mut bridge) = frame(FrameOrigin::Cross);
    bridge.activate();
    assert_eq!(bridge.origin_mode(), OriginMode::Unknown);
    assert!(host.calls().is_empty());
}

#[test]
fn test_deactivate_before_load_is_safe() {
    let (host, mut bridge) = frame(FrameOrigin::Same);
    bridge.deactivate();
    bridge.activate();
    bridge.deactivate();
    bridge.deactivate();
    assert!(host.calls().is_empty());
    assert!(!bridge.is_active());
}

#[test]
fn test_probe_waits_for_settle_delay() {
    let (host, mut bridge) = frame(FrameOrigin::Same);
    bridge.on_frame_load(1_000);
    assert!(!bridge.tick(1_000 + SETTLE_DELAY_MS - 1));
    assert!(host.calls().is_empty());
    assert!(bridge.tick(1_000 + SETTLE_DELAY_MS));
    assert_eq!(bridge.origin_mode(), OriginMode::SameOrigin);
    assert!(!bridge.has_pending_probe());
}

#[test]
fn test_second_load_reschedules_probe() {
    let (host, mut bridge) = frame(FrameOrigin::Same);
    bridge.on_frame_load(0);
    bridge.on_frame_load(80);
    assert!(!bridge.tick(SETTLE_DELAY_MS));
    assert!(bridge.tick(80 + SETTLE_DELAY_MS));
    let probes = host.calls().iter().filter(|c| **c == HostCall::Probe).count();
    assert_eq!(probes, 1);
}

#[test]
fn test_probe_due_in_tracks_latest_load() {
    let (_host, mut bridge) = frame(FrameOrigin::Same);
    assert_eq!(bridge.probe_due_in(0), None);

    bridge.on_frame_load(0);
    assert_eq!(bridge.probe_due_in(0), Some(SETTLE_DELAY_MS));
    bridge.on_frame_load(80);
    // a timer armed by the first load wakes early and must wait out the rest
    assert!(!bridge.tick(SETTLE_DELAY_MS));
    assert_eq!(bridge.probe_due_in(SETTLE_DELAY_MS), Some(80));
    assert_eq!(bridge.probe_due_in(500), Some(0));
    assert!(bridge.tick(500));
    assert_eq!(bridge.probe_due_in(500), None);
}

#[test]
fn test_probe_outcomes() {
    for (origin, expected) in [
        (FrameOrigin::Same, OriginMode::SameOrigin),
        (FrameOrigin::Cross, OriginMode::CrossOrigin),
        (FrameOrigin::NullDocument, OriginMode::CrossOrigin),
        (FrameOrigin::Detached, OriginMode::CrossOrigin),
        (FrameOrigin::InjectionFails, OriginMode::CrossOrigin),
    ] {
        let (_host, bridge) = loaded(origin);
        assert_eq!(bridge.origin_mode(), expected, "origin {:?}", origin);
    }
}

// ============================================================================
// Same-origin handshake
// ============================================================================

#[test]
fn test_same_origin_injects_agent_and_awaits_ready() {
    let (host, mut bridge) = frame(FrameOrigin::Same);
    bridge.activate();
    bridge.on_frame_load(0);
    bridge.tick(SETTLE_DELAY_MS);

    assert!(host.calls().contains(&HostCall::Inject(0)));
    assert_eq!(bridge.handshake(), Some(HandshakeState::AwaitingReady));
    // activate is held back until the agent is ready
    assert!(host.posted().is_empty());

    bridge.handle_message::<FakeElement>(BridgeMessage::Ready);
    assert_eq!(bridge.handshake(), Some(HandshakeState::ReadyActive));
    assert_eq!(host.posted(), vec![BridgeMessage::Activate]);
}

#[test]
fn test_ready_while_inactive_then_activation() {
    let (host, mut bridge) = loaded(FrameOrigin::Same);
    bridge.handle_message::<FakeElement>(BridgeMessage::Ready);
    assert_eq!(bridge.handshake(), Some(HandshakeState::ReadyInactive));
    assert!(host.posted().is_empty());

    bridge.activate();
    bridge.activate();
    assert_eq!(host.posted(), vec![BridgeMessage::Activate]);

    bridge.deactivate();
    bridge.deactivate();
    assert_eq!(
        host.posted(),
        vec![BridgeMessage::Activate, BridgeMessage::Deactivate]
    );
    assert_eq!(bridge.handshake(), Some(HandshakeState::ReadyInactive));
}

#[test]
fn test_hover_reports_dropped_until_ready_and_active() {
    let (_host, mut bridge) = loaded(FrameOrigin::Same);
    let ev = bridge.handle_message::<FakeElement>(BridgeMessage::ElementHover(report("a", "", 1.0, 1.0)));
    assert!(ev.is_none());

    bridge.activate();
    let ev = bridge.handle_message::<FakeElement>(BridgeMessage::ElementHover(report("a", "", 1.0, 1.0)));
    assert!(ev.is_none(), "still awaiting ready");

    bridge.handle_message::<FakeElement>(BridgeMessage::Ready);
    let ev = bridge.handle_message::<FakeElement>(BridgeMessage::ElementHover(report("a", "", 1.0, 1.0)));
    assert!(matches!(ev, Some(TargetEvent::Hover { .. })));
}

#[test]
fn test_same_origin_reports_become_target_events() {
    let (_host, mut bridge) = loaded(FrameOrigin::Same);
    bridge.activate();
    bridge.handle_message::<FakeElement>(BridgeMessage::Ready);

    let hover = bridge
        .handle_message::<FakeElement>(BridgeMessage::ElementHover(report("button", "cta", 5.0, 6.0)))
        .expect("hover event");
    assert_eq!(hover.capture().snapshot.id, "cta");
    assert!(hover.capture().node.is_none());
    assert_eq!(bridge.current_hover().unwrap().tag, "button");

    let click = bridge
        .handle_message::<FakeElement>(BridgeMessage::ElementClick(report("button", "cta", 7.0, 8.0)))
        .expect("click event");
    assert!(matches!(click, TargetEvent::Click { .. }));
    assert_eq!(click.position(), Position::new(7.0, 8.0));

    let debug = bridge
        .handle_message::<FakeElement>(BridgeMessage::DebugElement(report("button", "cta", 7.0, 8.0)))
        .expect("debug event");
    assert!(matches!(debug, TargetEvent::DebugRequested { .. }));
}

#[test]
fn test_commands_echoed_back_are_ignored() {
    let (host, mut bridge) = loaded(FrameOrigin::Same);
    bridge.handle_message::<FakeElement>(BridgeMessage::Ready);
    assert!(bridge.handle_message::<FakeElement>(BridgeMessage::Activate).is_none());
    assert_eq!(bridge.handshake(), Some(HandshakeState::ReadyInactive));
    assert!(host.posted().is_empty());
}

// ============================================================================
// Cross-origin capture layer
// ============================================================================

#[test]
fn test_cross_origin_activation_installs_layer() {
    let (host, mut bridge) = loaded(FrameOrigin::Cross);
    assert!(host.layer().is_none());

    bridge.activate();
    assert_eq!(host.layer(), Some(Rect::new(50.0, 50.0, 400.0, 300.0)));
    assert!(!host.pointer_events());

    bridge.deactivate();
    assert!(host.layer().is_none());
    assert!(host.pointer_events());
}

#[test]
fn test_cross_origin_degraded_snapshot() {
    let (_host, mut bridge) = loaded(FrameOrigin::Cross);
    bridge.activate();

    let event = bridge
        .on_layer_pointer_move::<FakeElement>(Position::new(150.0, 200.0))
        .expect("hover event");
    let snapshot = &event.capture().snapshot;
    assert_eq!(snapshot.tag, "iframe-element");
    assert!(snapshot.text.contains("(100, 150)"), "text was {:?}", snapshot.text);
    assert!(snapshot.classes.is_empty());
    assert!(snapshot.attributes.is_empty());
    assert_eq!(snapshot.size.width, 0);
    assert_eq!(snapshot.size.height, 0);
    assert_eq!(event.position(), Position::new(100.0, 150.0));
}

#[test]
fn test_cross_origin_click_promotes_hover() {
    let (_host, mut bridge) = loaded(FrameOrigin::Cross);
    bridge.activate();
    bridge.on_layer_pointer_move::<FakeElement>(Position::new(150.0, 200.0));

    let click = bridge
        .on_layer_click::<FakeElement>(Position::new(150.0, 200.0))
        .expect("click event");
    assert!(matches!(click, TargetEvent::Click { .. }));
    assert!(click.capture().snapshot.text.contains("(100, 150)"));

    let debug = bridge.on_layer_debug_key::<FakeElement>().expect("debug event");
    assert!(matches!(debug, TargetEvent::DebugRequested { .. }));
}

#[test]
fn test_layer_events_ignored_when_inactive() {
    let (_host, mut bridge) = loaded(FrameOrigin::Cross);
    assert!(bridge.on_layer_pointer_move::<FakeElement>(Position::new(60.0, 60.0)).is_none());
    assert!(bridge.on_layer_click::<FakeElement>(Position::new(60.0, 60.0)).is_none());
}

#[test]
fn test_bridge_messages_ignored_in_cross_origin_mode() {
    let (host, mut bridge) = loaded(FrameOrigin::Cross);
    bridge.activate();
    assert!(bridge.handle_message::<FakeElement>(BridgeMessage::Ready).is_none());
    assert!(bridge
        .handle_message::<FakeElement>(BridgeMessage::ElementHover(report("a", "", 1.0, 1.0)))
        .is_none());
    assert!(host.posted().is_empty());
}

#[test]
fn test_layer_follows_geometry_changes() {
    let (host, mut bridge) = loaded(FrameOrigin::Cross);
    bridge.activate();
    host.0.rect.set(Rect::new(0.0, 100.0, 200.0, 200.0));
    bridge.on_frame_geometry_changed();
    assert_eq!(host.layer(), Some(Rect::new(0.0, 100.0, 200.0, 200.0)));
}

// ============================================================================
// Mode switching
// ============================================================================

#[test]
fn test_switch_cross_to_same_tears_down_layer_first() {
    let (host, mut bridge) = loaded(FrameOrigin::Cross);
    bridge.activate();
    assert!(bridge.capture_layer_installed());
    host.clear_calls();

    host.navigate(FrameOrigin::Same);
    bridge.on_frame_load(500);
    bridge.tick(500 + SETTLE_DELAY_MS);

    let calls = host.calls();
    let removed = calls.iter().position(|c| *c == HostCall::RemoveLayer).unwrap();
    let restored = calls.iter().position(|c| *c == HostCall::PointerEvents(true)).unwrap();
    let injected = calls.iter().position(|c| *c == HostCall::Inject(1)).unwrap();
    assert!(removed < injected && restored < injected);
    assert!(host.layer().is_none());
    assert!(!bridge.capture_layer_installed());
    assert_eq!(bridge.origin_mode(), OriginMode::SameOrigin);

    bridge.handle_message::<FakeElement>(BridgeMessage::Ready);
    assert_eq!(host.posted(), vec![BridgeMessage::Activate]);
}

#[test]
fn test_switch_same_to_cross_deactivates_agent_first() {
    let (host, mut bridge) = loaded(FrameOrigin::Same);
    bridge.activate();
    bridge.handle_message::<FakeElement>(BridgeMessage::Ready);
    host.clear_calls();

    host.navigate(FrameOrigin::Cross);
    bridge.on_frame_load(10);
    bridge.tick(10 + SETTLE_DELAY_MS);

    let calls = host.calls();
    let deactivated = calls
        .iter()
        .position(|c| *c == HostCall::Post(BridgeMessage::Deactivate))
        .unwrap();
    let layered = calls
        .iter()
        .position(|c| matches!(c, HostCall::ShowLayer(_)))
        .unwrap();
    assert!(deactivated < layered);
    assert_eq!(bridge.origin_mode(), OriginMode::CrossOrigin);
    assert_eq!(bridge.handshake(), None);
    assert!(bridge.capture_layer_installed());
}

#[test]
fn test_modes_never_overlap_across_navigations() {
    let (host, mut bridge) = frame(FrameOrigin::Same);
    bridge.activate();
    let sequence = [
        FrameOrigin::Same,
        FrameOrigin::Cross,
        FrameOrigin::Cross,
        FrameOrigin::Same,
        FrameOrigin::Detached,
        FrameOrigin::Same,
    ];
    let mut now = 0;
    for origin in sequence {
        host.navigate(origin);
        bridge.on_frame_load(now);
        now += SETTLE_DELAY_MS;
        bridge.tick(now);
        if bridge.origin_mode() == OriginMode::SameOrigin {
            bridge.handle_message::<FakeElement>(BridgeMessage::Ready);
        }

        let same = bridge.handshake().is_some();
        let layered = bridge.capture_layer_installed();
        assert!(!(same && layered));
        assert_eq!(host.layer().is_some(), layered);
        assert_eq!(host.pointer_events(), !layered);
    }
}

#[test]
fn test_dropping_bridge_removes_layer() {
    let (host, mut bridge) = loaded(FrameOrigin::Cross);
    bridge.activate();
    drop(bridge);
    assert!(host.layer().is_none());
    assert!(host.pointer_events());
}

#[test]
fn test_hover_cleared_by_navigation() {
    let (host, mut bridge) = loaded(FrameOrigin::Cross);
    bridge.activate();
    bridge.on_layer_pointer_move::<FakeElement>(Position::new(60.0, 60.0));
    assert!(bridge.current_hover().is_some());

    host.navigate(FrameOrigin::Cross);
    bridge.on_frame_load(0);
    bridge.tick(SETTLE_DELAY_MS);
    assert!(bridge.current_hover().is_none());
    assert!(bridge.capture_layer_installed());
}
