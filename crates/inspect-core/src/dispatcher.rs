// ── Event dispatcher ──
//
// Pure routing from push events to state updates and effects. The
// dispatcher owns the observed node state, the dpi, a copy of the session
// and the active label; it performs no I/O. The actor task feeds it events
// and runs the effects it returns.

use std::sync::Arc;

use inspect_api::node::models::Detection;
use inspect_api::{EventKind, NodeEvent};
use tracing::{debug, info, warn};

use crate::model::{AccessLevel, Label, NodeState, Session};

/// Session-notice state meaning "logged in".
const SESSION_ACTIVE: &str = "0";

/// Work the dispatcher asks for. Effects needing device I/O run outside
/// the actor.
#[derive(Debug, Clone)]
pub enum Effect {
    /// Re-fetch the loaded job (with masks).
    RefreshJob,
    /// Start a new repeat-buffer generation.
    ClearRepeats,
    /// The node began capturing a label.
    LabelBegan,
    /// A setup image was captured for the active label.
    ProcessCapture {
        repeat: Option<u32>,
        label: Arc<Label>,
    },
    /// Detection finished; create sectors from these detections.
    LearnSectors {
        repeat: Option<u32>,
        detections: Vec<Detection>,
        label: Arc<Label>,
    },
    /// The node finished a label; fetch and deliver its report.
    DeliverRepeat { repeat: u32, label: Arc<Label> },
    /// Another client took control; end the local session.
    ForceLogout,
}

#[derive(Debug, Default)]
pub struct Dispatcher {
    state: NodeState,
    dpi: Option<u32>,
    session: Option<Session>,
    label: Option<Arc<Label>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn dpi(&self) -> Option<u32> {
        self.dpi
    }

    pub fn label(&self) -> Option<&Arc<Label>> {
        self.label.as_ref()
    }

    pub fn set_session(&mut self, session: Option<Session>) {
        self.session = session;
    }

    pub fn activate_label(&mut self, label: Arc<Label>) {
        self.label = Some(label);
    }

    pub fn take_label(&mut self) -> Option<Arc<Label>> {
        self.label.take()
    }

    fn in_control(&self) -> bool {
        self.session.as_ref().is_some_and(Session::is_control)
    }

    /// Apply one event and return the effects it triggers, in order.
    pub fn handle(&mut self, event: &NodeEvent) -> Vec<Effect> {
        let mut effects = Vec::new();
        debug!(name = %event.name, source = ?event.source, state = %self.state, "node event");

        match &event.kind {
            EventKind::Heartbeat { state, current_dpi } => {
                if current_dpi.is_some() {
                    self.dpi = *current_dpi;
                }
                if let Some(state) = state {
                    self.observe(NodeState::from_device(state), false, &mut effects);
                }
            }
            EventKind::StateChange { from, to } => {
                let next = NodeState::from_device(to);
                self.observe(next, true, &mut effects);

                let fresh_run = next == NodeState::Running
                    && NodeState::from_device(from) != NodeState::Paused;
                if next == NodeState::Editing || fresh_run {
                    effects.push(Effect::ClearRepeats);
                }
            }
            EventKind::SessionStateChange {
                token,
                access_level,
                state,
                ..
            } => {
                if self.is_takeover(token.as_deref(), access_level.as_deref(), state.as_deref()) {
                    info!("control session taken over by another client");
                    // Drop our copy so repeated notices do not log out twice.
                    self.session = None;
                    effects.push(Effect::ForceLogout);
                }
            }
            EventKind::LabelBegin { .. } => effects.push(Effect::LabelBegan),
            EventKind::LabelEnd { repeat } => {
                let label = self.label.take();
                match (label, repeat) {
                    (Some(label), Some(repeat)) if self.in_control() => {
                        effects.push(Effect::DeliverRepeat {
                            repeat: *repeat,
                            label,
                        });
                    }
                    (label, _) => {
                        debug!(
                            had_label = label.is_some(),
                            control = self.in_control(),
                            "labelEnd without deliverable repeat"
                        );
                    }
                }
            }
            EventKind::SetupCapture { repeat } => {
                if let Some(label) = self.editing_label() {
                    effects.push(Effect::ProcessCapture {
                        repeat: *repeat,
                        label,
                    });
                }
            }
            EventKind::SetupDetectEnd { repeat, detections } => {
                if let Some(label) = self.editing_label() {
                    effects.push(Effect::LearnSectors {
                        repeat: *repeat,
                        detections: detections.clone(),
                        label,
                    });
                }
            }
            EventKind::SetupDetectBegin
            | EventKind::SetupDetectProgress
            | EventKind::SectorBegin
            | EventKind::SectorEnd => {}
            EventKind::Unknown { .. } => {
                warn!(name = %event.name, "unknown event type");
            }
        }

        effects
    }

    /// Record an observed state. A job refresh follows any transition into
    /// a non-idle state; explicit transitions always count.
    fn observe(&mut self, next: NodeState, explicit: bool, effects: &mut Vec<Effect>) {
        let changed = next != self.state;
        if changed {
            debug!(from = %self.state, to = %next, "node state changed");
        }
        self.state = next;

        if (changed || explicit) && next != NodeState::Idle {
            effects.push(Effect::RefreshJob);
        }
    }

    /// Active label, if the node is editing and we hold control.
    fn editing_label(&self) -> Option<Arc<Label>> {
        if self.state != NodeState::Editing || !self.in_control() {
            return None;
        }
        self.label.clone()
    }

    fn is_takeover(
        &self,
        token: Option<&str>,
        access_level: Option<&str>,
        state: Option<&str>,
    ) -> bool {
        let Some(ref session) = self.session else {
            return false;
        };
        let control = AccessLevel::Control.as_ref();
        session.is_control()
            && state == Some(SESSION_ACTIVE)
            && access_level == Some(control)
            && !token.is_some_and(|t| session.has_token(t))
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LabelHandler;
    use pretty_assertions::assert_eq;
    use secrecy::SecretString;
    use serde_json::{Value, json};

    fn event(name: &str, data: Value) -> NodeEvent {
        NodeEvent::from_value(json!({"event": {"source": "node1", "name": name, "data": data}}))
            .unwrap()
    }

    fn state_change(from: &str, to: &str) -> NodeEvent {
        event("stateChange", json!({"fromState": from, "toState": to}))
    }

    fn session(token: &str, level: AccessLevel) -> Session {
        Session {
            token: SecretString::from(token.to_owned()),
            access_level: level,
            user_id: "admin".into(),
        }
    }

    fn control() -> Dispatcher {
        let mut d = Dispatcher::new();
        d.set_session(Some(session("T1", AccessLevel::Control)));
        d
    }

    fn label() -> Arc<Label> {
        Arc::new(Label::new(LabelHandler::CameraDetect))
    }

    fn names(effects: &[Effect]) -> Vec<&'static str> {
        effects
            .iter()
            .map(|e| match e {
                Effect::RefreshJob => "refresh",
                Effect::ClearRepeats => "clear",
                Effect::LabelBegan => "begin",
                Effect::ProcessCapture { .. } => "capture",
                Effect::LearnSectors { .. } => "learn",
                Effect::DeliverRepeat { .. } => "deliver",
                Effect::ForceLogout => "logout",
            })
            .collect()
    }

    // ── State machine ───────────────────────────────────────────────

    #[test]
    fn final_state_is_last_to_state() {
        let mut d = Dispatcher::new();
        for (from, to) in [("idle", "editing"), ("editing", "running"), ("running", "paused")] {
            d.handle(&state_change(from, to));
        }
        assert_eq!(d.state(), NodeState::Paused);
    }

    #[test]
    fn state_change_refreshes_unless_idle() {
        let mut d = Dispatcher::new();
        assert_eq!(names(&d.handle(&state_change("offline", "idle"))), Vec::<&str>::new());
        assert_eq!(names(&d.handle(&state_change("idle", "paused"))), vec!["refresh"]);
        // Explicit notice of the current state still refreshes.
        assert_eq!(names(&d.handle(&state_change("paused", "paused"))), vec!["refresh"]);
    }

    #[test]
    fn heartbeat_refreshes_only_on_change() {
        let mut d = Dispatcher::new();
        let hb = event("heartbeat", json!({"state": "editing", "Current_dpi": 600}));
        assert_eq!(names(&d.handle(&hb)), vec!["refresh"]);
        assert_eq!(names(&d.handle(&hb)), Vec::<&str>::new());
        assert_eq!(d.dpi(), Some(600));
        assert_eq!(d.state(), NodeState::Editing);
    }

    #[test]
    fn unknown_device_state_is_offline() {
        let mut d = Dispatcher::new();
        d.handle(&state_change("idle", "editing"));
        d.handle(&event("heartbeat", json!({"state": "rebooting"})));
        assert_eq!(d.state(), NodeState::Offline);
    }

    #[test]
    fn editing_and_fresh_runs_clear_repeats() {
        let mut d = Dispatcher::new();
        assert_eq!(
            names(&d.handle(&state_change("idle", "editing"))),
            vec!["refresh", "clear"]
        );
        assert_eq!(
            names(&d.handle(&state_change("editing", "running"))),
            vec!["refresh", "clear"]
        );
        d.handle(&state_change("running", "paused"));
        assert_eq!(
            names(&d.handle(&state_change("paused", "running"))),
            vec!["refresh"]
        );
    }

    // ── Session takeover ────────────────────────────────────────────

    fn session_notice(token: &str) -> NodeEvent {
        event(
            "sessionStateChange",
            json!({"token": token, "id": "other", "accessLevel": "control", "state": "0"}),
        )
    }

    #[test]
    fn foreign_control_token_forces_one_logout() {
        let mut d = control();
        assert_eq!(names(&d.handle(&session_notice("T2"))), vec!["logout"]);
        assert_eq!(names(&d.handle(&session_notice("T2"))), Vec::<&str>::new());
    }

    #[test]
    fn own_token_is_not_a_takeover() {
        let mut d = control();
        assert!(d.handle(&session_notice("T1")).is_empty());
    }

    #[test]
    fn monitor_session_ignores_takeover() {
        let mut d = Dispatcher::new();
        d.set_session(Some(session("T1", AccessLevel::Monitor)));
        assert!(d.handle(&session_notice("T2")).is_empty());
    }

    #[test]
    fn logout_notice_is_not_a_takeover() {
        let mut d = control();
        let notice = event(
            "sessionStateChange",
            json!({"token": "T2", "accessLevel": "control", "state": "1"}),
        );
        assert!(d.handle(&notice).is_empty());
    }

    // ── Label lifecycle ─────────────────────────────────────────────

    #[test]
    fn label_end_delivers_and_clears() {
        let mut d = control();
        d.activate_label(label());
        let effects = d.handle(&event("labelEnd", json!({"repeat": 7})));
        assert!(matches!(effects[..], [Effect::DeliverRepeat { repeat: 7, .. }]));
        assert!(d.label().is_none());
    }

    #[test]
    fn label_end_clears_even_when_not_deliverable() {
        let mut d = Dispatcher::new();
        d.set_session(Some(session("T1", AccessLevel::Monitor)));
        d.activate_label(label());
        assert!(d.handle(&event("labelEnd", json!({"repeat": 7}))).is_empty());
        assert!(d.label().is_none());
    }

    #[test]
    fn capture_requires_editing() {
        let mut d = control();
        d.activate_label(label());
        assert!(d.handle(&event("setupCapture", json!({"repeat": 2}))).is_empty());

        d.handle(&state_change("idle", "editing"));
        let effects = d.handle(&event("setupCapture", json!({"repeat": 2})));
        assert!(matches!(
            effects[..],
            [Effect::ProcessCapture { repeat: Some(2), .. }]
        ));
        // The label stays active until labelEnd.
        assert!(d.label().is_some());
    }

    #[test]
    fn detect_end_carries_detections() {
        let mut d = control();
        d.handle(&state_change("idle", "editing"));
        d.activate_label(label());

        let effects = d.handle(&event(
            "setupDetectEnd",
            json!({"repeat": 1, "detections": [{"symbology": "upcA", "region": {"x": 1, "y": 2, "width": 3, "height": 4}}]}),
        ));
        let [Effect::LearnSectors { detections, .. }] = &effects[..] else {
            panic!("expected LearnSectors, got {effects:?}");
        };
        assert_eq!(detections.len(), 1);
    }

    #[test]
    fn label_begin_is_signalled() {
        let mut d = Dispatcher::new();
        assert_eq!(names(&d.handle(&event("labelBegin", json!({})))), vec!["begin"]);
    }
}
