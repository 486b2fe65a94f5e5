#![allow(clippy::unwrap_used)]
// Controller integration tests: wiremock for the node's REST API and an
// in-process WebSocket server for its push events.

use std::sync::Arc;
use std::time::Duration;

use futures_util::SinkExt;
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use inspect_api::node::models::{GradingStandards, Mask, MaskLayer, Sector};
use inspect_core::{
    AccessLevel, Controller, CoreError, Credentials, DeviceProfile, ImageExchange, Label,
    LabelHandler, NodeConfig, NodeState, RestoreOutcome, SectorIntent, StandardsTable,
    WaitTimeouts,
};

// ── Harness ─────────────────────────────────────────────────────────

struct Node {
    server: MockServer,
    events: mpsc::UnboundedSender<String>,
    ctrl: Controller,
}

impl Node {
    fn push(&self, name: &str, data: Value) {
        let message = json!({
            "event": {
                "time": "2026-10-19T12:00:00Z",
                "source": "node0",
                "item": 0,
                "name": name,
                "data": data,
            }
        });
        self.events.send(message.to_string()).unwrap();
    }

    async fn wait_state(&self, target: NodeState) {
        let mut rx = self.ctrl.subscribe_state();
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| *s == target))
            .await
            .expect("state not reached")
            .unwrap();
    }

    async fn mount(&self, verb: &str, suffix: &str, response: ResponseTemplate) {
        Mock::given(method(verb))
            .and(path(node_path(suffix)))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }

    async fn expect(&self, verb: &str, suffix: &str, response: ResponseTemplate, times: u64) {
        Mock::given(method(verb))
            .and(path(node_path(suffix)))
            .respond_with(response)
            .expect(times)
            .mount(&self.server)
            .await;
    }

    /// Block until the node has seen `verb suffix`.
    async fn wait_request(&self, verb: &str, suffix: &str) {
        let wanted = node_path(suffix);
        for _ in 0..500 {
            let seen = self.server.received_requests().await.unwrap_or_default();
            if seen
                .iter()
                .any(|r| r.method.as_str() == verb && r.url.path() == wanted)
            {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("node never received {verb} {wanted}");
    }

    async fn requests(&self, verb: &str) -> Vec<(String, Value)> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.method.as_str() == verb)
            .map(|r| {
                let body = serde_json::from_slice(&r.body).unwrap_or(Value::Null);
                (r.url.path().to_owned(), body)
            })
            .collect()
    }
}

fn node_path(suffix: &str) -> String {
    format!("/api/printinspection/0/{suffix}")
}

fn ok() -> ResponseTemplate {
    ResponseTemplate::new(200)
}

fn ok_json(body: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(body)
}

fn waits() -> WaitTimeouts {
    WaitTimeouts {
        edit: Duration::from_secs(5),
        label_begin: Duration::from_secs(5),
        detect: Duration::from_secs(5),
        run: Duration::from_secs(5),
    }
}

/// One-connection WebSocket server; every string sent on the returned
/// channel becomes a text frame.
async fn event_server() -> (Url, mpsc::UnboundedSender<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        while let Some(text) = rx.recv().await {
            if ws.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    (Url::parse(&format!("ws://{addr}/events")).unwrap(), tx)
}

/// A node with a job named "Test" and no sectors, not yet logged in.
async fn node_with(waits: WaitTimeouts) -> Node {
    node_configured(|config| config.profile.waits = waits).await
}

/// Like [`node_with`], with `configure` applied to the controller's config.
async fn node_configured(configure: impl FnOnce(&mut NodeConfig)) -> Node {
    let server = MockServer::start().await;
    let (url, events) = event_server().await;
    let addr = server.address();

    let mut config = NodeConfig {
        host: addr.ip().to_string(),
        system_port: addr.port(),
        node: 0,
        credentials: Credentials {
            username: "admin".into(),
            password: SecretString::from("pw".to_owned()),
        },
        timeout: Duration::from_secs(5),
        event_stream_url: Some(url),
        profile: DeviceProfile {
            waits: waits(),
            ..DeviceProfile::default()
        },
        ..NodeConfig::default()
    };
    configure(&mut config);

    let node = Node {
        server,
        events,
        ctrl: Controller::new(config).unwrap(),
    };
    node.mount(
        "PUT",
        "security/login",
        ok().insert_header("Authorization", "T1"),
    )
    .await;
    node.mount(
        "GET",
        "inspection/job",
        ok_json(json!({"name": "Test", "sectors": []})),
    )
    .await;
    node
}

async fn logged_in(level: AccessLevel) -> Node {
    let node = node_with(waits()).await;
    node.ctrl.login(level).await.unwrap();
    node
}

/// Poll `check` until it holds or five seconds pass.
async fn eventually(check: impl Fn() -> bool) -> bool {
    for _ in 0..500 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

/// Wait until the actor has applied everything pushed so far.
async fn sync_state(node: &Node, state: &str, expected: NodeState) {
    node.push("heartbeat", json!({"state": state}));
    node.wait_state(expected).await;
}

// ── Session lifecycle ───────────────────────────────────────────────

#[tokio::test]
async fn login_caches_job_and_opens_stream() {
    let node = logged_in(AccessLevel::Control).await;

    assert!(node.ctrl.is_logged_in());
    assert!(node.ctrl.is_control());
    assert_eq!(node.ctrl.cache().job_name(), "Test");
    assert!(node.ctrl.stream_state().await.is_some());

    sync_state(&node, "idle", NodeState::Idle).await;

    node.ctrl.logout().await;
    assert!(!node.ctrl.is_logged_in());
    assert_eq!(node.ctrl.state(), NodeState::Offline);
    assert!(node.ctrl.cache().job().is_none());
}

#[tokio::test]
async fn login_rejected_without_token() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path(node_path("security/login")))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    let addr = server.address();
    let ctrl = Controller::new(NodeConfig {
        host: addr.ip().to_string(),
        system_port: addr.port(),
        node: 0,
        ..NodeConfig::default()
    })
    .unwrap();

    let result = ctrl.login(AccessLevel::Control).await;
    assert!(matches!(result, Err(CoreError::AuthenticationFailed { .. })));
    assert!(!ctrl.is_logged_in());
}

#[tokio::test]
async fn logout_wakes_waiting_operation() {
    let node = logged_in(AccessLevel::Control).await;
    node.mount("PUT", "inspection/job/stop", ok()).await;

    let ctrl = node.ctrl.clone();
    let task = tokio::spawn(async move { ctrl.switch_to_edit().await });
    node.wait_request("PUT", "inspection/job/stop").await;

    node.ctrl.logout().await;
    let result = task.await.unwrap();
    assert!(matches!(result, Err(CoreError::SessionClosed)), "got {result:?}");
}

// ── Takeover ────────────────────────────────────────────────────────

fn control_notice(token: &str) -> Value {
    json!({"token": token, "id": "other", "accessLevel": "control", "state": "0"})
}

#[tokio::test]
async fn foreign_control_session_forces_logout() {
    let node = logged_in(AccessLevel::Control).await;
    node.expect("PUT", "security/logout", ok(), 1).await;
    sync_state(&node, "editing", NodeState::Editing).await;

    node.push("sessionStateChange", control_notice("T2"));

    assert!(eventually(|| !node.ctrl.is_logged_in()).await);
    assert_eq!(node.ctrl.state(), NodeState::Offline);
}

#[tokio::test]
async fn own_control_session_is_kept() {
    let node = logged_in(AccessLevel::Control).await;
    node.expect("PUT", "security/logout", ok(), 1).await;

    node.push("sessionStateChange", control_notice("T1"));
    sync_state(&node, "editing", NodeState::Editing).await;

    assert!(node.ctrl.is_logged_in());
    node.ctrl.logout().await;
}

// ── State machine ───────────────────────────────────────────────────

#[tokio::test]
async fn switch_to_edit_waits_for_state_change() {
    let node = logged_in(AccessLevel::Control).await;
    node.expect("PUT", "inspection/job/stop", ok(), 1).await;
    sync_state(&node, "running", NodeState::Running).await;

    let ctrl = node.ctrl.clone();
    let task = tokio::spawn(async move { ctrl.switch_to_edit().await });
    node.wait_request("PUT", "inspection/job/stop").await;
    node.push("stateChange", json!({"fromState": "running", "toState": "editing"}));

    assert!(task.await.unwrap().unwrap());
    assert_eq!(node.ctrl.state(), NodeState::Editing);
    node.ctrl.logout().await;
}

#[tokio::test]
async fn switch_to_run_not_ready_sends_nothing() {
    let node = logged_in(AccessLevel::Control).await;
    node.mount(
        "GET",
        "inspection/job/isrunready",
        ResponseTemplate::new(200).set_body_string("NOTREADY"),
    )
    .await;
    node.expect("PUT", "repository/jobs/design/Test", ok(), 0).await;
    node.expect("PUT", "inspection/job/start", ok(), 0).await;
    sync_state(&node, "editing", NodeState::Editing).await;

    assert!(!node.ctrl.switch_to_run().await.unwrap());
    node.ctrl.logout().await;
}

#[tokio::test]
async fn switch_to_run_fails_at_deadline() {
    let node = node_with(WaitTimeouts {
        run: Duration::from_millis(300),
        ..waits()
    })
    .await;
    node.ctrl.login(AccessLevel::Control).await.unwrap();
    node.mount(
        "GET",
        "inspection/job/isrunready",
        ResponseTemplate::new(200).set_body_string("OK"),
    )
    .await;
    node.expect("PUT", "repository/jobs/design/Test", ok(), 1).await;
    node.expect("PUT", "inspection/job/start", ok(), 1).await;
    sync_state(&node, "editing", NodeState::Editing).await;

    assert!(!node.ctrl.switch_to_run().await.unwrap());
    node.ctrl.logout().await;
}

// ── Sector restoration ──────────────────────────────────────────────

fn sector(name: &str) -> Sector {
    Sector {
        name: name.into(),
        kind: "verify1D".into(),
        width: 100,
        height: 50,
        ..Sector::default()
    }
}

fn blemish(name: &str, layer_value: i64) -> Sector {
    Sector {
        name: name.into(),
        kind: "blemish".into(),
        blemish_mask: Some(Mask {
            width: 10,
            height: 10,
            states: vec![],
            layers: vec![MaskLayer {
                value: layer_value,
                run_length_encode: vec![0, 100],
            }],
        }),
        ..Sector::default()
    }
}

fn restore_label(sectors: Vec<Sector>) -> Label {
    Label::new(LabelHandler::CameraTrigger).with_sectors(SectorIntent::Restore(sectors))
}

#[tokio::test]
async fn restore_stops_at_first_failure() {
    let node = logged_in(AccessLevel::Control).await;
    node.expect("POST", "inspection/job/sectors/A", ok(), 1).await;
    node.expect("POST", "inspection/job/sectors/B", ResponseTemplate::new(500), 1)
        .await;
    node.expect("POST", "inspection/job/sectors/C", ok(), 0).await;

    let label = restore_label(vec![sector("A"), sector("B"), sector("C")]);
    let outcome = node.ctrl.restore_or_detect(&label).await;
    assert!(outcome.is_failure(), "got {outcome:?}");

    let posted: Vec<String> = node.requests("POST").await.into_iter().map(|(p, _)| p).collect();
    assert_eq!(
        posted,
        vec![
            node_path("inspection/job/sectors/A"),
            node_path("inspection/job/sectors/B")
        ]
    );
    node.ctrl.logout().await;
}

#[tokio::test]
async fn restore_deletes_existing_sectors_first() {
    let node = node_with(waits()).await;
    // Mounted ahead of the harness job: first match wins.
    Mock::given(method("GET"))
        .and(path(node_path("inspection/job")))
        .respond_with(ok_json(json!({
            "name": "Test",
            "sectors": [{"name": "old", "type": "verify2D"}]
        })))
        .with_priority(1)
        .mount(&node.server)
        .await;
    node.ctrl.login(AccessLevel::Control).await.unwrap();
    node.expect("DELETE", "inspection/job/sectors/old", ok(), 1).await;
    node.expect("POST", "inspection/job/sectors/A", ok(), 1).await;

    let outcome = node.ctrl.restore_or_detect(&restore_label(vec![sector("A")])).await;
    assert!(matches!(outcome, RestoreOutcome::Success), "got {outcome:?}");
    node.ctrl.logout().await;
}

#[tokio::test]
async fn empty_mask_layer_failure_is_tolerated() {
    let node = logged_in(AccessLevel::Control).await;
    node.mount("POST", "inspection/job/sectors/blem", ok()).await;
    node.expect(
        "PATCH",
        "inspection/job/sectors/blem/goldenImage/mask",
        ResponseTemplate::new(500),
        1,
    )
    .await;

    let outcome = node
        .ctrl
        .restore_or_detect(&restore_label(vec![blemish("blem", 0)]))
        .await;
    assert!(matches!(outcome, RestoreOutcome::Success), "got {outcome:?}");
    node.ctrl.logout().await;
}

#[tokio::test]
async fn painted_mask_layer_failure_fails() {
    let node = logged_in(AccessLevel::Control).await;
    node.mount("POST", "inspection/job/sectors/blem", ok()).await;
    node.mount(
        "PATCH",
        "inspection/job/sectors/blem/goldenImage/mask",
        ResponseTemplate::new(500),
    )
    .await;

    let outcome = node
        .ctrl
        .restore_or_detect(&restore_label(vec![blemish("blem", 255)]))
        .await;
    assert!(outcome.is_failure(), "got {outcome:?}");
    node.ctrl.logout().await;
}

#[tokio::test]
async fn detect_without_completion_fails_and_adds_nothing() {
    let node = node_with(WaitTimeouts {
        detect: Duration::from_millis(300),
        ..waits()
    })
    .await;
    node.ctrl.login(AccessLevel::Control).await.unwrap();
    node.mount("GET", "inspection/setup/detect", ok_json(json!({"active": false})))
        .await;
    node.expect("PUT", "inspection/setup/detect", ok(), 1).await;

    let label = Label::new(LabelHandler::CameraTrigger).with_sectors(SectorIntent::AutoDetect);
    let outcome = node.ctrl.restore_or_detect(&label).await;

    assert!(
        matches!(outcome, RestoreOutcome::Failure(CoreError::Timeout { .. })),
        "got {outcome:?}"
    );
    assert!(node.requests("POST").await.is_empty());
    node.ctrl.logout().await;
}

// ── End to end ──────────────────────────────────────────────────────

#[tokio::test]
async fn detect_learns_one_sector_per_class() {
    let node = node_with(waits()).await;
    node.mount(
        "GET",
        "inspection/verify/symbologies",
        ok_json(json!([
            {"symbology": "upcA", "symbolType": "upcA", "regionType": "verify1D", "directional": true},
            {"symbology": "dataMatrix", "symbolType": "dataMatrix", "regionType": "verify2D", "directional": false}
        ])),
    )
    .await;
    node.ctrl.login(AccessLevel::Control).await.unwrap();
    assert_eq!(node.ctrl.cache().job_name(), "Test");

    node.expect("PUT", "inspection/job/stop", ok(), 1).await;
    node.mount("GET", "inspection/setup/image/available", ok_json(json!([])))
        .await;
    node.mount("GET", "inspection/setup/detect", ok_json(json!({"active": false})))
        .await;
    node.expect("PUT", "inspection/setup/detect", ok(), 1).await;
    node.expect("POST", "inspection/job/sectors/verify1D_1", ok(), 1).await;
    node.expect("POST", "inspection/job/sectors/verify2D_1", ok(), 1).await;
    node.expect("PUT", "inspection/setup/inspect", ok(), 1).await;

    // Stop → Editing
    let ctrl = node.ctrl.clone();
    let edit = tokio::spawn(async move { ctrl.switch_to_edit().await });
    node.wait_request("PUT", "inspection/job/stop").await;
    node.push("stateChange", json!({"fromState": "idle", "toState": "editing"}));
    assert!(edit.await.unwrap().unwrap());

    // Auto-detect label
    let ctrl = node.ctrl.clone();
    let label = Arc::new(Label::new(LabelHandler::SimulatorDetect).with_table("5"));
    let process = tokio::spawn(async move { ctrl.process_label(None, label).await });
    node.wait_request("PUT", "inspection/setup/detect").await;

    node.push(
        "setupDetectEnd",
        json!({
            "repeat": 1,
            "detections": [
                {"symbology": "upcA", "region": {"x": 10, "y": 20, "width": 300, "height": 120}, "orientation": 0},
                {"symbology": "dataMatrix", "region": {"x": 400, "y": 30, "width": 80, "height": 80}, "orientation": 90}
            ]
        }),
    );
    assert!(process.await.unwrap().unwrap());

    let posted = node.requests("POST").await;
    let names: Vec<&str> = posted.iter().map(|(_, body)| body["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["verify1D_1", "verify2D_1"]);

    let (_, first) = &posted[0];
    assert_eq!(first["username"], "Verify1D_1");
    assert_eq!(first["top"], 20);
    assert_eq!(first["left"], 10);
    assert_eq!(first["gradingStandard"]["enabled"], true);
    assert_eq!(first["gradingStandard"]["tableId"], "5");

    node.ctrl.logout().await;
}

// ── Repeats ─────────────────────────────────────────────────────────

fn bmp() -> Vec<u8> {
    let mut image = vec![0_u8; 54];
    image[0] = b'B';
    image[1] = b'M';
    image
}

#[tokio::test]
async fn label_end_delivers_one_report() {
    let node = node_with(waits()).await;
    Mock::given(method("GET"))
        .and(path("/api/printinspection/product"))
        .respond_with(ok_json(json!({
            "name": "V275",
            "version": {"major": 1, "minor": 2, "service": 0, "build": 1000}
        })))
        .mount(&node.server)
        .await;
    node.ctrl.login(AccessLevel::Control).await.unwrap();

    node.expect(
        "GET",
        "inspection/repeat/reports/5",
        ok_json(json!({"overallGrade": "A"})),
        1,
    )
    .await;
    node.mount(
        "GET",
        "inspection/repeat/images/5",
        ResponseTemplate::new(200).set_body_bytes(bmp()),
    )
    .await;

    node.push("stateChange", json!({"fromState": "editing", "toState": "running"}));
    node.push("heartbeat", json!({"state": "running", "Current_dpi": 600}));
    node.wait_state(NodeState::Running).await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let label = Label::new(LabelHandler::CameraTrigger).on_repeat(move |repeat| {
        let _ = tx.send(repeat);
    });
    node.ctrl.activate_label(Arc::new(label)).await.unwrap();
    assert!(node.ctrl.label_active());

    node.push("labelEnd", json!({"repeat": 5}));
    let repeat = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(repeat.number, 5);
    let report = repeat.report.as_ref().unwrap();
    assert_eq!(report.report["overallGrade"], "A");
    assert_eq!(report.job.as_ref().unwrap()["jobVersion"], "1.2.0.1000");
    let image = report.image.as_ref().unwrap();
    assert_eq!(&image[38..42], &23622_i32.to_le_bytes());
    assert_eq!(&image[42..46], &23622_i32.to_le_bytes());

    assert!(!node.ctrl.label_active());
    assert!(node.ctrl.repeat(5).is_some());

    // A new edit session starts a new run.
    node.push("stateChange", json!({"fromState": "running", "toState": "editing"}));
    node.wait_state(NodeState::Editing).await;
    assert!(node.ctrl.repeats().is_empty());

    node.ctrl.logout().await;
}

// ── Label feeds ─────────────────────────────────────────────────────

#[tokio::test]
async fn printed_label_is_spooled_then_printing_enabled() {
    let node = logged_in(AccessLevel::Control).await;
    // Disabled for the first two reads of the toggle, enabled after the PUT.
    Mock::given(method("GET"))
        .and(path(node_path("inspection/print")))
        .respond_with(ok_json(json!({"enabled": false, "state": false, "override": false})))
        .up_to_n_times(2)
        .mount(&node.server)
        .await;
    node.mount(
        "GET",
        "inspection/print",
        ok_json(json!({"enabled": true, "state": true, "override": false})),
    )
    .await;
    node.expect("PUT", "inspection/print", ok(), 1).await;

    let spooled = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = Arc::clone(&spooled);
    let spooler = move |image: &[u8], dpi: Option<u32>| -> Result<(), CoreError> {
        sink.lock().unwrap().push((image.len(), dpi));
        Ok(())
    };

    let label = Label::new(LabelHandler::CameraTrigger)
        .with_image(vec![0_u8; 16])
        .with_dpi(300);
    assert!(node.ctrl.process_printed_label(label, &spooler).await.unwrap());

    assert_eq!(*spooled.lock().unwrap(), vec![(16, Some(300))]);
    assert!(node.ctrl.label_active());
    let puts = node.requests("PUT").await;
    let (_, body) = puts
        .iter()
        .find(|(p, _)| p == &node_path("inspection/print"))
        .unwrap();
    assert_eq!(body["enabled"], json!(true));

    node.ctrl.logout().await;
}

#[tokio::test]
async fn printed_label_without_image_is_refused() {
    let node = logged_in(AccessLevel::Monitor).await;
    let spooler = |_: &[u8], _: Option<u32>| -> Result<(), CoreError> {
        panic!("nothing to spool");
    };

    let label = Label::new(LabelHandler::CameraTrigger);
    assert!(!node.ctrl.process_printed_label(label, &spooler).await.unwrap());
    assert!(!node.ctrl.label_active());

    node.ctrl.logout().await;
}

#[tokio::test]
async fn remote_simulator_image_needs_dpi() {
    let node = logged_in(AccessLevel::Monitor).await;
    node.expect("PUT", "simulation/triggerimage", ok(), 1).await;

    let without_dpi = Label::new(LabelHandler::SimulatorTrigger).with_image(vec![0_u8; 8]);
    let result = node.ctrl.process_simulator_label(without_dpi).await;
    assert!(matches!(result, Err(CoreError::Precondition { .. })));
    assert!(!node.ctrl.label_active());

    let with_dpi = Label::new(LabelHandler::SimulatorTrigger)
        .with_image(vec![0_u8; 8])
        .with_dpi(600);
    assert!(node.ctrl.process_simulator_label(with_dpi).await.unwrap());
    assert!(node.ctrl.label_active());

    node.ctrl.logout().await;
}

// ── Reports ─────────────────────────────────────────────────────────

#[tokio::test]
async fn editing_report_inspects_first_and_stamps_job() {
    let node = logged_in(AccessLevel::Control).await;
    sync_state(&node, "editing", NodeState::Editing).await;
    node.expect("PUT", "inspection/setup/image", ok(), 1).await;
    node.expect("PUT", "inspection/setup/inspect", ok(), 1).await;
    node.expect(
        "GET",
        "inspection/setup/report",
        ok_json(json!({"overallGrade": "A"})),
        1,
    )
    .await;
    node.expect("PUT", "inspection/job/resume", ok(), 0).await;

    let report = node.ctrl.inspect_get_report(Some(3), false).await.unwrap();

    assert_eq!(report.report, json!({"overallGrade": "A"}));
    assert!(report.image.is_none());
    let job = report.job.unwrap();
    assert_eq!(job["name"], json!("Test"));
    assert_eq!(job["jobVersion"], json!("----"));

    node.ctrl.logout().await;
}

#[tokio::test]
async fn paused_report_removes_repeat_and_resumes() {
    let node = logged_in(AccessLevel::Control).await;
    sync_state(&node, "paused", NodeState::Paused).await;
    node.expect(
        "GET",
        "inspection/repeat/reports/4",
        ok_json(json!({"grade": 2.5})),
        1,
    )
    .await;
    node.expect("PUT", "inspection/setup/inspect", ok(), 0).await;
    node.expect("PUT", "inspection/stopevent/failure/removed/4", ok(), 1).await;
    node.expect("PUT", "inspection/job/resume", ok(), 1).await;

    let report = node.ctrl.inspect_get_report(Some(4), false).await.unwrap();
    assert_eq!(report.report, json!({"grade": 2.5}));

    node.ctrl.logout().await;
}

#[tokio::test]
async fn remove_repeat_takes_the_newest() {
    let node = logged_in(AccessLevel::Control).await;
    sync_state(&node, "editing", NodeState::Editing).await;
    node.mount("GET", "inspection/setup/image/available", ok_json(json!([9, 8]))).await;
    node.expect("PUT", "inspection/stopevent/failure/removed/9", ok(), 1).await;
    node.expect("PUT", "inspection/job/resume", ok(), 1).await;

    assert!(node.ctrl.remove_repeat().await.unwrap());

    node.ctrl.logout().await;
}

#[tokio::test]
async fn remove_repeat_without_repeats_sends_nothing() {
    let node = logged_in(AccessLevel::Control).await;
    sync_state(&node, "editing", NodeState::Editing).await;
    node.mount("GET", "inspection/setup/image/available", ok_json(json!([]))).await;
    node.expect("PUT", "inspection/job/resume", ok(), 0).await;

    assert!(!node.ctrl.remove_repeat().await.unwrap());

    node.ctrl.logout().await;
}

#[tokio::test]
async fn trigger_label_keeps_loaded_sectors() {
    let node = logged_in(AccessLevel::Control).await;
    node.expect("PUT", "inspection/setup/inspect", ok(), 1).await;

    let label = Arc::new(restore_label(vec![sector("A")]));
    assert!(node.ctrl.process_label(Some(0), label).await.unwrap());

    assert!(node.requests("POST").await.is_empty());
    assert!(node.requests("DELETE").await.is_empty());
    node.ctrl.logout().await;
}

// ── Simulator ───────────────────────────────────────────────────────

/// A simulated node whose simulator currently runs in `mode`.
async fn simulator(exchange: ImageExchange, mode: &str, waits: WaitTimeouts) -> Node {
    let node = node_configured(|config| {
        config.image_exchange = exchange;
        config.profile.waits = waits;
    })
    .await;
    node.mount(
        "GET",
        "inspection",
        ok_json(json!({"device": "simulator", "connected": true})),
    )
    .await;
    let dwell = if mode == "trigger" { 1 } else { 1000 };
    node.mount("GET", "simulation", ok_json(simulation(mode, dwell))).await;
    node.mount("PUT", "simulation", ok()).await;
    node
}

fn simulation(mode: &str, dwell_ms: u64) -> Value {
    json!({"mode": mode, "dwellMs": dwell_ms})
}

/// Bodies of every simulation-mode change, in order.
async fn simulation_changes(node: &Node) -> Vec<Value> {
    node.requests("PUT")
        .await
        .into_iter()
        .filter(|(p, _)| p == &node_path("simulation"))
        .map(|(_, body)| body)
        .collect()
}

#[tokio::test]
async fn simulator_login_needs_image_directory() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing");
    let node = simulator(ImageExchange::Directory(missing), "continuous", waits()).await;

    let result = node.ctrl.login(AccessLevel::Control).await;

    assert!(matches!(result, Err(CoreError::Precondition { .. })), "got {result:?}");
    assert!(!node.ctrl.is_logged_in());
    assert!(node.requests("PUT").await.is_empty());
}

#[tokio::test]
async fn remote_simulator_is_triggered_and_restored_on_logout() {
    let node = simulator(ImageExchange::Remote, "trigger", waits()).await;

    node.ctrl.login(AccessLevel::Monitor).await.unwrap();
    assert!(node.ctrl.is_simulator());
    assert_eq!(node.ctrl.cache().simulation().unwrap().mode, "trigger");
    node.ctrl.logout().await;

    assert_eq!(
        simulation_changes(&node).await,
        vec![simulation("trigger", 1), simulation("continuous", 1000)]
    );
}

#[tokio::test]
async fn directory_simulator_runs_continuously() {
    let dir = tempfile::tempdir().unwrap();
    let exchange = ImageExchange::Directory(dir.path().to_path_buf());
    let node = simulator(exchange, "continuous", waits()).await;

    node.ctrl.login(AccessLevel::Monitor).await.unwrap();
    node.ctrl.logout().await;

    // Already continuous at logout: nothing to restore.
    assert_eq!(simulation_changes(&node).await, vec![simulation("continuous", 1000)]);
}

#[tokio::test]
async fn directory_label_replaces_old_images_and_triggers() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("old.png"), b"x").unwrap();
    std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
    let exchange = ImageExchange::Directory(dir.path().to_path_buf());
    let node = simulator(exchange, "continuous", waits()).await;
    node.ctrl.login(AccessLevel::Monitor).await.unwrap();
    node.expect("PUT", "simulation/trigger", ok(), 1).await;
    node.expect("PUT", "simulation/start", ok(), 0).await;

    let label = Label::new(LabelHandler::SimulatorTrigger).with_image(bmp());
    assert!(node.ctrl.process_simulator_label(label).await.unwrap());

    assert!(!dir.path().join("old.png").exists());
    assert!(dir.path().join("notes.txt").exists());
    assert_eq!(std::fs::read(dir.path().join("simulatorImage.bmp")).unwrap(), bmp());
    assert!(node.ctrl.label_active());
    node.ctrl.logout().await;
}

#[tokio::test]
async fn directory_label_in_control_cycles_simulator() {
    let dir = tempfile::tempdir().unwrap();
    let exchange = ImageExchange::Directory(dir.path().to_path_buf());
    let node = simulator(exchange, "continuous", waits()).await;
    node.ctrl.login(AccessLevel::Control).await.unwrap();
    node.expect("PUT", "simulation/start", ok(), 1).await;
    node.expect("PUT", "simulation/stop", ok(), 1).await;
    node.expect("PUT", "simulation/trigger", ok(), 0).await;

    let ctrl = node.ctrl.clone();
    let label = Label::new(LabelHandler::SimulatorTrigger).with_image(bmp());
    let task = tokio::spawn(async move { ctrl.process_simulator_label(label).await });
    node.wait_request("PUT", "simulation/start").await;
    node.push("labelBegin", json!({"repeat": 1}));

    assert!(task.await.unwrap().unwrap());
    assert!(dir.path().join("simulatorImage.bmp").exists());
    node.ctrl.logout().await;
}

#[tokio::test]
async fn simulator_cycle_without_label_begin_fails() {
    let node = simulator(
        ImageExchange::Remote,
        "trigger",
        WaitTimeouts {
            label_begin: Duration::from_millis(300),
            ..waits()
        },
    )
    .await;
    node.ctrl.login(AccessLevel::Control).await.unwrap();
    node.expect("PUT", "simulation/start", ok(), 1).await;
    node.expect("PUT", "simulation/stop", ok(), 1).await;

    assert!(!node.ctrl.simulator_toggle_print().await.unwrap());
    node.ctrl.logout().await;
}

#[tokio::test]
async fn simulator_cycle_needs_a_successful_stop() {
    let node = simulator(ImageExchange::Remote, "trigger", waits()).await;
    node.ctrl.login(AccessLevel::Control).await.unwrap();
    node.mount("PUT", "simulation/start", ok()).await;
    node.mount("PUT", "simulation/stop", ResponseTemplate::new(500)).await;

    let ctrl = node.ctrl.clone();
    let task = tokio::spawn(async move { ctrl.simulator_toggle_print().await });
    node.wait_request("PUT", "simulation/start").await;
    node.push("labelBegin", json!({"repeat": 1}));

    assert!(!task.await.unwrap().unwrap());
    node.ctrl.logout().await;
}

#[tokio::test]
async fn disabling_print_on_simulator_does_nothing() {
    let node = simulator(ImageExchange::Remote, "trigger", waits()).await;
    node.ctrl.login(AccessLevel::Control).await.unwrap();
    node.expect("PUT", "simulation/start", ok(), 0).await;
    node.expect("PUT", "inspection/print", ok(), 0).await;

    assert!(node.ctrl.toggle_print(false).await.unwrap());
    node.ctrl.logout().await;
}

// ── Grading standards ───────────────────────────────────────────────

fn standards() -> Value {
    json!({
        "gradingStandards": [
            {"standard": "GS1", "tableId": "1", "specifications": {"symbology": "ean13", "symbolType": "ean13"}}
        ]
    })
}

#[tokio::test]
async fn standards_table_is_saved_at_login() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("standards.json");
    let saved = file.clone();
    let node = node_configured(move |config| config.standards_path = Some(saved)).await;
    node.mount("GET", "gradingstandards", ok_json(standards())).await;

    node.ctrl.login(AccessLevel::Monitor).await.unwrap();

    let table = node.ctrl.cache().standards().unwrap();
    assert_eq!(table.tables_for("ean13", "ean13").len(), 1);
    assert_eq!(StandardsTable::load(&file).unwrap(), *table);
    node.ctrl.logout().await;
}

#[tokio::test]
async fn saved_standards_table_covers_failed_fetch() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("standards.json");
    let standards: GradingStandards = serde_json::from_value(standards()).unwrap();
    let expected = StandardsTable::compile(&standards);
    expected.save(&file).unwrap();

    let node = node_configured(move |config| config.standards_path = Some(file)).await;
    node.mount("GET", "gradingstandards", ResponseTemplate::new(503)).await;

    node.ctrl.login(AccessLevel::Monitor).await.unwrap();

    assert_eq!(*node.ctrl.cache().standards().unwrap(), expected);
    node.ctrl.logout().await;
}
