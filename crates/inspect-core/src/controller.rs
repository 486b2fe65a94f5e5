// ── Node controller ──
//
// Session lifecycle and job control for one node. The controller owns the
// HTTP client, the resource cache and the repeat buffer. Observed node
// state comes from the session actor (see `actor`), which is the only
// writer of the published watch values; operations here issue requests
// and then wait on those values with a deadline.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use inspect_api::node::models::{Job, SIM_MODE_CONTINUOUS, SIM_MODE_TRIGGER, SimulationSettings};
use inspect_api::websocket::{EventStreamHandle, ReconnectConfig, StreamState};
use inspect_api::{NodeClient, NodeEndpoints, NodeEvent, TransportConfig};
use tokio::sync::{Mutex, broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::actor::{self, ActorMsg};
use crate::cache::ResourceCache;
use crate::config::{ImageExchange, NodeConfig, SymbologySource};
use crate::error::CoreError;
use crate::model::{AccessLevel, FirmwareVersion, Label, NodeState, Session};
use crate::repeats::RepeatBuffer;
use crate::simulator::SimulatorDirectory;
use crate::standards::StandardsTable;

const ACTOR_CHANNEL_SIZE: usize = 32;
const EVENT_CHANNEL_SIZE: usize = 256;

/// Pause between disabling and re-enabling print in backup-void mode.
const BACKUP_VOID_SETTLE: Duration = Duration::from_millis(100);

/// Simulator dwell for remotely triggered images.
const TRIGGER_DWELL_MS: u64 = 1;
/// Simulator dwell while it cycles through its image directory.
const CONTINUOUS_DWELL_MS: u64 = 1000;

// ── Controller ───────────────────────────────────────────────────────

/// The main entry point for driving one node.
///
/// Cheaply cloneable via `Arc<ControllerInner>`. A controller is bound to
/// one node identity for its whole life; sessions come and go through
/// [`login`](Self::login) and [`logout`](Self::logout).
#[derive(Clone)]
pub struct Controller {
    pub(crate) inner: Arc<ControllerInner>,
}

pub(crate) struct ControllerInner {
    pub(crate) config: NodeConfig,
    pub(crate) client: NodeClient,
    pub(crate) cache: ResourceCache,
    pub(crate) repeats: RepeatBuffer,
    session: ArcSwapOption<Session>,
    // Published by the actor; read by waits and callers.
    pub(crate) state: watch::Sender<NodeState>,
    pub(crate) dpi: watch::Sender<Option<u32>>,
    pub(crate) label_active: watch::Sender<bool>,
    /// Count of `labelBegin` events seen this controller's lifetime.
    pub(crate) label_begins: watch::Sender<u64>,
    /// Count of finished sector-learning passes.
    pub(crate) detect_complete: watch::Sender<u64>,
    pub(crate) event_tx: broadcast::Sender<Arc<NodeEvent>>,
    actor_tx: Mutex<Option<mpsc::Sender<ActorMsg>>>,
    /// Session scope: cancelled on logout, replaced on login.
    cancel_child: Mutex<CancellationToken>,
    /// Serialises login and logout.
    lifecycle: Mutex<()>,
    stream: Mutex<Option<EventStreamHandle>>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Controller {
    /// Create a controller for the node in `config`. Does not contact the
    /// node; call [`login`](Self::login) to open a session.
    pub fn new(config: NodeConfig) -> Result<Self, CoreError> {
        let endpoints = NodeEndpoints::new(config.host.clone(), config.system_port, config.node)
            .with_api_root(config.profile.api_root.clone());
        let client = NodeClient::new(endpoints, &TransportConfig::with_timeout(config.timeout))?;
        let repeats = RepeatBuffer::new(config.profile.repeat_capacity);

        let (state, _) = watch::channel(NodeState::Offline);
        let (dpi, _) = watch::channel(None);
        let (label_active, _) = watch::channel(false);
        let (label_begins, _) = watch::channel(0);
        let (detect_complete, _) = watch::channel(0);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);

        // No session yet: the scope starts out closed.
        let cancel_child = CancellationToken::new();
        cancel_child.cancel();

        Ok(Self {
            inner: Arc::new(ControllerInner {
                config,
                client,
                cache: ResourceCache::new(),
                repeats,
                session: ArcSwapOption::empty(),
                state,
                dpi,
                label_active,
                label_begins,
                detect_complete,
                event_tx,
                actor_tx: Mutex::new(None),
                cancel_child: Mutex::new(cancel_child),
                lifecycle: Mutex::new(()),
                stream: Mutex::new(None),
                task_handles: Mutex::new(Vec::new()),
            }),
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.inner.config
    }

    /// Raw node client, for calls the controller does not wrap.
    pub fn client(&self) -> &NodeClient {
        &self.inner.client
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.inner.cache
    }

    // ── Observed state ───────────────────────────────────────────────

    pub fn state(&self) -> NodeState {
        *self.inner.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<NodeState> {
        self.inner.state.subscribe()
    }

    /// Current dpi as last reported by a heartbeat.
    pub fn dpi(&self) -> Option<u32> {
        *self.inner.dpi.borrow()
    }

    /// Whether a label is between capture and `labelEnd`.
    pub fn label_active(&self) -> bool {
        *self.inner.label_active.borrow()
    }

    /// Every relevant push event, after the controller has applied it.
    pub fn events(&self) -> broadcast::Receiver<Arc<NodeEvent>> {
        self.inner.event_tx.subscribe()
    }

    /// Event-stream connection state, while a session is open.
    pub async fn stream_state(&self) -> Option<watch::Receiver<StreamState>> {
        self.inner.stream.lock().await.as_ref().map(EventStreamHandle::state)
    }

    pub fn session(&self) -> Option<Arc<Session>> {
        self.inner.session.load_full()
    }

    pub fn is_logged_in(&self) -> bool {
        self.inner.session.load().is_some()
    }

    pub fn is_control(&self) -> bool {
        self.inner.session.load().as_ref().is_some_and(|s| s.is_control())
    }

    pub fn is_simulator(&self) -> bool {
        self.inner.cache.is_simulator()
    }

    pub fn firmware_version(&self) -> Option<FirmwareVersion> {
        self.inner.cache.firmware_version()
    }

    // ── Session lifecycle ────────────────────────────────────────────

    /// Fetch the device list and inspection descriptor. Both are
    /// best-effort and readable without a session.
    pub async fn initialize(&self) {
        let client = &self.inner.client;
        let cache = &self.inner.cache;
        cache.set_devices(best_effort("device list", client.devices()).await);
        cache.set_inspection(best_effort("inspection descriptor", client.inspection()).await);
    }

    /// Open a session at `level`.
    ///
    /// An existing session is closed first. Only the credential exchange
    /// is fatal; the resource fetches that follow are best-effort. On
    /// success the event stream is open and the actor is running.
    pub async fn login(&self, level: AccessLevel) -> Result<(), CoreError> {
        let _guard = self.inner.lifecycle.lock().await;

        if self.is_logged_in() {
            debug!("already logged in, closing the previous session");
            self.logout_locked().await;
        }
        if self.inner.cache.inspection().is_none() {
            self.initialize().await;
        }
        self.check_image_directory()?;

        let creds = &self.inner.config.credentials;
        info!(
            user = %creds.username,
            host = %self.inner.config.host,
            node = self.inner.config.node,
            %level,
            "logging in"
        );
        let token = self
            .inner
            .client
            .login(&creds.username, &creds.password, level == AccessLevel::Monitor)
            .await?;

        let session = Session {
            token,
            access_level: level,
            user_id: creds.username.clone(),
        };
        self.inner.session.store(Some(Arc::new(session.clone())));

        let cancel = CancellationToken::new();
        *self.inner.cancel_child.lock().await = cancel.clone();

        self.post_login().await;

        if let Err(e) = self.start_session(session, cancel).await {
            warn!(error = %e, "event stream unavailable, closing session");
            self.logout_locked().await;
            return Err(e);
        }

        info!(simulator = self.is_simulator(), "logged in");
        Ok(())
    }

    /// Close the session. Idempotent; safe when not logged in.
    ///
    /// In-flight waits end with [`CoreError::SessionClosed`].
    pub async fn logout(&self) {
        let _guard = self.inner.lifecycle.lock().await;
        self.logout_locked().await;
    }

    async fn logout_locked(&self) {
        let was_logged_in = self.is_logged_in();

        // Stop the actor, effect tasks and waits.
        self.inner.cancel_child.lock().await.cancel();
        *self.inner.actor_tx.lock().await = None;
        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        drop(handles);

        if was_logged_in {
            if self.is_simulator() {
                self.restore_continuous_simulation().await;
            }
            if let Err(e) = self.inner.client.set_send_extended_data(false).await {
                warn!(error = %e, "failed to disable extended event data");
            }
        }

        self.inner.state.send_replace(NodeState::Offline);
        self.inner.dpi.send_replace(None);
        self.inner.label_active.send_replace(false);

        if was_logged_in {
            if let Err(e) = self.inner.client.logout().await {
                warn!(error = %e, "logout failed (non-fatal)");
            }
        } else {
            self.inner.client.clear_token();
        }

        if let Some(stream) = self.inner.stream.lock().await.take() {
            stream.shutdown();
        }

        self.inner.session.store(None);
        self.inner.cache.reset_session();

        if was_logged_in {
            info!("logged out");
        }
    }

    /// A simulator fed from a local directory needs somewhere writable.
    fn check_image_directory(&self) -> Result<(), CoreError> {
        let ImageExchange::Directory(ref path) = self.inner.config.image_exchange else {
            return Ok(());
        };
        if !self.is_simulator() {
            return Ok(());
        }
        SimulatorDirectory::new(path)
            .probe_writable()
            .map_err(|e| CoreError::Precondition {
                message: format!("simulator image directory {} is not writable: {e}", path.display()),
            })
    }

    async fn post_login(&self) {
        let client = &self.inner.client;
        let cache = &self.inner.cache;

        cache.set_camera(best_effort("camera configuration", client.camera_config()).await);
        let symbologies = match self.inner.config.profile.symbologies {
            SymbologySource::Node => best_effort("symbologies", client.symbologies()).await,
            SymbologySource::Static(ref table) => Some(table.clone()),
        };
        cache.set_symbologies(symbologies);
        cache.set_calibration(best_effort("calibration", client.calibration()).await);
        cache.set_jobs(best_effort("job list", client.jobs()).await);
        cache.set_print(best_effort("print settings", client.print_settings()).await);
        cache.set_product(best_effort("product info", client.product()).await);

        if self.is_simulator() {
            self.configure_simulation().await;
        }

        if let Err(e) = client.set_send_extended_data(true).await {
            warn!(error = %e, "failed to enable extended event data");
        }
        self.compile_standards().await;
        if let Err(e) = self.refresh_job().await {
            warn!(error = %e, "failed to fetch current job");
        }
    }

    async fn start_session(&self, session: Session, cancel: CancellationToken) -> Result<(), CoreError> {
        let url = match self.inner.config.event_stream_url {
            Some(ref url) => url.clone(),
            None => self.inner.client.endpoints().events_url()?,
        };
        let stream = EventStreamHandle::connect(url, ReconnectConfig::default(), cancel.child_token())?;
        let events = stream.subscribe();

        let (tx, rx) = mpsc::channel(ACTOR_CHANNEL_SIZE);
        *self.inner.actor_tx.lock().await = Some(tx);

        let handle = tokio::spawn(actor::run(self.clone(), session, rx, events, cancel));
        self.inner.task_handles.lock().await.push(handle);
        *self.inner.stream.lock().await = Some(stream);
        Ok(())
    }

    // ── Simulation mode ──────────────────────────────────────────────

    /// Remote images want a triggered simulator; a watched directory wants
    /// it cycling.
    async fn configure_simulation(&self) {
        let client = &self.inner.client;
        let (mode, dwell_ms) = match self.inner.config.image_exchange {
            ImageExchange::Remote => (SIM_MODE_TRIGGER, TRIGGER_DWELL_MS),
            ImageExchange::Directory(_) => (SIM_MODE_CONTINUOUS, CONTINUOUS_DWELL_MS),
        };

        if let Some(current) = best_effort("simulation settings", client.simulation()).await {
            let settings = SimulationSettings {
                mode: mode.into(),
                dwell_ms,
                ..current
            };
            if let Err(e) = client.set_simulation(&settings).await {
                warn!(error = %e, mode, "failed to set simulation mode");
            }
        }
        self.inner
            .cache
            .set_simulation(best_effort("simulation settings", client.simulation()).await);
    }

    async fn restore_continuous_simulation(&self) {
        let client = &self.inner.client;
        let Some(current) = best_effort("simulation settings", client.simulation()).await else {
            return;
        };
        if current.mode == SIM_MODE_CONTINUOUS {
            return;
        }
        let settings = SimulationSettings {
            mode: SIM_MODE_CONTINUOUS.into(),
            dwell_ms: CONTINUOUS_DWELL_MS,
            ..current
        };
        if let Err(e) = client.set_simulation(&settings).await {
            warn!(error = %e, "failed to restore continuous simulation");
        }
    }

    // ── Resources ────────────────────────────────────────────────────

    /// Re-fetch the loaded job, masks included, into the cache.
    pub async fn refresh_job(&self) -> Result<Job, CoreError> {
        let job = self.inner.client.job_with_masks().await?;
        debug!(job = ?job.name, sectors = job.sectors.len(), "job refreshed");
        self.inner.cache.set_job(Some(job.clone()));
        Ok(job)
    }

    /// Fetch grading standards, compile the lookup table, persist it when
    /// a path is configured. A failed fetch falls back to the persisted
    /// table.
    async fn compile_standards(&self) {
        let path = self.inner.config.standards_path.as_deref();
        let table = match best_effort("grading standards", self.inner.client.grading_standards()).await {
            Some(standards) => {
                let table = StandardsTable::compile(&standards);
                if let Some(path) = path {
                    match table.save(path) {
                        Ok(()) => debug!(path = %path.display(), "standards table saved"),
                        Err(e) => warn!(error = %e, "failed to save standards table"),
                    }
                }
                table
            }
            None => {
                let Some(path) = path else { return };
                match StandardsTable::load(path) {
                    Ok(table) => {
                        info!(path = %path.display(), "using saved standards table");
                        table
                    }
                    Err(e) => {
                        debug!(error = %e, "no saved standards table");
                        return;
                    }
                }
            }
        };
        self.inner.cache.set_standards(Some(table));
    }

    // ── Job control ──────────────────────────────────────────────────

    /// Stop the running job and wait for Editing.
    ///
    /// `Ok(false)` when the node is idle or Editing was not reached in
    /// time.
    pub async fn switch_to_edit(&self) -> Result<bool, CoreError> {
        match self.state() {
            NodeState::Idle => return Ok(false),
            NodeState::Editing => return Ok(true),
            _ => {}
        }
        self.inner.client.stop_job().await?;
        let limit = self.inner.config.profile.waits.edit;
        self.wait_for_state(NodeState::Editing, limit).await
    }

    /// Load the current job for inspection, start it, and wait for Running.
    ///
    /// Nothing is sent unless the node reports it is ready to run.
    pub async fn switch_to_run(&self) -> Result<bool, CoreError> {
        match self.state() {
            NodeState::Idle => return Ok(false),
            NodeState::Running => return Ok(true),
            _ => {}
        }
        let job = self.inner.cache.job_name();
        if job.is_empty() {
            debug!("no job loaded, cannot run");
            return Ok(false);
        }

        let client = &self.inner.client;
        if !client.is_run_ready().await? {
            info!(%job, "node is not ready to run");
            return Ok(false);
        }
        client.run_job(&job).await?;
        client.start_job().await?;

        let limit = self.inner.config.profile.waits.run;
        self.wait_for_state(NodeState::Running, limit).await
    }

    /// Replace the loaded job with `name`.
    pub async fn change_job(&self, name: &str) -> Result<(), CoreError> {
        info!(job = name, "changing job");
        self.inner.client.unload_job().await?;
        self.inner.client.load_job(name).await?;
        Ok(())
    }

    pub async fn pause_job(&self) -> Result<(), CoreError> {
        Ok(self.inner.client.pause_job().await?)
    }

    pub async fn resume_job(&self) -> Result<(), CoreError> {
        Ok(self.inner.client.resume_job().await?)
    }

    pub async fn stop_job(&self) -> Result<(), CoreError> {
        Ok(self.inner.client.stop_job().await?)
    }

    pub async fn unload_job(&self) -> Result<(), CoreError> {
        Ok(self.inner.client.unload_job().await?)
    }

    // ── Printing ─────────────────────────────────────────────────────

    /// Turn printing on or off. Returns whether the node ends up in the
    /// requested state.
    ///
    /// A simulator has no printer: enabling cycles it once instead (see
    /// [`simulator_toggle_print`](Self::simulator_toggle_print)), and
    /// disabling is a no-op.
    pub async fn toggle_print(&self, enable: bool) -> Result<bool, CoreError> {
        if self.is_simulator() {
            if !enable {
                debug!("simulator has no printer to disable");
                return Ok(true);
            }
            return self.simulator_toggle_print().await;
        }

        let client = &self.inner.client;
        let cache = &self.inner.cache;

        let print = client.print_settings().await?;
        cache.set_print(Some(print));

        // Backup-void mode only prints on an off→on edge.
        if cache.is_backup_void() && enable && print.enabled {
            client.set_print(false).await?;
            tokio::time::sleep(BACKUP_VOID_SETTLE).await;
        }

        let print = client.print_settings().await?;
        if print.enabled != enable {
            client.set_print(enable).await?;
        }

        let print = client.print_settings().await?;
        cache.set_print(Some(print));
        Ok(print.enabled == enable)
    }

    /// Start the simulator, wait for it to begin a label, stop it.
    pub async fn simulator_toggle_print(&self) -> Result<bool, CoreError> {
        let seen = *self.inner.label_begins.borrow();
        self.inner.client.start_simulator().await?;

        let limit = self.inner.config.profile.waits.label_begin;
        let began = self
            .wait_until(self.inner.label_begins.subscribe(), limit, |n| *n > seen)
            .await?;
        if !began {
            warn!("simulator did not begin a label in time");
        }

        let stopped = match self.inner.client.stop_simulator().await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "failed to stop simulator");
                false
            }
        };
        Ok(stopped && began)
    }

    // ── Actor plumbing ───────────────────────────────────────────────

    /// Make `label` the active label. Its callback receives the repeat
    /// the node reports with the next `labelEnd`.
    pub async fn activate_label(&self, label: Arc<Label>) -> Result<(), CoreError> {
        let (ack, done) = oneshot::channel();
        self.send_actor(ActorMsg::ActivateLabel { label, ack }).await?;
        done.await.map_err(|_| CoreError::SessionClosed)
    }

    /// Drop the active label, returning it.
    pub async fn clear_label(&self) -> Result<Option<Arc<Label>>, CoreError> {
        let (ack, done) = oneshot::channel();
        self.send_actor(ActorMsg::ClearLabel { ack }).await?;
        done.await.map_err(|_| CoreError::SessionClosed)
    }

    async fn send_actor(&self, msg: ActorMsg) -> Result<(), CoreError> {
        let tx = self
            .inner
            .actor_tx
            .lock()
            .await
            .clone()
            .ok_or(CoreError::NotLoggedIn)?;
        tx.send(msg).await.map_err(|_| CoreError::SessionClosed)
    }

    // ── Bounded waits ────────────────────────────────────────────────

    pub(crate) async fn wait_for_state(
        &self,
        target: NodeState,
        limit: Duration,
    ) -> Result<bool, CoreError> {
        let reached = self
            .wait_until(self.inner.state.subscribe(), limit, |s| *s == target)
            .await?;
        if !reached {
            warn!(%target, current = %self.state(), ?limit, "node did not reach state in time");
        }
        Ok(reached)
    }

    /// Wait until `pred` holds for the value in `rx`, at most `limit`.
    ///
    /// `Ok(false)` on deadline; `Err(SessionClosed)` if the session ends
    /// first.
    pub(crate) async fn wait_until<T, F>(
        &self,
        mut rx: watch::Receiver<T>,
        limit: Duration,
        pred: F,
    ) -> Result<bool, CoreError>
    where
        T: Send + Sync,
        F: FnMut(&T) -> bool + Send,
    {
        let cancel = self.inner.cancel_child.lock().await.clone();
        let wait = tokio::time::timeout(limit, async move { rx.wait_for(pred).await.map(|_| ()) });

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(CoreError::SessionClosed),
            result = wait => match result {
                Ok(Ok(())) => Ok(true),
                Ok(Err(_)) => Err(CoreError::SessionClosed),
                Err(_elapsed) => Ok(false),
            },
        }
    }
}

/// Await a fetch, logging and discarding its error.
async fn best_effort<T>(
    what: &str,
    fut: impl Future<Output = Result<T, inspect_api::Error>>,
) -> Option<T> {
    match fut.await {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(error = %e, "failed to fetch {what}");
            None
        }
    }
}
