// ── Resource cache ──
//
// Last-fetched copy of every node resource the controller consults.
// Each slot is an `ArcSwapOption`: readers take a cheap snapshot, a
// refresh swaps in a whole new value, and logout empties the
// session-scoped ones.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use inspect_api::node::models::{
    Calibration, CameraConfig, Devices, InspectionInfo, Job, JobList, PrintSettings, ProductInfo,
    SimulationSettings, Symbol,
};

use crate::model::version::{FirmwareVersion, UNKNOWN_VERSION};
use crate::standards::StandardsTable;

/// Snapshot store for node resources.
#[derive(Default)]
pub struct ResourceCache {
    devices: ArcSwapOption<Devices>,
    inspection: ArcSwapOption<InspectionInfo>,
    product: ArcSwapOption<ProductInfo>,
    camera: ArcSwapOption<CameraConfig>,
    symbologies: ArcSwapOption<Vec<Symbol>>,
    calibration: ArcSwapOption<Calibration>,
    jobs: ArcSwapOption<JobList>,
    job: ArcSwapOption<Job>,
    print: ArcSwapOption<PrintSettings>,
    simulation: ArcSwapOption<SimulationSettings>,
    standards: ArcSwapOption<StandardsTable>,
}

macro_rules! slot {
    ($get:ident, $set:ident, $ty:ty) => {
        pub fn $get(&self) -> Option<Arc<$ty>> {
            self.$get.load_full()
        }

        pub fn $set(&self, value: Option<$ty>) {
            self.$get.store(value.map(Arc::new));
        }
    };
}

impl ResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    slot!(devices, set_devices, Devices);
    slot!(inspection, set_inspection, InspectionInfo);
    slot!(product, set_product, ProductInfo);
    slot!(camera, set_camera, CameraConfig);
    slot!(symbologies, set_symbologies, Vec<Symbol>);
    slot!(calibration, set_calibration, Calibration);
    slot!(jobs, set_jobs, JobList);
    slot!(job, set_job, Job);
    slot!(print, set_print, PrintSettings);
    slot!(simulation, set_simulation, SimulationSettings);
    slot!(standards, set_standards, StandardsTable);

    /// Empty the session-scoped slots.
    ///
    /// The inspection descriptor and device list survive: they are read
    /// without a session and decide how the next login proceeds.
    pub fn reset_session(&self) {
        self.product.store(None);
        self.camera.store(None);
        self.symbologies.store(None);
        self.calibration.store(None);
        self.jobs.store(None);
        self.job.store(None);
        self.print.store(None);
        self.simulation.store(None);
        self.standards.store(None);
    }

    // ── Derived values ───────────────────────────────────────────────

    /// The node reports itself as the simulator.
    pub fn is_simulator(&self) -> bool {
        self.inspection
            .load()
            .as_ref()
            .is_some_and(|i| i.is_simulator())
    }

    /// Camera backup-void mode is on.
    pub fn is_backup_void(&self) -> bool {
        self.camera
            .load()
            .as_ref()
            .is_some_and(|c| c.backup_void_enabled())
    }

    pub fn firmware_version(&self) -> Option<FirmwareVersion> {
        self.product
            .load()
            .as_ref()
            .and_then(|p| p.version.as_ref())
            .map(FirmwareVersion::from)
    }

    /// `major.minor.service.build`, or `----` when unknown.
    pub fn firmware_version_string(&self) -> String {
        self.firmware_version()
            .map_or_else(|| UNKNOWN_VERSION.to_owned(), |v| v.to_string())
    }

    /// Name of the loaded job; empty when none is cached.
    pub fn job_name(&self) -> String {
        self.job
            .load()
            .as_ref()
            .and_then(|j| j.name.clone())
            .unwrap_or_default()
    }
}
