//! `status`: node identity, observed state and loaded job.

use serde::Serialize;

use inspect_core::{Controller, NodeState};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct Status {
    host: String,
    node: u16,
    state: NodeState,
    product: Option<String>,
    firmware: String,
    simulator: bool,
    job: Option<String>,
    sectors: usize,
    print_enabled: Option<bool>,
    calibrated: Option<bool>,
    dpi: Option<u32>,
}

pub async fn handle(controller: &Controller, global: &GlobalOpts) -> Result<(), CliError> {
    let state = super::settle_state(controller).await;
    let cache = controller.cache();
    let job = cache.job();

    let status = Status {
        host: controller.config().host.clone(),
        node: controller.config().node,
        state,
        product: cache.product().and_then(|p| p.name.clone()),
        firmware: cache.firmware_version_string(),
        simulator: controller.is_simulator(),
        job: job.as_ref().and_then(|j| j.name.clone()),
        sectors: job.as_ref().map_or(0, |j| j.sectors.len()),
        print_enabled: cache.print().map(|p| p.enabled),
        calibrated: cache.calibration().map(|c| c.calibration_ready),
        dpi: controller.dpi(),
    };

    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        &status,
        |s| {
            output::render_detail(&[
                ("node", format!("{}:{}", s.host, s.node)),
                ("state", output::paint_state(s.state, color)),
                ("product", s.product.clone().unwrap_or_else(|| "-".into())),
                ("firmware", s.firmware.clone()),
                ("simulator", s.simulator.to_string()),
                ("job", s.job.clone().unwrap_or_else(|| "-".into())),
                ("sectors", s.sectors.to_string()),
                ("printing", fmt_flag(s.print_enabled)),
                ("calibrated", fmt_flag(s.calibrated)),
                ("dpi", s.dpi.map_or_else(|| "-".into(), |d| d.to_string())),
            ])
        },
        |s| s.state.to_string(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}

fn fmt_flag(flag: Option<bool>) -> String {
    match flag {
        Some(true) => "yes".into(),
        Some(false) => "no".into(),
        None => "-".into(),
    }
}
