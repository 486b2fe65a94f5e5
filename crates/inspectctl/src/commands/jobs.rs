//! `jobs`: jobs stored on the node.

use serde::Serialize;
use tabled::Tabled;

use inspect_core::Controller;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct JobEntry {
    name: String,
    loaded: bool,
}

#[derive(Tabled)]
struct JobRow {
    #[tabled(rename = "Job")]
    name: String,
    #[tabled(rename = "Loaded")]
    loaded: &'static str,
}

pub fn handle(controller: &Controller, global: &GlobalOpts) -> Result<(), CliError> {
    let cache = controller.cache();
    let current = cache.job_name();
    let jobs: Vec<JobEntry> = cache
        .jobs()
        .map(|list| list.names())
        .unwrap_or_default()
        .into_iter()
        .map(|name| JobEntry {
            loaded: name == current,
            name,
        })
        .collect();

    let out = output::render_list(
        &global.output,
        &jobs,
        |j| JobRow {
            name: j.name.clone(),
            loaded: if j.loaded { "*" } else { "" },
        },
        |j| j.name.clone(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
