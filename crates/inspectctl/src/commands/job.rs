//! Job control: `load`, `edit`, `run`.

use inspect_core::Controller;

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub async fn load(controller: &Controller, job: &str, global: &GlobalOpts) -> Result<(), CliError> {
    controller.change_job(job).await?;
    if !global.quiet {
        eprintln!("Job '{job}' loaded");
    }
    Ok(())
}

pub async fn edit(controller: &Controller, global: &GlobalOpts) -> Result<(), CliError> {
    let state = super::settle_state(controller).await;
    if !controller.switch_to_edit().await? {
        return Err(CliError::Workflow {
            operation: "Switch to editing".into(),
            hint: format!("The node was {state}; an idle node has no job to edit."),
        });
    }
    if !global.quiet {
        eprintln!("Node is editing");
    }
    Ok(())
}

pub async fn run(controller: &Controller, global: &GlobalOpts) -> Result<(), CliError> {
    let state = super::settle_state(controller).await;
    if !controller.switch_to_run().await? {
        return Err(CliError::Workflow {
            operation: "Switch to running".into(),
            hint: format!(
                "The node was {state}. Check that a job is loaded and that the node \
                 reports it ready to run."
            ),
        });
    }
    if !global.quiet {
        eprintln!("Node is running");
    }
    Ok(())
}
