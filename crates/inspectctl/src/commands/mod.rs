//! Command dispatch: opens a session, runs the handler, closes the session.

pub mod config_cmd;
pub mod job;
pub mod jobs;
pub mod report;
pub mod status;
pub mod watch;

use std::time::Duration;

use inspect_core::{AccessLevel, Controller, NodeState};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// How long to wait for the first heartbeat before trusting `state()`.
const STATE_SETTLE: Duration = Duration::from_secs(3);

/// Read-only commands log in as monitor and leave control to others.
fn access_level(cmd: &Command) -> AccessLevel {
    match cmd {
        Command::Status | Command::Jobs | Command::Watch(_) => AccessLevel::Monitor,
        _ => AccessLevel::Control,
    }
}

/// Dispatch a node-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    controller: &Controller,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    controller.login(access_level(&cmd)).await?;

    let result = match cmd {
        Command::Status => status::handle(controller, global).await,
        Command::Jobs => jobs::handle(controller, global),
        Command::Load { job } => job::load(controller, &job, global).await,
        Command::Edit => job::edit(controller, global).await,
        Command::Run => job::run(controller, global).await,
        Command::Report(args) => report::handle(controller, args, global).await,
        Command::Watch(args) => watch::handle(controller, args, global).await,
        Command::Config(_) | Command::Completions(_) => Err(CliError::Internal(
            "local command dispatched to a node".into(),
        )),
    };

    controller.logout().await;
    result
}

/// Wait briefly for the event stream to report a state.
pub async fn settle_state(controller: &Controller) -> NodeState {
    let mut rx = controller.subscribe_state();
    let _ = tokio::time::timeout(STATE_SETTLE, rx.wait_for(|s| *s != NodeState::Offline)).await;
    controller.state()
}
