//! `watch`: stream node events until interrupted.

use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::warn;

use inspect_api::{EventKind, NodeEvent};
use inspect_core::Controller;

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(
    controller: &Controller,
    args: WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let mut events = BroadcastStream::new(controller.events());
    let color = output::should_color(&global.color);
    let mut seen = 0_usize;

    if !global.quiet {
        eprintln!("Watching node {} (Ctrl-C to stop)", controller.config().node);
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            next = events.next() => {
                let event = match next {
                    Some(Ok(event)) => event,
                    Some(Err(BroadcastStreamRecvError::Lagged(n))) => {
                        warn!(skipped = n, "event watcher lagged");
                        continue;
                    }
                    None => break,
                };

                let line = format_event(&event, &global.output, color);
                output::print_output(&line, global.quiet);

                seen += 1;
                if args.count.is_some_and(|max| seen >= max) {
                    break;
                }
            }
        }
    }
    Ok(())
}

fn format_event(event: &NodeEvent, format: &OutputFormat, color: bool) -> String {
    let detail = describe(&event.kind);
    match format {
        OutputFormat::Json | OutputFormat::JsonCompact => serde_json::json!({
            "time": event.time,
            "source": event.source,
            "name": event.name,
            "detail": detail,
        })
        .to_string(),
        OutputFormat::Plain => event.name.clone(),
        OutputFormat::Table => {
            let time = event.time.as_deref().unwrap_or("-");
            let name = if color {
                use owo_colors::OwoColorize;
                event.name.bold().to_string()
            } else {
                event.name.clone()
            };
            format!("{time}  {name}  {detail}")
        }
    }
}

/// One-line summary of an event's payload.
fn describe(kind: &EventKind) -> String {
    match kind {
        EventKind::Heartbeat { state, current_dpi } => format!(
            "state={} dpi={}",
            state.as_deref().unwrap_or("-"),
            current_dpi.map_or_else(|| "-".into(), |d| d.to_string())
        ),
        EventKind::StateChange { from, to } => format!("{from} -> {to}"),
        EventKind::SessionStateChange {
            user_id,
            access_level,
            ..
        } => format!(
            "user={} access={}",
            user_id.as_deref().unwrap_or("-"),
            access_level.as_deref().unwrap_or("-")
        ),
        EventKind::LabelBegin { repeat }
        | EventKind::LabelEnd { repeat }
        | EventKind::SetupCapture { repeat } => {
            format!("repeat={}", repeat.map_or_else(|| "-".into(), |r| r.to_string()))
        }
        EventKind::SetupDetectEnd { repeat, detections } => format!(
            "repeat={} detections={}",
            repeat.map_or_else(|| "-".into(), |r| r.to_string()),
            detections.len()
        ),
        EventKind::SetupDetectBegin
        | EventKind::SetupDetectProgress
        | EventKind::SectorBegin
        | EventKind::SectorEnd
        | EventKind::Unknown { .. } => String::new(),
    }
}
