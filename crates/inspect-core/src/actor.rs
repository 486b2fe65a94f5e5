// ── Session actor ──
//
// One task per session owns the `Dispatcher`. It consumes push events and
// caller messages in arrival order, publishes the observable values on
// the controller's watch channels, and runs the dispatcher's effects.
// Effects that touch the node are spawned inside the session scope so the
// loop itself never waits on I/O.

use std::future::Future;
use std::sync::Arc;

use inspect_api::NodeEvent;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::controller::Controller;
use crate::dispatcher::{Dispatcher, Effect};
use crate::model::{Label, Session};

/// Requests from controller operations to the actor.
pub(crate) enum ActorMsg {
    ActivateLabel {
        label: Arc<Label>,
        ack: oneshot::Sender<()>,
    },
    ClearLabel {
        ack: oneshot::Sender<Option<Arc<Label>>>,
    },
}

pub(crate) async fn run(
    ctrl: Controller,
    session: Session,
    mut rx: mpsc::Receiver<ActorMsg>,
    mut events: broadcast::Receiver<Arc<NodeEvent>>,
    cancel: CancellationToken,
) {
    let mut dispatcher = Dispatcher::new();
    dispatcher.set_session(Some(session));
    debug!("session actor started");

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            msg = rx.recv() => {
                let Some(msg) = msg else { break };
                // Acknowledge after publishing, so callers see their change.
                match msg {
                    ActorMsg::ActivateLabel { label, ack } => {
                        dispatcher.activate_label(label);
                        ctrl.publish(&dispatcher);
                        let _ = ack.send(());
                    }
                    ActorMsg::ClearLabel { ack } => {
                        let label = dispatcher.take_label();
                        ctrl.publish(&dispatcher);
                        let _ = ack.send(label);
                    }
                }
            }
            result = events.recv() => {
                match result {
                    Ok(event) => {
                        // The buffer is cleared before the new state is
                        // visible to waiters.
                        let (clears, effects): (Vec<_>, Vec<_>) = dispatcher
                            .handle(&event)
                            .into_iter()
                            .partition(|e| matches!(e, Effect::ClearRepeats));
                        for effect in clears {
                            ctrl.run_effect(effect, &cancel);
                        }
                        ctrl.publish(&dispatcher);
                        let _ = ctrl.inner.event_tx.send(event);
                        for effect in effects {
                            ctrl.run_effect(effect, &cancel);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "session actor lagged behind the event stream");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    debug!("session actor stopped");
}

impl Controller {
    /// Copy the dispatcher's observable values to the watch channels.
    fn publish(&self, dispatcher: &Dispatcher) {
        let state = dispatcher.state();
        let dpi = dispatcher.dpi();
        let active = dispatcher.label().is_some();
        self.inner.state.send_if_modified(|s| replace(s, state));
        self.inner.dpi.send_if_modified(|d| replace(d, dpi));
        self.inner.label_active.send_if_modified(|a| replace(a, active));
    }

    fn run_effect(&self, effect: Effect, cancel: &CancellationToken) {
        match effect {
            Effect::ClearRepeats => {
                self.inner.repeats.clear();
                debug!("repeat buffer cleared");
            }
            Effect::LabelBegan => self.inner.label_begins.send_modify(|n| *n += 1),
            Effect::RefreshJob => {
                let ctrl = self.clone();
                spawn_scoped(cancel, async move {
                    if let Err(e) = ctrl.refresh_job().await {
                        warn!(error = %e, "job refresh failed");
                    }
                });
            }
            Effect::ProcessCapture { repeat, label } => {
                let ctrl = self.clone();
                spawn_scoped(cancel, async move {
                    match ctrl.process_label(repeat, label).await {
                        Ok(true) => {}
                        Ok(false) => warn!(?repeat, "captured label was not inspected"),
                        Err(e) => warn!(?repeat, error = %e, "processing captured label failed"),
                    }
                });
            }
            Effect::LearnSectors {
                repeat,
                detections,
                label,
            } => {
                let ctrl = self.clone();
                spawn_scoped(cancel, async move {
                    ctrl.learn_sectors(repeat, &detections, &label).await;
                });
            }
            Effect::DeliverRepeat { repeat, label } => {
                // Tag with the generation current at labelEnd, so a run
                // restarted meanwhile discards this repeat.
                let generation = self.inner.repeats.generation();
                let ctrl = self.clone();
                spawn_scoped(cancel, async move {
                    ctrl.deliver_repeat(repeat, label, generation).await;
                });
            }
            Effect::ForceLogout => {
                // Outside the session scope: logout cancels that scope.
                let ctrl = self.clone();
                tokio::spawn(async move { ctrl.logout().await });
            }
        }
    }
}

fn spawn_scoped<F>(cancel: &CancellationToken, fut: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    let cancel = cancel.clone();
    tokio::spawn(async move {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {}
            () = fut => {}
        }
    });
}

fn replace<T: PartialEq>(slot: &mut T, next: T) -> bool {
    if *slot == next {
        false
    } else {
        *slot = next;
        true
    }
}
