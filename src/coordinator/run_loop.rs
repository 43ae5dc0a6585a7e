use super::{command_handler, download_handler, Coordinator, CoordinatorCommand, InternalEvent, COORDINATOR_LOG_TARGET};
use tracing::{info, trace};

/// Runs the coordinator's command processing loop.
pub async fn run_coordinator_loop(coordinator: &mut Coordinator) {
    info!(target: COORDINATOR_LOG_TARGET, "Coordinator run loop started.");

    loop {
        tokio::select! {
            biased; // Check commands first

            command = coordinator.command_rx.recv() => {
                let Some(command) = command else {
                    info!(target: COORDINATOR_LOG_TARGET, "All handles dropped. Exiting run loop.");
                    break;
                };
                trace!(target: COORDINATOR_LOG_TARGET, "Received command: {:?}", command);
                if !handle_command(coordinator, command) {
                    break;
                }
            }

            // The coordinator holds a sender, so this channel never closes.
            Some(event) = coordinator.internal_rx.recv() => {
                trace!(target: COORDINATOR_LOG_TARGET, "Received internal event: {:?}", event);
                handle_internal_event(coordinator, event);
            }
        }
    }

    coordinator.release_all();
    info!(target: COORDINATOR_LOG_TARGET, "Coordinator run loop finished.");
}

/// Returns `false` when the loop should exit.
fn handle_command(coordinator: &mut Coordinator, command: CoordinatorCommand) -> bool {
    match command {
        CoordinatorCommand::LoadCatalog { records, respond_to } => {
            let _ = respond_to.send(command_handler::handle_load_catalog(coordinator, records));
        }
        CoordinatorCommand::RequestPlay { key, respond_to } => {
            let _ = respond_to.send(command_handler::handle_request_play(coordinator, key));
        }
        CoordinatorCommand::RequestStop { key, respond_to } => {
            let _ = respond_to.send(command_handler::handle_request_stop(coordinator, key));
        }
        CoordinatorCommand::RequestDownload {
            key,
            source_ref,
            respond_to,
        } => {
            let _ = respond_to.send(download_handler::handle_request_download(coordinator, key, source_ref));
        }
        CoordinatorCommand::Seek { key, percent, respond_to } => {
            let _ = respond_to.send(command_handler::handle_seek(coordinator, key, percent));
        }
        CoordinatorCommand::ReleaseAll { respond_to } => {
            command_handler::handle_release_all(coordinator);
            let _ = respond_to.send(());
        }
        CoordinatorCommand::Shutdown => {
            info!(target: COORDINATOR_LOG_TARGET, "Shutdown command received. Exiting run loop.");
            return false;
        }
    }
    true
}

fn handle_internal_event(coordinator: &mut Coordinator, event: InternalEvent) {
    match event {
        InternalEvent::PlayerPrepared { key, session, result } => {
            command_handler::handle_player_prepared(coordinator, key, session, result)
        }
        InternalEvent::PlaybackTick { key, session, percent } => {
            command_handler::handle_playback_tick(coordinator, key, session, percent)
        }
        InternalEvent::PlaybackFinished { session } => command_handler::handle_playback_finished(coordinator, session),
        InternalEvent::Download {
            key,
            generation,
            update,
        } => download_handler::handle_download_update(coordinator, key, generation, update),
    }
}
