use tokio::sync::watch;
use tvsync_core::sync::SyncDirection;
use tvsync_core::{AutoSync, RemoteStoreClient, SyncCoordinator, SyncEvent, SyncOutcome, Visibility};

use crate::commands::common::wait_for_idle;
use crate::error::CliError;

/// Run one cycle to completion and report its outcome.
pub async fn run_once(
    coordinator: &SyncCoordinator<RemoteStoreClient>,
    direction: SyncDirection,
    silent: bool,
) -> Result<SyncOutcome, CliError> {
    let mut events = coordinator.subscribe();
    let accepted = match direction {
        SyncDirection::Upload => coordinator.request_upload(silent),
        SyncDirection::Download => coordinator.request_download(silent),
    };
    if !accepted {
        return Err(CliError::Rejected("another sync is running or one ran too recently"));
    }

    let events = wait_for_idle(&mut events).await?;
    let outcome = events
        .iter()
        .find_map(|event| match event {
            SyncEvent::Finished { outcome, .. } => Some(*outcome),
            _ => None,
        })
        .unwrap_or(SyncOutcome::NoOp);
    println!("{}", describe_outcome(direction, outcome));
    Ok(outcome)
}

pub fn describe_outcome(direction: SyncDirection, outcome: SyncOutcome) -> &'static str {
    match (direction, outcome) {
        (SyncDirection::Upload, SyncOutcome::RemoteSuccess) => "Uploaded to remote store",
        (SyncDirection::Upload, SyncOutcome::LocalFallback) => {
            "Remote store unavailable; saved a local copy"
        }
        (SyncDirection::Upload, SyncOutcome::NoOp) => "Upload failed; nothing was saved",
        (SyncDirection::Download, SyncOutcome::RemoteSuccess) => "Downloaded from remote store",
        (SyncDirection::Download, SyncOutcome::LocalFallback) => {
            "Remote store unavailable; restored the local copy"
        }
        (SyncDirection::Download, SyncOutcome::NoOp) => "No sync data found; nothing changed",
    }
}

/// Auto-sync until Ctrl-C. A terminal has no background state, so it is
/// reported as visible for the whole session.
pub async fn run_auto(coordinator: SyncCoordinator<RemoteStoreClient>) -> Result<(), CliError> {
    let (_visibility_tx, visibility_rx) = watch::channel(Visibility::Visible);
    let mut events = coordinator.subscribe();
    let interval = coordinator.config().auto_sync_interval;
    let auto = AutoSync::start(coordinator, visibility_rx);
    println!(
        "Auto-sync running every {}s; press Ctrl-C to stop",
        interval.as_secs()
    );

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
            event = events.recv() => match event {
                Ok(SyncEvent::Finished { direction, outcome }) => {
                    println!("{}", describe_outcome(direction, outcome));
                }
                Ok(_) | Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    auto.stop();
    println!("Auto-sync stopped");
    Ok(())
}
