use serde::Serialize;
use tvsync_core::{RemoteStoreClient, SyncCoordinator};

use crate::commands::common::{display_path, format_sync_timestamp, CliContext};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub user_id: String,
    pub data_file: String,
    pub sync_url: String,
    pub remote_enabled: bool,
    pub force_remote: bool,
    pub last_sync_time: Option<i64>,
    pub has_local_copy: bool,
}

pub fn collect_status(context: &CliContext) -> Result<StatusReport, CliError> {
    let coordinator = &context.coordinator;
    let user_id = coordinator.user_id()?;
    Ok(StatusReport {
        data_file: display_path(&context.data_file),
        sync_url: coordinator.config().sync_url(),
        remote_enabled: coordinator.remote_enabled(),
        force_remote: coordinator.device().force_remote()?,
        last_sync_time: coordinator.device().last_sync_time()?,
        has_local_copy: coordinator.cache().read_fallback(&user_id)?.is_some(),
        user_id: user_id.to_string(),
    })
}

pub fn format_status_lines(report: &StatusReport) -> Vec<String> {
    let last_sync = report
        .last_sync_time
        .map_or_else(|| "never".to_string(), format_sync_timestamp);
    let mode = if report.remote_enabled {
        "remote"
    } else {
        "local only"
    };
    vec![
        format!("User id:     {}", report.user_id),
        format!("Data file:   {}", report.data_file),
        format!("Sync URL:    {}", report.sync_url),
        format!("Mode:        {mode}"),
        format!("Last sync:   {last_sync}"),
        format!(
            "Local copy:  {}",
            if report.has_local_copy { "yes" } else { "no" }
        ),
    ]
}

pub fn run_status(context: &CliContext, as_json: bool) -> Result<(), CliError> {
    let report = collect_status(context)?;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for line in format_status_lines(&report) {
            println!("{line}");
        }
    }
    Ok(())
}

pub fn run_force_remote(
    coordinator: &SyncCoordinator<RemoteStoreClient>,
    enabled: bool,
) -> Result<(), CliError> {
    coordinator.device().set_force_remote(enabled)?;
    let effective = if coordinator.remote_enabled() {
        "remote sync enabled"
    } else {
        "local only"
    };
    println!(
        "Force remote {}; {effective}",
        if enabled { "on" } else { "off" }
    );
    Ok(())
}
