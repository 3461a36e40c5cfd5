//! Live watch: stream directory changes or one device's telemetry.

use owo_colors::OwoColorize;

use htfleet_core::{DeviceManager, DeviceUpdate, LinkState};

use crate::cli::{GlobalOpts, WatchArgs};
use crate::error::CliError;
use crate::{config, output};

/// Run until interrupted, printing updates as they arrive.
pub async fn handle(args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let manager_config = config::resolve(global)?;
    let color = output::should_color(&global.color);

    let manager = DeviceManager::connect(manager_config)?;
    let mut link = manager.link_state();

    let result = match args.device {
        Some(ref id) => watch_device(&manager, &mut link, id, color, global).await,
        None => watch_directory(&manager, &mut link, color, global).await,
    };

    manager.shutdown().await;
    result
}

/// Print the whole directory on every change.
async fn watch_directory(
    manager: &DeviceManager,
    link: &mut tokio::sync::watch::Receiver<LinkState>,
    color: bool,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let mut directory = manager.devices();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => return Ok(()),
            changed = link.changed() => {
                if changed.is_err() {
                    return Err(CliError::LinkFailed);
                }
                let state = link.borrow_and_update().clone();
                print_link_state(&state, color, global.quiet);
                if state == LinkState::Failed {
                    return Err(CliError::LinkFailed);
                }
            }
            snapshot = directory.changed() => {
                let Some(snapshot) = snapshot else {
                    return Ok(());
                };
                if !global.quiet {
                    let ids: Vec<&str> = snapshot.iter().map(|d| d.id.as_str()).collect();
                    println!("{} devices: {}", snapshot.len(), ids.join(", "));
                }
            }
        }
    }
}

/// Select one device and print its telemetry as it arrives.
async fn watch_device(
    manager: &DeviceManager,
    link: &mut tokio::sync::watch::Receiver<LinkState>,
    id: &str,
    color: bool,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let mut stream = manager.select(id);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => return Ok(()),
            changed = link.changed() => {
                if changed.is_err() {
                    return Err(CliError::LinkFailed);
                }
                let state = link.borrow_and_update().clone();
                print_link_state(&state, color, global.quiet);
                if state == LinkState::Failed {
                    return Err(CliError::LinkFailed);
                }
            }
            update = stream.next() => {
                let Some(update) = update else {
                    return Ok(());
                };
                print_update(&update);
            }
        }
    }
}

fn print_update(update: &DeviceUpdate) {
    let body = match update {
        DeviceUpdate::Info(record) => serde_json::to_string(record).unwrap_or_default(),
        DeviceUpdate::Status(v)
        | DeviceUpdate::Diag(v)
        | DeviceUpdate::Topics(v)
        | DeviceUpdate::Values(v)
        | DeviceUpdate::Value(v) => v.to_string(),
    };
    println!("{} {}", update.kind(), body);
}

fn print_link_state(state: &LinkState, color: bool, quiet: bool) {
    if quiet {
        return;
    }
    let label = match state {
        LinkState::Connecting => "connecting",
        LinkState::Connected => "connected",
        LinkState::Reconnecting { .. } => "reconnecting",
        LinkState::Failed => "failed",
    };
    if color {
        let line = match state {
            LinkState::Connected => format!("* {}", label.green()),
            LinkState::Failed => format!("* {}", label.red()),
            _ => format!("* {}", label.yellow()),
        };
        eprintln!("{line}");
    } else {
        eprintln!("* {label}");
    }
}
