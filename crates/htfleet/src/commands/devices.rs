//! Device command handlers.

use std::io::{self, IsTerminal, Read};

use bytesize::ByteSize;
use chrono::{DateTime, Utc};
use tabled::Tabled;

use htfleet_api::{DeviceDiag, DeviceRecord, RestClient};

use crate::cli::{DevicesArgs, DevicesCommand, GlobalOpts, OutputFormat, ProfileCommand};
use crate::error::CliError;
use crate::{config, output};

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Description")]
    description: String,
    #[tabled(rename = "Type")]
    dtype: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "IP")]
    ip: String,
    #[tabled(rename = "Flash")]
    memory: String,
    #[tabled(rename = "Last Seen")]
    last_seen: String,
}

impl From<&DeviceRecord> for DeviceRow {
    fn from(d: &DeviceRecord) -> Self {
        Self {
            id: d.id.clone(),
            description: d.description.clone(),
            dtype: d.device_type.clone(),
            version: d.version.clone(),
            ip: d.ip_addr.clone(),
            memory: if d.memory == 0 {
                "-".into()
            } else {
                ByteSize(d.memory).to_string()
            },
            last_seen: ago(d.last_seen),
        }
    }
}

/// Human-friendly "3m 2s ago" rendering of a timestamp.
fn ago(ts: Option<DateTime<Utc>>) -> String {
    let Some(ts) = ts else {
        return "never".into();
    };
    let elapsed = (Utc::now() - ts).to_std().unwrap_or_default();
    // Sub-second precision is noise here.
    let rounded = std::time::Duration::from_secs(elapsed.as_secs());
    format!("{} ago", humantime::format_duration(rounded))
}

fn detail(d: &DeviceRecord) -> String {
    let mut lines = vec![
        format!("ID:           {}", d.id),
        format!("Description:  {}", dash_if_empty(&d.description)),
        format!("Type:         {}", dash_if_empty(&d.device_type)),
        format!("Version:      {}", dash_if_empty(&d.version)),
        format!("IP:           {}", dash_if_empty(&d.ip_addr)),
        format!(
            "Flash:        {}",
            if d.memory == 0 {
                "-".into()
            } else {
                ByteSize(d.memory).to_string()
            }
        ),
        format!("Last seen:    {}", ago(d.last_seen)),
    ];
    if !d.capabilities.is_empty() {
        lines.push(format!("Capabilities: {}", d.capabilities.join(", ")));
    }
    lines.join("\n")
}

fn diag_detail(diag: &DeviceDiag) -> String {
    let uptime = std::time::Duration::from_secs(diag.uptime);
    let mut lines = vec![
        format!("Last seen: {}", ago(diag.last_seen)),
        format!("Uptime:    {}", humantime::format_duration(uptime)),
        format!("Heap free: {}", ByteSize(diag.mem.free)),
        format!("Heap low:  {}", ByteSize(diag.mem.low)),
    ];
    if !diag.tasks.is_empty() {
        lines.push("Tasks:".into());
        for task in &diag.tasks {
            lines.push(format!(
                "  {:<16} stack min left {}",
                task.name, task.stack_min_left
            ));
        }
    }
    lines.join("\n")
}

fn dash_if_empty(s: &str) -> &str {
    if s.is_empty() { "-" } else { s }
}

// ── Handler ─────────────────────────────────────────────────────────

#[allow(clippy::too_many_lines)]
pub async fn handle(args: DevicesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let manager_config = config::resolve(global)?;
    let client = RestClient::new(
        manager_config.base_url.clone(),
        &manager_config.transport(),
    )
    .map_err(|e| CliError::from_api(e, &manager_config.base_url, ""))?;
    let wrap = |id: &str| {
        let url = manager_config.base_url.clone();
        let id = id.to_owned();
        move |e: htfleet_api::Error| CliError::from_api(e, &url, &id)
    };

    match args.command {
        DevicesCommand::List => {
            let devices = client.list_devices().await.map_err(wrap(""))?;
            let out = output::render_list(&global.output, &devices, |d| DeviceRow::from(d), |d| {
                d.id.clone()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        DevicesCommand::Get { device } => {
            let record = client.device_info(&device).await.map_err(wrap(&device))?;
            let out = output::render_single(&global.output, &record, detail, |d| d.id.clone());
            output::print_output(&out, global.quiet);
            Ok(())
        }

        DevicesCommand::Diag { device } => {
            let diag = client.device_diag(&device).await.map_err(wrap(&device))?;
            let out = output::render_single(&global.output, &diag, diag_detail, |_| {
                device.clone()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        DevicesCommand::Status { device } => {
            let status = client.device_status(&device).await.map_err(wrap(&device))?;
            output::print_output(&status, global.quiet);
            Ok(())
        }

        DevicesCommand::Profile(profile) => match profile.command {
            ProfileCommand::Get { device } => {
                let text = client.device_profile(&device).await.map_err(wrap(&device))?;
                output::print_output(&text, global.quiet);
                Ok(())
            }
            ProfileCommand::Set { device, file } => {
                let text = match file {
                    Some(path) => std::fs::read_to_string(path)?,
                    None => {
                        let mut buf = String::new();
                        io::stdin().read_to_string(&mut buf)?;
                        buf
                    }
                };
                client
                    .set_device_profile(&device, &text)
                    .await
                    .map_err(wrap(&device))?;
                if !global.quiet {
                    eprintln!("Profile updated");
                }
                Ok(())
            }
        },

        DevicesCommand::Topics { device, values } => {
            let data = if values {
                client
                    .device_topic_values(&device)
                    .await
                    .map_err(wrap(&device))?
            } else {
                client.device_topics(&device).await.map_err(wrap(&device))?
            };
            let out = output::render_single(
                &global.output,
                &data,
                |v| serde_json::to_string_pretty(v).unwrap_or_default(),
                std::string::ToString::to_string,
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        DevicesCommand::Versions { device } => {
            let versions = client.update_versions(&device).await.map_err(wrap(&device))?;
            let out = match global.output {
                OutputFormat::Table | OutputFormat::Plain => versions.join("\n"),
                ref format => output::render_single(
                    format,
                    &versions,
                    |v| v.join("\n"),
                    |v| v.join("\n"),
                ),
            };
            output::print_output(&out, global.quiet);
            Ok(())
        }

        DevicesCommand::Reboot { device } => {
            client.reboot_device(&device).await.map_err(wrap(&device))?;
            if !global.quiet {
                eprintln!("Restart requested");
            }
            Ok(())
        }

        DevicesCommand::Update {
            device,
            firmware_version,
        } => {
            client
                .update_device(&device, &firmware_version)
                .await
                .map_err(wrap(&device))?;
            if !global.quiet {
                eprintln!("Update to {firmware_version} requested");
            }
            Ok(())
        }

        DevicesCommand::Delete { device } => {
            if !confirm(&format!("delete device '{device}'"), global.yes)? {
                if !global.quiet {
                    eprintln!("Aborted");
                }
                return Ok(());
            }
            client.delete_device(&device).await.map_err(wrap(&device))?;
            if !global.quiet {
                eprintln!("Device {device} deleted");
            }
            Ok(())
        }
    }
}

/// Confirm a destructive action, honoring `--yes` and refusing to guess
/// in non-interactive contexts.
fn confirm(action: &str, yes: bool) -> Result<bool, CliError> {
    if yes {
        return Ok(true);
    }
    if !io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: action.to_owned(),
        });
    }
    dialoguer::Confirm::new()
        .with_prompt(format!("Really {action}?"))
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(io::Error::other(e.to_string())))
}
