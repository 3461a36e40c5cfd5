//! Config command handlers.

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let cfg = config::load_config()?;
            let out = output::render_single(
                &global.output,
                &cfg,
                |c| {
                    [
                        format!("server:   {}", c.server.as_deref().unwrap_or("-")),
                        format!("insecure: {}", c.insecure),
                        format!("timeout:  {}s", c.timeout),
                    ]
                    .join("\n")
                },
                |c| c.server.clone().unwrap_or_default(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Init { server } => {
            // Validate before writing so a typo doesn't poison the file.
            let _: url::Url = server.parse().map_err(|_| CliError::Validation {
                field: "server".into(),
                reason: format!("invalid URL: {server}"),
            })?;

            let cfg = Config {
                server: Some(server),
                ..Config::default()
            };
            let path = config::save_config(&cfg)?;
            if !global.quiet {
                eprintln!("Wrote {}", path.display());
            }
            Ok(())
        }
    }
}
