//! Config subcommand handlers.

use dialoguer::Input;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn prompt_server() -> Result<String, CliError> {
    if !std::io::IsTerminal::is_terminal(&std::io::stdin()) {
        return Err(CliError::Validation {
            field: "server".into(),
            reason: "pass --server <URL> when not running interactively".into(),
        });
    }
    Input::new()
        .with_prompt("Backend URL")
        .default("http://localhost:8099".to_owned())
        .interact_text()
        .map_err(prompt_err)
}

fn check_server(server: &str) -> Result<(), CliError> {
    url::Url::parse(server)
        .map(|_| ())
        .map_err(|e| CliError::Validation {
            field: "server".into(),
            reason: format!("invalid URL '{server}': {e}"),
        })
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init { force } => {
            let path = config::config_path();
            if path.exists() && !force {
                return Err(CliError::ConfigExists {
                    path: path.display().to_string(),
                });
            }

            let server = match &global.server {
                Some(server) => server.clone(),
                None => prompt_server()?,
            };
            check_server(&server)?;

            config::save_config(&Config::starter(&server))?;
            if !global.quiet {
                eprintln!("Wrote {}", path.display());
            }
            Ok(())
        }

        ConfigCommand::Show => {
            let path = config::config_path();
            if !path.exists() {
                return Err(CliError::NoConfig {
                    path: path.display().to_string(),
                });
            }
            let cfg = config::load_config()?;
            let out = output::render_single(
                &global.output,
                &cfg,
                |c| toml::to_string_pretty(c).unwrap_or_default(),
                |c| c.profiles.keys().cloned().collect::<Vec<_>>().join("\n"),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            println!("{}", config::config_path().display());
            Ok(())
        }
    }
}
