//! Backend health probe. Does not start the engine.

use bluesync_core::{Engine, EngineConfig};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

pub async fn handle(config: EngineConfig, global: &GlobalOpts) -> Result<(), CliError> {
    let url = config.url.to_string();
    let engine = Engine::new(config)?;
    let health = engine.health().await?;

    let out = output::render_single(
        &global.output,
        &health,
        |h| {
            let mut line = format!("{url}: {}", h.status);
            if let Some(ts) = &h.timestamp {
                line.push_str(&format!(" ({ts})"));
            }
            line
        },
        |h| h.status.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
