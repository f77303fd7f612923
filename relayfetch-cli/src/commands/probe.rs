//! `relayfetch exists` and `relayfetch length` - synchronous URL probes.

use console::style;

use super::common::Engine;
use crate::error::CliError;

/// Run the exists probe. A missing resource is reported as an error.
pub fn exists(url: &str, engine: &mut Engine) -> Result<(), CliError> {
    let found = engine.fetcher.is_exist(url);
    engine.pump();

    if found {
        println!("{} {}", style("found").green(), url);
        Ok(())
    } else {
        Err(CliError::NotFound(url.to_string()))
    }
}

/// Run the length probe, printing `-1` when the length is unknown.
pub fn length(url: &str, engine: &mut Engine) -> Result<(), CliError> {
    let length = engine.fetcher.content_length(url);
    engine.pump();

    println!("{}", length);
    Ok(())
}
