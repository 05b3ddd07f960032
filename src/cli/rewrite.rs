//! One-shot document rewrite.

use crate::config::EngineConfig;
use crate::engine::{Backend, RewriteEngine};
use crate::overrides::source::{FileSource, OverrideSource};
use crate::{debug, log};
use anyhow::{Context, Result};
use std::io::{Read, Write};
use std::path::Path;
use std::{fs, io};

/// Rewrite a single HTML document and write it to `output` or stdout.
pub fn run_rewrite(
    config: &EngineConfig,
    input: &Path,
    overrides: &Path,
    output: Option<&Path>,
    page: &str,
    backend: Backend,
) -> Result<()> {
    let html = read_input(input)?;
    let set = FileSource::new(overrides).overrides_for(page);
    debug!("rewrite"; "{} override(s) for page {page}", set.len());

    let engine = RewriteEngine::new(&config.rewrite.data_attribute);
    let outcome = engine.process("text/html", &html, &set, backend);

    if outcome.client_fallback {
        debug!("rewrite"; "some overrides deferred to the client script");
    }

    match output {
        Some(path) => {
            fs::write(path, &outcome.body)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            log!(
                "rewrite";
                "{} override(s) applied, wrote {}",
                set.len(),
                path.display()
            );
        }
        None => {
            io::stdout().write_all(outcome.body.as_bytes())?;
        }
    }
    Ok(())
}

/// Read the input document, `-` meaning stdin.
fn read_input(input: &Path) -> Result<String> {
    if input.as_os_str() == "-" {
        let mut html = String::new();
        io::stdin().read_to_string(&mut html)?;
        return Ok(html);
    }
    fs::read_to_string(input).with_context(|| format!("Failed to read {}", input.display()))
}
