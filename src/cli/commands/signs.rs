//! `signs` command: prints the ring and each sign's beats set.

use std::fmt::Write as _;

use crate::cli::args::{OutputFormat, SignsArgs};
use crate::error::SignClashError;
use crate::transport::http::sign_listing;

/// Renders the sign ring.
///
/// # Errors
///
/// Returns [`SignClashError::Json`] if JSON encoding fails.
pub fn render(format: OutputFormat) -> Result<String, SignClashError> {
    let listing = sign_listing();
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&listing)?),
        OutputFormat::Human => {
            let mut out = String::new();
            for info in &listing {
                let beats: Vec<&str> = info.beats.iter().map(|s| s.name()).collect();
                let _ = writeln!(
                    out,
                    "{:>2}  {:<10} beats {}",
                    info.position,
                    info.name.name(),
                    beats.join(", ")
                );
            }
            Ok(out)
        }
    }
}

/// Print the sign ring.
///
/// # Errors
///
/// Returns [`SignClashError::Json`] if JSON encoding fails.
pub fn run(args: &SignsArgs) -> Result<(), SignClashError> {
    print!("{}", render(args.format)?);
    Ok(())
}
