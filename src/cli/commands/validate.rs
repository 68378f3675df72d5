//! `validate` command: checks configuration files without serving.

use std::path::Path;

use serde_json::json;

use crate::cli::args::{OutputFormat, ValidateArgs};
use crate::config::{ConfigLoader, LoadWarning};
use crate::error::{ConfigError, Severity, SignClashError, ValidationIssue};

/// Validate every file, stopping at the first invalid one.
///
/// With `--strict`, load warnings are promoted to errors.
///
/// # Errors
///
/// Returns [`SignClashError::Config`] for the first file that fails.
pub fn run(args: &ValidateArgs) -> Result<(), SignClashError> {
    let loader = ConfigLoader::with_defaults();
    for path in &args.files {
        tracing::info!(file = %path.display(), "validating configuration");
        let result = loader.load(path)?;
        check_warnings(path, &result.warnings, args.strict)?;

        match args.format {
            OutputFormat::Human => println!("{}: ok", path.display()),
            OutputFormat::Json => println!(
                "{}",
                json!({
                    "file": path.display().to_string(),
                    "valid": true,
                    "warnings": result.warnings.iter().map(|w| &w.message).collect::<Vec<_>>(),
                })
            ),
        }
    }
    Ok(())
}

fn check_warnings(
    path: &Path,
    warnings: &[LoadWarning],
    strict: bool,
) -> Result<(), ConfigError> {
    for warning in warnings {
        tracing::warn!(
            location = warning.location.as_deref().unwrap_or("<unknown>"),
            "{}",
            warning.message
        );
    }
    if strict && !warnings.is_empty() {
        return Err(ConfigError::ValidationError {
            path: path.display().to_string(),
            errors: warnings
                .iter()
                .map(|w| ValidationIssue {
                    path: w.location.clone().unwrap_or_default(),
                    message: w.message.clone(),
                    severity: Severity::Error,
                })
                .collect(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn config_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn args(file: &Path, strict: bool) -> ValidateArgs {
        ValidateArgs {
            files: vec![file.to_path_buf()],
            format: OutputFormat::Human,
            strict,
        }
    }

    #[test]
    fn valid_file_passes() {
        let file = config_file("game:\n  sign_cooldown: 2\n");
        assert!(run(&args(file.path(), false)).is_ok());
    }

    #[test]
    fn strict_promotes_warnings() {
        let file = config_file("game:\n  countdown: 5m\n");
        assert!(run(&args(file.path(), false)).is_ok());
        let err = run(&args(file.path(), true)).unwrap_err();
        assert!(matches!(
            err,
            SignClashError::Config(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn invalid_file_fails() {
        let file = config_file("server:\n  bind: nowhere\n");
        let err = run(&args(file.path(), false)).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::ExitCode::CONFIG_ERROR);
    }
}
