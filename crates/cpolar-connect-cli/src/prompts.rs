//! Interactive prompt helpers.
//!
//! Ctrl-C during a prompt is mapped to [`CliError::Interrupted`] so the
//! process can exit quietly with the conventional interrupt code instead
//! of printing an error.

use dialoguer::{Confirm, Input, Password};

use crate::commands::{CliError, Result};

/// Prompt for a line of text, optionally with a default.
pub fn input(prompt: &str, default: Option<&str>) -> Result<String> {
    let mut builder = Input::<String>::new().with_prompt(prompt);
    if let Some(default) = default {
        builder = builder.default(default.to_string());
    }
    builder.interact_text().map_err(map_prompt_error)
}

/// Prompt for a password without echo.
pub fn password(prompt: &str) -> Result<String> {
    Password::new()
        .with_prompt(prompt)
        .interact()
        .map_err(map_prompt_error)
}

/// Yes/no confirmation.
pub fn confirm(prompt: &str, default: bool) -> Result<bool> {
    Confirm::new()
        .with_prompt(prompt)
        .default(default)
        .interact()
        .map_err(map_prompt_error)
}

fn map_prompt_error(err: dialoguer::Error) -> CliError {
    match &err {
        dialoguer::Error::IO(io) if io.kind() == std::io::ErrorKind::Interrupted => {
            CliError::Interrupted
        }
        _ => CliError::Prompt(err),
    }
}
