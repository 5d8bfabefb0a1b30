//! Subcommand implementations.

pub mod account;
pub mod address;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod contact;
pub mod orders;

use std::io::{BufRead, Write};

use thiserror::Error;

use craftmart_storefront::config::ConfigError;
use craftmart_storefront::error::AppError;

use crate::views;

/// Errors surfaced by a CLI command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A storefront operation failed.
    #[error("{}", views::error(.0))]
    App(#[from] AppError),

    /// Terminal I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Arguments did not name anything that exists.
    #[error("{0}")]
    Invalid(String),
}

impl CliError {
    /// Returns `true` if the shopper should sign in and retry.
    pub const fn is_auth_required(&self) -> bool {
        matches!(self, Self::App(err) if err.is_auth_required())
    }
}

/// Write a rendered view to stdout.
#[allow(clippy::print_stdout)]
pub fn emit(text: &str) {
    println!("{text}");
}

/// Ask a yes/no question on the terminal. Anything but `y`/`yes` is a no.
///
/// # Errors
///
/// Returns an error if the terminal cannot be read or written.
pub fn confirm(prompt: &str) -> Result<bool, CliError> {
    let mut stdout = std::io::stdout().lock();
    write!(stdout, "{prompt} [y/N] ")?;
    stdout.flush()?;

    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

/// Case-insensitive lookup by name, or by id when `wanted` is numeric.
fn find_by_name_or_id<'a, T>(
    items: &'a [T],
    wanted: &str,
    id: impl Fn(&T) -> i64,
    name: impl Fn(&T) -> &str,
) -> Option<&'a T> {
    let wanted = wanted.trim();
    match wanted.parse::<i64>() {
        Ok(n) => items.iter().find(|item| id(item) == n),
        Err(_) => items
            .iter()
            .find(|item| name(item).eq_ignore_ascii_case(wanted)),
    }
}
