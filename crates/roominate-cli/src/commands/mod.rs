//! CLI command implementations.

mod auth;
mod data;
mod reset;
mod signup;

pub use auth::{login, logout, oauth_callback, status};
pub use data::{get_rows, insert_row, update_rows};
pub use reset::reset_password;
pub use signup::{signup, SignupForm};

use anyhow::Result;
use std::io::{self, Write};

/// Read one trimmed line from stdin after printing `label`.
fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Ask for a password and its confirmation without echoing.
fn prompt_new_password() -> Result<(String, String)> {
    let password = rpassword::prompt_password("New password: ")?;
    let confirmation = rpassword::prompt_password("Confirm password: ")?;
    Ok((password, confirmation))
}
