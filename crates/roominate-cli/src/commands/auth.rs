//! Session commands.

use super::prompt;
use crate::app::App;
use crate::output::{self, OutputFormat};
use anyhow::Result;

/// Show the current session.
pub fn status(app: &App, format: &OutputFormat) -> Result<()> {
    let status = app.manager.status()?;

    match format {
        OutputFormat::Json => output::print_json(&status),
        OutputFormat::Text => {
            output::print_heading("Session");
            output::print_row("State", &format!("{:?}", status.state));
            output::print_row(
                "Authenticated",
                if status.state.is_authenticated() { "yes" } else { "no" },
            );
            if let Some(tier) = status.token_tier {
                output::print_row("Token tier", &format!("{:?}", tier));
            }
            if let Some(expires_at) = status.expires_at {
                output::print_row("Expires", &expires_at.to_rfc3339());
            }
            if let Some(user_id) = &status.user_id {
                output::print_row("User", user_id);
            }
            if let Some(role) = &status.role {
                output::print_row("Role", role);
            }
            if let Some(email) = &status.last_signed_email {
                output::print_row("Last email", email);
            }
        }
    }
    Ok(())
}

/// Sign in with email and password.
pub async fn login(app: &App, email: Option<String>, format: &OutputFormat) -> Result<()> {
    if app.manager.state().is_authenticated() {
        let who = app
            .manager
            .prefs()
            .get_last_signed_email()?
            .unwrap_or_else(|| "current user".to_string());
        output::print_success(&format!("Already logged in as {}", who), format);
        return Ok(());
    }

    let email = match email {
        Some(email) => email,
        None => {
            let last = app.manager.prefs().get_last_signed_email()?;
            let label = match &last {
                Some(last) => format!("Email [{}]: ", last),
                None => "Email: ".to_string(),
            };
            let typed = prompt(&label)?;
            match last {
                Some(last) if typed.is_empty() => last,
                _ => typed,
            }
        }
    };

    let password = rpassword::prompt_password("Password: ")?;

    match app.manager.sign_in(&email, &password).await {
        Ok(outcome) => {
            let who = outcome.email.unwrap_or(outcome.user_id);
            output::print_success(&format!("Logged in as {} ({})", who, outcome.role), format);
        }
        Err(e) => output::print_error(&e.user_message(), format),
    }
    Ok(())
}

/// Sign out and clear local tokens.
pub async fn logout(app: &App, format: &OutputFormat) -> Result<()> {
    match app.manager.sign_out().await {
        Ok(()) => output::print_success("Logged out", format),
        Err(e) => output::print_error(&e.user_message(), format),
    }
    Ok(())
}

/// Store tokens from an OAuth redirect.
pub async fn oauth_callback(app: &App, url: &str, format: &OutputFormat) -> Result<()> {
    match app.manager.complete_oauth_callback(url).await {
        Ok(session) => {
            let expires = session
                .expires_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "unknown".to_string());
            output::print_success(&format!("Signed in; session expires {}", expires), format);
        }
        Err(e) => output::print_error(&e.user_message(), format),
    }
    Ok(())
}
