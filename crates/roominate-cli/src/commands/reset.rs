//! Interactive password reset.

use super::{prompt, prompt_new_password};
use crate::app::App;
use crate::output::{self, OutputFormat};
use anyhow::Result;
use roominate_auth::{PasswordResetController, ResetStage};

pub async fn reset_password(app: &App, email: &str, format: &OutputFormat) -> Result<()> {
    let mut flow = PasswordResetController::new(
        app.manager.backend().clone(),
        app.config.reset_otp_cooldown(),
    );

    if let Err(e) = flow.request_code(email).await {
        output::print_error(&e.user_message(), format);
        return Ok(());
    }
    println!("A recovery code was sent to {}.", email.trim());

    while flow.stage() == ResetStage::CodeSent {
        let code = prompt("Code (r to resend, q to quit): ")?;
        let result = match code.as_str() {
            "q" => return Ok(()),
            "r" => flow.resend_code().await.map(|()| println!("Code sent again.")),
            code => flow.verify_code(code).await,
        };
        if let Err(e) = result {
            output::print_error(&e.user_message(), format);
        }
    }

    println!("Use at least 8 characters with upper and lower case letters and a digit.");
    while flow.stage() == ResetStage::CodeVerified {
        let (password, confirmation) = prompt_new_password()?;
        if let Err(e) = flow.set_new_password(&password, &confirmation).await {
            output::print_error(&e.user_message(), format);
        }
    }

    output::print_success("Password updated. You can now sign in.", format);
    Ok(())
}
