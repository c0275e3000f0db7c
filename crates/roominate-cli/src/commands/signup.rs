//! Interactive account creation.

use super::{prompt, prompt_new_password};
use crate::app::App;
use crate::output::{self, OutputFormat};
use anyhow::Result;
use roominate_auth::{Applicant, Role, SignupController, SignupStage};

/// Basic-info form collected from flags.
pub struct SignupForm {
    pub role: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub dob: Option<String>,
}

pub async fn signup(app: &App, form: SignupForm, format: &OutputFormat) -> Result<()> {
    let applicant = match form.role.parse::<Role>().and_then(|role| {
        Applicant::new(
            role,
            &form.first_name,
            &form.last_name,
            form.phone.as_deref(),
            form.dob.as_deref(),
        )
    }) {
        Ok(applicant) => applicant,
        Err(e) => {
            output::print_error(&e.user_message(), format);
            return Ok(());
        }
    };

    let mut flow = SignupController::new(
        app.manager.backend().clone(),
        app.manager.store().clone(),
        app.config.signup_otp_cooldown(),
        applicant,
    )
    .with_prefs(app.manager.prefs().clone());

    if let Err(e) = flow.submit_email(&form.email) {
        output::print_error(&e.user_message(), format);
        return Ok(());
    }
    if let Err(e) = flow.request_otp().await {
        output::print_error(&e.user_message(), format);
        return Ok(());
    }
    println!("A 6-digit code was sent to {}.", form.email.trim());

    while flow.stage() == SignupStage::OtpRequested {
        let code = prompt("Code (r to resend, q to quit): ")?;
        let result = match code.as_str() {
            "q" => return Ok(()),
            "r" => flow.resend_otp().await.map(|()| println!("Code sent again.")),
            code => flow.verify_otp(code).await,
        };
        if let Err(e) = result {
            output::print_error(&e.user_message(), format);
        }
    }

    while flow.stage() == SignupStage::OtpVerified {
        let (password, confirmation) = prompt_new_password()?;
        if let Err(e) = flow.choose_password(&password, &confirmation) {
            output::print_error(&e.user_message(), format);
        }
    }

    match flow.complete().await {
        Ok(outcome) => {
            if !outcome.profile_created {
                output::print_error(
                    "Account created, but your profile could not be saved. You can finish it after signing in.",
                    format,
                );
            }
            let message = if outcome.signed_in {
                format!("Welcome, {}! Signed in as {}", outcome.email, outcome.role)
            } else {
                format!("Account created for {}. Sign in to continue.", outcome.email)
            };
            output::print_success(&message, format);
        }
        Err(e) => output::print_error(&e.user_message(), format),
    }
    Ok(())
}
