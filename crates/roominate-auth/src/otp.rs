//! The one-time-code challenge shared by signup and password reset.

use crate::backend::{AuthBackend, OtpPurpose};
use crate::validation::validate_otp_code;
use crate::{AuthError, AuthResult, OtpVerification};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// A code sent to one email address, with a resend cooldown.
///
/// The cooldown is enforced here, on the client only. It keeps honest users
/// from hammering the send endpoint and is not a security control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpChallenge {
    email: String,
    purpose: OtpPurpose,
    cooldown: Duration,
    last_sent_at: Option<Instant>,
}

impl OtpChallenge {
    pub fn new(email: impl Into<String>, purpose: OtpPurpose, cooldown: Duration) -> Self {
        Self {
            email: email.into(),
            purpose,
            cooldown,
            last_sent_at: None,
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn purpose(&self) -> OtpPurpose {
        self.purpose
    }

    /// Time left before another send is allowed.
    pub fn remaining(&self) -> Duration {
        match self.last_sent_at {
            Some(sent) => self.cooldown.saturating_sub(sent.elapsed()),
            None => Duration::ZERO,
        }
    }

    pub fn can_resend(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Send (or resend) the code.
    ///
    /// Inside the cooldown window this fails with
    /// [`AuthError::CooldownActive`] without touching the backend. A successful
    /// send restarts the window; a failed one leaves it as it was, so the user
    /// may retry straight away after a network error on the first send.
    pub async fn send(&mut self, backend: &dyn AuthBackend) -> AuthResult<()> {
        let remaining = self.remaining();
        if !remaining.is_zero() {
            let remaining_secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
            debug!(purpose = ?self.purpose, remaining_secs, "OTP resend blocked by cooldown");
            return Err(AuthError::CooldownActive { remaining_secs });
        }

        backend.send_otp(self.purpose, &self.email).await?;
        self.last_sent_at = Some(Instant::now());
        info!(purpose = ?self.purpose, "OTP sent");
        Ok(())
    }

    /// Check `code` locally, then with the backend.
    pub async fn verify(&self, backend: &dyn AuthBackend, code: &str) -> AuthResult<OtpVerification> {
        let code = validate_otp_code(code)?;
        let verification = backend.verify_otp(self.purpose, &self.email, &code).await?;
        info!(purpose = ?self.purpose, "OTP verified");
        Ok(verification)
    }
}
