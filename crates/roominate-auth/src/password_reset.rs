//! Forgotten-password flow: email, emailed recovery code, new password.

use crate::backend::{AuthBackend, OtpPurpose};
use crate::otp::OtpChallenge;
use crate::validation::validate_email;
use crate::{AuthError, AuthResult, PasswordPolicy};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Clone, PartialEq, Eq)]
pub enum ResetProgress {
    EmailEntry,
    CodeSent {
        challenge: OtpChallenge,
    },
    /// The recovery token authorises exactly one password update.
    CodeVerified {
        email: String,
        recovery_token: String,
    },
    Complete {
        email: String,
    },
}

impl fmt::Debug for ResetProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResetProgress::EmailEntry => f.write_str("EmailEntry"),
            ResetProgress::CodeSent { challenge } => f
                .debug_struct("CodeSent")
                .field("challenge", challenge)
                .finish(),
            ResetProgress::CodeVerified { email, .. } => f
                .debug_struct("CodeVerified")
                .field("email", email)
                .finish_non_exhaustive(),
            ResetProgress::Complete { email } => {
                f.debug_struct("Complete").field("email", email).finish()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetStage {
    EmailEntry,
    CodeSent,
    CodeVerified,
    Complete,
}

/// Drives one password reset.
pub struct PasswordResetController {
    backend: Arc<dyn AuthBackend>,
    cooldown: Duration,
    progress: ResetProgress,
}

impl PasswordResetController {
    pub fn new(backend: Arc<dyn AuthBackend>, cooldown: Duration) -> Self {
        Self {
            backend,
            cooldown,
            progress: ResetProgress::EmailEntry,
        }
    }

    pub fn progress(&self) -> &ResetProgress {
        &self.progress
    }

    pub fn stage(&self) -> ResetStage {
        match self.progress {
            ResetProgress::EmailEntry => ResetStage::EmailEntry,
            ResetProgress::CodeSent { .. } => ResetStage::CodeSent,
            ResetProgress::CodeVerified { .. } => ResetStage::CodeVerified,
            ResetProgress::Complete { .. } => ResetStage::Complete,
        }
    }

    pub fn resend_remaining(&self) -> Option<Duration> {
        match &self.progress {
            ResetProgress::CodeSent { challenge } => Some(challenge.remaining()),
            _ => None,
        }
    }

    fn invalid(&self, action: &str) -> AuthError {
        AuthError::InvalidStateTransition(format!(
            "Cannot {action} at reset stage {:?}",
            self.stage()
        ))
    }

    /// EmailEntry -> CodeSent.
    pub async fn request_code(&mut self, email: &str) -> AuthResult<()> {
        if !matches!(self.progress, ResetProgress::EmailEntry) {
            return Err(self.invalid("request a code"));
        }
        let email = validate_email(email)?;
        let mut challenge = OtpChallenge::new(email, OtpPurpose::Recovery, self.cooldown);
        challenge.send(self.backend.as_ref()).await?;
        self.progress = ResetProgress::CodeSent { challenge };
        Ok(())
    }

    pub async fn resend_code(&mut self) -> AuthResult<()> {
        let backend = self.backend.clone();
        let ResetProgress::CodeSent { challenge } = &mut self.progress else {
            return Err(self.invalid("resend a code"));
        };
        challenge.send(backend.as_ref()).await
    }

    /// CodeSent -> CodeVerified. The backend must hand back a recovery token;
    /// without one the stage stays at CodeSent.
    pub async fn verify_code(&mut self, code: &str) -> AuthResult<()> {
        let ResetProgress::CodeSent { challenge } = &self.progress else {
            return Err(self.invalid("verify a code"));
        };

        let verification = challenge.verify(self.backend.as_ref(), code).await?;
        let recovery_token = verification
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                AuthError::Parse("Verification response is missing the access token".to_string())
            })?;

        self.progress = ResetProgress::CodeVerified {
            email: challenge.email().to_string(),
            recovery_token,
        };
        Ok(())
    }

    /// CodeVerified -> Complete, under the strict password policy.
    pub async fn set_new_password(&mut self, password: &str, confirmation: &str) -> AuthResult<()> {
        let ResetProgress::CodeVerified {
            email,
            recovery_token,
        } = &self.progress
        else {
            return Err(self.invalid("set a new password"));
        };
        PasswordPolicy::Strict.check(password, confirmation)?;

        self.backend
            .update_password(recovery_token, password)
            .await?;

        info!("Password reset complete");
        self.progress = ResetProgress::Complete {
            email: email.clone(),
        };
        Ok(())
    }

    /// Abandon the current attempt and return to email entry.
    pub fn restart(&mut self) {
        debug!(stage = ?self.stage(), "Password reset restarted");
        self.progress = ResetProgress::EmailEntry;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_hides_recovery_token() {
        let progress = ResetProgress::CodeVerified {
            email: "a@b.com".to_string(),
            recovery_token: "secret-token".to_string(),
        };
        let printed = format!("{progress:?}");
        assert!(printed.contains("a@b.com"));
        assert!(!printed.contains("secret-token"));
    }
}
