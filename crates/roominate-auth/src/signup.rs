//! Multi-step account creation.
//!
//! ```text
//! RoleSelected -> EmailEntered -> OtpRequested -> OtpVerified -> PasswordChosen -> Complete
//! ```
//!
//! Each stage carries exactly the data collected so far, so a later step can
//! never run with a missing field. Failed backend calls leave the stage as it
//! was.

use crate::backend::{AuthBackend, OtpPurpose};
use crate::otp::OtpChallenge;
use crate::token_store::save_tokens;
use crate::types::{NewProfile, Role, SignupMetadata, SignupRequest};
use crate::validation::{validate_dob, validate_email, validate_name, validate_phone};
use crate::{AuthError, AuthResult, PasswordPolicy, TokenStore};
use chrono::NaiveDate;
use roominate_storage::AppPrefs;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Personal details collected before the email step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applicant {
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub dob: Option<NaiveDate>,
}

impl Applicant {
    /// Validate and normalise the basic-info form.
    pub fn new(
        role: Role,
        first_name: &str,
        last_name: &str,
        phone: Option<&str>,
        dob: Option<&str>,
    ) -> AuthResult<Self> {
        let phone = match phone.map(str::trim).filter(|p| !p.is_empty()) {
            Some(phone) => Some(validate_phone(phone)?),
            None => None,
        };
        let dob = match dob.map(str::trim).filter(|d| !d.is_empty()) {
            Some(dob) => Some(validate_dob(dob)?),
            None => None,
        };
        Ok(Self {
            role,
            first_name: validate_name("First name", first_name)?,
            last_name: validate_name("Last name", last_name)?,
            phone,
            dob,
        })
    }
}

/// A chosen password. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(***)")
    }
}

/// Result of a finished signup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignupOutcome {
    pub user_id: String,
    pub email: String,
    pub role: Role,
    /// Whether a session was obtained and stored.
    pub signed_in: bool,
    /// Whether the profile row was written. Account creation succeeds
    /// regardless.
    pub profile_created: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignupProgress {
    RoleSelected {
        applicant: Applicant,
    },
    EmailEntered {
        applicant: Applicant,
        email: String,
    },
    OtpRequested {
        applicant: Applicant,
        challenge: OtpChallenge,
    },
    OtpVerified {
        applicant: Applicant,
        email: String,
    },
    PasswordChosen {
        applicant: Applicant,
        email: String,
        password: Password,
    },
    Complete(SignupOutcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SignupStage {
    RoleSelected,
    EmailEntered,
    OtpRequested,
    OtpVerified,
    PasswordChosen,
    Complete,
}

impl SignupProgress {
    pub fn stage(&self) -> SignupStage {
        match self {
            SignupProgress::RoleSelected { .. } => SignupStage::RoleSelected,
            SignupProgress::EmailEntered { .. } => SignupStage::EmailEntered,
            SignupProgress::OtpRequested { .. } => SignupStage::OtpRequested,
            SignupProgress::OtpVerified { .. } => SignupStage::OtpVerified,
            SignupProgress::PasswordChosen { .. } => SignupStage::PasswordChosen,
            SignupProgress::Complete(_) => SignupStage::Complete,
        }
    }

    /// Email collected so far, if any.
    pub fn email(&self) -> Option<&str> {
        match self {
            SignupProgress::RoleSelected { .. } => None,
            SignupProgress::EmailEntered { email, .. }
            | SignupProgress::OtpVerified { email, .. }
            | SignupProgress::PasswordChosen { email, .. } => Some(email),
            SignupProgress::OtpRequested { challenge, .. } => Some(challenge.email()),
            SignupProgress::Complete(outcome) => Some(&outcome.email),
        }
    }
}

/// Drives one signup attempt. Progress lives in memory only.
pub struct SignupController {
    backend: Arc<dyn AuthBackend>,
    store: Arc<TokenStore>,
    prefs: Option<AppPrefs>,
    cooldown: Duration,
    progress: SignupProgress,
}

impl SignupController {
    pub fn new(
        backend: Arc<dyn AuthBackend>,
        store: Arc<TokenStore>,
        cooldown: Duration,
        applicant: Applicant,
    ) -> Self {
        debug!(role = %applicant.role, "Signup started");
        Self {
            backend,
            store,
            prefs: None,
            cooldown,
            progress: SignupProgress::RoleSelected { applicant },
        }
    }

    /// Remember the OTP email for form prefill.
    pub fn with_prefs(mut self, prefs: AppPrefs) -> Self {
        self.prefs = Some(prefs);
        self
    }

    pub fn progress(&self) -> &SignupProgress {
        &self.progress
    }

    pub fn stage(&self) -> SignupStage {
        self.progress.stage()
    }

    /// Time left before a resend is allowed, while a code is outstanding.
    pub fn resend_remaining(&self) -> Option<Duration> {
        match &self.progress {
            SignupProgress::OtpRequested { challenge, .. } => Some(challenge.remaining()),
            _ => None,
        }
    }

    fn invalid(&self, action: &str) -> AuthError {
        AuthError::InvalidStateTransition(format!(
            "Cannot {action} at signup stage {:?}",
            self.stage()
        ))
    }

    /// RoleSelected -> EmailEntered.
    pub fn submit_email(&mut self, email: &str) -> AuthResult<()> {
        let SignupProgress::RoleSelected { applicant } = &self.progress else {
            return Err(self.invalid("submit an email"));
        };
        let email = validate_email(email)?;
        self.progress = SignupProgress::EmailEntered {
            applicant: applicant.clone(),
            email,
        };
        Ok(())
    }

    /// EmailEntered -> OtpRequested. On failure the stage does not change and
    /// the request may be retried immediately.
    pub async fn request_otp(&mut self) -> AuthResult<()> {
        let SignupProgress::EmailEntered { applicant, email } = &self.progress else {
            return Err(self.invalid("request a code"));
        };
        let applicant = applicant.clone();
        let mut challenge = OtpChallenge::new(email.clone(), OtpPurpose::Signup, self.cooldown);

        challenge.send(self.backend.as_ref()).await?;
        self.remember_otp_email(challenge.email()).await;

        self.progress = SignupProgress::OtpRequested {
            applicant,
            challenge,
        };
        Ok(())
    }

    /// Send the code again. Refused locally while the cooldown runs.
    pub async fn resend_otp(&mut self) -> AuthResult<()> {
        let backend = self.backend.clone();
        let SignupProgress::OtpRequested { challenge, .. } = &mut self.progress else {
            return Err(self.invalid("resend a code"));
        };
        challenge.send(backend.as_ref()).await
    }

    /// OtpRequested -> OtpVerified. A rejected code leaves the stage at
    /// OtpRequested.
    pub async fn verify_otp(&mut self, code: &str) -> AuthResult<()> {
        let SignupProgress::OtpRequested {
            applicant,
            challenge,
        } = &self.progress
        else {
            return Err(self.invalid("verify a code"));
        };

        challenge.verify(self.backend.as_ref(), code).await?;

        self.progress = SignupProgress::OtpVerified {
            applicant: applicant.clone(),
            email: challenge.email().to_string(),
        };
        Ok(())
    }

    /// OtpVerified -> PasswordChosen, under the signup password policy.
    pub fn choose_password(&mut self, password: &str, confirmation: &str) -> AuthResult<()> {
        let SignupProgress::OtpVerified { applicant, email } = &self.progress else {
            return Err(self.invalid("choose a password"));
        };
        PasswordPolicy::Simple.check(password, confirmation)?;
        self.progress = SignupProgress::PasswordChosen {
            applicant: applicant.clone(),
            email: email.clone(),
            password: Password(password.to_string()),
        };
        Ok(())
    }

    /// PasswordChosen -> Complete.
    ///
    /// The account is authoritative: once it exists the signup completes even
    /// if no session could be stored or the profile row failed to write.
    pub async fn complete(&mut self) -> AuthResult<SignupOutcome> {
        let SignupProgress::PasswordChosen {
            applicant,
            email,
            password,
        } = &self.progress
        else {
            return Err(self.invalid("complete signup"));
        };
        let applicant = applicant.clone();
        let email = email.clone();
        let password = password.clone();

        let generation = self.store.generation();
        let request = SignupRequest {
            email: email.clone(),
            password: password.expose().to_string(),
            data: SignupMetadata {
                first_name: applicant.first_name.clone(),
                last_name: applicant.last_name.clone(),
                role: applicant.role,
                phone: applicant.phone.clone(),
            },
        };

        let (response, signed_in_already) = match self.backend.sign_up(&request).await {
            Ok(response) => (response, false),
            Err(err) if err.is_user_already_exists() => {
                info!("Account already exists; signing in instead");
                let response = self
                    .backend
                    .sign_in_with_password(&email, password.expose())
                    .await?;
                (response, true)
            }
            Err(err) => return Err(err),
        };

        let user_id = response
            .user_id()
            .ok_or_else(|| AuthError::Parse("Sign up response is missing the user id".to_string()))?
            .to_string();
        info!(user_id = %user_id, role = %applicant.role, "Account created");

        let mut tokens = response.tokens();
        if tokens.is_none() && !signed_in_already {
            match self
                .backend
                .sign_in_with_password(&email, password.expose())
                .await
            {
                Ok(response) => tokens = response.tokens(),
                Err(err) => warn!(user_id = %user_id, error = %err, "Sign in after signup failed"),
            }
        }

        let mut signed_in = false;
        let mut profile_created = false;
        match tokens {
            Some(tokens) => {
                match save_tokens(&self.store, generation, &tokens).await {
                    Ok(Some(_)) => signed_in = true,
                    Ok(None) => warn!(user_id = %user_id, "Session cleared during signup; not saved"),
                    Err(err) => warn!(user_id = %user_id, error = %err, "Failed to store session"),
                }

                let profile = NewProfile {
                    id: user_id.clone(),
                    email: email.clone(),
                    first_name: applicant.first_name.clone(),
                    last_name: applicant.last_name.clone(),
                    role: applicant.role,
                    phone: applicant.phone.clone(),
                    dob: applicant.dob.map(|d| d.format("%Y-%m-%d").to_string()),
                };
                match self
                    .backend
                    .upsert_profile(&profile, &tokens.access_token)
                    .await
                {
                    Ok(()) => profile_created = true,
                    Err(err) => {
                        warn!(user_id = %user_id, error = %err, "Profile creation failed; account kept")
                    }
                }
            }
            None => warn!(user_id = %user_id, "No session after signup; skipping profile creation"),
        }

        let outcome = SignupOutcome {
            user_id,
            email,
            role: applicant.role,
            signed_in,
            profile_created,
        };
        self.progress = SignupProgress::Complete(outcome.clone());
        Ok(outcome)
    }

    /// Step back one stage, dropping what that stage collected. Returning
    /// from a sent code lands on EmailEntered, since the code is gone.
    pub fn back(&mut self) -> AuthResult<SignupStage> {
        let previous = match &self.progress {
            SignupProgress::RoleSelected { .. } | SignupProgress::Complete(_) => {
                return Err(self.invalid("go back"));
            }
            SignupProgress::EmailEntered { applicant, .. } => SignupProgress::RoleSelected {
                applicant: applicant.clone(),
            },
            SignupProgress::OtpRequested {
                applicant,
                challenge,
            } => SignupProgress::EmailEntered {
                applicant: applicant.clone(),
                email: challenge.email().to_string(),
            },
            SignupProgress::OtpVerified { applicant, email } => SignupProgress::EmailEntered {
                applicant: applicant.clone(),
                email: email.clone(),
            },
            SignupProgress::PasswordChosen {
                applicant, email, ..
            } => SignupProgress::OtpVerified {
                applicant: applicant.clone(),
                email: email.clone(),
            },
        };
        self.progress = previous;
        debug!(stage = ?self.stage(), "Signup stepped back");
        Ok(self.stage())
    }

    /// Step back until at or before `stage`, returning where it landed.
    pub fn back_to(&mut self, stage: SignupStage) -> AuthResult<SignupStage> {
        if stage >= self.stage() {
            return Err(self.invalid(&format!("go back to {stage:?}")));
        }
        while self.stage() > stage {
            self.back()?;
        }
        Ok(self.stage())
    }

    async fn remember_otp_email(&self, email: &str) {
        let Some(prefs) = self.prefs.clone() else {
            return;
        };
        let email = email.to_string();
        let result = tokio::task::spawn_blocking(move || prefs.set_last_otp_email(&email)).await;
        match result {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(error = %err, "Failed to remember OTP email"),
            Err(err) => warn!(error = %err, "Failed to remember OTP email"),
        }
    }
}
