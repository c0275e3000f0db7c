//! Local input checks applied before any backend call.

use crate::{AuthError, AuthResult};
use chrono::NaiveDate;

/// Length of an emailed verification code.
pub const OTP_LENGTH: usize = 6;

/// Loose email check: contains an `@` and a `.`.
///
/// This is deliberately not RFC 5322; the backend is the authority.
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    email.contains('@') && email.contains('.')
}

/// Trim and check an email, returning the trimmed form.
pub fn validate_email(email: &str) -> AuthResult<String> {
    let trimmed = email.trim();
    if trimmed.is_empty() {
        return Err(AuthError::Validation("Email is required".to_string()));
    }
    if !is_valid_email(trimmed) {
        return Err(AuthError::Validation(
            "Please enter a valid email address".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

/// A verification code must be exactly six ASCII digits.
pub fn validate_otp_code(code: &str) -> AuthResult<String> {
    let code = code.trim();
    if code.len() != OTP_LENGTH || !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(AuthError::Validation(
            "Please enter the 6-digit code".to_string(),
        ));
    }
    Ok(code.to_string())
}

pub fn validate_name(field: &str, value: &str) -> AuthResult<String> {
    let trimmed = value.trim();
    if trimmed.chars().count() < 2 {
        return Err(AuthError::Validation(format!(
            "{field} must be at least 2 characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Phone numbers need at least ten digits; separators are allowed.
pub fn validate_phone(phone: &str) -> AuthResult<String> {
    let trimmed = phone.trim();
    let digits = trimmed.chars().filter(|c| c.is_ascii_digit()).count();
    let allowed = trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')'));
    if digits < 10 || !allowed {
        return Err(AuthError::Validation(
            "Please enter a valid phone number".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

/// Date of birth in `YYYY-MM-DD` form.
pub fn validate_dob(dob: &str) -> AuthResult<NaiveDate> {
    NaiveDate::parse_from_str(dob.trim(), "%Y-%m-%d").map_err(|_| {
        AuthError::Validation("Date of birth must be in YYYY-MM-DD format".to_string())
    })
}

/// Password rules. Signup and password reset enforce different ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordPolicy {
    /// At least 6 characters (account creation).
    Simple,
    /// At least 8 characters with upper case, lower case and a digit
    /// (password reset).
    Strict,
}

impl PasswordPolicy {
    pub fn min_length(&self) -> usize {
        match self {
            PasswordPolicy::Simple => 6,
            PasswordPolicy::Strict => 8,
        }
    }

    /// Check `password` and its confirmation against this policy.
    pub fn check(&self, password: &str, confirmation: &str) -> AuthResult<()> {
        if password.is_empty() {
            return Err(AuthError::Validation("Password is required".to_string()));
        }
        if password.chars().count() < self.min_length() {
            return Err(AuthError::Validation(format!(
                "Password must be at least {} characters",
                self.min_length()
            )));
        }
        if *self == PasswordPolicy::Strict {
            let has_upper = password.chars().any(|c| c.is_uppercase());
            let has_lower = password.chars().any(|c| c.is_lowercase());
            let has_digit = password.chars().any(|c| c.is_ascii_digit());
            if !(has_upper && has_lower && has_digit) {
                return Err(AuthError::Validation(
                    "Password must contain uppercase, lowercase, and a number".to_string(),
                ));
            }
        }
        if password != confirmation {
            return Err(AuthError::Validation("Passwords do not match".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrengthLevel {
    Weak,
    Medium,
    Strong,
}

/// Informational strength meter shown while a password is typed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordStrength {
    /// 0 to 100.
    pub score: u8,
    pub level: StrengthLevel,
}

pub fn password_strength(password: &str) -> PasswordStrength {
    let mut score: u32 = 0;
    if password.chars().count() >= 8 {
        score += 25;
    }
    if password.chars().any(|c| c.is_lowercase()) {
        score += 15;
    }
    if password.chars().any(|c| c.is_uppercase()) {
        score += 20;
    }
    if password.chars().any(|c| c.is_ascii_digit()) {
        score += 20;
    }
    if password.chars().any(|c| !c.is_alphanumeric()) {
        score += 20;
    }
    let score = score.min(100) as u8;

    let level = match score {
        0..=39 => StrengthLevel::Weak,
        40..=69 => StrengthLevel::Medium,
        _ => StrengthLevel::Strong,
    };

    PasswordStrength { score, level }
}
