//! Identity types, coded sign-in errors and form validation.
//!
//! The identity service itself sits behind [`crate::traits::IdentityProvider`].
//! Forms are validated here so that obviously incomplete input never reaches it.

use crate::error::{Result, ValidationError};
use serde::{Deserialize, Serialize};

/// The signed-in user as reported by the identity service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable user ID; namespaces every document in the store.
    pub uid: String,
    /// Account email.
    pub email: String,
    /// Name chosen at sign-up; may be empty.
    pub display_name: String,
}

/// Email and password pair sent to the identity service.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Account email, trimmed.
    pub email: String,
    /// Account password, verbatim.
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Reasons the identity service rejects an operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The email is malformed.
    #[error("invalid email")]
    InvalidEmail,
    /// The password is too weak.
    #[error("weak password")]
    WeakPassword,
    /// An account already uses this email.
    #[error("email already in use")]
    EmailInUse,
    /// Unknown account or wrong password.
    #[error("invalid credentials")]
    InvalidCredentials,
    /// The identity service could not be reached.
    #[error("network failure: {0}")]
    Network(String),
    /// Any other provider code.
    #[error("identity provider error: {0}")]
    Other(String),
}

impl AuthError {
    /// Map a provider error code such as `auth/email-already-in-use`.
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        match code {
            "auth/invalid-email" => Self::InvalidEmail,
            "auth/weak-password" => Self::WeakPassword,
            "auth/email-already-in-use" => Self::EmailInUse,
            "auth/invalid-credential"
            | "auth/invalid-login-credentials"
            | "auth/wrong-password"
            | "auth/user-not-found" => Self::InvalidCredentials,
            "auth/network-request-failed" => Self::Network(code.to_string()),
            other => Self::Other(other.to_string()),
        }
    }

    /// The provider code for this error.
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::InvalidEmail => "auth/invalid-email",
            Self::WeakPassword => "auth/weak-password",
            Self::EmailInUse => "auth/email-already-in-use",
            Self::InvalidCredentials => "auth/invalid-credential",
            Self::Network(_) => "auth/network-request-failed",
            Self::Other(code) => code,
        }
    }

    /// Message shown to the user.
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidEmail => "This email address is not valid.",
            Self::WeakPassword => "This password is too weak. Use at least 6 characters.",
            Self::EmailInUse => "This email is already in use.",
            Self::InvalidCredentials => "Incorrect email or password.",
            Self::Network(_) => "Unable to reach the sign-in service. Check your connection.",
            Self::Other(_) => "Sign-in failed. Please try again.",
        }
    }
}

fn required(value: &str, field: &'static str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField(field).into());
    }
    Ok(())
}

/// Fields of the sign-in screen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignInForm {
    /// Email as typed.
    pub email: String,
    /// Password as typed.
    pub password: String,
}

impl SignInForm {
    /// Check that every field is filled and build the credentials.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingField`] naming the first empty field.
    pub fn validate(&self) -> Result<Credentials> {
        required(&self.email, "email")?;
        required(&self.password, "password")?;
        Ok(Credentials { email: self.email.trim().to_string(), password: self.password.clone() })
    }
}

/// Fields of the registration screen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationForm {
    /// Name shown in the profile; optional.
    pub display_name: String,
    /// Email as typed.
    pub email: String,
    /// Password as typed.
    pub password: String,
    /// Password confirmation as typed.
    pub confirm_password: String,
}

impl RegistrationForm {
    /// Check that every field is filled and the passwords match.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingField`] or
    /// [`ValidationError::PasswordMismatch`].
    pub fn validate(&self) -> Result<Credentials> {
        required(&self.email, "email")?;
        required(&self.password, "password")?;
        required(&self.confirm_password, "password confirmation")?;
        if self.password != self.confirm_password {
            return Err(ValidationError::PasswordMismatch.into());
        }
        Ok(Credentials { email: self.email.trim().to_string(), password: self.password.clone() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_from_code_known_codes() {
        assert_eq!(AuthError::from_code("auth/email-already-in-use"), AuthError::EmailInUse);
        assert_eq!(AuthError::from_code("auth/weak-password"), AuthError::WeakPassword);
        assert_eq!(AuthError::from_code("auth/invalid-email"), AuthError::InvalidEmail);
        assert_eq!(AuthError::from_code("auth/wrong-password"), AuthError::InvalidCredentials);
        assert!(matches!(
            AuthError::from_code("auth/network-request-failed"),
            AuthError::Network(_)
        ));
    }

    #[test]
    fn test_from_code_unknown_is_preserved() {
        let err = AuthError::from_code("auth/quota-exceeded");
        assert_eq!(err, AuthError::Other("auth/quota-exceeded".into()));
        assert_eq!(err.code(), "auth/quota-exceeded");
        assert_eq!(err.user_message(), "Sign-in failed. Please try again.");
    }

    #[test]
    fn test_code_round_trip() {
        for err in [
            AuthError::InvalidEmail,
            AuthError::WeakPassword,
            AuthError::EmailInUse,
            AuthError::InvalidCredentials,
        ] {
            assert_eq!(AuthError::from_code(err.code()), err);
        }
    }

    #[test]
    fn test_sign_in_form_requires_fields() {
        let form = SignInForm { email: "  ".into(), password: "secret".into() };
        assert!(matches!(
            form.validate(),
            Err(Error::Validation(ValidationError::MissingField("email")))
        ));

        let form = SignInForm { email: " sam@example.com ".into(), password: "secret".into() };
        let creds = form.validate().unwrap();
        assert_eq!(creds.email, "sam@example.com");
    }

    #[test]
    fn test_registration_form_password_mismatch() {
        let form = RegistrationForm {
            display_name: String::new(),
            email: "sam@example.com".into(),
            password: "secret1".into(),
            confirm_password: "secret2".into(),
        };
        let err = form.validate().unwrap_err();
        assert_eq!(err.user_message(), "The passwords do not match");
    }

    #[test]
    fn test_registration_form_missing_confirmation() {
        let form = RegistrationForm {
            email: "sam@example.com".into(),
            password: "secret1".into(),
            ..RegistrationForm::default()
        };
        let err = form.validate().unwrap_err();
        assert_eq!(err.user_message(), "Please fill in the password confirmation field");
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials { email: "a@b.c".into(), password: "hunter2".into() };
        let debug = format!("{creds:?}");
        assert!(!debug.contains("hunter2"));
    }
}
