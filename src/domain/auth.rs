//! Identity types shared between the account service and the HTTP layer.

use serde::{Deserialize, Serialize};

/// Closed set of identity failures.
///
/// Provider error codes are folded into these kinds by [`AuthErrorKind::from_code`],
/// and each kind has a fixed user-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    UserNotFound,
    WrongPassword,
    InvalidCredential,
    EmailAlreadyInUse,
    WeakPassword,
    InvalidEmail,
    UserDisabled,
    TooManyRequests,
    NetworkRequestFailed,
    MissingToken,
    InvalidToken,
    Unknown,
}

impl AuthErrorKind {
    /// Map a provider error code to a kind.
    ///
    /// Accepts both the REST API codes (`EMAIL_NOT_FOUND`,
    /// `WEAK_PASSWORD : Password should be ...`) and the client SDK codes
    /// (`auth/user-not-found`). Anything unrecognized is `Unknown`.
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        let code = code.split(" : ").next().unwrap_or_default().trim();

        match code {
            "EMAIL_NOT_FOUND" | "USER_NOT_FOUND" | "auth/user-not-found" => Self::UserNotFound,
            "INVALID_PASSWORD" | "auth/wrong-password" => Self::WrongPassword,
            "INVALID_LOGIN_CREDENTIALS" | "auth/invalid-credential" => Self::InvalidCredential,
            "EMAIL_EXISTS" | "auth/email-already-in-use" => Self::EmailAlreadyInUse,
            "WEAK_PASSWORD" | "auth/weak-password" => Self::WeakPassword,
            "INVALID_EMAIL" | "MISSING_EMAIL" | "auth/invalid-email" => Self::InvalidEmail,
            "USER_DISABLED" | "auth/user-disabled" => Self::UserDisabled,
            "TOO_MANY_ATTEMPTS_TRY_LATER" | "auth/too-many-requests" => Self::TooManyRequests,
            "auth/network-request-failed" => Self::NetworkRequestFailed,
            "INVALID_ID_TOKEN" | "TOKEN_EXPIRED" | "auth/id-token-expired"
            | "auth/argument-error" => Self::InvalidToken,
            _ => Self::Unknown,
        }
    }

    /// Human-readable message for this kind.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::UserNotFound => "No account found with this email address",
            Self::WrongPassword => "Incorrect password",
            Self::InvalidCredential => "Invalid email or password",
            Self::EmailAlreadyInUse => "An account with this email already exists",
            Self::WeakPassword => "Password should be at least 6 characters",
            Self::InvalidEmail => "Invalid email address",
            Self::UserDisabled => "This account has been disabled",
            Self::TooManyRequests => "Too many failed attempts. Please try again later",
            Self::NetworkRequestFailed => "Network error. Please check your connection",
            Self::MissingToken => "No authentication token provided",
            Self::InvalidToken => "Invalid or expired authentication token",
            Self::Unknown => "An error occurred. Please try again.",
        }
    }

    /// Kinds caused by bad sign-up input rather than a rejected credential.
    #[must_use]
    pub const fn is_input_problem(self) -> bool {
        matches!(
            self,
            Self::EmailAlreadyInUse | Self::WeakPassword | Self::InvalidEmail
        )
    }
}

/// A caller whose bearer token has been verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedUser {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

/// Result of a successful sign-in or sign-up.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    /// Bearer token for subsequent API calls.
    pub token: String,
    pub refresh_token: Option<String>,
    /// Token lifetime in seconds.
    pub expires_in: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rest_codes_map_to_kinds() {
        assert_eq!(
            AuthErrorKind::from_code("EMAIL_NOT_FOUND"),
            AuthErrorKind::UserNotFound
        );
        assert_eq!(
            AuthErrorKind::from_code("WEAK_PASSWORD : Password should be at least 6 characters"),
            AuthErrorKind::WeakPassword
        );
        assert_eq!(
            AuthErrorKind::from_code("TOKEN_EXPIRED"),
            AuthErrorKind::InvalidToken
        );
    }

    #[test]
    fn test_sdk_codes_map_to_kinds() {
        assert_eq!(
            AuthErrorKind::from_code("auth/email-already-in-use"),
            AuthErrorKind::EmailAlreadyInUse
        );
        assert_eq!(
            AuthErrorKind::from_code("auth/too-many-requests").message(),
            "Too many failed attempts. Please try again later"
        );
    }

    #[test]
    fn test_unknown_code_falls_back() {
        let kind = AuthErrorKind::from_code("auth/popup-blocked-by-gremlins");
        assert_eq!(kind, AuthErrorKind::Unknown);
        assert_eq!(kind.message(), "An error occurred. Please try again.");
        assert_eq!(AuthErrorKind::from_code("").message(), kind.message());
    }
}
