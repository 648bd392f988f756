//! Account operations: sign-in, sign-up, token checks and profiles.

use std::sync::Arc;

use chrono::Utc;

use crate::domain::{
    AppError, AuthErrorKind, AuthSession, AuthenticatedUser, Result, UserProfile,
};

use super::ports::{IdentityProvider, UserRepository};

/// Service wrapping the identity provider and profile storage.
#[derive(Clone)]
pub struct AccountService {
    identity: Arc<dyn IdentityProvider>,
    users: Arc<dyn UserRepository>,
}

impl AccountService {
    #[must_use]
    pub fn new(identity: Arc<dyn IdentityProvider>, users: Arc<dyn UserRepository>) -> Self {
        Self { identity, users }
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    /// Validation error on missing credentials, auth error if rejected.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession> {
        require_credentials(email, password)?;

        let session = self.identity.sign_in(email.trim(), password).await?;
        tracing::info!(user = %session.uid, "User signed in");
        Ok(session)
    }

    /// Create an account and its profile document.
    ///
    /// A failed profile write is logged; the account still exists at the
    /// provider, so the sign-up is reported as successful.
    ///
    /// # Errors
    /// Validation error on missing credentials, auth error if rejected.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<AuthSession> {
        require_credentials(email, password)?;
        let display_name = display_name.map(str::trim).filter(|n| !n.is_empty());

        let session = self
            .identity
            .sign_up(email.trim(), password, display_name)
            .await?;
        tracing::info!(user = %session.uid, "Account created");

        let profile_name = session.display_name.as_deref().or(display_name);
        if let Err(e) = self
            .create_profile(&session.uid, session.email.as_deref(), profile_name)
            .await
        {
            tracing::warn!(user = %session.uid, error = %e, "Failed to create user profile");
        }

        Ok(session)
    }

    /// End a session.
    ///
    /// ID tokens are stateless; the client discards its token and it
    /// expires on its own.
    pub fn sign_out(&self, user: &AuthenticatedUser) {
        tracing::info!(user = %user.uid, "User signed out");
    }

    /// Ask the provider to email a password-reset link.
    ///
    /// # Errors
    /// Validation error on a missing email, auth error if rejected.
    pub async fn reset_password(&self, email: &str) -> Result<()> {
        let email = email.trim();
        if email.is_empty() {
            return Err(AppError::validation("Email is required"));
        }
        self.identity.send_password_reset(email).await
    }

    /// Resolve a bearer token.
    ///
    /// # Errors
    /// `MissingToken` for an empty token, otherwise whatever the provider reports.
    pub async fn verify_token(&self, token: &str) -> Result<AuthenticatedUser> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AppError::auth(AuthErrorKind::MissingToken));
        }
        self.identity.verify_token(token).await
    }

    /// Create or update a profile; `created_at` of an existing one is kept.
    ///
    /// # Errors
    /// Storage error if the write fails.
    pub async fn create_profile(
        &self,
        user_id: &str,
        email: Option<&str>,
        display_name: Option<&str>,
    ) -> Result<UserProfile> {
        let now = Utc::now();
        self.users
            .upsert_profile(UserProfile {
                user_id: user_id.to_string(),
                email: email.map(String::from),
                display_name: display_name.map(String::from),
                created_at: now,
                updated_at: now,
            })
            .await
    }
}

fn require_credentials(email: &str, password: &str) -> Result<()> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(AppError::validation("Email and password are required"));
    }
    Ok(())
}
