//! HTTP client for the Identity Toolkit REST API.
//!
//! Password sign-in, account creation, ID token lookup and password-reset
//! emails. Every request carries the project API key as `?key=`. Provider
//! errors arrive as `{"error":{"message":"CODE"}}` and are folded into
//! [`AuthErrorKind`]; transport failures become `NetworkRequestFailed`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::application::ports::IdentityProvider;
use crate::domain::{
    AppError, AuthErrorKind, AuthSession, AuthenticatedUser, IdentityConfig, Result,
};

/// Identity provider backed by the Identity Toolkit REST endpoints.
pub struct IdentityToolkitClient {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateProfileRequest<'a> {
    id_token: &'a str,
    display_name: &'a str,
    return_secure_token: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LookupRequest<'a> {
    id_token: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OobRequest<'a> {
    request_type: &'a str,
    email: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    id_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    /// Seconds, sent as a string.
    #[serde(default)]
    expires_in: Option<String>,
}

impl TokenResponse {
    fn into_session(self) -> AuthSession {
        AuthSession {
            uid: self.local_id,
            email: self.email,
            display_name: self.display_name.filter(|n| !n.is_empty()),
            token: self.id_token,
            refresh_token: self.refresh_token,
            expires_in: self.expires_in.and_then(|s| s.parse().ok()),
        }
    }
}

#[derive(Deserialize)]
struct UpdateProfileResponse {
    #[serde(default, rename = "displayName")]
    display_name: Option<String>,
}

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    disabled: bool,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

impl IdentityToolkitClient {
    /// Build a client from the identity settings.
    ///
    /// # Errors
    /// Returns a config error if the HTTP client cannot be constructed.
    pub fn new(config: &IdentityConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| AppError::Config {
                message: format!("Failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    /// POST `body` to `accounts:{method}` and decode the reply.
    async fn call<B, R>(&self, method: &str, body: &B) -> Result<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}/accounts:{method}", self.base_url);
        let resp = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(body)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(method, error = %e, "Identity request failed");
                AppError::auth(AuthErrorKind::NetworkRequestFailed)
            })?;

        let status = resp.status();
        let bytes = resp.bytes().await.map_err(|e| {
            tracing::warn!(method, error = %e, "Failed to read identity response");
            AppError::auth(AuthErrorKind::NetworkRequestFailed)
        })?;

        if !status.is_success() {
            let code = serde_json::from_slice::<ErrorEnvelope>(&bytes)
                .ok()
                .map(|env| env.error.message);
            tracing::debug!(method, %status, code = ?code, "Identity provider rejected request");
            // A bare 5xx means the provider itself is failing, not the caller.
            let kind = match code {
                Some(code) => AuthErrorKind::from_code(&code),
                None if status.is_server_error() => AuthErrorKind::NetworkRequestFailed,
                None => AuthErrorKind::Unknown,
            };
            return Err(AppError::auth(kind));
        }

        serde_json::from_slice(&bytes).map_err(|e| {
            tracing::warn!(method, error = %e, "Unexpected identity response shape");
            AppError::auth(AuthErrorKind::Unknown)
        })
    }
}

#[async_trait]
impl IdentityProvider for IdentityToolkitClient {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession> {
        let resp: TokenResponse = self
            .call(
                "signInWithPassword",
                &PasswordRequest {
                    email,
                    password,
                    return_secure_token: true,
                },
            )
            .await?;
        Ok(resp.into_session())
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<AuthSession> {
        let resp: TokenResponse = self
            .call(
                "signUp",
                &PasswordRequest {
                    email,
                    password,
                    return_secure_token: true,
                },
            )
            .await?;
        let mut session = resp.into_session();

        // The account exists at this point; a failed name update is not fatal.
        if let Some(name) = display_name {
            let update: Result<UpdateProfileResponse> = self
                .call(
                    "update",
                    &UpdateProfileRequest {
                        id_token: &session.token,
                        display_name: name,
                        return_secure_token: false,
                    },
                )
                .await;
            match update {
                Ok(updated) => {
                    session.display_name = updated.display_name.or_else(|| Some(name.to_string()));
                }
                Err(e) => {
                    tracing::warn!(user = %session.uid, error = %e, "Failed to set display name");
                }
            }
        }

        Ok(session)
    }

    async fn verify_token(&self, token: &str) -> Result<AuthenticatedUser> {
        let resp: LookupResponse = self
            .call("lookup", &LookupRequest { id_token: token })
            .await
            .map_err(|e| match e {
                AppError::Auth {
                    kind: AuthErrorKind::Unknown,
                } => AppError::auth(AuthErrorKind::InvalidToken),
                other => other,
            })?;

        let user = resp
            .users
            .into_iter()
            .next()
            .ok_or_else(|| AppError::auth(AuthErrorKind::InvalidToken))?;

        if user.disabled {
            return Err(AppError::auth(AuthErrorKind::UserDisabled));
        }

        Ok(AuthenticatedUser {
            uid: user.local_id,
            email: user.email,
            display_name: user.display_name.filter(|n| !n.is_empty()),
        })
    }

    async fn send_password_reset(&self, email: &str) -> Result<()> {
        let _: serde_json::Value = self
            .call(
                "sendOobCode",
                &OobRequest {
                    request_type: "PASSWORD_RESET",
                    email,
                },
            )
            .await?;
        Ok(())
    }
}
