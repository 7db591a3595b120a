use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Identity provider not reachable: {0}")]
    Network(String),
    #[error("{0}")]
    Rejected(String),
    #[error("Malformed response from identity provider: {0}")]
    Decode(String),
}

/// An authenticated session as returned by the identity provider.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub email: String,
    pub user_id: String,
    pub id_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    id_token: String,
    #[serde(default)]
    email: String,
    refresh_token: String,
    expires_in: String,
    local_id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// REST client for the identity provider (Firebase Identity Toolkit wire
/// shape: key-authenticated `accounts:signInWithPassword` / `accounts:signUp`).
/// Sign-out is client-local; the provider keeps no session server-side.
#[derive(Clone)]
pub struct AuthClient {
    agent: ureq::Agent,
    base_url: String,
    api_key: String,
}

impl AuthClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        self.token_request("accounts:signInWithPassword", email, password)
    }

    pub fn sign_up(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        self.token_request("accounts:signUp", email, password)
    }

    fn token_request(
        &self,
        action: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, AuthError> {
        let url = format!("{}/v1/{}", self.base_url, action);
        let response = self
            .agent
            .post(&url)
            .query("key", &self.api_key)
            .send_json(serde_json::json!({
                "email": email,
                "password": password,
                "returnSecureToken": true,
            }));

        let token: TokenResponse = match response {
            Ok(resp) => resp
                .into_json()
                .map_err(|e| AuthError::Decode(e.to_string()))?,
            Err(ureq::Error::Status(code, resp)) => {
                let message = resp
                    .into_json::<ErrorBody>()
                    .map(|b| friendly_message(&b.error.message))
                    .unwrap_or_else(|_| format!("Identity provider returned status {}", code));
                return Err(AuthError::Rejected(message));
            }
            Err(ureq::Error::Transport(t)) => return Err(AuthError::Network(t.to_string())),
        };

        let expires_secs: i64 = token.expires_in.parse().unwrap_or(3600);
        let email = if token.email.is_empty() {
            email.to_string()
        } else {
            token.email
        };
        Ok(AuthSession {
            email,
            user_id: token.local_id,
            id_token: token.id_token,
            refresh_token: token.refresh_token,
            expires_at: Utc::now() + chrono::Duration::seconds(expires_secs),
        })
    }
}

/// Map the provider's error codes onto messages fit for the login screen.
pub fn friendly_message(code: &str) -> String {
    match code {
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => {
            "Incorrect email or password".to_string()
        }
        "EMAIL_EXISTS" => "An account already exists for that email".to_string(),
        "WEAK_PASSWORD : Password should be at least 6 characters" | "WEAK_PASSWORD" => {
            "Password should be at least 6 characters".to_string()
        }
        "USER_DISABLED" => "This account has been disabled".to_string(),
        "TOO_MANY_ATTEMPTS_TRY_LATER" => {
            "Too many attempts. Try again later".to_string()
        }
        "INVALID_EMAIL" => "That email address is not valid".to_string(),
        other => {
            // Unknown codes pass through; they are still actionable to read.
            other.replace('_', " ").to_lowercase()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_response_parses_provider_shape() {
        let json = r#"{
            "kind": "identitytoolkit#VerifyPasswordResponse",
            "localId": "u1",
            "email": "a@example.com",
            "idToken": "tok",
            "registered": true,
            "refreshToken": "ref",
            "expiresIn": "3600"
        }"#;
        let token: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(token.local_id, "u1");
        assert_eq!(token.email, "a@example.com");
        assert_eq!(token.expires_in, "3600");
    }

    #[test]
    fn test_error_body_parses() {
        let json = r#"{"error":{"code":400,"message":"EMAIL_NOT_FOUND","errors":[]}}"#;
        let body: ErrorBody = serde_json::from_str(json).unwrap();
        assert_eq!(body.error.message, "EMAIL_NOT_FOUND");
    }

    #[test]
    fn test_friendly_messages() {
        assert_eq!(friendly_message("EMAIL_NOT_FOUND"), "Incorrect email or password");
        assert_eq!(
            friendly_message("EMAIL_EXISTS"),
            "An account already exists for that email"
        );
        assert_eq!(friendly_message("OPERATION_NOT_ALLOWED"), "operation not allowed");
    }
}
