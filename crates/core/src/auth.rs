//! Authentication client
//!
//! Talks to the backend's auth endpoints (sign-up, password grant,
//! sign-out, current user) and the `profiles` collection for role
//! lookups. The signed-in session is cached in-process and state
//! changes are broadcast to interested listeners.

use crate::error::SitepulseError;
use crate::store::RestStoreConfig;
use crate::Result;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

/// Authenticated user as returned by the backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
}

/// Row in the `profiles` collection, created at sign-up
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    #[serde(default)]
    pub full_name: String,
    /// Free-form role string; `"admin"` unlocks the dashboard
    #[serde(default = "default_role")]
    pub role: String,
}

fn default_role() -> String {
    "user".to_string()
}

impl Profile {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

/// Tokens plus the user they belong to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthSession {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    pub user: AuthUser,
}

/// Broadcast on every sign-in and sign-out
#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    SignedIn(AuthUser),
    SignedOut,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: String,
    user: AuthUser,
}

#[derive(Debug, Deserialize)]
struct AuthErrorBody {
    #[serde(alias = "error_description", alias = "msg", alias = "message")]
    error: Option<String>,
}

/// Client for the backend auth API
pub struct AuthClient {
    config: RestStoreConfig,
    client: reqwest::Client,
    session: RwLock<Option<AuthSession>>,
    events: broadcast::Sender<AuthEvent>,
}

impl AuthClient {
    pub fn new(config: RestStoreConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SitepulseError::network(format!("failed to build HTTP client: {}", e)))?;
        let (events, _) = broadcast::channel(16);
        Ok(Self {
            config,
            client,
            session: RwLock::new(None),
            events,
        })
    }

    /// Subscribe to sign-in / sign-out notifications
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    /// Cached session, if signed in
    pub fn session(&self) -> Option<AuthSession> {
        self.session.read().clone()
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn rest_url(&self, path: &str) -> String {
        format!("{}/rest/v1/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Register a new account, then create its profile row.
    ///
    /// The profile insert is best-effort: a failure there leaves a valid
    /// account without a profile row and is logged, not returned.
    pub async fn sign_up(&self, email: &str, password: &str, full_name: &str) -> Result<AuthUser> {
        let response = self
            .client
            .post(self.auth_url("signup"))
            .header("apikey", &self.config.api_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| SitepulseError::network(format!("sign-up request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(auth_error("sign-up", response).await);
        }

        let user: AuthUser = response
            .json()
            .await
            .map_err(|e| SitepulseError::auth(format!("invalid sign-up response: {}", e)))?;

        let profile_result = self
            .client
            .post(self.rest_url("profiles"))
            .header("apikey", &self.config.api_key)
            .bearer_auth(&self.config.api_key)
            .header("Prefer", "return=minimal")
            .json(&json!([{
                "id": user.id,
                "email": email,
                "full_name": full_name,
                "role": "user",
            }]))
            .send()
            .await;
        match profile_result {
            Ok(r) if r.status().is_success() => {
                debug!(user_id = %user.id, "created profile row");
            }
            Ok(r) => warn!(status = %r.status(), "profile creation failed"),
            Err(e) => warn!("profile creation failed: {}", e),
        }

        Ok(user)
    }

    /// Exchange email and password for a session
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession> {
        let response = self
            .client
            .post(self.auth_url("token?grant_type=password"))
            .header("apikey", &self.config.api_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| SitepulseError::network(format!("sign-in request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(auth_error("sign-in", response).await);
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| SitepulseError::auth(format!("invalid token response: {}", e)))?;

        let session = AuthSession {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            user: token.user,
        };
        *self.session.write() = Some(session.clone());
        let _ = self.events.send(AuthEvent::SignedIn(session.user.clone()));
        Ok(session)
    }

    /// Revoke the cached session, if any
    pub async fn sign_out(&self) -> Result<()> {
        let session = self.session.write().take();
        let Some(session) = session else {
            return Ok(());
        };

        let response = self
            .client
            .post(self.auth_url("logout"))
            .header("apikey", &self.config.api_key)
            .bearer_auth(&session.access_token)
            .send()
            .await
            .map_err(|e| SitepulseError::network(format!("sign-out request failed: {}", e)))?;
        if !response.status().is_success() {
            warn!(status = %response.status(), "remote sign-out failed");
        }

        let _ = self.events.send(AuthEvent::SignedOut);
        Ok(())
    }

    /// Resolve an access token to its user
    pub async fn current_user(&self, access_token: &str) -> Result<AuthUser> {
        let response = self
            .client
            .get(self.auth_url("user"))
            .header("apikey", &self.config.api_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| SitepulseError::network(format!("user lookup failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(SitepulseError::auth("invalid or expired access token"));
        }

        response
            .json()
            .await
            .map_err(|e| SitepulseError::auth(format!("invalid user response: {}", e)))
    }

    /// Fetch the profile row for a user id
    pub async fn get_profile(&self, user_id: Uuid) -> Result<Profile> {
        let filter = format!("eq.{}", user_id);
        let response = self
            .client
            .get(self.rest_url("profiles"))
            .header("apikey", &self.config.api_key)
            .bearer_auth(&self.config.api_key)
            .query(&[("select", "*"), ("id", filter.as_str()), ("limit", "1")])
            .send()
            .await
            .map_err(|e| SitepulseError::network(format!("profile lookup failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(SitepulseError::store(format!(
                "profile lookup returned {}",
                response.status()
            )));
        }

        let mut rows: Vec<Profile> = response
            .json()
            .await
            .map_err(|e| SitepulseError::store(format!("invalid profile response: {}", e)))?;
        if rows.is_empty() {
            return Err(SitepulseError::not_found(format!(
                "no profile for user {}",
                user_id
            )));
        }
        Ok(rows.remove(0))
    }
}

async fn auth_error(operation: &str, response: reqwest::Response) -> SitepulseError {
    let status = response.status();
    let detail = response
        .json::<AuthErrorBody>()
        .await
        .ok()
        .and_then(|b| b.error)
        .unwrap_or_else(|| status.to_string());
    SitepulseError::auth(format!("{} failed: {}", operation, detail))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_admin_role() {
        let admin = Profile {
            id: Uuid::new_v4(),
            email: "a@example.com".to_string(),
            full_name: "Admin".to_string(),
            role: "admin".to_string(),
        };
        let user = Profile {
            role: "user".to_string(),
            ..admin.clone()
        };

        assert!(admin.is_admin());
        assert!(!user.is_admin());
    }

    #[test]
    fn test_profile_role_defaults_to_user() {
        let profile: Profile = serde_json::from_str(
            r#"{"id": "11111111-2222-3333-4444-555555555555", "email": "a@example.com"}"#,
        )
        .unwrap();
        assert_eq!(profile.role, "user");
        assert!(!profile.is_admin());
    }

    #[test]
    fn test_url_construction() {
        let client = AuthClient::new(RestStoreConfig::new(
            "https://backend.example/".to_string(),
            "key".to_string(),
        ))
        .unwrap();

        assert_eq!(
            client.auth_url("signup"),
            "https://backend.example/auth/v1/signup"
        );
        assert_eq!(
            client.rest_url("profiles"),
            "https://backend.example/rest/v1/profiles"
        );
    }

    #[test]
    fn test_session_starts_empty() {
        let client = AuthClient::new(RestStoreConfig::new(
            "https://backend.example".to_string(),
            "key".to_string(),
        ))
        .unwrap();
        assert!(client.session().is_none());
    }

    #[tokio::test]
    async fn test_sign_out_without_session_is_noop() {
        let client = AuthClient::new(RestStoreConfig::new(
            "https://backend.example".to_string(),
            "key".to_string(),
        ))
        .unwrap();
        client.sign_out().await.unwrap();
    }
}
