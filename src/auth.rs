//! Authentication collaborator
//!
//! The core only needs `verify(token) -> Option<AuthContext>`. The dev
//! implementation stands in for the production JWT/OTP service: it issues
//! OTPs, exchanges them for opaque bearer tokens and expires tokens after a
//! configurable lifetime. Real OTP delivery is out of scope.

use crate::models::AuthContext;
use chrono::{Duration, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

#[async_trait::async_trait]
pub trait Authenticator: Send + Sync {
    async fn verify(&self, token: &str) -> Option<AuthContext>;
}

/// In-memory OTP and token issuer for development
pub struct DevAuthenticator {
    otp_store: RwLock<HashMap<String, String>>,
    tokens: RwLock<HashMap<String, AuthContext>>,
    token_expiry_minutes: i64,
}

impl DevAuthenticator {
    pub fn new(token_expiry_minutes: i64) -> Self {
        Self {
            otp_store: RwLock::new(HashMap::new()),
            tokens: RwLock::new(HashMap::new()),
            token_expiry_minutes,
        }
    }

    /// Generate a 6-digit OTP for a user. Delivery (SMS/email) is the
    /// caller's problem; here it is just logged.
    pub async fn generate_otp(&self, user_id: &str) -> String {
        let seed = u32::from_be_bytes(
            Uuid::new_v4().as_bytes()[..4]
                .try_into()
                .expect("uuid has at least 4 bytes"),
        );
        let otp = format!("{:06}", seed % 900_000 + 100_000);

        self.otp_store
            .write()
            .await
            .insert(user_id.to_string(), otp.clone());

        info!(user_id, "OTP generated");
        otp
    }

    /// Exchange a valid OTP for a bearer token
    pub async fn login(&self, user_id: &str, otp: &str) -> Option<String> {
        let expected = self.otp_store.write().await.remove(user_id);

        if expected.as_deref() != Some(otp) {
            warn!(user_id, "OTP verification failed");
            return None;
        }

        let now = Utc::now();
        let token = mint_token(user_id);
        let context = AuthContext {
            user_id: user_id.to_string(),
            authenticated: true,
            issued_at: now,
            expires_at: now + Duration::minutes(self.token_expiry_minutes),
        };

        self.tokens.write().await.insert(token.clone(), context);
        info!(user_id, "Token issued");

        Some(token)
    }
}

/// Opaque bearer token: hash of the user id and a fresh nonce
fn mint_token(user_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_bytes());
    hasher.update(Uuid::new_v4().as_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait::async_trait]
impl Authenticator for DevAuthenticator {
    async fn verify(&self, token: &str) -> Option<AuthContext> {
        let token = token.strip_prefix("Bearer ").unwrap_or(token);

        let tokens = self.tokens.read().await;
        let context = tokens.get(token)?;

        if !context.is_valid(Utc::now()) {
            warn!(user_id = %context.user_id, "Token expired");
            return None;
        }

        Some(context.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_otp_login_round_trip() {
        let auth = DevAuthenticator::new(30);

        let otp = auth.generate_otp("user_001").await;
        assert_eq!(otp.len(), 6);

        let token = auth.login("user_001", &otp).await.expect("login succeeds");
        let context = auth.verify(&token).await.expect("token verifies");
        assert_eq!(context.user_id, "user_001");
        assert!(context.authenticated);
    }

    #[tokio::test]
    async fn test_wrong_otp_rejected() {
        let auth = DevAuthenticator::new(30);
        auth.generate_otp("user_001").await;

        assert!(auth.login("user_001", "000000").await.is_none());
    }

    #[tokio::test]
    async fn test_otp_is_single_use() {
        let auth = DevAuthenticator::new(30);
        let otp = auth.generate_otp("user_001").await;

        assert!(auth.login("user_001", &otp).await.is_some());
        assert!(auth.login("user_001", &otp).await.is_none());
    }

    #[tokio::test]
    async fn test_bearer_prefix_and_unknown_token() {
        let auth = DevAuthenticator::new(30);
        let otp = auth.generate_otp("user_001").await;
        let token = auth.login("user_001", &otp).await.unwrap();

        assert!(auth.verify(&format!("Bearer {}", token)).await.is_some());
        assert!(auth.verify("Bearer bogus").await.is_none());
    }

    #[tokio::test]
    async fn test_expired_token_rejected() {
        let auth = DevAuthenticator::new(0);
        let otp = auth.generate_otp("user_001").await;
        let token = auth.login("user_001", &otp).await.unwrap();

        // zero-minute lifetime: expired as soon as issued
        assert!(auth.verify(&token).await.is_none());
    }
}
