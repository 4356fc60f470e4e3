use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use shared_config::{AppConfig, StorageBackend};
use shared_models::auth::{JwtClaims, JwtHeader, Role, User};

pub struct TestConfig {
    pub jwt_secret: String,
    pub database_rest_url: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "scheduling-test-secret-with-enough-entropy".to_string(),
            database_rest_url: "http://localhost:3001".to_string(),
        }
    }
}

impl TestConfig {
    /// In-memory backend; the REST URL is only read by `PostgrestStore`.
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            database_rest_url: self.database_rest_url.clone(),
            database_api_key: "test-api-key".to_string(),
            jwt_secret: self.jwt_secret.clone(),
            storage_backend: StorageBackend::Memory,
            bind_address: ([127, 0, 0, 1], 0).into(),
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

/// A caller identity that can be turned into a signed bearer token.
pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

impl Default for TestUser {
    fn default() -> Self {
        Self::patient("patient@example.com")
    }
}

impl TestUser {
    pub fn new(email: &str, role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.to_string(),
            role,
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, Role::Doctor)
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, Role::Patient)
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, Role::Admin)
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id,
            email: Some(self.email.clone()),
            role: self.role,
            created_at: Some(Utc::now()),
        }
    }

    fn claims(&self, valid_for: Duration) -> JwtClaims {
        let now = Utc::now();
        JwtClaims {
            sub: self.id.to_string(),
            exp: Some((now + valid_for).timestamp().max(0) as u64),
            email: Some(self.email.clone()),
            role: Some(self.role.to_string()),
            iat: Some(now.timestamp().max(0) as u64),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    /// HS256 token for `user`, valid for `exp_hours` (24 by default, negative for expired).
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let header = JwtHeader {
            alg: "HS256".to_string(),
            typ: Some("JWT".to_string()),
        };
        let claims = user.claims(Duration::hours(exp_hours.unwrap_or(24)));
        Self::sign(&header, &claims, secret)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "not-the-configured-secret", None)
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }

    /// Value for an `Authorization` header.
    pub fn bearer(user: &TestUser, config: &TestConfig) -> String {
        format!("Bearer {}", Self::create_test_token(user, &config.jwt_secret, None))
    }

    fn sign(header: &JwtHeader, claims: &JwtClaims, secret: &str) -> String {
        let encode = |value: Vec<u8>| URL_SAFE_NO_PAD.encode(value);
        let signing_input = format!(
            "{}.{}",
            encode(serde_json::to_vec(header).expect("header serializes")),
            encode(serde_json::to_vec(claims).expect("claims serialize"))
        );

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(signing_input.as_bytes());

        format!("{}.{}", signing_input, encode(mac.finalize().into_bytes().to_vec()))
    }
}
