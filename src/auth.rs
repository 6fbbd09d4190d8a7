use crate::error::{AttendanceError, AttendanceResult};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

/// Identity resolved from a bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthUser {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    id: String,
    name: String,
    exp: i64,
}

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {e}"))?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Issues and checks compact HS256 tokens.
pub struct TokenSigner {
    secret: Vec<u8>,
    ttl: chrono::Duration,
}

impl TokenSigner {
    pub fn new(secret: impl Into<Vec<u8>>, ttl: chrono::Duration) -> Self {
        TokenSigner {
            secret: secret.into(),
            ttl,
        }
    }

    fn mac(&self) -> anyhow::Result<HmacSha256> {
        HmacSha256::new_from_slice(&self.secret).map_err(|e| anyhow::anyhow!("bad token secret: {e}"))
    }

    pub fn issue(&self, user: &AuthUser) -> anyhow::Result<String> {
        let claims = Claims {
            id: user.id.clone(),
            name: user.name.clone(),
            exp: (chrono::Utc::now() + self.ttl).timestamp(),
        };
        let header = URL_SAFE_NO_PAD.encode(TOKEN_HEADER);
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);
        let signing_input = format!("{header}.{payload}");
        let mut mac = self.mac()?;
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        Ok(format!("{signing_input}.{signature}"))
    }

    pub fn verify(&self, token: &str) -> AttendanceResult<AuthUser> {
        let unauthorized = |why: &str| AttendanceError::Unauthorized(format!("invalid token: {why}"));

        let mut parts = token.trim().split('.');
        let (Some(header), Some(payload), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(unauthorized("malformed"));
        };

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| unauthorized("malformed signature"))?;
        let mut mac = self.mac().map_err(|_| unauthorized("signer unavailable"))?;
        mac.update(header.as_bytes());
        mac.update(b".");
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| unauthorized("bad signature"))?;

        let header_json = URL_SAFE_NO_PAD
            .decode(header)
            .map_err(|_| unauthorized("malformed header"))?;
        let header_value: serde_json::Value =
            serde_json::from_slice(&header_json).map_err(|_| unauthorized("malformed header"))?;
        if header_value.get("alg").and_then(|v| v.as_str()) != Some("HS256") {
            return Err(unauthorized("unsupported algorithm"));
        }

        let payload_json = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| unauthorized("malformed payload"))?;
        let claims: Claims =
            serde_json::from_slice(&payload_json).map_err(|_| unauthorized("malformed claims"))?;
        if claims.exp <= chrono::Utc::now().timestamp() {
            return Err(AttendanceError::Unauthorized("token expired".to_string()));
        }
        Ok(AuthUser {
            id: claims.id,
            name: claims.name,
        })
    }
}
