use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

use crate::state::AppState;

/// Session token payload.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub identity: String, // username or email submitted at login
    pub admin: bool,      // reserved; there is no role system, so always false
    pub exp: usize,       // expiry (unix timestamp)
}

/// HS256 signing and verification material, derived from config.
#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        let jwt = &state.config.jwt;
        Self {
            encoding: EncodingKey::from_secret(jwt.secret.as_bytes()),
            decoding: DecodingKey::from_secret(jwt.secret.as_bytes()),
            ttl: Duration::from_secs(jwt.ttl_hours.max(0) as u64 * 3600),
        }
    }
}

impl JwtKeys {
    pub fn sign(&self, identity: &str) -> anyhow::Result<String> {
        let exp = OffsetDateTime::now_utc() + TimeDuration::seconds(self.ttl.as_secs() as i64);
        let claims = Claims {
            identity: identity.to_string(),
            admin: false,
            exp: exp.unix_timestamp() as usize,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(identity = %identity, "jwt signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let validation = Validation::default();
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(identity = %data.claims.identity, "jwt verified");
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys(secret: &str, ttl_hours: i64) -> JwtKeys {
        JwtKeys {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::from_secs(ttl_hours as u64 * 3600),
        }
    }

    #[test]
    fn sign_and_verify_roundtrip() {
        let keys = make_keys("dev-secret", 72);
        let token = keys.sign("someuser").expect("sign");
        let claims = keys.verify(&token).expect("verify");
        assert_eq!(claims.identity, "someuser");
        assert!(!claims.admin);
    }

    #[test]
    fn expiry_is_ttl_from_issuance() {
        let keys = make_keys("dev-secret", 72);
        let before = OffsetDateTime::now_utc().unix_timestamp();
        let token = keys.sign("user@example.com").expect("sign");
        let after = OffsetDateTime::now_utc().unix_timestamp();
        let claims = keys.verify(&token).expect("verify");
        let ttl = 72 * 3600;
        assert!(claims.exp as i64 >= before + ttl);
        assert!(claims.exp as i64 <= after + ttl);
    }

    #[test]
    fn verify_rejects_wrong_secret() {
        let keys = make_keys("dev-secret", 72);
        let other = make_keys("another-secret", 72);
        let token = keys.sign("someuser").expect("sign");
        assert!(other.verify(&token).is_err());
    }

    #[test]
    fn verify_rejects_expired_token() {
        let keys = make_keys("dev-secret", 72);
        // well past the default 60s leeway
        let claims = Claims {
            identity: "someuser".into(),
            admin: false,
            exp: (OffsetDateTime::now_utc() - TimeDuration::hours(2)).unix_timestamp() as usize,
        };
        let token = encode(&Header::default(), &claims, &keys.encoding).expect("encode");
        assert!(keys.verify(&token).is_err());
    }
}
