//! JWT token generation and verification.
//!
//! Security features:
//! - No hardcoded fallback secrets outside explicit dev mode
//! - Issuer and audience validation
//! - Support for key rotation (primary + secondary secret)
//! - Fail-fast startup in production mode

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::env;
use std::sync::OnceLock;
use uuid::Uuid;

struct JwtConfig {
    secret: String,
    secret_secondary: Option<String>,
    issuer: String,
    audience: String,
    expiry_secs: usize,
}

static JWT_CONFIG: OnceLock<JwtConfig> = OnceLock::new();

/// # Panics
/// Panics if `JWT_SECRET` is not set and `ENVIRONMENT` is not "development" or "dev".
fn get_jwt_config() -> &'static JwtConfig {
    JWT_CONFIG.get_or_init(|| {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "production".to_string());
        let is_dev = environment == "development" || environment == "dev";

        let secret = match env::var("JWT_SECRET") {
            Ok(s) if !s.is_empty() => {
                if s.len() < 32 {
                    tracing::warn!("JWT_SECRET is less than 32 characters - consider using a longer secret");
                }
                s
            }
            _ => {
                if is_dev {
                    tracing::warn!(
                        "JWT_SECRET not set - using insecure development secret. DO NOT use this in production!"
                    );
                    "INSECURE_DEV_SECRET_DO_NOT_USE_IN_PRODUCTION_12345".to_string()
                } else {
                    panic!(
                        "JWT_SECRET environment variable is required in production. \
                        Set JWT_SECRET to a secure random string (at least 32 characters). \
                        For development, set ENVIRONMENT=development"
                    );
                }
            }
        };

        let secret_secondary = env::var("JWT_SECRET_SECONDARY").ok().filter(|s| !s.is_empty());
        if secret_secondary.is_some() {
            tracing::info!("JWT key rotation enabled: secondary secret configured");
        }

        let issuer = env::var("JWT_ISSUER").unwrap_or_else(|_| "mitsume".to_string());
        let audience = env::var("JWT_AUDIENCE").unwrap_or_else(|_| "mitsume-api".to_string());

        let expiry_secs: usize = env::var("JWT_EXPIRY_HOURS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .map(|hours| hours * 3600)
            .unwrap_or(7 * 24 * 3600);

        tracing::info!("JWT configured: issuer={}, audience={}, expiry={}s", issuer, audience, expiry_secs);

        JwtConfig { secret, secret_secondary, issuer, audience, expiry_secs }
    })
}

/// Claims carried by every issued token. There is no `tenant_id`, Mitsume
/// has no tenant entity; authorisation is resolved per-dashboard by
/// `roles::permission_level`, not embedded in the token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid, uuid::Error> {
        Uuid::parse_str(&self.sub)
    }
}

pub fn generate_token(user_id: Uuid) -> Result<String, jsonwebtoken::errors::Error> {
    let config = get_jwt_config();
    let now = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap().as_secs() as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        exp: now + config.expiry_secs,
        iat: now,
        iss: Some(config.issuer.clone()),
        aud: Some(config.audience.clone()),
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(config.secret.as_bytes()))
}

/// Validates signature (primary secret, then secondary for rotation),
/// expiration, issuer and audience.
pub fn verify_token(token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let config = get_jwt_config();

    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    validation.leeway = 60;
    validation.set_issuer(&[&config.issuer]);
    validation.set_audience(&[&config.audience]);

    match decode::<Claims>(token, &DecodingKey::from_secret(config.secret.as_bytes()), &validation) {
        Ok(token_data) => Ok(token_data.claims),
        Err(primary_err) => {
            if let Some(ref secondary) = config.secret_secondary {
                match decode::<Claims>(token, &DecodingKey::from_secret(secondary.as_bytes()), &validation) {
                    Ok(token_data) => {
                        tracing::debug!("token validated with secondary secret (key rotation)");
                        Ok(token_data.claims)
                    }
                    Err(_) => Err(primary_err),
                }
            } else {
                Err(primary_err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_roundtrip() {
        std::env::set_var("ENVIRONMENT", "development");
        std::env::set_var("JWT_SECRET", "test-secret-for-unit-tests-only-32chars");
        std::env::set_var("JWT_ISSUER", "test-issuer");
        std::env::set_var("JWT_AUDIENCE", "test-audience");

        let user_id = Uuid::new_v4();
        let token = generate_token(user_id).expect("failed to generate token");
        assert!(!token.is_empty());
    }
}
