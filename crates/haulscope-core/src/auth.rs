//! Access token verification

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::{Error, Result};
use crate::models::{Principal, Role};

/// Turns a bearer token into a [`Principal`]
pub trait TokenVerifier: Send + Sync {
    /// Verify `token` and return the identity it asserts
    fn verify(&self, token: &str) -> Result<Principal>;
}

/// Access token claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    #[serde(alias = "sub")]
    pub user_id: Uuid,
    /// Organization the user acts for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<Uuid>,
    /// Role, descriptive name or deployment code
    pub role: Role,
    /// Driver record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_id: Option<Uuid>,
    /// Expiry, seconds since the epoch
    pub exp: i64,
}

impl Claims {
    /// Claims for `principal` expiring after `ttl`
    pub fn for_principal(principal: &Principal, ttl: Duration) -> Self {
        Self {
            user_id: principal.user_id,
            org_id: principal.org_id,
            role: principal.role,
            driver_id: principal.driver_id,
            exp: (Utc::now() + ttl).timestamp(),
        }
    }
}

impl From<Claims> for Principal {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.user_id,
            org_id: claims.org_id,
            role: claims.role,
            driver_id: claims.driver_id,
        }
    }
}

/// HS256 verifier with a shared secret
#[derive(Clone)]
pub struct JwtVerifier {
    decoding: DecodingKey,
    encoding: EncodingKey,
    validation: Validation,
}

impl JwtVerifier {
    /// Build a verifier from the auth settings
    pub fn new(config: &AuthConfig) -> Result<Self> {
        if config.jwt_secret.is_empty() {
            return Err(Error::config("auth.jwt_secret must not be empty"));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = config.leeway_secs;
        validation.set_required_spec_claims(&["exp"]);

        Ok(Self {
            decoding: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            encoding: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
        })
    }

    /// Sign `claims` with the same secret
    pub fn issue(&self, claims: &Claims) -> Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| Error::internal(format!("token signing failed: {e}")))
    }
}

impl TokenVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Result<Principal> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| Error::auth(format!("invalid token: {e}")))?;
        Ok(data.claims.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn verifier(secret: &str) -> JwtVerifier {
        JwtVerifier::new(&AuthConfig {
            jwt_secret: secret.to_string(),
            leeway_secs: 0,
        })
        .unwrap()
    }

    #[test]
    fn test_issue_and_verify() {
        let jwt = verifier("s3cret");
        let principal = Principal::new(Uuid::new_v4(), Role::Contractor, Some(Uuid::new_v4()));

        let token = jwt
            .issue(&Claims::for_principal(&principal, Duration::minutes(5)))
            .unwrap();

        assert_eq!(jwt.verify(&token).unwrap(), principal);
    }

    #[test]
    fn test_rejects_other_secret() {
        let principal = Principal::new(Uuid::new_v4(), Role::CityAuthority, None);
        let token = verifier("one")
            .issue(&Claims::for_principal(&principal, Duration::minutes(5)))
            .unwrap();

        assert!(matches!(verifier("two").verify(&token), Err(Error::Auth(_))));
    }

    #[test]
    fn test_rejects_expired_token() {
        let jwt = verifier("s3cret");
        let principal = Principal::new(Uuid::new_v4(), Role::CityAuthority, None);
        let token = jwt
            .issue(&Claims::for_principal(&principal, Duration::minutes(-10)))
            .unwrap();

        assert!(matches!(jwt.verify(&token), Err(Error::Auth(_))));
    }

    #[test]
    fn test_claims_accept_sub_and_deployment_role_code() {
        let user = Uuid::new_v4();
        let json = format!(r#"{{"sub":"{user}","role":"KGU","exp":1}}"#);

        let claims: Claims = serde_json::from_str(&json).unwrap();

        assert_eq!(claims.user_id, user);
        assert_eq!(claims.role, Role::RegionalAuthority);
        assert_eq!(claims.org_id, None);
    }

    #[test]
    fn test_empty_secret_is_a_config_error() {
        let result = JwtVerifier::new(&AuthConfig {
            jwt_secret: String::new(),
            leeway_secs: 30,
        });
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
