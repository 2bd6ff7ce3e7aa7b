//! Accounts, passwords, and access tokens.
//!
//! Passwords are hashed with Argon2id. Access tokens are HS256 JWTs whose
//! `sub` claim is the account id; every authenticated operation is keyed by
//! that id.

use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::RngCore;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use validator::Validate;

use crate::config::{AuthConfig, Config, DEV_JWT_SECRET};
use crate::error::{ServiceError, ServiceResult};
use crate::store::{Role, Store, User, is_unique_violation};

const BAD_CREDENTIALS: &str = "Incorrect email or password.";
const INVALID_TOKEN: &str = "Could not validate credentials.";

/// A new account.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, JsonSchema)]
pub struct Registration {
    /// Login email.
    #[validate(email)]
    pub email: String,
    /// Plain-text password (at least 8 characters).
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    /// Requested role.
    #[serde(default)]
    #[schemars(with = "String")]
    pub role: Role,
}

/// Claims carried by an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Account id.
    pub sub: String,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
    /// Issue time, seconds since the epoch.
    pub iat: i64,
}

/// A signed access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    /// The encoded JWT.
    pub access_token: String,
    /// Always `bearer`.
    pub token_type: String,
    /// Lifetime in seconds.
    pub expires_in: i64,
}

/// Hash `password` with Argon2id and a random salt.
pub fn hash_password(password: &str) -> ServiceResult<String> {
    let mut salt_bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt_bytes);
    let salt =
        SaltString::encode_b64(&salt_bytes).map_err(|e| ServiceError::Hashing(e.to_string()))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::Hashing(e.to_string()))
}

/// Check `password` against a stored hash. Unparseable hashes never match.
pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

/// Fail with [`ServiceError::Forbidden`] unless `user` is an admin.
pub fn require_admin(user: &User) -> ServiceResult<()> {
    if user.role == Role::Admin {
        Ok(())
    } else {
        Err(ServiceError::Forbidden("Admin access required.".into()))
    }
}

/// Issues and checks access tokens, and owns the account lifecycle.
pub struct Auth {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
    starting_tokens: i64,
}

impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Auth")
            .field("ttl", &self.ttl)
            .field("starting_tokens", &self.starting_tokens)
            .finish_non_exhaustive()
    }
}

impl Auth {
    /// Build from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.auth, config.starting_tokens)
    }

    /// Build from token settings and the balance new accounts receive.
    pub fn new(cfg: &AuthConfig, starting_tokens: i64) -> Self {
        if cfg.jwt_secret == DEV_JWT_SECRET {
            warn!("using the built-in development JWT secret; set auth.jwt_secret");
        }
        let secret = cfg.jwt_secret.as_bytes();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation: Validation::default(),
            ttl: Duration::minutes(cfg.token_ttl_minutes),
            starting_tokens,
        }
    }

    /// Create an account.
    #[tracing::instrument(skip_all, fields(email = %reg.email, role = %reg.role))]
    pub fn register(&self, store: &Store, reg: &Registration) -> ServiceResult<User> {
        reg.validate()?;
        let email = reg.email.trim().to_lowercase();
        let hash = hash_password(&reg.password)?;
        let user = store
            .insert_user(&email, &hash, reg.role, self.starting_tokens)
            .map_err(|e| {
                if is_unique_violation(&e) {
                    ServiceError::Conflict("Email is already registered.".into())
                } else {
                    e.into()
                }
            })?;
        info!(user_id = %user.id, tokens = user.tokens_remaining, "account registered");
        Ok(user)
    }

    /// Exchange credentials for an access token.
    #[tracing::instrument(skip_all, fields(email = %email))]
    pub fn login(&self, store: &Store, email: &str, password: &str) -> ServiceResult<AccessToken> {
        let email = email.trim().to_lowercase();
        let Some((user, hash)) = store.credentials_by_email(&email)? else {
            return Err(ServiceError::Unauthorized(BAD_CREDENTIALS.into()));
        };
        if !verify_password(password, &hash) {
            warn!(user_id = %user.id, "password mismatch");
            return Err(ServiceError::Unauthorized(BAD_CREDENTIALS.into()));
        }
        self.issue(&user)
    }

    /// Sign a token for `user`.
    pub fn issue(&self, user: &User) -> ServiceResult<AccessToken> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.clone(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        let access_token = encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| ServiceError::Unauthorized(format!("cannot sign token: {e}")))?;
        Ok(AccessToken {
            access_token,
            token_type: "bearer".into(),
            expires_in: self.ttl.num_seconds(),
        })
    }

    /// Resolve a bearer token (with or without the `Bearer ` prefix) to its
    /// account.
    pub fn authenticate(&self, store: &Store, token: &str) -> ServiceResult<User> {
        let token = token.trim();
        let token = token
            .strip_prefix("Bearer ")
            .or_else(|| token.strip_prefix("bearer "))
            .unwrap_or(token)
            .trim();
        if token.is_empty() {
            return Err(ServiceError::Unauthorized(
                "Missing or invalid Authorization header.".into(),
            ));
        }
        let claims = decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| {
                tracing::debug!(error = %e, "token rejected");
                ServiceError::Unauthorized(INVALID_TOKEN.into())
            })?
            .claims;
        store
            .user_by_id(&claims.sub)?
            .ok_or_else(|| ServiceError::Unauthorized(INVALID_TOKEN.into()))
    }
}

/// Top up an account's balance. Admin only.
#[tracing::instrument(skip(store, admin), fields(admin_id = %admin.id))]
pub fn grant_tokens(store: &Store, admin: &User, user_id: &str, amount: i64) -> ServiceResult<i64> {
    require_admin(admin)?;
    if amount <= 0 {
        return Err(ServiceError::Validation("amount: must be positive".into()));
    }
    let balance = store
        .add_tokens(user_id, amount)?
        .ok_or_else(|| ServiceError::not_found("User not found."))?;
    info!(balance, "tokens granted");
    Ok(balance)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth() -> Auth {
        Auth::new(
            &AuthConfig {
                jwt_secret: "test-secret".into(),
                token_ttl_minutes: 30,
            },
            1_000,
        )
    }

    fn registration(email: &str, role: Role) -> Registration {
        Registration {
            email: email.into(),
            password: "correct horse".into(),
            role,
        }
    }

    #[test]
    fn password_hash_roundtrip() {
        let hash = hash_password("s3cret-pass").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("s3cret-pass", &hash));
        assert!(!verify_password("wrong", &hash));
        assert!(!verify_password("s3cret-pass", "not-a-hash"));
    }

    #[test]
    fn register_grants_starting_tokens() {
        let store = Store::open_in_memory().unwrap();
        let user = auth()
            .register(&store, &registration("Owner@Example.com", Role::User))
            .unwrap();
        assert_eq!(user.email, "owner@example.com");
        assert_eq!(user.tokens_remaining, 1_000);
    }

    #[test]
    fn register_rejects_bad_input_and_duplicates() {
        let store = Store::open_in_memory().unwrap();
        let auth = auth();
        let bad_email = auth.register(&store, &registration("nope", Role::User));
        assert!(matches!(bad_email, Err(ServiceError::Validation(_))));

        let short = Registration {
            password: "short".into(),
            ..registration("a@example.com", Role::User)
        };
        assert!(matches!(auth.register(&store, &short), Err(ServiceError::Validation(_))));

        auth.register(&store, &registration("a@example.com", Role::User)).unwrap();
        let dup = auth.register(&store, &registration("a@example.com", Role::User));
        assert!(matches!(dup, Err(ServiceError::Conflict(_))));
    }

    #[test]
    fn login_then_authenticate() {
        let store = Store::open_in_memory().unwrap();
        let auth = auth();
        let user = auth.register(&store, &registration("a@example.com", Role::User)).unwrap();

        let token = auth.login(&store, "a@example.com", "correct horse").unwrap();
        assert_eq!(token.token_type, "bearer");
        assert_eq!(token.expires_in, 30 * 60);

        let bare = auth.authenticate(&store, &token.access_token).unwrap();
        assert_eq!(bare.id, user.id);
        let prefixed = auth
            .authenticate(&store, &format!("Bearer {}", token.access_token))
            .unwrap();
        assert_eq!(prefixed.id, user.id);
    }

    #[test]
    fn login_failures_are_unauthorized() {
        let store = Store::open_in_memory().unwrap();
        let auth = auth();
        auth.register(&store, &registration("a@example.com", Role::User)).unwrap();
        assert!(matches!(
            auth.login(&store, "a@example.com", "wrong password"),
            Err(ServiceError::Unauthorized(_))
        ));
        assert!(matches!(
            auth.login(&store, "ghost@example.com", "correct horse"),
            Err(ServiceError::Unauthorized(_))
        ));
    }

    #[test]
    fn foreign_or_garbage_tokens_are_rejected() {
        let store = Store::open_in_memory().unwrap();
        let auth = auth();
        let user = auth.register(&store, &registration("a@example.com", Role::User)).unwrap();

        let other = Auth::new(
            &AuthConfig {
                jwt_secret: "other-secret".into(),
                token_ttl_minutes: 30,
            },
            0,
        );
        let foreign = other.issue(&user).unwrap();
        assert!(auth.authenticate(&store, &foreign.access_token).is_err());
        assert!(auth.authenticate(&store, "garbage").is_err());
        assert!(auth.authenticate(&store, "Bearer ").is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let store = Store::open_in_memory().unwrap();
        let expired = Auth::new(
            &AuthConfig {
                jwt_secret: "test-secret".into(),
                token_ttl_minutes: -10,
            },
            0,
        );
        let user = expired.register(&store, &registration("a@example.com", Role::User)).unwrap();
        let token = expired.issue(&user).unwrap();
        assert!(matches!(
            expired.authenticate(&store, &token.access_token),
            Err(ServiceError::Unauthorized(_))
        ));
    }

    #[test]
    fn grant_tokens_is_admin_only() {
        let store = Store::open_in_memory().unwrap();
        let auth = auth();
        let admin = auth.register(&store, &registration("boss@example.com", Role::Admin)).unwrap();
        let user = auth.register(&store, &registration("a@example.com", Role::User)).unwrap();

        assert!(matches!(
            grant_tokens(&store, &user, &user.id, 10),
            Err(ServiceError::Forbidden(_))
        ));
        assert_eq!(grant_tokens(&store, &admin, &user.id, 500).unwrap(), 1_500);
        assert!(matches!(
            grant_tokens(&store, &admin, "missing", 5),
            Err(ServiceError::NotFound(_))
        ));
        assert!(grant_tokens(&store, &admin, &user.id, 0).is_err());
    }
}
