//! Bearer tokens bound to users.
//!
//! Tokens look like `yt_<prefix>_<secret>`. Only the prefix and a SHA-256
//! hash of the secret are stored; the plain token is shown once on issue.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

use crate::application::repos::{CreateTokenParams, RepoError, TokensRepo, UsersRepo};
use crate::domain::entities::{UserRecord, UserTokenRecord};

const TOKEN_TAG: &str = "yt";
const PREFIX_LEN: usize = 12;
const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid token")]
    Invalid,
    #[error("user `{0}` not found")]
    UnknownUser(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub username: String,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub user: UserRecord,
    pub record: UserTokenRecord,
    pub token: String,
}

#[derive(Clone)]
pub struct UserTokenService {
    users: Arc<dyn UsersRepo>,
    tokens: Arc<dyn TokensRepo>,
}

impl UserTokenService {
    pub fn new(users: Arc<dyn UsersRepo>, tokens: Arc<dyn TokensRepo>) -> Self {
        Self { users, tokens }
    }

    pub async fn issue(&self, username: &str) -> Result<IssuedToken, AuthError> {
        let user = self
            .users
            .find_user_by_username(username)
            .await?
            .ok_or_else(|| AuthError::UnknownUser(username.to_string()))?;

        let prefix = generate_prefix();
        let secret = generate_secret();
        let token = format!("{TOKEN_TAG}_{prefix}_{secret}");

        let record = self
            .tokens
            .create_token(CreateTokenParams {
                user_id: user.id,
                prefix,
                hashed_secret: hash_secret(&secret),
            })
            .await?;

        Ok(IssuedToken {
            user,
            record,
            token,
        })
    }

    pub async fn authenticate(&self, token: &str) -> Result<Principal, AuthError> {
        let parsed = parse_token(token).ok_or(AuthError::Invalid)?;
        let record = self
            .tokens
            .find_token_by_prefix(parsed.prefix)
            .await?
            .ok_or(AuthError::Invalid)?;

        let hashed_input = hash_secret(parsed.secret);
        if record.hashed_secret.ct_eq(&hashed_input).unwrap_u8() == 0 {
            return Err(AuthError::Invalid);
        }

        let user = self
            .users
            .find_user(record.user_id)
            .await?
            .ok_or(AuthError::Invalid)?;

        // last_used_at is informational; never block the request on it
        let tokens = self.tokens.clone();
        let token_id = record.id;
        tokio::spawn(async move {
            if let Err(err) = tokens.touch_token(token_id, OffsetDateTime::now_utc()).await {
                warn!(
                    target = "application::auth::authenticate",
                    error = %err,
                    "failed to record token use"
                );
            }
        });

        Ok(Principal {
            user_id: user.id,
            username: user.username,
        })
    }
}

fn hash_secret(secret: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.finalize().to_vec()
}

fn generate_prefix() -> String {
    Uuid::new_v4().simple().to_string()[..PREFIX_LEN].to_string()
}

fn generate_secret() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

struct ParsedToken<'a> {
    prefix: &'a str,
    secret: &'a str,
}

fn parse_token(token: &str) -> Option<ParsedToken<'_>> {
    let mut parts = token.trim().splitn(3, '_');
    if parts.next()? != TOKEN_TAG {
        return None;
    }
    let prefix = parts.next()?;
    let secret = parts.next()?;
    if prefix.is_empty() || secret.len() < MIN_SECRET_LEN {
        return None;
    }
    Some(ParsedToken { prefix, secret })
}
