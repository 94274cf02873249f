use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::application::repos::{RepoError, UsersRepo};
use crate::domain::entities::UserRecord;
use crate::domain::error::DomainError;
use crate::domain::forms::{FieldErrors, required_text};

pub const MAX_USERNAME_CHARS: usize = 150;

#[derive(Debug, Error)]
pub enum UserError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("username `{0}` is already taken")]
    UsernameTaken(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Letters, digits and `@ . + - _`, at most 150 characters.
pub fn validate_username(raw: &str) -> Result<String, DomainError> {
    let mut errors = FieldErrors::default();
    let username = required_text(&mut errors, "username", raw);
    if username.chars().count() > MAX_USERNAME_CHARS {
        errors.push(
            "username",
            format!("Ensure this value has at most {MAX_USERNAME_CHARS} characters."),
        );
    }
    if !username
        .chars()
        .all(|ch| ch.is_alphanumeric() || matches!(ch, '@' | '.' | '+' | '-' | '_'))
    {
        errors.push(
            "username",
            concat!(
                "Enter a valid username. This value may contain only letters, ",
                "numbers, and @/./+/-/_ characters."
            ),
        );
    }
    errors.into_result()?;
    Ok(username)
}

#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UsersRepo>,
}

impl UserService {
    pub fn new(users: Arc<dyn UsersRepo>) -> Self {
        Self { users }
    }

    pub async fn create_user(&self, username: &str) -> Result<UserRecord, UserError> {
        let username = validate_username(username)?;
        let user = self
            .users
            .create_user(&username)
            .await
            .map_err(|err| match err {
                RepoError::Duplicate { .. } => UserError::UsernameTaken(username.clone()),
                other => UserError::Repo(other),
            })?;

        info!(
            target = "application::users::create_user",
            username = %user.username,
            "user created"
        );
        Ok(user)
    }

    /// Removes the user with their posts, comments, follow edges and tokens.
    pub async fn delete_user(&self, username: &str) -> Result<UserRecord, UserError> {
        let user = self
            .users
            .find_user_by_username(username)
            .await?
            .ok_or(DomainError::not_found("user"))?;

        if !self.users.delete_user(user.id).await? {
            return Err(DomainError::not_found("user").into());
        }

        info!(
            target = "application::users::delete_user",
            username = %user.username,
            "user deleted"
        );
        Ok(user)
    }
}
