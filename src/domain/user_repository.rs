//! A repository (DDD) for users.

use crate::domain::user::{ChannelProfile, EmailAddress, FullName, User, Username, WatchEntry};
use argon2::password_hash::PasswordHashString;
use nutype::nutype;
use secrecy::SecretString;
use std::{
    collections::HashSet,
    error::Error as StdError,
    fmt::Debug,
    hash::{Hash, Hasher},
};
use thiserror::Error;
use uuid::Uuid;

/// A refresh token as persisted per user. Opaque to the repository.
pub type RefreshToken = SecretString;

/// A repository (DDD) for users.
#[trait_variant::make(Send)]
pub trait UserRepository
where
    Self: Clone + Send + Sync + 'static,
{
    type InfraError: StdError + Send + Sync + 'static;

    /// Add a user with the given attributes.
    #[allow(clippy::too_many_arguments)]
    async fn add_user(
        &self,
        id: Uuid,
        username: &Username,
        email_address: &EmailAddress,
        full_name: &FullName,
        password_hash: &PasswordHash,
        avatar_image: Option<&str>,
        cover_image: Option<&str>,
    ) -> Result<(), Error<AddUserError, Self::InfraError>>;

    /// Update the user with the given ID with the given attributes.
    async fn update_user(
        &self,
        id: Uuid,
        attributes: HashSet<UserAttribute>,
    ) -> Result<User, Error<UpdateUserError, Self::InfraError>>;

    /// Get the user with the given ID.
    async fn get_user_by_id(
        &self,
        id: Uuid,
    ) -> Result<User, Error<GetUserByIdError, Self::InfraError>>;

    /// Get the user and its password hash for the given email address.
    async fn get_user_and_pwh_by_email_address(
        &self,
        email_address: &EmailAddress,
    ) -> Result<(User, PasswordHash), Error<GetUserAndPwhByEmailAddressError, Self::InfraError>>;

    /// Get the user and its password hash for the given ID.
    async fn get_user_and_pwh_by_id(
        &self,
        id: Uuid,
    ) -> Result<(User, PasswordHash), Error<GetUserByIdError, Self::InfraError>>;

    /// Replace the password hash of the user with the given ID.
    async fn set_password_hash(
        &self,
        id: Uuid,
        password_hash: &PasswordHash,
    ) -> Result<(), Error<SetPasswordHashError, Self::InfraError>>;

    /// Set or clear the persisted refresh token of the user with the given ID.
    async fn set_refresh_token(
        &self,
        id: Uuid,
        refresh_token: Option<&RefreshToken>,
    ) -> Result<(), Error<SetRefreshTokenError, Self::InfraError>>;

    /// Replace the persisted refresh token of the user with the given ID with `next`, but only if
    /// it currently equals `presented` (compare and swap).
    async fn replace_refresh_token(
        &self,
        id: Uuid,
        presented: &RefreshToken,
        next: &RefreshToken,
    ) -> Result<(), Error<ReplaceRefreshTokenError, Self::InfraError>>;

    /// Get the channel profile for the given username, as seen by the given viewer.
    async fn get_channel_profile(
        &self,
        username: &Username,
        viewer: Uuid,
    ) -> Result<ChannelProfile, Error<GetChannelProfileError, Self::InfraError>>;

    /// Get the watch history of the user with the given ID, most recently watched first.
    async fn get_watch_history(
        &self,
        id: Uuid,
    ) -> Result<Vec<WatchEntry>, Error<GetWatchHistoryError, Self::InfraError>>;
}

/// A user attribute, e.g. its username.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UserAttribute {
    Username(Username),
    EmailAddress(EmailAddress),
    FullName(FullName),
    PasswordHash(PasswordHash),
    AvatarImage(String),
    CoverImage(String),
}

/// A password hash.
#[nutype(derive(Debug, Display, Clone, PartialEq, Eq, From, Deref))]
pub struct PasswordHash(PasswordHashString);

impl Hash for PasswordHash {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

/// Domain and infra/implementation errors for the user repository.
#[derive(Debug, Error)]
pub enum Error<D, I> {
    /// A domain error.
    #[error(transparent)]
    Domain(D),

    /// An infra/implementation error.
    #[error(transparent)]
    Infra(I),
}

/// Possible errors for adding a user.
#[derive(Debug, Error)]
pub enum AddUserError {
    #[error("username {0} taken")]
    UsernameTaken(Username),

    #[error("email address {0} taken")]
    EmailAddressTaken(EmailAddress),
}

/// Possible errors for updating a user.
#[derive(Debug, Error)]
pub enum UpdateUserError {
    #[error("user with ID {0} not found")]
    NotFound(Uuid),

    #[error("username taken")]
    UsernameTaken,

    #[error("email address taken")]
    EmailAddressTaken,
}

/// Possible errors for getting a user by ID.
#[derive(Debug, Error)]
pub enum GetUserByIdError {
    /// A user with the given ID cannot be found.
    #[error("user with ID {0} not found")]
    NotFound(Uuid),
}

/// Possible errors for getting a user by email address.
#[derive(Debug, Error)]
pub enum GetUserAndPwhByEmailAddressError {
    /// A user with the given email address cannot be found.
    #[error("user with email address {0} not found")]
    NotFound(EmailAddress),
}

/// Possible errors for replacing a password hash.
#[derive(Debug, Error)]
pub enum SetPasswordHashError {
    #[error("user with ID {0} not found")]
    NotFound(Uuid),
}

/// Possible errors for setting or clearing a refresh token.
#[derive(Debug, Error)]
pub enum SetRefreshTokenError {
    #[error("user with ID {0} not found")]
    NotFound(Uuid),
}

/// Possible errors for replacing a refresh token.
#[derive(Debug, Error)]
pub enum ReplaceRefreshTokenError {
    #[error("user with ID {0} not found")]
    NotFound(Uuid),

    /// The presented refresh token does not match the persisted one, e.g. because it has already
    /// been rotated or the user has logged out.
    #[error("refresh token for user with ID {0} does not match")]
    Mismatch(Uuid),
}

/// Possible errors for getting a channel profile.
#[derive(Debug, Error)]
pub enum GetChannelProfileError {
    /// A channel with the given username cannot be found.
    #[error("channel with username {0} not found")]
    NotFound(Username),
}

/// Possible errors for getting a watch history.
#[derive(Debug, Error)]
pub enum GetWatchHistoryError {
    #[error("user with ID {0} not found")]
    NotFound(Uuid),
}
