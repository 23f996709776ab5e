//! A user service.

use crate::domain::{
    media_store::{ImageData, MediaStore},
    user::{ChannelProfile, EmailAddress, FullName, Password, User, Username, WatchEntry},
    user_repository::{
        self, AddUserError, GetChannelProfileError, GetUserAndPwhByEmailAddressError,
        GetUserByIdError, GetWatchHistoryError, PasswordHash, RefreshToken,
        ReplaceRefreshTokenError, SetPasswordHashError, SetRefreshTokenError, UpdateUserError,
        UserAttribute, UserRepository,
    },
};
use argon2::{
    Argon2, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use log::warn;
use secrecy::ExposeSecret;
use std::{collections::HashSet, convert::Infallible};
use thiserror::Error;
use uuid::Uuid;

/// A service (DDD) for users.
#[trait_variant::make(Send)]
pub trait UserService {
    type InfraError;

    /// Register a user with the given attributes, storing the optional avatar and cover images.
    async fn register(
        &self,
        username: Username,
        email_address: EmailAddress,
        full_name: FullName,
        password: Password,
        avatar: Option<ImageData>,
        cover_image: Option<ImageData>,
    ) -> Result<User, Error<Infallible, AddUserError, Self::InfraError>>;

    /// Login a user with the given email address and password.
    async fn login(
        &self,
        email_address: &EmailAddress,
        password: &Password,
    ) -> Result<User, Error<LoginError, GetUserAndPwhByEmailAddressError, Self::InfraError>>;

    /// Persist the given refresh token for the user with the given ID, starting a session.
    async fn store_refresh_token(
        &self,
        id: Uuid,
        refresh_token: RefreshToken,
    ) -> Result<(), Error<Infallible, SetRefreshTokenError, Self::InfraError>>;

    /// Logout the user with the given ID by clearing its persisted refresh token.
    async fn logout(
        &self,
        id: Uuid,
    ) -> Result<(), Error<Infallible, SetRefreshTokenError, Self::InfraError>>;

    /// Replace the persisted refresh token of the user with the given ID with `next`, but only if
    /// `presented` matches the persisted one.
    async fn rotate_refresh_token(
        &self,
        id: Uuid,
        presented: &RefreshToken,
        next: RefreshToken,
    ) -> Result<(), Error<Infallible, ReplaceRefreshTokenError, Self::InfraError>>;

    /// Get the user with the given ID.
    async fn get_user_by_id(
        &self,
        id: Uuid,
    ) -> Result<User, Error<Infallible, GetUserByIdError, Self::InfraError>>;

    /// Change the password of the user with the given ID, verifying the current one first.
    async fn change_password(
        &self,
        id: Uuid,
        current_password: &Password,
        new_password: Password,
    ) -> Result<(), Error<ChangePasswordError, GetUserByIdError, Self::InfraError>>;

    /// Update username, email address and/or full name of the user with the given ID.
    async fn update_user(
        &self,
        id: Uuid,
        username: Option<Username>,
        email_address: Option<EmailAddress>,
        full_name: Option<FullName>,
    ) -> Result<User, Error<Infallible, UpdateUserError, Self::InfraError>>;

    /// Store the given image and make it the avatar of the user with the given ID.
    async fn update_avatar(
        &self,
        id: Uuid,
        image: ImageData,
    ) -> Result<User, Error<Infallible, UpdateUserError, Self::InfraError>>;

    /// Store the given image and make it the cover image of the user with the given ID.
    async fn update_cover_image(
        &self,
        id: Uuid,
        image: ImageData,
    ) -> Result<User, Error<Infallible, UpdateUserError, Self::InfraError>>;

    /// Get the channel profile for the given username, as seen by the given viewer.
    async fn get_channel_profile(
        &self,
        username: &Username,
        viewer: Uuid,
    ) -> Result<ChannelProfile, Error<Infallible, GetChannelProfileError, Self::InfraError>>;

    /// Get the watch history of the user with the given ID.
    async fn get_watch_history(
        &self,
        id: Uuid,
    ) -> Result<Vec<WatchEntry>, Error<Infallible, GetWatchHistoryError, Self::InfraError>>;
}

/// A user service using a user repository and a media store.
#[derive(Debug, Clone)]
pub struct UserRepositoryUserService<R, M> {
    user_repository: R,
    media_store: M,
    argon_2: Argon2<'static>,
}

impl<R, M> UserRepositoryUserService<R, M> {
    #[allow(missing_docs)]
    pub fn new(user_repository: R, media_store: M) -> Self {
        let argon_2 = Argon2::default();

        Self {
            user_repository,
            media_store,
            argon_2,
        }
    }
}

impl<R, M> UserService for UserRepositoryUserService<R, M>
where
    R: UserRepository,
    M: MediaStore,
{
    type InfraError = ServiceInfraError<R::InfraError, M::Error>;

    async fn register(
        &self,
        username: Username,
        email_address: EmailAddress,
        full_name: FullName,
        password: Password,
        avatar: Option<ImageData>,
        cover_image: Option<ImageData>,
    ) -> Result<User, Error<Infallible, AddUserError, Self::InfraError>> {
        let id = Uuid::now_v7();
        let password_hash = self.hash_password(&password);

        let avatar_image = match avatar {
            Some(image) => Some(self.store_image(image).await?),
            None => None,
        };
        let cover_image = match cover_image {
            Some(image) => Some(self.store_image(image).await?),
            None => None,
        };

        let added = self
            .user_repository
            .add_user(
                id,
                &username,
                &email_address,
                &full_name,
                &password_hash,
                avatar_image.as_deref(),
                cover_image.as_deref(),
            )
            .await;

        if let Err(error) = added {
            // The user row does not exist, so the stored images are orphans.
            self.discard_image(avatar_image.as_deref()).await;
            self.discard_image(cover_image.as_deref()).await;
            return Err(error.into());
        }

        Ok(User {
            id,
            username,
            email_address,
            full_name,
            avatar_image,
            cover_image,
        })
    }

    async fn login(
        &self,
        email_address: &EmailAddress,
        password: &Password,
    ) -> Result<User, Error<LoginError, GetUserAndPwhByEmailAddressError, Self::InfraError>> {
        let (user, password_hash) = self
            .user_repository
            .get_user_and_pwh_by_email_address(email_address)
            .await?;

        let valid_password = self
            .argon_2
            .verify_password(
                password.expose_secret().as_bytes(),
                &password_hash.password_hash(),
            )
            .is_ok();
        if !valid_password {
            return Err(Error::Domain(LoginError::InvalidPassword(
                email_address.to_owned(),
            )));
        }

        Ok(user)
    }

    async fn store_refresh_token(
        &self,
        id: Uuid,
        refresh_token: RefreshToken,
    ) -> Result<(), Error<Infallible, SetRefreshTokenError, Self::InfraError>> {
        self.user_repository
            .set_refresh_token(id, Some(&refresh_token))
            .await?;
        Ok(())
    }

    async fn logout(
        &self,
        id: Uuid,
    ) -> Result<(), Error<Infallible, SetRefreshTokenError, Self::InfraError>> {
        self.user_repository.set_refresh_token(id, None).await?;
        Ok(())
    }

    async fn rotate_refresh_token(
        &self,
        id: Uuid,
        presented: &RefreshToken,
        next: RefreshToken,
    ) -> Result<(), Error<Infallible, ReplaceRefreshTokenError, Self::InfraError>> {
        self.user_repository
            .replace_refresh_token(id, presented, &next)
            .await?;
        Ok(())
    }

    async fn get_user_by_id(
        &self,
        id: Uuid,
    ) -> Result<User, Error<Infallible, GetUserByIdError, Self::InfraError>> {
        let user = self.user_repository.get_user_by_id(id).await?;
        Ok(user)
    }

    async fn change_password(
        &self,
        id: Uuid,
        current_password: &Password,
        new_password: Password,
    ) -> Result<(), Error<ChangePasswordError, GetUserByIdError, Self::InfraError>> {
        let (_, password_hash) = self.user_repository.get_user_and_pwh_by_id(id).await?;

        let valid_password = self
            .argon_2
            .verify_password(
                current_password.expose_secret().as_bytes(),
                &password_hash.password_hash(),
            )
            .is_ok();
        if !valid_password {
            return Err(Error::Domain(ChangePasswordError::InvalidPassword(id)));
        }

        let password_hash = self.hash_password(&new_password);
        self.user_repository
            .set_password_hash(id, &password_hash)
            .await
            .map_err(|error| match error {
                user_repository::Error::Domain(SetPasswordHashError::NotFound(id)) => {
                    Error::Repository(GetUserByIdError::NotFound(id))
                }

                user_repository::Error::Infra(error) => {
                    Error::Infra(ServiceInfraError::Repository(error))
                }
            })?;

        Ok(())
    }

    async fn update_user(
        &self,
        id: Uuid,
        username: Option<Username>,
        email_address: Option<EmailAddress>,
        full_name: Option<FullName>,
    ) -> Result<User, Error<Infallible, UpdateUserError, Self::InfraError>> {
        let username = username.map(UserAttribute::Username);
        let email_address = email_address.map(UserAttribute::EmailAddress);
        let full_name = full_name.map(UserAttribute::FullName);

        let attributes = [username, email_address, full_name]
            .into_iter()
            .flatten()
            .collect::<HashSet<_>>();

        let user = self.user_repository.update_user(id, attributes).await?;

        Ok(user)
    }

    async fn update_avatar(
        &self,
        id: Uuid,
        image: ImageData,
    ) -> Result<User, Error<Infallible, UpdateUserError, Self::InfraError>> {
        let name = self.store_image(image).await?;

        let attributes = HashSet::from_iter([UserAttribute::AvatarImage(name.clone())]);
        match self.user_repository.update_user(id, attributes).await {
            Ok(user) => Ok(user),

            Err(error) => {
                self.discard_image(Some(&name)).await;
                Err(error.into())
            }
        }
        // TODO: remove the replaced avatar image from the media store.
    }

    async fn update_cover_image(
        &self,
        id: Uuid,
        image: ImageData,
    ) -> Result<User, Error<Infallible, UpdateUserError, Self::InfraError>> {
        let name = self.store_image(image).await?;

        let attributes = HashSet::from_iter([UserAttribute::CoverImage(name.clone())]);
        match self.user_repository.update_user(id, attributes).await {
            Ok(user) => Ok(user),

            Err(error) => {
                self.discard_image(Some(&name)).await;
                Err(error.into())
            }
        }
    }

    async fn get_channel_profile(
        &self,
        username: &Username,
        viewer: Uuid,
    ) -> Result<ChannelProfile, Error<Infallible, GetChannelProfileError, Self::InfraError>> {
        let profile = self
            .user_repository
            .get_channel_profile(username, viewer)
            .await?;
        Ok(profile)
    }

    async fn get_watch_history(
        &self,
        id: Uuid,
    ) -> Result<Vec<WatchEntry>, Error<Infallible, GetWatchHistoryError, Self::InfraError>> {
        let history = self.user_repository.get_watch_history(id).await?;
        Ok(history)
    }
}

impl<R, M> UserRepositoryUserService<R, M>
where
    R: UserRepository,
    M: MediaStore,
{
    fn hash_password(&self, password: &Password) -> PasswordHash {
        self.argon_2
            .hash_password(
                password.expose_secret().as_bytes(),
                &SaltString::generate(&mut OsRng),
            )
            .expect("password can be hashed")
            .serialize()
            .into()
    }

    async fn store_image<D, RE>(
        &self,
        image: ImageData,
    ) -> Result<String, Error<D, RE, ServiceInfraError<R::InfraError, M::Error>>> {
        self.media_store
            .store_image(image)
            .await
            .map_err(|error| Error::Infra(ServiceInfraError::MediaStore(error)))
    }

    async fn discard_image(&self, name: Option<&str>) {
        if let Some(name) = name {
            if let Err(error) = self.media_store.remove_image(name).await {
                warn!(error:%, name; "cannot remove stored image");
            }
        }
    }
}

/// Domain, repository and infra errors for the user service.
#[derive(Debug, Error)]
pub enum Error<D, R, I> {
    /// A domain error.
    #[error(transparent)]
    Domain(D),

    /// A repository error.
    #[error(transparent)]
    Repository(R),

    /// An infra/implementation error.
    #[error(transparent)]
    Infra(I),
}

/// Infra errors of [UserRepositoryUserService], from either the user repository or the media
/// store.
#[derive(Debug, Error)]
pub enum ServiceInfraError<R, M> {
    #[error(transparent)]
    Repository(R),

    #[error(transparent)]
    MediaStore(M),
}

impl<D, RD, RI, MI> From<user_repository::Error<RD, RI>> for Error<D, RD, ServiceInfraError<RI, MI>> {
    fn from(error: user_repository::Error<RD, RI>) -> Self {
        match error {
            user_repository::Error::Domain(d) => Self::Repository(d),
            user_repository::Error::Infra(i) => Self::Infra(ServiceInfraError::Repository(i)),
        }
    }
}

#[derive(Debug, Error)]
pub enum LoginError {
    #[error("invalid password for login with email address {0}")]
    InvalidPassword(EmailAddress),
}

#[derive(Debug, Error)]
pub enum ChangePasswordError {
    #[error("invalid current password for user with ID {0}")]
    InvalidPassword(Uuid),
}
