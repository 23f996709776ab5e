//! PostgreSQL based implementation of user repository.

use crate::{
    domain::{
        user::{ChannelProfile, EmailAddress, FullName, User, Username, WatchEntry},
        user_repository::{
            AddUserError, Error, GetChannelProfileError, GetUserAndPwhByEmailAddressError,
            GetUserByIdError, GetWatchHistoryError, PasswordHash, RefreshToken,
            ReplaceRefreshTokenError, SetPasswordHashError, SetRefreshTokenError, UpdateUserError,
            UserAttribute, UserRepository,
        },
    },
    infra::pg_pool::PgPool,
};
use argon2::password_hash::PasswordHashString;
use indoc::indoc;
use secrecy::ExposeSecret;
use sqlx::{FromRow, Postgres, QueryBuilder, Row};
use std::collections::HashSet;
use uuid::Uuid;

/// PostgreSQL based implementation of user repository.
#[derive(Debug, Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    /// Create a new PostgreSQL based user repository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn user_exists(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(id)
            .fetch_one(&*self.pool)
            .await
    }
}

impl UserRepository for PgUserRepository {
    type InfraError = sqlx::Error;

    async fn add_user(
        &self,
        id: Uuid,
        username: &Username,
        email_address: &EmailAddress,
        full_name: &FullName,
        password_hash: &PasswordHash,
        avatar_image: Option<&str>,
        cover_image: Option<&str>,
    ) -> Result<(), Error<AddUserError, Self::InfraError>> {
        let query = indoc! {"
            INSERT INTO users
                (id, username, email_address, full_name, password_hash, avatar_image, cover_image)
            VALUES($1, $2, $3, $4, $5, $6, $7)
        "};

        sqlx::query(query)
            .bind(id)
            .bind(&**username)
            .bind(&**email_address)
            .bind(&**full_name)
            .bind(password_hash.as_str())
            .bind(avatar_image)
            .bind(cover_image)
            .execute(&*self.pool)
            .await
            .map_err(|error| match error {
                sqlx::Error::Database(e) if unique_violation(e.as_ref(), "username") => {
                    Error::Domain(AddUserError::UsernameTaken(username.to_owned()))
                }

                sqlx::Error::Database(e) if unique_violation(e.as_ref(), "email_address") => {
                    Error::Domain(AddUserError::EmailAddressTaken(email_address.to_owned()))
                }

                other => Error::Infra(other),
            })?;

        Ok(())
    }

    async fn update_user(
        &self,
        id: Uuid,
        attributes: HashSet<UserAttribute>,
    ) -> Result<User, Error<UpdateUserError, Self::InfraError>> {
        let mut query = QueryBuilder::<Postgres>::new("UPDATE users SET");
        attributes.iter().fold(
            // We set the ID to make the query valid even for empty attributes.
            query
                .separated(", ")
                .push(" id = ")
                .push_bind_unseparated(id),
            |query, attribute| {
                match attribute {
                    UserAttribute::Username(username) => query
                        .push(" username = ")
                        .push_bind_unseparated(&**username),

                    UserAttribute::EmailAddress(email_address) => query
                        .push(" email_address = ")
                        .push_bind_unseparated(&**email_address),

                    UserAttribute::FullName(full_name) => query
                        .push(" full_name = ")
                        .push_bind_unseparated(&**full_name),

                    UserAttribute::PasswordHash(password_hash) => query
                        .push(" password_hash = ")
                        .push_bind_unseparated(password_hash.as_str()),

                    UserAttribute::AvatarImage(avatar_image) => query
                        .push(" avatar_image = ")
                        .push_bind_unseparated(avatar_image.as_str()),

                    UserAttribute::CoverImage(cover_image) => query
                        .push(" cover_image = ")
                        .push_bind_unseparated(cover_image.as_str()),
                };

                query
            },
        );
        query
            .push(" WHERE id = ")
            .push_bind(id)
            .push(" RETURNING *");

        let user = query
            .build_query_as::<User>()
            .fetch_optional(&*self.pool)
            .await
            .map_err(|error| match error {
                sqlx::Error::Database(e) if unique_violation(e.as_ref(), "username") => {
                    Error::Domain(UpdateUserError::UsernameTaken)
                }

                sqlx::Error::Database(e) if unique_violation(e.as_ref(), "email_address") => {
                    Error::Domain(UpdateUserError::EmailAddressTaken)
                }

                other => Error::Infra(other),
            })?
            .ok_or_else(|| Error::Domain(UpdateUserError::NotFound(id)))?;

        Ok(user)
    }

    async fn get_user_by_id(
        &self,
        id: Uuid,
    ) -> Result<User, Error<GetUserByIdError, Self::InfraError>> {
        let query = indoc! {"
            SELECT *
            FROM users
            WHERE id = $1
        "};

        let user = sqlx::query_as(query)
            .bind(id)
            .fetch_optional(&*self.pool)
            .await?;

        user.ok_or(Error::Domain(GetUserByIdError::NotFound(id)))
    }

    async fn get_user_and_pwh_by_email_address(
        &self,
        email_address: &EmailAddress,
    ) -> Result<(User, PasswordHash), Error<GetUserAndPwhByEmailAddressError, Self::InfraError>>
    {
        let query = indoc! {"
            SELECT *
            FROM users
            WHERE email_address = $1
        "};

        let row = sqlx::query(query)
            .bind(&**email_address)
            .fetch_optional(&*self.pool)
            .await?
            .ok_or_else(|| {
                Error::Domain(GetUserAndPwhByEmailAddressError::NotFound(
                    email_address.to_owned(),
                ))
            })?;

        let user = User::from_row(&row)?;
        let password_hash = password_hash_from_row(&row)?;

        Ok((user, password_hash))
    }

    async fn get_user_and_pwh_by_id(
        &self,
        id: Uuid,
    ) -> Result<(User, PasswordHash), Error<GetUserByIdError, Self::InfraError>> {
        let query = indoc! {"
            SELECT *
            FROM users
            WHERE id = $1
        "};

        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&*self.pool)
            .await?
            .ok_or(Error::Domain(GetUserByIdError::NotFound(id)))?;

        let user = User::from_row(&row)?;
        let password_hash = password_hash_from_row(&row)?;

        Ok((user, password_hash))
    }

    async fn set_password_hash(
        &self,
        id: Uuid,
        password_hash: &PasswordHash,
    ) -> Result<(), Error<SetPasswordHashError, Self::InfraError>> {
        let result = sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash.as_str())
            .execute(&*self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::Domain(SetPasswordHashError::NotFound(id)));
        }

        Ok(())
    }

    async fn set_refresh_token(
        &self,
        id: Uuid,
        refresh_token: Option<&RefreshToken>,
    ) -> Result<(), Error<SetRefreshTokenError, Self::InfraError>> {
        let result = sqlx::query("UPDATE users SET refresh_token = $2 WHERE id = $1")
            .bind(id)
            .bind(refresh_token.map(|token| token.expose_secret()))
            .execute(&*self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::Domain(SetRefreshTokenError::NotFound(id)));
        }

        Ok(())
    }

    async fn replace_refresh_token(
        &self,
        id: Uuid,
        presented: &RefreshToken,
        next: &RefreshToken,
    ) -> Result<(), Error<ReplaceRefreshTokenError, Self::InfraError>> {
        let query = indoc! {"
            UPDATE users
            SET refresh_token = $3
            WHERE id = $1 AND refresh_token = $2
        "};

        let result = sqlx::query(query)
            .bind(id)
            .bind(presented.expose_secret())
            .bind(next.expose_secret())
            .execute(&*self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return if self.user_exists(id).await? {
                Err(Error::Domain(ReplaceRefreshTokenError::Mismatch(id)))
            } else {
                Err(Error::Domain(ReplaceRefreshTokenError::NotFound(id)))
            };
        }

        Ok(())
    }

    async fn get_channel_profile(
        &self,
        username: &Username,
        viewer: Uuid,
    ) -> Result<ChannelProfile, Error<GetChannelProfileError, Self::InfraError>> {
        let query = indoc! {"
            SELECT
                u.username,
                u.full_name,
                u.avatar_image,
                u.cover_image,
                (SELECT count(*) FROM subscriptions s WHERE s.channel_id = u.id)
                    AS subscriber_count,
                (SELECT count(*) FROM subscriptions s WHERE s.subscriber_id = u.id)
                    AS subscribed_to_count,
                EXISTS(
                    SELECT 1 FROM subscriptions s
                    WHERE s.channel_id = u.id AND s.subscriber_id = $2
                ) AS subscribed
            FROM users u
            WHERE u.username = $1
        "};

        let profile = sqlx::query_as(query)
            .bind(&**username)
            .bind(viewer)
            .fetch_optional(&*self.pool)
            .await?;

        profile.ok_or_else(|| Error::Domain(GetChannelProfileError::NotFound(username.to_owned())))
    }

    async fn get_watch_history(
        &self,
        id: Uuid,
    ) -> Result<Vec<WatchEntry>, Error<GetWatchHistoryError, Self::InfraError>> {
        if !self.user_exists(id).await? {
            return Err(Error::Domain(GetWatchHistoryError::NotFound(id)));
        }

        let query = indoc! {"
            SELECT video_id, watched_at
            FROM watch_history
            WHERE user_id = $1
            ORDER BY watched_at DESC
        "};

        let history = sqlx::query_as(query)
            .bind(id)
            .fetch_all(&*self.pool)
            .await?;

        Ok(history)
    }
}

impl<D> From<sqlx::Error> for Error<D, sqlx::Error> {
    fn from(error: sqlx::Error) -> Self {
        Error::Infra(error)
    }
}

fn password_hash_from_row(row: &sqlx::postgres::PgRow) -> Result<PasswordHash, sqlx::Error> {
    let password_hash = row.try_get::<&str, _>("password_hash")?;
    let password_hash = PasswordHashString::new(password_hash)
        .expect("password hash is valid")
        .into();
    Ok(password_hash)
}

fn unique_violation(error: &dyn sqlx::error::DatabaseError, column: &str) -> bool {
    error.is_unique_violation() && error.message().contains(column)
}
