use crate::{
    domain::{
        media_store::MediaStore,
        user::{
            ChannelProfile, EmailAddress, FullName, Password, User as DomainUser, Username,
            WatchEntry,
        },
        user_repository::{
            GetChannelProfileError, GetUserAndPwhByEmailAddressError, GetUserByIdError,
            GetWatchHistoryError, UpdateUserError, UserRepository,
        },
        user_service::{self, ChangePasswordError, LoginError, UserService},
    },
    infra::api::{
        AppState,
        auth::{self, CurrentUser},
        tokens::{Token, TokenPair},
        upload::{AvatarUpload, CoverImageUpload, RegisterUpload},
    },
};
use axum::{
    Extension, Json, Router, middleware,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
};
use error_ext::{StdErrorExt, axum::Error};
use log::{error, info};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

pub fn routes<R, M>(app_state: AppState<R, M>) -> Router<AppState<R, M>>
where
    R: UserRepository,
    M: MediaStore,
{
    let open = Router::new()
        .route("/register", post(register_user))
        .route("/login", post(login_user))
        .route("/refresh-token", post(refresh_access_token));

    let secured = Router::new()
        .route("/logout", post(logout_user))
        .route("/change-password", post(change_current_password))
        .route("/current-user", get(get_current_user))
        .route("/update-account", patch(update_account_details))
        .route("/avatar", patch(update_user_avatar))
        .route("/cover-image", patch(update_user_cover_image))
        .route("/c/{username}", get(get_user_channel_profile))
        .route("/history", get(get_watch_history))
        .route_layer(middleware::from_fn_with_state(
            app_state,
            auth::require_auth,
        ));

    open.merge(secured)
}

#[derive(Debug, Serialize)]
struct User {
    username: Username,
    email_address: EmailAddress,
    full_name: FullName,
    avatar_image: Option<String>,
    cover_image: Option<String>,
}

impl From<DomainUser> for User {
    fn from(user: DomainUser) -> Self {
        let DomainUser {
            username,
            email_address,
            full_name,
            avatar_image,
            cover_image,
            ..
        } = user;

        Self {
            username,
            email_address,
            full_name,
            avatar_image,
            cover_image,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LoginUserRequest {
    email_address: EmailAddress,
    password: Password,
}

#[derive(Debug, Deserialize)]
struct RefreshTokenRequest {
    refresh_token: Token,
}

#[derive(Debug, Deserialize)]
struct ChangePasswordRequest {
    current_password: Password,
    new_password: Password,
}

#[derive(Debug, Deserialize)]
struct UpdateAccountRequest {
    username: Option<Username>,
    email_address: Option<EmailAddress>,
    full_name: Option<FullName>,
}

#[derive(Debug, Serialize)]
struct UserResponse {
    user: User,
}

#[derive(Debug, Serialize)]
struct SessionResponse {
    user: User,
    access_token: String,
    refresh_token: String,
}

#[derive(Debug, Serialize)]
struct TokensResponse {
    access_token: String,
    refresh_token: String,
}

#[derive(Debug, Serialize)]
struct ChannelResponse {
    channel: ChannelProfile,
}

#[derive(Debug, Serialize)]
struct WatchHistoryResponse {
    history: Vec<WatchEntry>,
}

async fn register_user<R, M>(
    State(app_state): State<AppState<R, M>>,
    upload: RegisterUpload,
) -> Result<impl IntoResponse, Error>
where
    R: UserRepository,
    M: MediaStore,
{
    let RegisterUpload {
        username,
        email_address,
        full_name,
        password,
        avatar,
        cover_image,
    } = upload;

    let user = app_state
        .user_service
        .register(
            username,
            email_address,
            full_name,
            password,
            avatar,
            cover_image,
        )
        .await
        .map_err(|error| match error {
            user_service::Error::Repository(add_user_error) => Error::conflict(add_user_error),

            user_service::Error::Infra(error) => {
                error!(error = error.as_chain(); "cannot register user");
                Error::Internal
            }
        })?;

    info!(user:?; "user registered");

    let user = user.into();
    let response = UserResponse { user };

    Ok((StatusCode::CREATED, Json(response)))
}

async fn login_user<R, M>(
    State(app_state): State<AppState<R, M>>,
    Json(request): Json<LoginUserRequest>,
) -> Result<impl IntoResponse, Error>
where
    R: UserRepository,
    M: MediaStore,
{
    let LoginUserRequest {
        email_address,
        password,
    } = request;

    let user = app_state
        .user_service
        .login(&email_address, &password)
        .await
        .map_err(|error| match error {
            user_service::Error::Domain(invalid_password @ LoginError::InvalidPassword(_)) => {
                Error::unauthorized(invalid_password)
            }

            user_service::Error::Repository(
                not_found @ GetUserAndPwhByEmailAddressError::NotFound(_),
            ) => Error::unauthorized(not_found),

            user_service::Error::Infra(error) => {
                error!(error = error.as_chain(); "cannot login user");
                Error::Internal
            }
        })?;

    let TokenPair {
        access_token,
        refresh_token,
    } = app_state.tokens.create_token_pair(user.id).map_err(|error| {
        error!(error = format!("{error:#}"); "cannot login user");
        Error::Internal
    })?;

    app_state
        .user_service
        .store_refresh_token(user.id, refresh_token.clone())
        .await
        .map_err(|error| match error {
            user_service::Error::Repository(not_found) => Error::unauthorized(not_found),

            user_service::Error::Infra(error) => {
                error!(error = error.as_chain(); "cannot login user");
                Error::Internal
            }
        })?;

    info!(user:?; "user logged in");

    let response = SessionResponse {
        user: user.into(),
        access_token: access_token.expose_secret().to_owned(),
        refresh_token: refresh_token.expose_secret().to_owned(),
    };

    Ok(Json(response))
}

async fn logout_user<R, M>(
    State(app_state): State<AppState<R, M>>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, Error>
where
    R: UserRepository,
    M: MediaStore,
{
    app_state
        .user_service
        .logout(current_user.id)
        .await
        .map_err(|error| match error {
            user_service::Error::Repository(not_found) => Error::not_found(not_found),

            user_service::Error::Infra(error) => {
                error!(error = error.as_chain(); "cannot logout user");
                Error::Internal
            }
        })?;

    info!(id:% = current_user.id; "user logged out");

    Ok(StatusCode::NO_CONTENT)
}

async fn refresh_access_token<R, M>(
    State(app_state): State<AppState<R, M>>,
    Json(request): Json<RefreshTokenRequest>,
) -> Result<impl IntoResponse, Error>
where
    R: UserRepository,
    M: MediaStore,
{
    let RefreshTokenRequest { refresh_token } = request;

    let id = app_state
        .tokens
        .verify_refresh_token(&refresh_token)
        .map_err(Error::unauthorized)?;

    let TokenPair {
        access_token,
        refresh_token: next_refresh_token,
    } = app_state.tokens.create_token_pair(id).map_err(|error| {
        error!(error = format!("{error:#}"); "cannot refresh access token");
        Error::Internal
    })?;

    app_state
        .user_service
        .rotate_refresh_token(id, &refresh_token, next_refresh_token.clone())
        .await
        .map_err(|error| match error {
            user_service::Error::Repository(replace_error) => Error::unauthorized(replace_error),

            user_service::Error::Infra(error) => {
                error!(error = error.as_chain(); "cannot refresh access token");
                Error::Internal
            }
        })?;

    let response = TokensResponse {
        access_token: access_token.expose_secret().to_owned(),
        refresh_token: next_refresh_token.expose_secret().to_owned(),
    };

    Ok(Json(response))
}

async fn change_current_password<R, M>(
    State(app_state): State<AppState<R, M>>,
    Extension(current_user): Extension<CurrentUser>,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, Error>
where
    R: UserRepository,
    M: MediaStore,
{
    let ChangePasswordRequest {
        current_password,
        new_password,
    } = request;

    app_state
        .user_service
        .change_password(current_user.id, &current_password, new_password)
        .await
        .map_err(|error| match error {
            user_service::Error::Domain(
                invalid_password @ ChangePasswordError::InvalidPassword(_),
            ) => Error::unauthorized(invalid_password),

            user_service::Error::Repository(not_found @ GetUserByIdError::NotFound(_)) => {
                Error::not_found(not_found)
            }

            user_service::Error::Infra(error) => {
                error!(error = error.as_chain(); "cannot change password");
                Error::Internal
            }
        })?;

    info!(id:% = current_user.id; "user changed password");

    Ok(StatusCode::NO_CONTENT)
}

async fn get_current_user<R, M>(
    State(app_state): State<AppState<R, M>>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, Error>
where
    R: UserRepository,
    M: MediaStore,
{
    let user = app_state
        .user_service
        .get_user_by_id(current_user.id)
        .await
        .map_err(|error| match error {
            user_service::Error::Repository(not_found @ GetUserByIdError::NotFound(_)) => {
                Error::not_found(not_found)
            }

            user_service::Error::Infra(error) => {
                error!(error = error.as_chain(); "cannot get current user");
                Error::Internal
            }
        })?;

    let user = user.into();
    let response = UserResponse { user };

    Ok(Json(response))
}

async fn update_account_details<R, M>(
    State(app_state): State<AppState<R, M>>,
    Extension(current_user): Extension<CurrentUser>,
    Json(request): Json<UpdateAccountRequest>,
) -> Result<impl IntoResponse, Error>
where
    R: UserRepository,
    M: MediaStore,
{
    let UpdateAccountRequest {
        username,
        email_address,
        full_name,
    } = request;

    let user = app_state
        .user_service
        .update_user(current_user.id, username, email_address, full_name)
        .await
        .map_err(|error| match error {
            user_service::Error::Repository(not_found @ UpdateUserError::NotFound(_)) => {
                Error::not_found(not_found)
            }

            user_service::Error::Repository(other) => Error::conflict(other),

            user_service::Error::Infra(error) => {
                error!(error = error.as_chain(); "cannot update account details");
                Error::Internal
            }
        })?;

    info!(user:?; "user updated account details");

    let user = user.into();
    let response = UserResponse { user };

    Ok(Json(response))
}

async fn update_user_avatar<R, M>(
    State(app_state): State<AppState<R, M>>,
    Extension(current_user): Extension<CurrentUser>,
    AvatarUpload(image): AvatarUpload,
) -> Result<impl IntoResponse, Error>
where
    R: UserRepository,
    M: MediaStore,
{
    let user = app_state
        .user_service
        .update_avatar(current_user.id, image)
        .await
        .map_err(|error| match error {
            user_service::Error::Repository(not_found @ UpdateUserError::NotFound(_)) => {
                Error::not_found(not_found)
            }

            user_service::Error::Repository(other) => Error::conflict(other),

            user_service::Error::Infra(error) => {
                error!(error = error.as_chain(); "cannot update avatar");
                Error::Internal
            }
        })?;

    info!(user:?; "user updated avatar");

    let user = user.into();
    let response = UserResponse { user };

    Ok(Json(response))
}

async fn update_user_cover_image<R, M>(
    State(app_state): State<AppState<R, M>>,
    Extension(current_user): Extension<CurrentUser>,
    CoverImageUpload(image): CoverImageUpload,
) -> Result<impl IntoResponse, Error>
where
    R: UserRepository,
    M: MediaStore,
{
    let user = app_state
        .user_service
        .update_cover_image(current_user.id, image)
        .await
        .map_err(|error| match error {
            user_service::Error::Repository(not_found @ UpdateUserError::NotFound(_)) => {
                Error::not_found(not_found)
            }

            user_service::Error::Repository(other) => Error::conflict(other),

            user_service::Error::Infra(error) => {
                error!(error = error.as_chain(); "cannot update cover image");
                Error::Internal
            }
        })?;

    info!(user:?; "user updated cover image");

    let user = user.into();
    let response = UserResponse { user };

    Ok(Json(response))
}

async fn get_user_channel_profile<R, M>(
    State(app_state): State<AppState<R, M>>,
    Extension(current_user): Extension<CurrentUser>,
    Path(username): Path<Username>,
) -> Result<impl IntoResponse, Error>
where
    R: UserRepository,
    M: MediaStore,
{
    let channel = app_state
        .user_service
        .get_channel_profile(&username, current_user.id)
        .await
        .map_err(|error| match error {
            user_service::Error::Repository(not_found @ GetChannelProfileError::NotFound(_)) => {
                Error::not_found(not_found)
            }

            user_service::Error::Infra(error) => {
                error!(error = error.as_chain(); "cannot get channel profile");
                Error::Internal
            }
        })?;

    let response = ChannelResponse { channel };

    Ok(Json(response))
}

async fn get_watch_history<R, M>(
    State(app_state): State<AppState<R, M>>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, Error>
where
    R: UserRepository,
    M: MediaStore,
{
    let history = app_state
        .user_service
        .get_watch_history(current_user.id)
        .await
        .map_err(|error| match error {
            user_service::Error::Repository(not_found @ GetWatchHistoryError::NotFound(_)) => {
                Error::not_found(not_found)
            }

            user_service::Error::Infra(error) => {
                error!(error = error.as_chain(); "cannot get watch history");
                Error::Internal
            }
        })?;

    let response = WatchHistoryResponse { history };

    Ok(Json(response))
}
