//! Multipart upload handling.
//!
//! Upload parsing runs as extractors, i.e. before the handler body, and rejects invalid requests
//! with 400. `/register` accepts text fields plus at most one file each for "avatar" and
//! "cover_image"; the avatar and cover image routes accept exactly one file.

use crate::domain::{
    media_store::ImageData,
    user::{EmailAddress, FullName, Password, Username},
};
use axum::{
    extract::{
        FromRequest, Multipart, Request,
        multipart::{Field, MultipartError, MultipartRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::{fmt::Display, str::FromStr};
use thiserror::Error;

/// The parsed and validated `/register` form.
#[derive(Debug)]
pub struct RegisterUpload {
    pub username: Username,
    pub email_address: EmailAddress,
    pub full_name: FullName,
    pub password: Password,
    pub avatar: Option<ImageData>,
    pub cover_image: Option<ImageData>,
}

impl<S> FromRequest<S> for RegisterUpload
where
    S: Send + Sync,
{
    type Rejection = UploadError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let mut multipart = Multipart::from_request(request, state).await?;

        let mut username = None;
        let mut email_address = None;
        let mut full_name = None;
        let mut password = None;
        let mut avatar = None;
        let mut cover_image = None;

        while let Some(field) = multipart.next_field().await.map_err(UploadError::Field)? {
            let name = field.name().map(ToOwned::to_owned);

            match name.as_deref() {
                Some("username") => {
                    ensure_vacant(&username, "username")?;
                    username = Some(text_value(field, "username").await?);
                }

                Some("email_address") => {
                    ensure_vacant(&email_address, "email_address")?;
                    email_address = Some(text_value(field, "email_address").await?);
                }

                Some("full_name") => {
                    ensure_vacant(&full_name, "full_name")?;
                    full_name = Some(text_value(field, "full_name").await?);
                }

                Some("password") => {
                    ensure_vacant(&password, "password")?;
                    let text = field.text().await.map_err(UploadError::Field)?;
                    let value =
                        Password::try_new(text.into()).map_err(|error| UploadError::InvalidField {
                            field: "password",
                            reason: error.to_string(),
                        })?;
                    password = Some(value);
                }

                Some("avatar") => {
                    if avatar.is_some() {
                        return Err(UploadError::TooManyFiles("avatar"));
                    }
                    avatar = Some(image_data(field).await?);
                }

                Some("cover_image") => {
                    if cover_image.is_some() {
                        return Err(UploadError::TooManyFiles("cover_image"));
                    }
                    cover_image = Some(image_data(field).await?);
                }

                Some(other) => return Err(UploadError::UnexpectedField(other.to_owned())),

                None => return Err(UploadError::UnnamedField),
            }
        }

        Ok(Self {
            username: username.ok_or(UploadError::MissingField("username"))?,
            email_address: email_address.ok_or(UploadError::MissingField("email_address"))?,
            full_name: full_name.ok_or(UploadError::MissingField("full_name"))?,
            password: password.ok_or(UploadError::MissingField("password"))?,
            avatar,
            cover_image,
        })
    }
}

/// A single "avatar" image file.
#[derive(Debug)]
pub struct AvatarUpload(pub ImageData);

impl<S> FromRequest<S> for AvatarUpload
where
    S: Send + Sync,
{
    type Rejection = UploadError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let mut multipart = Multipart::from_request(request, state).await?;
        let image = single_image(&mut multipart, "avatar").await?;
        Ok(Self(image))
    }
}

/// A single "cover_image" image file.
#[derive(Debug)]
pub struct CoverImageUpload(pub ImageData);

impl<S> FromRequest<S> for CoverImageUpload
where
    S: Send + Sync,
{
    type Rejection = UploadError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let mut multipart = Multipart::from_request(request, state).await?;
        let image = single_image(&mut multipart, "cover_image").await?;
        Ok(Self(image))
    }
}

async fn single_image(
    multipart: &mut Multipart,
    name: &'static str,
) -> Result<ImageData, UploadError> {
    let mut image = None;

    while let Some(field) = multipart.next_field().await.map_err(UploadError::Field)? {
        let field_name = field.name().map(ToOwned::to_owned);

        match field_name.as_deref() {
            Some(n) if n == name => {
                if image.is_some() {
                    return Err(UploadError::TooManyFiles(name));
                }
                image = Some(image_data(field).await?);
            }

            Some(other) => return Err(UploadError::UnexpectedField(other.to_owned())),

            None => return Err(UploadError::UnnamedField),
        }
    }

    image.ok_or(UploadError::MissingField(name))
}

async fn image_data(field: Field<'_>) -> Result<ImageData, UploadError> {
    let file_name = field.file_name().map(ToOwned::to_owned);
    let content_type = field.content_type().map(ToOwned::to_owned);
    let bytes = field.bytes().await.map_err(UploadError::Field)?.to_vec();

    Ok(ImageData {
        bytes,
        file_name,
        content_type,
    })
}

async fn text_value<T>(field: Field<'_>, name: &'static str) -> Result<T, UploadError>
where
    T: FromStr,
    T::Err: Display,
{
    let text = field.text().await.map_err(UploadError::Field)?;

    text.parse().map_err(|error: T::Err| UploadError::InvalidField {
        field: name,
        reason: error.to_string(),
    })
}

fn ensure_vacant<T>(value: &Option<T>, name: &'static str) -> Result<(), UploadError> {
    if value.is_some() {
        Err(UploadError::DuplicateField(name))
    } else {
        Ok(())
    }
}

/// Rejection for the upload extractors, resulting in a 400 response.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error(transparent)]
    Multipart(#[from] MultipartRejection),

    #[error("cannot read multipart field")]
    Field(#[source] MultipartError),

    #[error("multipart field without a name")]
    UnnamedField,

    #[error("unexpected multipart field {0}")]
    UnexpectedField(String),

    #[error("duplicate multipart field {0}")]
    DuplicateField(&'static str),

    #[error("more than one file for multipart field {0}")]
    TooManyFiles(&'static str),

    #[error("missing multipart field {0}")]
    MissingField(&'static str),

    #[error("invalid {field}: {reason}")]
    InvalidField {
        field: &'static str,
        reason: String,
    },
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        match self {
            UploadError::Multipart(rejection) => rejection.into_response(),
            other => (StatusCode::BAD_REQUEST, other.to_string()).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::infra::api::upload::{AvatarUpload, RegisterUpload, UploadError};
    use assert_matches::assert_matches;
    use axum::{
        body::Body,
        extract::{FromRequest, Request},
        http::header::CONTENT_TYPE,
    };
    use std::error::Error as StdError;

    const BOUNDARY: &str = "test-boundary";

    enum Part<'a> {
        Text(&'a str, &'a str),
        File(&'a str, &'a str, &'a str),
    }

    fn multipart_request(parts: &[Part<'_>]) -> Request {
        let mut body = String::new();

        for part in parts {
            body.push_str(&format!("--{BOUNDARY}\r\n"));
            match part {
                Part::Text(name, value) => {
                    body.push_str(&format!(
                        "Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                    ));
                }

                Part::File(name, file_name, content) => {
                    body.push_str(&format!(
                        "Content-Disposition: form-data; name=\"{name}\"; \
                         filename=\"{file_name}\"\r\nContent-Type: image/png\r\n\r\n{content}\r\n"
                    ));
                }
            }
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));

        Request::builder()
            .method("POST")
            .uri("/")
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn register_parts<'a>() -> Vec<Part<'a>> {
        vec![
            Part::Text("username", "user"),
            Part::Text("email_address", "user@streamhub.dev"),
            Part::Text("full_name", "User McUser"),
            Part::Text("password", "password"),
        ]
    }

    #[tokio::test]
    async fn test_register_upload() -> Result<(), Box<dyn StdError>> {
        let mut parts = register_parts();
        parts.push(Part::File("avatar", "avatar.png", "avatar-bytes"));

        let request = multipart_request(&parts);
        let upload = RegisterUpload::from_request(request, &()).await?;

        assert_eq!(&*upload.username, "user");
        assert_eq!(&*upload.email_address, "user@streamhub.dev");
        assert_eq!(&*upload.full_name, "User McUser");
        assert_matches!(
            upload.avatar,
            Some(ref image) if image.bytes == b"avatar-bytes" &&
                image.file_name.as_deref() == Some("avatar.png") &&
                image.content_type.as_deref() == Some("image/png")
        );
        assert!(upload.cover_image.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_register_upload_too_many_files() {
        let mut parts = register_parts();
        parts.push(Part::File("avatar", "a.png", "a"));
        parts.push(Part::File("avatar", "b.png", "b"));

        let request = multipart_request(&parts);
        let result = RegisterUpload::from_request(request, &()).await;
        assert_matches!(result, Err(UploadError::TooManyFiles("avatar")));
    }

    #[tokio::test]
    async fn test_register_upload_missing_field() {
        let parts = vec![
            Part::Text("username", "user"),
            Part::Text("email_address", "user@streamhub.dev"),
            Part::Text("full_name", "User McUser"),
        ];

        let request = multipart_request(&parts);
        let result = RegisterUpload::from_request(request, &()).await;
        assert_matches!(result, Err(UploadError::MissingField("password")));
    }

    #[tokio::test]
    async fn test_register_upload_invalid_field() {
        let mut parts = register_parts();
        parts[1] = Part::Text("email_address", "not-an-email");

        let request = multipart_request(&parts);
        let result = RegisterUpload::from_request(request, &()).await;
        assert_matches!(
            result,
            Err(UploadError::InvalidField {
                field: "email_address",
                ..
            })
        );
    }

    #[tokio::test]
    async fn test_register_upload_unexpected_field() {
        let mut parts = register_parts();
        parts.push(Part::Text("role", "admin"));

        let request = multipart_request(&parts);
        let result = RegisterUpload::from_request(request, &()).await;
        assert_matches!(result, Err(UploadError::UnexpectedField(field)) if field == "role");
    }

    #[tokio::test]
    async fn test_avatar_upload() -> Result<(), Box<dyn StdError>> {
        let request = multipart_request(&[Part::File("avatar", "avatar.png", "avatar-bytes")]);
        let AvatarUpload(image) = AvatarUpload::from_request(request, &()).await?;
        assert_eq!(image.bytes, b"avatar-bytes");

        let request = multipart_request(&[]);
        let result = AvatarUpload::from_request(request, &()).await;
        assert_matches!(result, Err(UploadError::MissingField("avatar")));

        Ok(())
    }
}
