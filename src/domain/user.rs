//! A user, i.e. a channel on the platform.

use chrono::{DateTime, Utc};
use nutype::nutype;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use sqlx::prelude::FromRow;
use std::sync::LazyLock;
use thiserror::Error;
use uuid::Uuid;

static EMAIL_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9-.]+$")
        .expect("regex for email address is correct")
});

/// A user. Every user is also a channel which other users can subscribe to. The image fields hold
/// media store file names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,

    #[sqlx(try_from = "String")]
    pub username: Username,

    #[sqlx(try_from = "String")]
    pub email_address: EmailAddress,

    #[sqlx(try_from = "String")]
    pub full_name: FullName,

    pub avatar_image: Option<String>,

    pub cover_image: Option<String>,
}

/// A username, trimmed. Must neither be empty nor have more than 32 characters.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 32),
    derive(
        Debug,
        Display,
        Clone,
        PartialEq,
        Eq,
        Hash,
        Deref,
        FromStr,
        TryFrom,
        Serialize,
        Deserialize,
    )
)]
pub struct Username(String);

/// An email address, trimmed and lowercased. Must not have more than 256 characters and match the
/// regular expression `^[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9-.]+$`.
#[nutype(
    sanitize(trim, lowercase),
    validate(len_char_max = 256, regex = EMAIL_ADDRESS),
    derive(
        Debug,
        Display,
        Clone,
        PartialEq,
        Eq,
        Hash,
        Deref,
        FromStr,
        TryFrom,
        Serialize,
        Deserialize
    )
)]
pub struct EmailAddress(String);

/// A full (display) name, trimmed. Must neither be empty nor have more than 64 characters.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 64),
    derive(
        Debug,
        Display,
        Clone,
        PartialEq,
        Eq,
        Hash,
        Deref,
        FromStr,
        TryFrom,
        Serialize,
        Deserialize,
    )
)]
pub struct FullName(String);

/// A password. Must have eight to 256 characters.
#[nutype(
    validate(with = validate_password, error = PasswordError),
    derive(Clone, Debug, Deref, Deserialize)
)]
pub struct Password(SecretString);

fn validate_password(value: &SecretString) -> Result<(), PasswordError> {
    let len = value.expose_secret().chars().count();

    if len < 8 {
        Err(PasswordError::TooShort)
    } else if len > 256 {
        Err(PasswordError::TooLong)
    } else {
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password too short, must not have less than eight characters")]
    TooShort,

    #[error("password too long, must not have more than 256 characters")]
    TooLong,
}

/// The public view of a user as a channel, from the perspective of a viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct ChannelProfile {
    #[sqlx(try_from = "String")]
    pub username: Username,

    #[sqlx(try_from = "String")]
    pub full_name: FullName,

    pub avatar_image: Option<String>,

    pub cover_image: Option<String>,

    /// Number of users subscribed to this channel.
    pub subscriber_count: i64,

    /// Number of channels this user subscribes to.
    pub subscribed_to_count: i64,

    /// Whether the viewer subscribes to this channel.
    pub subscribed: bool,
}

/// One watched video in a user's watch history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct WatchEntry {
    pub video_id: Uuid,
    pub watched_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use crate::domain::user::{
        EmailAddress, EmailAddressError, FullName, FullNameError, Password, PasswordError,
        Username, UsernameError,
    };
    use assert_matches::assert_matches;
    use proptest::{proptest, string::string_regex};
    use secrecy::ExposeSecret;

    #[test]
    fn test_username() {
        assert_matches!(Username::try_new(""), Err(UsernameError::NotEmptyViolated));

        let too_long_usernames = string_regex(r"\S[a-z]{31,100}\S").unwrap();
        proptest! {
            |(username in too_long_usernames)| {
                assert_matches!(
                    Username::try_new(&username),
                    Err(UsernameError::LenCharMaxViolated)
                );
            }
        }

        let valid_usernames = string_regex(r"\S|\S[a-z]{0,30}\S").unwrap();
        proptest! {
            |(username in valid_usernames)| {
                assert_matches!(
                    Username::try_new(&username),
                    Ok(u) if *u == username
                );
            }
        }
    }

    #[test]
    fn test_email_address() {
        assert_matches!(
            EmailAddress::try_new(""),
            Err(EmailAddressError::RegexViolated)
        );

        assert_matches!(
            EmailAddress::try_new("a"),
            Err(EmailAddressError::RegexViolated)
        );

        assert_matches!(
            EmailAddress::try_new("a@b"),
            Err(EmailAddressError::RegexViolated)
        );

        assert_matches!(
            EmailAddress::try_new("InFo@StreamHub.aPp"),
            Ok(e) if &*e == "info@streamhub.app"
        );

        let valid_email_addresses =
            string_regex(r"[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9-.]+").unwrap();
        proptest! {
            |(email_address in valid_email_addresses)| {
                assert_matches!(
                    EmailAddress::try_new(&email_address),
                    Ok(e) if *e == email_address.to_lowercase()
                );
            }
        }
    }

    #[test]
    fn test_full_name() {
        assert_matches!(FullName::try_new("  "), Err(FullNameError::NotEmptyViolated));

        let too_long_full_names = string_regex(r"\S[a-z]{63,100}\S").unwrap();
        proptest! {
            |(full_name in too_long_full_names)| {
                assert_matches!(
                    FullName::try_new(&full_name),
                    Err(FullNameError::LenCharMaxViolated)
                );
            }
        }

        assert_matches!(
            FullName::try_new("  Jane Doe  "),
            Ok(n) if &*n == "Jane Doe"
        );
    }

    #[test]
    fn test_password() {
        let too_short_passwords = string_regex(r".{0,7}").unwrap();
        proptest! {
            |(password in too_short_passwords)| {
                assert_matches!(
                    Password::try_new(password.into()),
                    Err(PasswordError::TooShort)
                );
            }
        }

        let too_long_passwords = string_regex(r".{257,512}").unwrap();
        proptest! {
            |(password in too_long_passwords)| {
                assert_matches!(
                    Password::try_new(password.into()),
                    Err(PasswordError::TooLong)
                );
            }
        }

        let valid_passwords = string_regex(r".{8,256}").unwrap();
        proptest! {
            |(password in valid_passwords)| {
                assert_matches!(
                    Password::try_new(password.clone().into()),
                    Ok(p) if p.expose_secret() == password
                );
            }
        }
    }
}
