use anyhow::{Context, anyhow};
use derive_more::Debug;
use jwt_simple::prelude::{
    Claims, Duration, HS256Key, MACLike, NoCustomClaims, VerificationOptions,
};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_with::{base64::Base64, serde_as};
use std::time::Duration as StdDuration;
use uuid::Uuid;

pub type Token = SecretString;

/// An access/refresh token pair as handed out on login and refresh.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: Token,
    pub refresh_token: Token,
}

/// Creation and verification of access and refresh JWTs. The two kinds are signed with
/// independent keys, so one can never pass as the other.
#[derive(Debug, Clone)]
pub struct Tokens {
    access_key: HS256Key,
    refresh_key: HS256Key,
    access_token_expiry: Duration,
    refresh_token_expiry: Duration,
    verification_options: VerificationOptions,
}

impl Tokens {
    pub fn new(config: Config) -> Self {
        let Config {
            access_key,
            refresh_key,
            access_token_expiry,
            refresh_token_expiry,
            time_tolerance,
        } = config;

        let access_key = HS256Key::from_bytes(&access_key);
        let refresh_key = HS256Key::from_bytes(&refresh_key);

        let access_token_expiry = access_token_expiry.into();
        let refresh_token_expiry = refresh_token_expiry.into();

        let verification_options = VerificationOptions {
            time_tolerance: Some(time_tolerance.into()),
            ..Default::default()
        };

        Self {
            access_key,
            refresh_key,
            access_token_expiry,
            refresh_token_expiry,
            verification_options,
        }
    }

    /// Create an access/refresh token pair with the given user ID as subject.
    pub fn create_token_pair(&self, id: Uuid) -> anyhow::Result<TokenPair> {
        let access_token = create_token(&self.access_key, self.access_token_expiry, id)
            .context("create access token")?;
        let refresh_token = create_token(&self.refresh_key, self.refresh_token_expiry, id)
            .context("create refresh token")?;

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    pub fn verify_access_token(&self, token: &Token) -> anyhow::Result<Uuid> {
        verify_token(&self.access_key, &self.verification_options, token).context("verify access token")
    }

    pub fn verify_refresh_token(&self, token: &Token) -> anyhow::Result<Uuid> {
        verify_token(&self.refresh_key, &self.verification_options, token)
            .context("verify refresh token")
    }
}

fn create_token(key: &HS256Key, expiry: Duration, id: Uuid) -> anyhow::Result<Token> {
    // The jti makes tokens unique even when created for the same subject within the same second,
    // which refresh token rotation relies on.
    let claims = Claims::create(expiry)
        .with_subject(id)
        .with_jwt_id(Uuid::now_v7());
    key.authenticate(claims)
        .context("create token")
        .map(|token| token.into())
}

fn verify_token(
    key: &HS256Key,
    verification_options: &VerificationOptions,
    token: &Token,
) -> anyhow::Result<Uuid> {
    key.verify_token::<NoCustomClaims>(
        token.expose_secret(),
        Some(verification_options.clone()),
    )
    .context("verify token")
    .and_then(|claims| claims.subject.ok_or(anyhow!("JWT token has no subject")))
    .and_then(|subject| subject.parse().context("parse subject as Uuid"))
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[debug(skip)] // Skip is important, because this is a secret!
    #[serde_as(as = "Base64")]
    access_key: Vec<u8>,

    #[debug(skip)] // Skip is important, because this is a secret!
    #[serde_as(as = "Base64")]
    refresh_key: Vec<u8>,

    #[serde(with = "humantime_serde")]
    access_token_expiry: StdDuration,

    #[serde(with = "humantime_serde")]
    refresh_token_expiry: StdDuration,

    #[serde(with = "humantime_serde")]
    time_tolerance: StdDuration,
}

#[cfg(test)]
mod tests {
    use crate::infra::api::tokens::{Config, Tokens};
    use std::{error::Error as StdError, time::Duration};
    use uuid::Uuid;

    fn tokens() -> Tokens {
        Tokens::new(Config {
            access_key: b"access-key-for-tests".to_vec(),
            refresh_key: b"refresh-key-for-tests".to_vec(),
            access_token_expiry: Duration::from_secs(600),
            refresh_token_expiry: Duration::from_secs(86_400),
            time_tolerance: Duration::from_secs(15),
        })
    }

    #[test]
    fn test_token_pair() -> Result<(), Box<dyn StdError>> {
        let tokens = tokens();
        let id = Uuid::now_v7();

        let pair = tokens.create_token_pair(id)?;

        let verified = tokens.verify_access_token(&pair.access_token)?;
        assert_eq!(verified, id);

        let verified = tokens.verify_refresh_token(&pair.refresh_token)?;
        assert_eq!(verified, id);

        Ok(())
    }

    #[test]
    fn test_keys_are_independent() -> Result<(), Box<dyn StdError>> {
        let tokens = tokens();
        let pair = tokens.create_token_pair(Uuid::now_v7())?;

        assert!(tokens.verify_access_token(&pair.refresh_token).is_err());
        assert!(tokens.verify_refresh_token(&pair.access_token).is_err());

        Ok(())
    }

    #[test]
    fn test_garbage_token() {
        let tokens = tokens();
        assert!(tokens.verify_access_token(&"not-a-jwt".into()).is_err());
    }
}
