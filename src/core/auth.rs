//! Authentication - Accounts, password and OAuth sign-in, sessions.
//!
//! Passwords are hashed with Argon2id. Sign-in issues an opaque random token stored in
//! the `sessions` table; [`session_user`] resolves a token back to its user until the
//! session expires. Repeated failed sign-ins for the same email are throttled by
//! [`LoginThrottle`].

use crate::{
    config::AuthSettings,
    core::room::display_name,
    entities::{Profile, Session, profile, session},
    errors::{Error, Result},
};
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use base64::Engine;
use chrono::{Duration as ChronoDuration, Utc};
use rand::Rng;
use rand_core::OsRng;
use sea_orm::{Set, prelude::*};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use uuid::Uuid;

const MIN_PASSWORD_LEN: usize = 6;

/// The signed-in user as seen by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    /// Profile id
    pub id: String,
    /// Login email
    pub email: String,
    /// Display name
    pub name: String,
    /// Full name
    pub full_name: String,
}

impl From<&profile::Model> for AuthUser {
    fn from(profile: &profile::Model) -> Self {
        Self {
            id: profile.id.clone(),
            email: profile.email.clone(),
            name: display_name(profile),
            full_name: profile.full_name.clone(),
        }
    }
}

/// An issued session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    /// Opaque bearer token
    pub access_token: String,
    /// Session owner
    pub user: AuthUser,
    /// When the token stops being accepted
    pub expires_at: DateTimeUtc,
}

/// Result of a sign-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    /// Account created and signed in
    SignedIn(AuthSession),
    /// Account created; the email must be confirmed before signing in
    ConfirmationRequired {
        /// The new user
        user: AuthUser,
    },
}

/// Identity returned by an OAuth provider after the redirect completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthIdentity {
    /// Verified email from the provider
    pub email: String,
    /// Full name from the provider, if shared
    pub full_name: Option<String>,
}

/// Sliding-window counter of failed sign-ins per email.
#[derive(Debug)]
pub struct LoginThrottle {
    max_failures: usize,
    window: Duration,
    failures: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl LoginThrottle {
    /// Creates a throttle allowing `max_failures` failures per `window`.
    #[must_use]
    pub fn new(max_failures: usize, window: Duration) -> Self {
        Self {
            max_failures,
            window,
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a throttle from the `[auth]` settings.
    #[must_use]
    pub fn from_settings(settings: &AuthSettings) -> Self {
        Self::new(settings.max_failed_attempts, settings.lockout_window())
    }

    fn key(email: &str) -> String {
        email.trim().to_lowercase()
    }

    /// Fails with [`Error::RateLimited`] when the email is locked out.
    pub fn check(&self, email: &str) -> Result<()> {
        self.check_at(email, Instant::now())
    }

    fn check_at(&self, email: &str, now: Instant) -> Result<()> {
        let Ok(mut failures) = self.failures.lock() else {
            warn!("Login throttle lock poisoned, skipping check");
            return Ok(());
        };
        let key = Self::key(email);
        let Some(attempts) = failures.get_mut(&key) else {
            return Ok(());
        };
        self.expire(attempts, now);
        if attempts.is_empty() {
            failures.remove(&key);
            return Ok(());
        }
        if attempts.len() < self.max_failures {
            return Ok(());
        }
        let retry_after = attempts
            .front()
            .map_or(Duration::ZERO, |oldest| {
                self.window
                    .saturating_sub(now.saturating_duration_since(*oldest))
            });
        Err(Error::RateLimited {
            retry_after_secs: retry_after.as_secs().max(1),
        })
    }

    /// Records a failed attempt.
    pub fn record_failure(&self, email: &str) {
        self.record_failure_at(email, Instant::now());
    }

    fn record_failure_at(&self, email: &str, now: Instant) {
        if let Ok(mut failures) = self.failures.lock() {
            // Emails whose failures all expired are dropped
            failures.retain(|_, attempts| {
                self.expire(attempts, now);
                !attempts.is_empty()
            });
            failures.entry(Self::key(email)).or_default().push_back(now);
        }
    }

    fn expire(&self, attempts: &mut VecDeque<Instant>, now: Instant) {
        while attempts
            .front()
            .is_some_and(|t| now.saturating_duration_since(*t) >= self.window)
        {
            attempts.pop_front();
        }
    }

    /// Forgets failures after a successful sign-in.
    pub fn reset(&self, email: &str) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.remove(&Self::key(email));
        }
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::PasswordHash {
            message: e.to_string(),
        })
}

fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| Error::PasswordHash {
        message: e.to_string(),
    })?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Finds a profile by email (case-insensitive).
pub async fn get_profile_by_email(
    db: &DatabaseConnection,
    email: &str,
) -> Result<Option<profile::Model>> {
    Profile::find()
        .filter(profile::Column::Email.eq(normalize_email(email)))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds a profile by id.
pub async fn get_profile(db: &DatabaseConnection, user_id: &str) -> Result<Option<profile::Model>> {
    Profile::find_by_id(user_id.to_string())
        .one(db)
        .await
        .map_err(Into::into)
}

async fn issue_session(
    db: &DatabaseConnection,
    profile: &profile::Model,
    settings: &AuthSettings,
) -> Result<AuthSession> {
    let now = Utc::now();
    let row = session::ActiveModel {
        token: Set(generate_token()),
        user_id: Set(profile.id.clone()),
        created_at: Set(now),
        expires_at: Set(now + ChronoDuration::days(settings.session_ttl_days)),
    }
    .insert(db)
    .await?;

    Ok(AuthSession {
        access_token: row.token,
        user: AuthUser::from(profile),
        expires_at: row.expires_at,
    })
}

/// Creates a password account.
///
/// With `require_email_confirmation` the account starts unconfirmed and no session is
/// issued.
pub async fn sign_up(
    db: &DatabaseConnection,
    settings: &AuthSettings,
    email: &str,
    password: &str,
    full_name: &str,
) -> Result<SignUpOutcome> {
    let email = normalize_email(email);
    if email.is_empty() {
        return Err(Error::MissingField { field: "email" });
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err(Error::MissingField { field: "password" });
    }
    if get_profile_by_email(db, &email).await?.is_some() {
        return Err(Error::EmailTaken { email });
    }

    let full_name = full_name.trim();
    let display = if full_name.is_empty() {
        email.clone()
    } else {
        full_name.to_string()
    };
    let now = Utc::now();
    let created = profile::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        email: Set(email),
        name: Set(display.clone()),
        full_name: Set(display),
        password_hash: Set(Some(hash_password(password)?)),
        email_confirmed: Set(!settings.require_email_confirmation),
        push_token: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;

    info!(user_id = %created.id, "Signed up new user");

    if created.email_confirmed {
        Ok(SignUpOutcome::SignedIn(
            issue_session(db, &created, settings).await?,
        ))
    } else {
        Ok(SignUpOutcome::ConfirmationRequired {
            user: AuthUser::from(&created),
        })
    }
}

/// Marks a user's email as confirmed.
pub async fn confirm_email(db: &DatabaseConnection, user_id: &str) -> Result<profile::Model> {
    let existing = get_profile(db, user_id)
        .await?
        .ok_or(Error::InvalidCredentials)?;
    let mut active: profile::ActiveModel = existing.into();
    active.email_confirmed = Set(true);
    active.updated_at = Set(Utc::now());
    active.update(db).await.map_err(Into::into)
}

/// Signs in with email and password.
///
/// Unknown email and wrong password both yield [`Error::InvalidCredentials`] and count as a
/// failure for throttling.
pub async fn sign_in_with_password(
    db: &DatabaseConnection,
    settings: &AuthSettings,
    throttle: &LoginThrottle,
    email: &str,
    password: &str,
) -> Result<AuthSession> {
    throttle.check(email)?;

    let profile = get_profile_by_email(db, email).await?;
    let verified = match profile.as_ref().and_then(|p| p.password_hash.as_deref()) {
        Some(hash) => verify_password(password, hash)?,
        None => false,
    };

    let Some(profile) = profile.filter(|_| verified) else {
        throttle.record_failure(email);
        warn!("Failed sign-in attempt");
        return Err(Error::InvalidCredentials);
    };

    if !profile.email_confirmed {
        return Err(Error::EmailNotConfirmed {
            email: profile.email,
        });
    }

    throttle.reset(email);
    let session = issue_session(db, &profile, settings).await?;
    info!(user_id = %profile.id, "User signed in");
    Ok(session)
}

/// Builds the provider authorize URL for an OAuth redirect sign-in.
///
/// `redirect_to` defaults to `<redirect_scheme>://auth/callback`.
pub fn oauth_authorize_url(
    settings: &AuthSettings,
    provider: &str,
    redirect_to: Option<&str>,
) -> Result<String> {
    let default_redirect = format!("{}://auth/callback", settings.redirect_scheme);
    let redirect = redirect_to.unwrap_or(&default_redirect);
    reqwest::Url::parse_with_params(
        &settings.oauth_authorize_url,
        &[
            ("provider", provider),
            ("redirect_to", redirect),
            ("access_type", "offline"),
            ("prompt", "consent"),
        ],
    )
    .map(String::from)
    .map_err(|e| Error::Config {
        message: format!("Invalid OAuth authorize URL: {e}"),
    })
}

/// Completes an OAuth sign-in: creates the profile on first use, then issues a session.
pub async fn sign_in_with_oauth_identity(
    db: &DatabaseConnection,
    settings: &AuthSettings,
    identity: &OAuthIdentity,
) -> Result<AuthSession> {
    let email = normalize_email(&identity.email);
    if email.is_empty() {
        return Err(Error::MissingField { field: "email" });
    }

    let profile = if let Some(existing) = get_profile_by_email(db, &email).await? {
        if existing.email_confirmed {
            existing
        } else {
            confirm_email(db, &existing.id).await?
        }
    } else {
        let name = identity
            .full_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map_or_else(|| email.clone(), ToString::to_string);
        let now = Utc::now();
        profile::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            email: Set(email),
            name: Set(name.clone()),
            full_name: Set(name),
            password_hash: Set(None),
            email_confirmed: Set(true),
            push_token: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await?
    };

    issue_session(db, &profile, settings).await
}

/// Resolves a session token to its user. Expired or unknown tokens yield `None`.
pub async fn session_user(db: &DatabaseConnection, token: &str) -> Result<Option<AuthUser>> {
    let Some(row) = Session::find_by_id(token.to_string()).one(db).await? else {
        return Ok(None);
    };
    if row.expires_at <= Utc::now() {
        return Ok(None);
    }
    Ok(get_profile(db, &row.user_id)
        .await?
        .map(|p| AuthUser::from(&p)))
}

/// Ends a session. Unknown tokens are ignored.
pub async fn sign_out(db: &DatabaseConnection, token: &str) -> Result<()> {
    Session::delete_by_id(token.to_string()).exec(db).await?;
    Ok(())
}

/// Stores the device push token on the user's profile.
pub async fn save_push_token(db: &DatabaseConnection, user_id: &str, token: &str) -> Result<()> {
    let existing = get_profile(db, user_id)
        .await?
        .ok_or(Error::NotAuthenticated)?;
    let mut active: profile::ActiveModel = existing.into();
    active.push_token = Set(Some(token.to_string()));
    active.updated_at = Set(Utc::now());
    active.update(db).await?;
    Ok(())
}
