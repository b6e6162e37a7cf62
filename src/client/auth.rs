//! Authentication flows of the client.

use super::RoommateApp;
use crate::{
    cache::keys,
    core::auth::{self, AuthSession, AuthUser, OAuthIdentity, SignUpOutcome},
    errors::Result,
    notifications::PushNotifier,
};
use tracing::{error, info, warn};

impl<N: PushNotifier> RoommateApp<N> {
    async fn start_session(&self, session: AuthSession) -> AuthUser {
        let user = session.user.clone();
        self.cache.set(keys::CURRENT_USER, &user, false).await;
        self.cache.set(keys::SESSION_TOKEN, &session, false).await;
        *self.session.write().await = Some(session);
        user
    }

    /// Creates an account. Signs in unless email confirmation is required.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<SignUpOutcome> {
        let outcome = auth::sign_up(self.db(), &self.auth_settings, email, password, full_name)
            .await
            .inspect_err(|e| error!("Error signing up with email: {}", e))?;
        if let SignUpOutcome::SignedIn(session) = &outcome {
            self.start_session(session.clone()).await;
        }
        Ok(outcome)
    }

    /// Signs in with email and password.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser> {
        let session = auth::sign_in_with_password(
            self.db(),
            &self.auth_settings,
            &self.throttle,
            email,
            password,
        )
        .await
        .inspect_err(|e| error!("Error signing in with email: {}", e))?;
        Ok(self.start_session(session).await)
    }

    /// Authorize URL for an OAuth sign-in through `provider`.
    pub fn oauth_url(&self, provider: &str, redirect_to: Option<&str>) -> Result<String> {
        auth::oauth_authorize_url(&self.auth_settings, provider, redirect_to)
    }

    /// Completes an OAuth redirect.
    pub async fn complete_oauth(&self, identity: &OAuthIdentity) -> Result<AuthUser> {
        let session = auth::sign_in_with_oauth_identity(self.db(), &self.auth_settings, identity)
            .await
            .inspect_err(|e| error!("Error completing OAuth sign-in: {}", e))?;
        Ok(self.start_session(session).await)
    }

    /// Restores the session saved by a previous run.
    ///
    /// The cached user is trusted when the backend cannot be reached; a session the
    /// backend rejects is discarded.
    pub async fn restore_session(&self) -> Option<AuthUser> {
        let cached: Option<AuthSession> = self.cache.get(keys::SESSION_TOKEN).await;
        let cached = cached?;

        match auth::session_user(self.db(), &cached.access_token).await {
            Ok(Some(user)) => {
                let session = AuthSession { user, ..cached };
                Some(self.start_session(session).await)
            }
            Ok(None) => {
                info!("Stored session expired");
                self.cache.remove(keys::SESSION_TOKEN).await;
                self.cache.remove(keys::CURRENT_USER).await;
                None
            }
            Err(e) => {
                warn!("Error getting session, using cached user: {}", e);
                let user = cached.user.clone();
                *self.session.write().await = Some(cached);
                Some(user)
            }
        }
    }

    /// Ends the current session. Local sign-out always succeeds.
    pub async fn sign_out(&self) {
        let session = self.session.write().await.take();
        if let Some(session) = session {
            if let Err(e) = auth::sign_out(self.db(), &session.access_token).await {
                error!("Error signing out: {}", e);
            }
        }
        self.cache.remove(keys::SESSION_TOKEN).await;
        self.cache.remove(keys::CURRENT_USER).await;
    }

    /// Registers this device's push token for the signed-in user.
    pub async fn register_push_token(&self, token: &str) -> Result<()> {
        let user = self.require_user().await?;
        auth::save_push_token(self.db(), &user.id, token).await
    }
}
