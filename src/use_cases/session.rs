use serde_json::Value;
use std::sync::{Arc, Weak};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};

use crate::domain::token_store::TOKEN_KEY;
use crate::domain::{
    AuthApi, AuthEvent, Clock, Credentials, Rejection, Session, TokenStore, decode_token,
};
use crate::use_cases::subscription::Subscription;

pub const REGISTER_FALLBACK_MESSAGE: &str = "Registration failed. Please try again.";

// Derives the session from the stored token and drives login/logout.
// Observers follow state changes through `subscribe`.
pub struct SessionManager<A, C> {
    pub auth: A,
    pub clock: C,
    tokens: TokenStore,
    state: watch::Sender<Session>,
}

impl<A, C> SessionManager<A, C>
where
    A: AuthApi,
    C: Clock,
{
    pub fn new(auth: A, tokens: TokenStore, clock: C) -> Self {
        let (state, _) = watch::channel(Session::anonymous());
        Self {
            auth,
            clock,
            tokens,
            state,
        }
    }

    pub fn session(&self) -> Session {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    // Returns false on every failure; the reason is only logged.
    #[tracing::instrument(name = "login", skip_all, fields(username = %username))]
    pub async fn login(&self, username: &str, password: &str) -> bool {
        let credentials = Credentials {
            username: username.to_string(),
            password: password.to_string(),
        };

        let response = match self.auth.login(&credentials).await {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!(%error, "login rejected");
                self.logout();
                return false;
            }
        };

        let Some(token) = response.token.filter(|token| !token.is_empty()) else {
            tracing::warn!("login response carried no token");
            self.logout();
            return false;
        };

        if let Err(error) = self.tokens.set(&token) {
            tracing::error!(%error, "failed to persist token");
            self.publish(Session::anonymous());
            return false;
        }

        match decode_token(&token) {
            Ok(claims) => {
                let user = claims.user();
                tracing::info!(user_id = %user.id, "logged in");
                self.publish(Session::authenticated(user));
                true
            }
            Err(error) => {
                tracing::warn!(%error, "login token could not be decoded");
                self.logout();
                false
            }
        }
    }

    // Idempotent; always leaves storage empty and the session anonymous.
    pub fn logout(&self) {
        if let Err(error) = self.tokens.clear() {
            tracing::error!(%error, "failed to clear stored token");
        }
        self.publish(Session::anonymous());
    }

    pub fn check_auth(&self) {
        let Some(token) = self.tokens.get() else {
            self.publish(Session::anonymous());
            return;
        };

        match decode_token(&token) {
            Ok(claims) if !claims.is_expired(self.clock.now_epoch_seconds()) => {
                self.publish(Session::authenticated(claims.user()));
            }
            Ok(claims) => {
                tracing::info!(exp = claims.exp, "stored token expired");
                self.logout();
            }
            Err(error) => {
                tracing::warn!(%error, "stored token is malformed");
                self.logout();
            }
        }
    }

    // Independent of the session; the created account is returned as sent.
    #[tracing::instrument(name = "register", skip_all, fields(username = %username))]
    pub async fn register(&self, username: &str, password: &str) -> Result<Value, Rejection> {
        let credentials = Credentials {
            username: username.to_string(),
            password: password.to_string(),
        };

        match self.auth.register(&credentials).await {
            Ok(created) => {
                tracing::info!("account registered");
                Ok(created)
            }
            Err(source) => {
                let message = source
                    .backend_message()
                    .or_else(|| source.first_validation_message())
                    .unwrap_or_else(|| REGISTER_FALLBACK_MESSAGE.to_string());
                tracing::warn!(error = %source, %message, "registration failed");
                Err(Rejection { message, source })
            }
        }
    }

    fn publish(&self, next: Session) {
        self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}

impl<A, C> SessionManager<A, C>
where
    A: AuthApi + 'static,
    C: Clock + 'static,
{
    // Initial check plus the cross-handle storage subscription.
    pub fn mount(self: &Arc<Self>) -> Subscription {
        self.check_auth();
        self.watch_storage()
    }

    // Re-checks whenever another storage handle changes the token key.
    pub fn watch_storage(self: &Arc<Self>) -> Subscription {
        let mut events = self.tokens.subscribe();
        let own_origin = self.tokens.origin();
        let manager = Arc::downgrade(self);

        Subscription::new(tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) if event.key == TOKEN_KEY && event.origin != own_origin => {
                        tracing::debug!(origin = ?event.origin, "token changed elsewhere");
                        if !recheck(&manager) {
                            return;
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "storage events lagged; re-checking session");
                        if !recheck(&manager) {
                            return;
                        }
                    }
                    Err(RecvError::Closed) => return,
                }
            }
        }))
    }

    // The front end's listener for the pipeline's unauthorized signal.
    pub fn follow_unauthorized(
        self: &Arc<Self>,
        mut events: broadcast::Receiver<AuthEvent>,
    ) -> Subscription {
        let manager = Arc::downgrade(self);

        Subscription::new(tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(AuthEvent::Unauthorized) | Err(RecvError::Lagged(_)) => {
                        if !recheck(&manager) {
                            return;
                        }
                    }
                    Err(RecvError::Closed) => return,
                }
            }
        }))
    }
}

// False once the manager is gone and the listener should stop.
fn recheck<A: AuthApi, C: Clock>(manager: &Weak<SessionManager<A, C>>) -> bool {
    match manager.upgrade() {
        Some(manager) => {
            manager.check_auth();
            true
        }
        None => false,
    }
}
