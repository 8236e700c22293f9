use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::domain::{Clock, Storage, TokenStore};
use crate::interface_adapters::clients::{AuthClient, BookClient};
use crate::interface_adapters::http::{ApiClient, ClientBuildError, UnauthorizedNotifier};
use crate::use_cases::{BookService, SessionManager};

pub type AppSession = SessionManager<AuthClient, SystemClock>;

// Everything a front end needs, wired over one storage backend and one
// request pipeline.
#[derive(Clone)]
pub struct AppState {
    pub tokens: TokenStore,
    pub api: ApiClient,
    pub session: Arc<AppSession>,
    pub books: Arc<BookService<BookClient>>,
}

impl AppState {
    pub fn build(base_url: &str, storage: Arc<dyn Storage>) -> Result<Self, ClientBuildError> {
        let tokens = TokenStore::new(storage);
        let api = ApiClient::new(base_url, tokens.clone(), UnauthorizedNotifier::new())?;

        let session = Arc::new(SessionManager::new(
            AuthClient::new(api.clone()),
            tokens.clone(),
            SystemClock,
        ));
        let books = Arc::new(BookService::new(BookClient::new(api.clone())));

        Ok(Self {
            tokens,
            api,
            session,
            books,
        })
    }
}

// System clock adapter used by the session manager and form validation.
#[derive(Clone)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_seconds(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface_adapters::storage::MemoryStorage;

    #[test]
    fn when_base_url_is_valid_then_state_shares_one_token_store() {
        let state = AppState::build("http://localhost:5234/api", Arc::new(MemoryStorage::new()))
            .expect("expected state to build");

        state.tokens.set("abc").expect("expected token to be stored");
        state.session.check_auth();

        // The malformed token is dropped through the session's own handle.
        assert!(!state.session.session().authenticated);
        assert_eq!(state.tokens.get(), None);
        assert_eq!(state.api.base_url().as_str(), "http://localhost:5234/api");
    }

    #[test]
    fn when_system_clock_is_read_then_year_is_plausible() {
        assert!(SystemClock.current_year() >= 2024);
    }
}
