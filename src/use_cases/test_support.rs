use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Value, json};

use crate::domain::claims::{CLAIM_NAME, CLAIM_NAME_ID};
use crate::domain::{
    ApiError, AuthApi, Book, BookApi, BookPatch, Clock, Credentials, ErrorBody, LoginResponse,
    NewBook, TokenStore,
};
use crate::interface_adapters::storage::MemoryStorage;

pub(crate) const NOW: u64 = 1_700_000_000;

// Shared fixed time source for deterministic use-case tests.
pub(crate) struct FixedClock(pub(crate) u64);

impl Clock for FixedClock {
    fn now_epoch_seconds(&self) -> u64 {
        self.0
    }
}

// Unsigned token carrying the backend's claim names.
pub(crate) fn token_for(user_id: &str, username: &str, exp: u64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = json!({
        CLAIM_NAME_ID: user_id,
        CLAIM_NAME: username,
        "exp": exp,
        "iss": "catalog",
        "aud": "catalog-web"
    });
    let payload = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{header}.{payload}.test-signature")
}

pub(crate) fn memory_tokens() -> (Arc<MemoryStorage>, TokenStore) {
    let storage = Arc::new(MemoryStorage::new());
    let tokens = TokenStore::new(storage.clone());
    (storage, tokens)
}

// Scripted failure, turned into a fresh ApiError on every call.
#[derive(Clone, Debug)]
pub(crate) enum Failure {
    Status(u16, ErrorBody),
    Transport,
}

impl Failure {
    pub(crate) fn text(status: u16, message: &str) -> Self {
        Failure::Status(status, ErrorBody::Text(message.to_string()))
    }

    pub(crate) fn json(status: u16, body: Value) -> Self {
        Failure::Status(status, ErrorBody::Json(body))
    }

    fn to_error(&self) -> ApiError {
        match self {
            Failure::Status(status, body) => ApiError::Status {
                status: *status,
                body: body.clone(),
            },
            Failure::Transport => ApiError::Transport("connection refused".into()),
        }
    }
}

#[derive(Clone)]
pub(crate) struct FakeAuthApi {
    pub login: Result<LoginResponse, Failure>,
    pub register: Result<Value, Failure>,
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl FakeAuthApi {
    pub(crate) fn issuing(token: impl Into<String>) -> Self {
        Self {
            login: Ok(LoginResponse {
                token: Some(token.into()),
            }),
            register: Ok(json!({ "id": "1" })),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn failing_login(failure: Failure) -> Self {
        Self {
            login: Err(failure),
            ..Self::issuing("unused")
        }
    }

    pub(crate) fn recorded_calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls mutex poisoned").clone()
    }
}

#[async_trait]
impl AuthApi for FakeAuthApi {
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, ApiError> {
        self.calls
            .lock()
            .expect("calls mutex poisoned")
            .push(format!("login:{}", credentials.username));
        self.login.clone().map_err(|failure| failure.to_error())
    }

    async fn register(&self, credentials: &Credentials) -> Result<Value, ApiError> {
        self.calls
            .lock()
            .expect("calls mutex poisoned")
            .push(format!("register:{}", credentials.username));
        self.register.clone().map_err(|failure| failure.to_error())
    }
}

#[derive(Clone)]
pub(crate) struct FakeBookApi {
    books: Arc<Mutex<Vec<Book>>>,
    failure: Option<Failure>,
}

impl FakeBookApi {
    pub(crate) fn with_books(books: Vec<Book>) -> Self {
        Self {
            books: Arc::new(Mutex::new(books)),
            failure: None,
        }
    }

    pub(crate) fn failing(failure: Failure) -> Self {
        Self {
            books: Arc::new(Mutex::new(Vec::new())),
            failure: Some(failure),
        }
    }

    pub(crate) fn stored(&self) -> Vec<Book> {
        self.books.lock().expect("books mutex poisoned").clone()
    }

    fn check(&self) -> Result<(), ApiError> {
        match &self.failure {
            Some(failure) => Err(failure.to_error()),
            None => Ok(()),
        }
    }

    fn not_found() -> ApiError {
        ApiError::Status {
            status: 404,
            body: ErrorBody::Empty,
        }
    }
}

pub(crate) fn sample_book(id: &str, title: &str, author: &str, genre: &str) -> Book {
    Book {
        id: id.to_string(),
        title: title.to_string(),
        author: author.to_string(),
        published_year: 1965,
        genre: genre.to_string(),
    }
}

#[async_trait]
impl BookApi for FakeBookApi {
    async fn list(&self) -> Result<Vec<Book>, ApiError> {
        self.check()?;
        Ok(self.stored())
    }

    async fn get(&self, id: &str) -> Result<Book, ApiError> {
        self.check()?;
        self.stored()
            .into_iter()
            .find(|book| book.id == id)
            .ok_or_else(Self::not_found)
    }

    async fn create(&self, book: &NewBook) -> Result<Book, ApiError> {
        self.check()?;
        let mut books = self.books.lock().expect("books mutex poisoned");
        let created = Book {
            id: (books.len() + 1).to_string(),
            title: book.title.clone(),
            author: book.author.clone(),
            published_year: book.published_year,
            genre: book.genre.clone(),
        };
        books.push(created.clone());
        Ok(created)
    }

    async fn update(&self, id: &str, patch: &BookPatch) -> Result<Book, ApiError> {
        self.check()?;
        let mut books = self.books.lock().expect("books mutex poisoned");
        let book = books
            .iter_mut()
            .find(|book| book.id == id)
            .ok_or_else(Self::not_found)?;
        if let Some(title) = &patch.title {
            book.title = title.clone();
        }
        if let Some(author) = &patch.author {
            book.author = author.clone();
        }
        if let Some(year) = patch.published_year {
            book.published_year = year;
        }
        if let Some(genre) = &patch.genre {
            book.genre = genre.clone();
        }
        Ok(book.clone())
    }

    async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.check()?;
        let mut books = self.books.lock().expect("books mutex poisoned");
        let before = books.len();
        books.retain(|book| book.id != id);
        if books.len() == before {
            return Err(Self::not_found());
        }
        Ok(())
    }
}
