// Shared fake catalog backend for integration tests.
#![allow(dead_code)]

use std::{
    collections::HashMap,
    // `Arc` shares data between threads; `OnceLock` writes a value only once.
    sync::{Arc, Mutex, OnceLock},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use catalog_client::AppState;
use catalog_client::domain::claims::{CLAIM_NAME, CLAIM_NAME_ID};
use catalog_client::domain::{Book, BookPatch, NewBook, decode_token};
use catalog_client::interface_adapters::storage::MemoryStorage;
use serde_json::{Value, json};

// Tokens the fake backend accepts carry this signature segment.
pub const SIGNATURE: &str = "fake-backend-signature";
pub const PASSWORD: &str = "Secret#123";

// Global base URL used by all tests after the backend publishes its bound address.
static BACKEND_URL: OnceLock<String> = OnceLock::new();
// One-time guard that ensures the backend bootstrap path runs only once.
static BACKEND_READY: OnceLock<()> = OnceLock::new();

#[derive(Default)]
struct Backend {
    // username -> (user id, password)
    users: Mutex<HashMap<String, (String, String)>>,
    books: Mutex<Vec<Book>>,
}

type Shared = Arc<Backend>;

// Ensure the fake backend is running and return the API base URL.
pub fn ensure_backend() -> &'static str {
    BACKEND_READY.get_or_init(|| {
        // Local one-time slot where the backend thread publishes its selected URL.
        let published_url = Arc::new(OnceLock::<String>::new());
        let published_url_thread = Arc::clone(&published_url);
        // Spawn an OS thread so the backend outlives individual `#[tokio::test]` runtimes.
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().expect("test runtime");
            runtime.block_on(async move {
                // Bind to an ephemeral port to avoid collisions with local services.
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                    .await
                    .expect("bind ephemeral test port");
                let addr = listener.local_addr().expect("get local addr");
                let _ = published_url_thread.set(format!("http://{addr}"));
                axum::serve(listener, router())
                    .await
                    .expect("fake backend failed");
            });
        });
        wait_for_backend(published_url);
    });

    BACKEND_URL
        .get()
        .expect("backend url should be initialized")
        .as_str()
}

// Wait for URL publication and then for the socket to accept TCP connections.
fn wait_for_backend(published_url: Arc<OnceLock<String>>) {
    let origin = loop {
        if let Some(url) = published_url.get() {
            break url.clone();
        }
        std::thread::sleep(Duration::from_millis(10));
    };

    let _ = BACKEND_URL.set(format!("{origin}/api"));

    let addr = origin
        .strip_prefix("http://")
        .expect("origin should use http://");
    for _ in 0..100 {
        if std::net::TcpStream::connect(addr).is_ok() {
            return;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    panic!("fake backend did not become ready in time");
}

fn router() -> Router {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/register", post(register))
        .route("/api/books/get-all-books", get(list_books))
        .route("/api/books/add-book", post(add_book))
        .route(
            "/api/books/{id}",
            get(get_book).put(update_book).delete(delete_book),
        )
        .with_state(Arc::new(Backend::default()))
}

pub fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock after epoch")
        .as_secs()
}

// Token in the backend's format, signed with the fake signature.
pub fn token_for(user_id: &str, username: &str, exp: u64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(
        json!({
            CLAIM_NAME_ID: user_id,
            CLAIM_NAME: username,
            "exp": exp,
            "iss": "fake-backend",
            "aud": "catalog"
        })
        .to_string(),
    );
    format!("{header}.{payload}.{SIGNATURE}")
}

pub fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", uuid::Uuid::new_v4().simple())
}

// Client state over in-memory storage, pointed at `base_url`.
pub fn memory_state(base_url: &str) -> (Arc<MemoryStorage>, AppState) {
    let storage = Arc::new(MemoryStorage::new());
    let state = AppState::build(base_url, storage.clone()).expect("client state should build");
    (storage, state)
}

// Base URL of a port nothing listens on.
pub fn unreachable_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind unused port");
    let addr = listener.local_addr().expect("unused port addr");
    drop(listener);
    format!("http://{addr}/api")
}

// Registers a fresh account and returns its username.
pub async fn registered_user(state: &AppState) -> String {
    let username = unique("reader");
    state
        .session
        .register(&username, PASSWORD)
        .await
        .expect("registration should succeed");
    username
}

// Registers a fresh account and logs the state in with it.
pub async fn logged_in(state: &AppState) -> String {
    let username = registered_user(state).await;
    assert!(
        state.session.login(&username, PASSWORD).await,
        "login should succeed"
    );
    username
}

fn field<'a>(body: &'a Value, name: &str) -> &'a str {
    body.get(name).and_then(Value::as_str).unwrap_or_default()
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
}

fn authorize(headers: &HeaderMap) -> Result<(), Response> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));
    let Some(token) = token else {
        return Err(unauthorized());
    };
    if !token.ends_with(SIGNATURE) {
        return Err(unauthorized());
    }
    match decode_token(token) {
        Ok(claims) if !claims.is_expired(now()) => Ok(()),
        _ => Err(unauthorized()),
    }
}

async fn login(State(backend): State<Shared>, Json(body): Json<Value>) -> Response {
    let username = field(&body, "username");
    let password = field(&body, "password");
    let users = backend.users.lock().expect("users lock");

    match users.get(username) {
        Some((id, stored)) if stored == password => {
            Json(json!({ "token": token_for(id, username, now() + 3600) })).into_response()
        }
        _ => (StatusCode::UNAUTHORIZED, "Invalid username or password").into_response(),
    }
}

async fn register(State(backend): State<Shared>, Json(body): Json<Value>) -> Response {
    let username = field(&body, "username").to_string();
    let password = field(&body, "password").to_string();

    if password == "password" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "title": "One or more validation errors occurred.",
                "errors": { "Password": ["Password is too common", "Password is weak"] }
            })),
        )
            .into_response();
    }

    let mut users = backend.users.lock().expect("users lock");
    if users.contains_key(&username) {
        return (StatusCode::BAD_REQUEST, "Username already exists").into_response();
    }
    let id = uuid::Uuid::new_v4().to_string();
    users.insert(username.clone(), (id.clone(), password));
    (
        StatusCode::CREATED,
        Json(json!({ "id": id, "username": username })),
    )
        .into_response()
}

async fn list_books(State(backend): State<Shared>, headers: HeaderMap) -> Response {
    if let Err(rejected) = authorize(&headers) {
        return rejected;
    }
    let books = backend.books.lock().expect("books lock").clone();
    Json(json!({ "books": books })).into_response()
}

async fn get_book(
    State(backend): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Err(rejected) = authorize(&headers) {
        return rejected;
    }
    let books = backend.books.lock().expect("books lock");
    match books.iter().find(|book| book.id == id) {
        Some(book) => Json(book.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn add_book(
    State(backend): State<Shared>,
    headers: HeaderMap,
    Json(book): Json<NewBook>,
) -> Response {
    if let Err(rejected) = authorize(&headers) {
        return rejected;
    }
    if book.title.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": "Title is required" })),
        )
            .into_response();
    }

    let mut books = backend.books.lock().expect("books lock");
    if books.iter().any(|existing| existing.title == book.title) {
        return (StatusCode::BAD_REQUEST, Json("Title already exists")).into_response();
    }
    let created = Book {
        id: uuid::Uuid::new_v4().to_string(),
        title: book.title,
        author: book.author,
        published_year: book.published_year,
        genre: book.genre,
    };
    books.push(created.clone());
    (StatusCode::CREATED, Json(created)).into_response()
}

async fn update_book(
    State(backend): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(patch): Json<BookPatch>,
) -> Response {
    if let Err(rejected) = authorize(&headers) {
        return rejected;
    }
    if patch.title.as_deref() == Some("") {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": "Title is required" })),
        )
            .into_response();
    }
    let mut books = backend.books.lock().expect("books lock");
    let Some(book) = books.iter_mut().find(|book| book.id == id) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if let Some(title) = patch.title {
        book.title = title;
    }
    if let Some(author) = patch.author {
        book.author = author;
    }
    if let Some(year) = patch.published_year {
        book.published_year = year;
    }
    if let Some(genre) = patch.genre {
        book.genre = genre;
    }
    Json(book.clone()).into_response()
}

async fn delete_book(
    State(backend): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Err(rejected) = authorize(&headers) {
        return rejected;
    }
    let mut books = backend.books.lock().expect("books lock");
    let before = books.len();
    books.retain(|book| book.id != id);
    if books.len() == before {
        return StatusCode::NOT_FOUND.into_response();
    }
    StatusCode::NO_CONTENT.into_response()
}
