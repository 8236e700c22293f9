use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

use crate::domain::{
    ApiError, AuthApi, Book, BookApi, BookPatch, Credentials, LoginResponse, NewBook,
};
use crate::interface_adapters::http::ApiClient;
use crate::interface_adapters::protocol::{
    ADD_BOOK_PATH, BOOKS_SEGMENT, BooksEnvelope, LIST_BOOKS_PATH, LOGIN_PATH, REGISTER_PATH,
};

// Thin wrappers over the shared pipeline, one per backend area.
#[derive(Clone)]
pub struct AuthClient {
    api: ApiClient,
}

impl AuthClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl AuthApi for AuthClient {
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, ApiError> {
        self.api
            .send_json(Method::POST, &LOGIN_PATH, credentials)
            .await?
            .json()
    }

    async fn register(&self, credentials: &Credentials) -> Result<Value, ApiError> {
        self.api
            .send_json(Method::POST, &REGISTER_PATH, credentials)
            .await?
            .value()
    }
}

#[derive(Clone)]
pub struct BookClient {
    api: ApiClient,
}

impl BookClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl BookApi for BookClient {
    async fn list(&self) -> Result<Vec<Book>, ApiError> {
        let envelope: BooksEnvelope = self.api.get_json(&LIST_BOOKS_PATH).await?;
        Ok(envelope.books)
    }

    async fn get(&self, id: &str) -> Result<Book, ApiError> {
        self.api.get_json(&[BOOKS_SEGMENT, id]).await
    }

    async fn create(&self, book: &NewBook) -> Result<Book, ApiError> {
        self.api
            .send_json(Method::POST, &ADD_BOOK_PATH, book)
            .await?
            .json()
    }

    async fn update(&self, id: &str, patch: &BookPatch) -> Result<Book, ApiError> {
        self.api
            .send_json(Method::PUT, &[BOOKS_SEGMENT, id], patch)
            .await?
            .json()
    }

    async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.api.delete(&[BOOKS_SEGMENT, id]).await
    }
}
