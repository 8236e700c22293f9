use serde::Deserialize;

use crate::domain::Book;

// Envelope returned by `GET /books/get-all-books`.
#[derive(Debug, Deserialize)]
pub struct BooksEnvelope {
    pub books: Vec<Book>,
}

// Endpoint paths relative to the API base url.
pub const LOGIN_PATH: [&str; 2] = ["auth", "login"];
pub const REGISTER_PATH: [&str; 2] = ["auth", "register"];
pub const LIST_BOOKS_PATH: [&str; 2] = ["books", "get-all-books"];
pub const ADD_BOOK_PATH: [&str; 2] = ["books", "add-book"];
pub const BOOKS_SEGMENT: &str = "books";
