// Domain layer: catalog entities, token claims, validation rules and ports.

pub mod claims;
pub mod entities;
pub mod errors;
pub mod ports;
pub mod token_store;
pub mod validation;

pub use claims::{Claims, TokenError, decode_token};
pub use entities::{Book, BookPatch, Credentials, GENRES, LoginResponse, NewBook, Session, User};
pub use errors::{ApiError, ErrorBody, Rejection, StorageError};
pub use ports::{AuthApi, AuthEvent, BookApi, Clock, Storage, StorageEvent, StorageOrigin};
pub use token_store::{TOKEN_KEY, TokenStore};
