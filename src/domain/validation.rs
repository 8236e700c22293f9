//! Client-side form rules, checked before anything is submitted.
//!
//! Every rule for a field is evaluated in order and only the first failing
//! message per field is kept, which is what the forms display.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

use crate::domain::entities::{BookPatch, NewBook};

pub const MIN_PUBLISHED_YEAR: i32 = 1000;

static UPPERCASE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Z]").expect("valid regex"));
static LOWERCASE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[a-z]").expect("valid regex"));
static DIGIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9]").expect("valid regex"));
static SPECIAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\W_]").expect("valid regex"));

// Field name plus the first message that field failed with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    // Keeps only the first message reported for a field.
    fn add(&mut self, field: &'static str, message: impl Into<String>) {
        if self.get(field).is_none() {
            self.errors.push(FieldError {
                field,
                message: message.into(),
            });
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|error| error.field == field)
            .map(|error| error.message.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.iter()
    }

    fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, error) in self.errors.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            write!(f, "{}: {}", error.field, error.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

// Registration form input, including the confirmation field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Registration {
    pub username: String,
    pub password: String,
    pub confirm_password: String,
}

pub fn parse_published_year(raw: &str) -> Result<i32, String> {
    raw.trim()
        .parse::<i32>()
        .map_err(|_| "Published year must be an integer".to_string())
}

// Raw text of the book form. For edits, `None` means the field is left as is.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BookForm {
    pub title: Option<String>,
    pub author: Option<String>,
    pub published_year: Option<String>,
    pub genre: Option<String>,
}

impl BookForm {
    // Missing fields are validated as empty.
    pub fn into_new_book(self, current_year: i32) -> Result<NewBook, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let title = self.title.unwrap_or_default();
        let author = self.author.unwrap_or_default();
        let genre = self.genre.unwrap_or_default();
        let raw_year = self.published_year.unwrap_or_default();

        check_title(&mut errors, &title);
        check_author(&mut errors, &author);
        let published_year = parse_year_field(&mut errors, &raw_year, current_year);
        check_genre(&mut errors, &genre);

        errors.into_result()?;
        Ok(NewBook {
            title,
            author,
            // Always set once no error was recorded.
            published_year: published_year.unwrap_or_default(),
            genre,
        })
    }

    pub fn into_patch(self, current_year: i32) -> Result<BookPatch, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        if let Some(title) = &self.title {
            check_title(&mut errors, title);
        }
        if let Some(author) = &self.author {
            check_author(&mut errors, author);
        }
        let published_year = match self.published_year.as_deref() {
            Some(raw) => parse_year_field(&mut errors, raw, current_year),
            None => None,
        };
        if let Some(genre) = &self.genre {
            check_genre(&mut errors, genre);
        }

        errors.into_result()?;
        Ok(BookPatch {
            title: self.title,
            author: self.author,
            published_year,
            genre: self.genre,
        })
    }
}

fn parse_year_field(errors: &mut ValidationErrors, raw: &str, current_year: i32) -> Option<i32> {
    match parse_published_year(raw) {
        Ok(year) => {
            check_year(errors, year, current_year);
            Some(year)
        }
        Err(message) => {
            errors.add("publishedYear", message);
            None
        }
    }
}

pub fn validate_book(book: &NewBook, current_year: i32) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    check_title(&mut errors, &book.title);
    check_author(&mut errors, &book.author);
    check_year(&mut errors, book.published_year, current_year);
    check_genre(&mut errors, &book.genre);
    errors.into_result()
}

// Only the fields being changed are checked.
pub fn validate_patch(patch: &BookPatch, current_year: i32) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    if let Some(title) = &patch.title {
        check_title(&mut errors, title);
    }
    if let Some(author) = &patch.author {
        check_author(&mut errors, author);
    }
    if let Some(year) = patch.published_year {
        check_year(&mut errors, year, current_year);
    }
    if let Some(genre) = &patch.genre {
        check_genre(&mut errors, genre);
    }
    errors.into_result()
}

pub fn validate_registration(form: &Registration) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();

    let username_len = form.username.chars().count();
    if username_len < 3 {
        errors.add("username", "Username must be at least 3 characters");
    }
    if username_len > 50 {
        errors.add("username", "Username must be less than 50 characters");
    }
    if form.username.is_empty() {
        errors.add("username", "Username is required");
    }

    let password = form.password.as_str();
    if password.chars().count() < 8 {
        errors.add("password", "Password must be at least 8 characters long");
    }
    if !UPPERCASE.is_match(password) {
        errors.add("password", "Password must contain at least one uppercase letter");
    }
    if !LOWERCASE.is_match(password) {
        errors.add("password", "Password must contain at least one lowercase letter");
    }
    if !DIGIT.is_match(password) {
        errors.add("password", "Password must contain at least one digit");
    }
    if !SPECIAL.is_match(password) {
        errors.add("password", "Password must contain at least one special character");
    }
    if password.is_empty() {
        errors.add("password", "Password is required");
    }

    if form.confirm_password.is_empty() {
        errors.add("confirmPassword", "Please confirm your password");
    }
    if form.password != form.confirm_password {
        errors.add("confirmPassword", "Passwords do not match");
    }

    errors.into_result()
}

fn check_title(errors: &mut ValidationErrors, title: &str) {
    if title.is_empty() {
        errors.add("title", "Title is required");
    }
}

fn check_author(errors: &mut ValidationErrors, author: &str) {
    if author.is_empty() {
        errors.add("author", "Author is required");
    }
}

fn check_year(errors: &mut ValidationErrors, year: i32, current_year: i32) {
    if year < MIN_PUBLISHED_YEAR {
        errors.add("publishedYear", "Published year must be at least 1000");
    }
    if year > current_year {
        errors.add("publishedYear", "Published year cannot be in the future");
    }
}

fn check_genre(errors: &mut ValidationErrors, genre: &str) {
    if genre.is_empty() {
        errors.add("genre", "Genre is required");
    }
}
