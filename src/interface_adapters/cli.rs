//! Command line front end over the session manager and book service.
//!
//! Commands that touch books behave like protected pages: they re-derive the
//! session from the stored token first and ask the user to log in when there
//! is none. Forms are validated locally before anything is sent, and every
//! failing field prints its first message.

use std::collections::HashMap;
use std::io::{self, Write};

use thiserror::Error;

use crate::domain::validation::{BookForm, Registration, validate_registration};
use crate::domain::{Book, Clock, GENRES, Rejection, User};
use crate::interface_adapters::state::AppState;
use crate::use_cases::{BookQuery, PAGE_SIZES, Page, paginate};

pub const USAGE: &str = "\
usage: catalog <command> [options]

commands:
  register --username U --password P --confirm P
  login --username U --password P
  logout
  whoami
  list [--search S] [--genre G] [--page N] [--per-page 5|10|25]
  show ID
  add --title T --author A --year Y --genre G
  edit ID [--title T] [--author A] [--year Y] [--genre G]
  delete ID
  genres
  help";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Register(Registration),
    Login { username: String, password: String },
    Logout,
    Whoami,
    List {
        query: BookQuery,
        // One-based, as typed by the user.
        page: usize,
        per_page: Option<usize>,
    },
    Show { id: String },
    Add(BookForm),
    Edit { id: String, form: BookForm },
    Delete { id: String },
    Genres,
    Help,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum UsageError {
    #[error("missing command")]
    MissingCommand,
    #[error("unknown command {0:?}")]
    UnknownCommand(String),
    #[error("{command}: unknown option {flag:?}")]
    UnknownFlag { command: &'static str, flag: String },
    #[error("{command}: option --{flag} needs a value")]
    MissingValue { command: &'static str, flag: &'static str },
    #[error("{command}: missing book id")]
    MissingId { command: &'static str },
    #[error("{command}: unexpected argument {argument:?}")]
    UnexpectedArgument { command: &'static str, argument: String },
    #[error("--{flag} expects a positive number, got {value:?}")]
    InvalidNumber { flag: &'static str, value: String },
    #[error("--per-page must be one of 5, 10 or 25, got {0}")]
    PageSize(usize),
    #[error("edit: nothing to change")]
    NothingToEdit,
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}\n\n{USAGE}")]
    Usage(#[from] UsageError),
    #[error("{0}")]
    Invalid(#[from] crate::domain::validation::ValidationErrors),
    #[error("{0}")]
    Rejected(#[from] Rejection),
    #[error("Please log in to continue.")]
    LoginRequired,
    #[error("Invalid username or password.")]
    LoginFailed,
    #[error("Book {0} not found.")]
    NotFound(String),
    #[error("Error deleting book {0}")]
    DeleteFailed(String),
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

impl Command {
    pub fn parse<I>(args: I) -> Result<Self, UsageError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let Some(name) = args.next() else {
            return Err(UsageError::MissingCommand);
        };
        let rest: Vec<String> = args.collect();

        match name.as_str() {
            "register" => {
                let mut flags = Flags::parse("register", &rest, &["username", "password", "confirm"])?;
                flags.no_positional()?;
                Ok(Command::Register(Registration {
                    username: flags.take("username").unwrap_or_default(),
                    password: flags.take("password").unwrap_or_default(),
                    confirm_password: flags.take("confirm").unwrap_or_default(),
                }))
            }
            "login" => {
                let mut flags = Flags::parse("login", &rest, &["username", "password"])?;
                flags.no_positional()?;
                Ok(Command::Login {
                    username: flags.take("username").unwrap_or_default(),
                    password: flags.take("password").unwrap_or_default(),
                })
            }
            "logout" => bare("logout", &rest, Command::Logout),
            "whoami" => bare("whoami", &rest, Command::Whoami),
            "genres" => bare("genres", &rest, Command::Genres),
            "help" | "--help" | "-h" => Ok(Command::Help),
            "list" => {
                let mut flags = Flags::parse("list", &rest, &["search", "genre", "page", "per-page"])?;
                flags.no_positional()?;
                let page = flags.number("page")?.unwrap_or(1);
                let per_page = flags.number("per-page")?;
                if let Some(size) = per_page
                    && !PAGE_SIZES.contains(&size)
                {
                    return Err(UsageError::PageSize(size));
                }
                Ok(Command::List {
                    query: BookQuery {
                        search: flags.take("search"),
                        genre: flags.take("genre"),
                    },
                    page,
                    per_page,
                })
            }
            "show" => {
                let mut flags = Flags::parse("show", &rest, &[])?;
                Ok(Command::Show { id: flags.id()? })
            }
            "delete" => {
                let mut flags = Flags::parse("delete", &rest, &[])?;
                Ok(Command::Delete { id: flags.id()? })
            }
            "add" => {
                let mut flags = Flags::parse("add", &rest, BOOK_FLAGS)?;
                flags.no_positional()?;
                Ok(Command::Add(flags.book_form()))
            }
            "edit" => {
                let mut flags = Flags::parse("edit", &rest, BOOK_FLAGS)?;
                let id = flags.id()?;
                let form = flags.book_form();
                if form.title.is_none()
                    && form.author.is_none()
                    && form.published_year.is_none()
                    && form.genre.is_none()
                {
                    return Err(UsageError::NothingToEdit);
                }
                Ok(Command::Edit { id, form })
            }
            other => Err(UsageError::UnknownCommand(other.to_string())),
        }
    }
}

const BOOK_FLAGS: &[&str] = &["title", "author", "year", "genre"];

fn bare(command: &'static str, rest: &[String], parsed: Command) -> Result<Command, UsageError> {
    Flags::parse(command, rest, &[])?.no_positional()?;
    Ok(parsed)
}

// `--name value` or `--name=value` options plus positional arguments.
struct Flags {
    command: &'static str,
    values: HashMap<&'static str, String>,
    positional: Vec<String>,
}

impl Flags {
    fn parse(
        command: &'static str,
        args: &[String],
        allowed: &[&'static str],
    ) -> Result<Self, UsageError> {
        let mut values = HashMap::new();
        let mut positional = Vec::new();
        let mut args = args.iter();

        while let Some(arg) = args.next() {
            let Some(option) = arg.strip_prefix("--") else {
                positional.push(arg.clone());
                continue;
            };
            let (name, inline) = match option.split_once('=') {
                Some((name, value)) => (name, Some(value.to_string())),
                None => (option, None),
            };
            let Some(flag) = allowed.iter().copied().find(|allowed| *allowed == name) else {
                return Err(UsageError::UnknownFlag {
                    command,
                    flag: arg.clone(),
                });
            };
            let value = match inline {
                Some(value) => value,
                None => args
                    .next()
                    .cloned()
                    .ok_or(UsageError::MissingValue { command, flag })?,
            };
            values.insert(flag, value);
        }

        Ok(Self {
            command,
            values,
            positional,
        })
    }

    fn take(&mut self, flag: &str) -> Option<String> {
        self.values.remove(flag)
    }

    fn number(&mut self, flag: &'static str) -> Result<Option<usize>, UsageError> {
        let Some(raw) = self.take(flag) else {
            return Ok(None);
        };
        match raw.trim().parse::<usize>() {
            Ok(value) if value > 0 => Ok(Some(value)),
            _ => Err(UsageError::InvalidNumber { flag, value: raw }),
        }
    }

    fn id(&mut self) -> Result<String, UsageError> {
        if self.positional.is_empty() {
            return Err(UsageError::MissingId {
                command: self.command,
            });
        }
        let id = self.positional.remove(0);
        self.no_positional()?;
        Ok(id)
    }

    fn no_positional(&self) -> Result<(), UsageError> {
        match self.positional.first() {
            Some(argument) => Err(UsageError::UnexpectedArgument {
                command: self.command,
                argument: argument.clone(),
            }),
            None => Ok(()),
        }
    }

    fn book_form(&mut self) -> BookForm {
        BookForm {
            title: self.take("title"),
            author: self.take("author"),
            published_year: self.take("year"),
            genre: self.take("genre"),
        }
    }
}

#[tracing::instrument(name = "command", skip_all)]
pub async fn execute<W: Write>(
    state: &AppState,
    command: Command,
    default_page_size: usize,
    out: &mut W,
) -> Result<(), CliError> {
    match command {
        Command::Help => writeln!(out, "{USAGE}")?,
        Command::Genres => {
            for genre in GENRES {
                writeln!(out, "{genre}")?;
            }
        }
        Command::Register(form) => {
            validate_registration(&form)?;
            state.session.register(&form.username, &form.password).await?;
            writeln!(out, "Account created for {}. You can now log in.", form.username)?;
        }
        Command::Login { username, password } => {
            if !state.session.login(&username, &password).await {
                return Err(CliError::LoginFailed);
            }
            let user = current_user(state)?;
            writeln!(out, "Logged in as {}.", user.username)?;
        }
        Command::Logout => {
            state.session.logout();
            writeln!(out, "Logged out.")?;
        }
        Command::Whoami => {
            state.session.check_auth();
            match state.session.session().user {
                Some(user) => writeln!(out, "{} (id {})", user.username, user.id)?,
                None => writeln!(out, "Not logged in.")?,
            }
        }
        Command::List {
            query,
            page,
            per_page,
        } => {
            require_user(state)?;
            let books = query.apply(state.books.list().await);
            let page = paginate(
                books,
                page.saturating_sub(1),
                per_page.unwrap_or(default_page_size),
            );
            render_page(&page, out)?;
        }
        Command::Show { id } => {
            require_user(state)?;
            let book = state
                .books
                .get_by_id(&id)
                .await
                .ok_or(CliError::NotFound(id))?;
            render_book(&book, out)?;
        }
        Command::Add(form) => {
            require_user(state)?;
            let book = form.into_new_book(state.session.clock.current_year())?;
            let created = state.books.create(&book).await?;
            writeln!(out, "Added {:?} (id {}).", created.title, created.id)?;
        }
        Command::Edit { id, form } => {
            require_user(state)?;
            let patch = form.into_patch(state.session.clock.current_year())?;
            let updated = state.books.update(&id, &patch).await?;
            writeln!(out, "Updated {:?} (id {}).", updated.title, updated.id)?;
        }
        Command::Delete { id } => {
            require_user(state)?;
            if !state.books.delete(&id).await {
                return Err(CliError::DeleteFailed(id));
            }
            writeln!(out, "Deleted book {id}.")?;
        }
    }
    Ok(())
}

// Protected commands re-derive the session from storage first.
fn require_user(state: &AppState) -> Result<User, CliError> {
    state.session.check_auth();
    current_user(state)
}

fn current_user(state: &AppState) -> Result<User, CliError> {
    state.session.session().user.ok_or(CliError::LoginRequired)
}

const HEADERS: [&str; 5] = ["ID", "Title", "Author", "Year", "Genre"];

pub fn render_page<W: Write>(page: &Page<Book>, out: &mut W) -> io::Result<()> {
    if page.items.is_empty() {
        return writeln!(out, "No books found.");
    }

    let rows: Vec<[String; 5]> = page
        .items
        .iter()
        .map(|book| {
            [
                book.id.clone(),
                book.title.clone(),
                book.author.clone(),
                book.published_year.to_string(),
                book.genre.clone(),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(|header| header.chars().count());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    write_row(out, &HEADERS, &widths)?;
    let rule: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
    write_row(out, rule.as_slice(), &widths)?;
    for row in &rows {
        write_row(out, row, &widths)?;
    }

    writeln!(
        out,
        "\nPage {} of {} ({} books, {} per page)",
        page.page + 1,
        page.page_count(),
        page.total,
        page.per_page
    )
}

fn write_row<W: Write, S: AsRef<str>>(out: &mut W, cells: &[S], widths: &[usize]) -> io::Result<()> {
    let line: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell.as_ref(), width = *width))
        .collect();
    writeln!(out, "{}", line.join("  ").trim_end())
}

pub fn render_book<W: Write>(book: &Book, out: &mut W) -> io::Result<()> {
    writeln!(out, "Title:  {}", book.title)?;
    writeln!(out, "Author: {}", book.author)?;
    writeln!(out, "Year:   {}", book.published_year)?;
    writeln!(out, "Genre:  {}", book.genre)?;
    writeln!(out, "ID:     {}", book.id)
}
