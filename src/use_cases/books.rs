use crate::domain::{Book, BookApi, BookPatch, NewBook, Rejection};

pub const CREATE_FALLBACK_MESSAGE: &str = "Error creating book";

pub fn update_fallback_message(id: &str) -> String {
    format!("Error updating book {id}")
}

// Book operations on top of the raw endpoints.
// Reads degrade to empty results; writes surface a displayable rejection.
pub struct BookService<B> {
    pub api: B,
}

impl<B> BookService<B>
where
    B: BookApi,
{
    pub fn new(api: B) -> Self {
        Self { api }
    }

    pub async fn list(&self) -> Vec<Book> {
        match self.api.list().await {
            Ok(books) => {
                tracing::debug!(count = books.len(), "fetched books");
                books
            }
            Err(error) => {
                tracing::warn!(%error, "failed to fetch books");
                Vec::new()
            }
        }
    }

    pub async fn get_by_id(&self, id: &str) -> Option<Book> {
        match self.api.get(id).await {
            Ok(book) => Some(book),
            Err(error) => {
                tracing::warn!(%error, book_id = %id, "failed to fetch book");
                None
            }
        }
    }

    #[tracing::instrument(name = "create_book", skip_all, fields(title = %book.title))]
    pub async fn create(&self, book: &NewBook) -> Result<Book, Rejection> {
        match self.api.create(book).await {
            Ok(created) => {
                tracing::info!(book_id = %created.id, "book created");
                Ok(created)
            }
            Err(source) => {
                let rejection = Rejection::from_api(source, CREATE_FALLBACK_MESSAGE);
                tracing::warn!(error = %rejection.source, message = %rejection.message, "create rejected");
                Err(rejection)
            }
        }
    }

    #[tracing::instrument(name = "update_book", skip_all, fields(book_id = %id))]
    pub async fn update(&self, id: &str, patch: &BookPatch) -> Result<Book, Rejection> {
        match self.api.update(id, patch).await {
            Ok(updated) => {
                tracing::info!("book updated");
                Ok(updated)
            }
            Err(source) => {
                let rejection = Rejection::from_api(source, update_fallback_message(id));
                tracing::warn!(error = %rejection.source, message = %rejection.message, "update rejected");
                Err(rejection)
            }
        }
    }

    pub async fn delete(&self, id: &str) -> bool {
        match self.api.delete(id).await {
            Ok(()) => {
                tracing::info!(book_id = %id, "book deleted");
                true
            }
            Err(error) => {
                tracing::warn!(%error, book_id = %id, "failed to delete book");
                false
            }
        }
    }
}
