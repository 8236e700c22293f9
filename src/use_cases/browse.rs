use crate::domain::Book;

// Page sizes offered by the listing.
pub const PAGE_SIZES: [usize; 3] = [5, 10, 25];
pub const DEFAULT_PAGE_SIZE: usize = 5;

// Client-side filter over an already fetched listing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BookQuery {
    pub search: Option<String>,
    pub genre: Option<String>,
}

impl BookQuery {
    pub fn matches(&self, book: &Book) -> bool {
        self.matches_search(book) && self.matches_genre(book)
    }

    pub fn apply(&self, books: Vec<Book>) -> Vec<Book> {
        books.into_iter().filter(|book| self.matches(book)).collect()
    }

    fn matches_search(&self, book: &Book) -> bool {
        let Some(needle) = non_blank(self.search.as_deref()) else {
            return true;
        };
        let needle = needle.to_lowercase();

        [&book.title, &book.author, &book.genre]
            .into_iter()
            .any(|field| field.to_lowercase().contains(&needle))
    }

    fn matches_genre(&self, book: &Book) -> bool {
        match non_blank(self.genre.as_deref()) {
            Some(genre) => book.genre.to_lowercase() == genre.to_lowercase(),
            None => true,
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    // Zero-based, after clamping.
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
}

impl<T> Page<T> {
    pub fn page_count(&self) -> usize {
        self.total.div_ceil(self.per_page).max(1)
    }
}

pub fn paginate<T>(items: Vec<T>, page: usize, per_page: usize) -> Page<T> {
    let per_page = if per_page == 0 {
        DEFAULT_PAGE_SIZE
    } else {
        per_page
    };
    let total = items.len();
    let last_page = total.div_ceil(per_page).saturating_sub(1);
    let page = page.min(last_page);

    let items = items
        .into_iter()
        .skip(page * per_page)
        .take(per_page)
        .collect();

    Page {
        items,
        page,
        per_page,
        total,
    }
}
