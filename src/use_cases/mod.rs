pub mod books;
pub mod browse;
pub mod session;
pub mod subscription;

#[cfg(test)]
pub(crate) mod test_support;

pub use books::BookService;
pub use browse::{BookQuery, DEFAULT_PAGE_SIZE, PAGE_SIZES, Page, paginate};
pub use session::SessionManager;
pub use subscription::Subscription;
