pub mod domain;
pub mod frameworks;
pub mod interface_adapters;
pub mod use_cases;

pub use frameworks::app::{dispatch, run};
pub use interface_adapters::cli::{CliError, Command};
pub use interface_adapters::state::AppState;
