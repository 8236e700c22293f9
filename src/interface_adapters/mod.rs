// Interface adapters: storage backends, HTTP pipeline, backend clients and the CLI.

pub mod cli;
pub mod clients;
pub mod http;
pub mod protocol;
pub mod state;
pub mod storage;
