use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    catalog_client::run().await
}
