use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    haggle_cli::run().await
}
