use survey_hooks_cli::run_cli;
use tracing::error;

#[tokio::main]
async fn main() {
    if let Err(e) = run_cli().await {
        error!(exit_code = e.exit_code(), "CLI error: {}", e);
        eprintln!("Error: {}", e.operator_message());

        std::process::exit(e.exit_code());
    }
}
