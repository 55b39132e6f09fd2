use issue_chat_cli::run_cli;
use tracing::error;

#[tokio::main]
async fn main() {
    if let Err(e) = run_cli().await {
        error!(error = %e, "Command failed");
        eprintln!("error: {}", e);
        std::process::exit(e.exit_code());
    }
}
