#[tokio::main]
async fn main() {
    if let Err(error) = roleplay_bot::cli::run_cli_process().await {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}
