#[tokio::main]
async fn main() {
    if let Err(e) = health_tech::run().await {
        eprintln!("{} failed: {e}", health_tech::config::APP_NAME);
        std::process::exit(1);
    }
}
