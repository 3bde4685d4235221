#[tokio::main]
async fn main() {
    if let Err(e) = app_sync::run().await {
        eprintln!("app-sync: {}", e);
        std::process::exit(1);
    }
}
