use messaging_patterns::app;

#[tokio::main]
async fn main() {
    if let Err(e) = app::run().await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
