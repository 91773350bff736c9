use kindred_api::server;
use kindred_api::service::Service;

#[tokio::main]
async fn main() {
    if let Err(e) = server::run(Service::Media).await {
        tracing::error!(error = ?e, "media service exited with an error");
        eprintln!("kindred-media: {e:#}");
        std::process::exit(1);
    }
}
