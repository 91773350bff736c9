use kindred_api::server;
use kindred_api::service::Service;

#[tokio::main]
async fn main() {
    if let Err(e) = server::run(Service::Search).await {
        tracing::error!(error = ?e, "search service exited with an error");
        eprintln!("kindred-search: {e:#}");
        std::process::exit(1);
    }
}
