use kindred_api::server;
use kindred_api::service::Service;

#[tokio::main]
async fn main() {
    if let Err(e) = server::run(Service::Match).await {
        tracing::error!(error = ?e, "match service exited with an error");
        eprintln!("kindred-match: {e:#}");
        std::process::exit(1);
    }
}
