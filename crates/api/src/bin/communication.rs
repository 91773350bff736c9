use kindred_api::server;
use kindred_api::service::Service;

#[tokio::main]
async fn main() {
    if let Err(e) = server::run(Service::Communication).await {
        tracing::error!(error = ?e, "communication service exited with an error");
        eprintln!("kindred-communication: {e:#}");
        std::process::exit(1);
    }
}
