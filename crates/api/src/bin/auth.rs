use kindred_api::server;
use kindred_api::service::Service;

#[tokio::main]
async fn main() {
    if let Err(e) = server::run(Service::Auth).await {
        tracing::error!(error = ?e, "auth service exited with an error");
        eprintln!("kindred-auth: {e:#}");
        std::process::exit(1);
    }
}
