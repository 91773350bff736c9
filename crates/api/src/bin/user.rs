use kindred_api::server;
use kindred_api::service::Service;

#[tokio::main]
async fn main() {
    if let Err(e) = server::run(Service::User).await {
        tracing::error!(error = ?e, "user service exited with an error");
        eprintln!("kindred-user: {e:#}");
        std::process::exit(1);
    }
}
