use kindred_api::server;
use kindred_api::service::Service;

#[tokio::main]
async fn main() {
    if let Err(e) = server::run(Service::Notification).await {
        tracing::error!(error = ?e, "notification service exited with an error");
        eprintln!("kindred-notification: {e:#}");
        std::process::exit(1);
    }
}
