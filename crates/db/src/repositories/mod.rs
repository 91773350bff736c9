//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that accept
//! `&PgPool` as the first argument. Operations that touch several tables run
//! inside a single transaction.

pub mod api_key_repo;
pub mod audit_repo;
pub mod match_repo;
pub mod message_repo;
pub mod notification_repo;
pub mod payment_repo;
pub mod photo_repo;
pub mod processing_job_repo;
pub mod profile_repo;
pub mod role_repo;
pub mod session_repo;
pub mod subscription_repo;
pub mod swipe_repo;
pub mod user_repo;

pub use api_key_repo::ApiKeyRepo;
pub use audit_repo::AuditRepo;
pub use match_repo::MatchRepo;
pub use message_repo::MessageRepo;
pub use notification_repo::NotificationRepo;
pub use payment_repo::PaymentRepo;
pub use photo_repo::PhotoRepo;
pub use processing_job_repo::ProcessingJobRepo;
pub use profile_repo::ProfileRepo;
pub use role_repo::RoleRepo;
pub use session_repo::SessionRepo;
pub use subscription_repo::SubscriptionRepo;
pub use swipe_repo::SwipeRepo;
pub use user_repo::UserRepo;
