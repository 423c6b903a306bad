//! Repository layer for PostgreSQL data access

pub mod campaigns;
pub mod email_statuses;
pub mod users;

// Re-export concrete repository implementations with simple names
pub use campaigns::DbCampaignRepository as CampaignRepository;
pub use email_statuses::DbEmailStatusRepository as EmailStatusRepository;
pub use users::DbUserRepository as UserRepository;

// Re-export repository traits
pub use campaigns::CampaignRepository as CampaignRepositoryTrait;
pub use email_statuses::EmailStatusRepository as EmailStatusRepositoryTrait;
pub use users::UserRepository as UserRepositoryTrait;
