//! MailChats Core - campaign engine and supporting services
//!
//! This crate provides the campaign sending engine, mail merge, the
//! WebSocket progress hub, DeepSeek AI helpers, email verification codes,
//! the theme store and license key login.

pub mod ai;
pub mod license;
pub mod merge;
pub mod progress;
pub mod sender;
pub mod theme;
pub mod verification;

pub use ai::DeepSeekClient;
pub use license::{LicenseResponse, LicenseVerifier};
pub use merge::MergeMode;
pub use progress::{LogType, ProgressEvent, ProgressHub, StatusUpdate};
pub use sender::{CampaignEngine, CampaignJob, Dispatcher, SendSettings, TestEmailRequest};
pub use theme::{ThemeConfig, ThemeStore};
pub use verification::{CodeMailer, SmtpCodeMailer, VerificationService};
