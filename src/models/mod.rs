pub mod activity;
pub mod prompt;
pub mod user;

pub use activity::{content_type_for, Activity, ActivityType, ActivityView, MediaKind, NewActivity};
pub use prompt::{AssignedPrompt, PromptKind};
pub use user::{Gender, User, UserSummary};
