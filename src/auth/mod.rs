pub mod handlers;
pub mod middleware;

pub use middleware::{require_admin, require_auth, CurrentUser};

pub const SESSION_PHONE: &str = "phone";
pub const SESSION_IS_ADMIN: &str = "is_admin";
pub const SESSION_ASSIGNED_PROMPT: &str = "assigned_prompt";
