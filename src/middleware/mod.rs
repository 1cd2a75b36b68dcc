pub mod csrf;
pub mod security_headers;

pub use csrf::{get_or_create_csrf_token, verify_csrf_token, CsrfToken, CSRF_FIELD, CSRF_TOKEN_KEY};
pub use security_headers::add_security_headers;
