// HTTP middleware
pub mod operator_auth;

pub use operator_auth::*;
