pub mod base_url;
pub mod jwt;

pub use base_url::*;
pub use jwt::*;
