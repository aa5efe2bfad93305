pub mod paypal;
pub mod paypal_auth;

pub use paypal::*;
pub use paypal_auth::*;
