pub mod common;
pub mod subscription;
pub mod webhook;

pub use common::*;
pub use subscription::*;
pub use webhook::*;
