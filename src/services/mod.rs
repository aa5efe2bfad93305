pub mod ledger_service;
pub mod plan_service;
pub mod subscription_sync_service;

pub use ledger_service::*;
pub use plan_service::*;
pub use subscription_sync_service::*;
