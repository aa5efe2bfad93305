pub mod subscription_plans;
pub mod user_subscriptions;

pub use subscription_plans as subscription_plan_entity;
pub use user_subscriptions as user_subscription_entity;
