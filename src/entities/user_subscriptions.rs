use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

/// Local mirror of one PayPal subscription, keyed by `paypal_subscription_id`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "user_subscriptions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: Uuid,
    pub plan_id: Option<String>,
    #[sea_orm(unique)]
    pub paypal_subscription_id: String,
    pub status: String,
    pub started_at: Option<DateTime<Utc>>,
    /// PayPal `update_time` of the stored snapshot.
    pub remote_updated_at: Option<DateTime<Utc>>,
    pub raw: Option<Json>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
