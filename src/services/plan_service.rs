use crate::entities::subscription_plan_entity as sp;
use crate::error::AppResult;
use async_trait::async_trait;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};

pub type Plan = sp::Model;

/// Lookup of local plans and their PayPal counterparts.
#[async_trait]
pub trait PlanRegistry: Send + Sync {
    /// Local plan by id, only if it is active. Used when creating.
    async fn find_active_plan(&self, plan_id: &str) -> AppResult<Option<Plan>>;

    /// Local plan for a PayPal plan id, active or not. Used when syncing.
    async fn find_plan_by_paypal_id(&self, paypal_plan_id: &str) -> AppResult<Option<Plan>>;
}

#[derive(Clone)]
pub struct PlanService {
    pool: DatabaseConnection,
}

impl PlanService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlanRegistry for PlanService {
    async fn find_active_plan(&self, plan_id: &str) -> AppResult<Option<Plan>> {
        let plan = sp::Entity::find_by_id(plan_id.to_string())
            .filter(sp::Column::IsActive.eq(true))
            .one(&self.pool)
            .await?;
        Ok(plan)
    }

    async fn find_plan_by_paypal_id(&self, paypal_plan_id: &str) -> AppResult<Option<Plan>> {
        // several local plans may point at one PayPal plan; prefer an active one
        let plan = sp::Entity::find()
            .filter(sp::Column::PaypalPlanId.eq(paypal_plan_id))
            .order_by_desc(sp::Column::IsActive)
            .order_by_asc(sp::Column::Id)
            .one(&self.pool)
            .await?;
        Ok(plan)
    }
}
