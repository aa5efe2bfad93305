use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum SubscriptionPlans {
    Table,
    Id,
    Name,
    PaypalPlanId,
    IsActive,
    CreatedAt,
}

#[derive(DeriveIden)]
enum UserSubscriptions {
    Table,
    Id,
    UserId,
    PlanId,
    PaypalSubscriptionId,
    Status,
    StartedAt,
    RemoteUpdatedAt,
    Raw,
    CreatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SubscriptionPlans::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SubscriptionPlans::Id)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SubscriptionPlans::Name).string_len(255).null())
                    .col(
                        ColumnDef::new(SubscriptionPlans::PaypalPlanId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SubscriptionPlans::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(SubscriptionPlans::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::cust("NOW()"))
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_subscription_plans_paypal_plan_id")
                    .table(SubscriptionPlans::Table)
                    .col(SubscriptionPlans::PaypalPlanId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UserSubscriptions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserSubscriptions::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(UserSubscriptions::UserId).uuid().not_null())
                    .col(ColumnDef::new(UserSubscriptions::PlanId).string_len(64).null())
                    .col(
                        ColumnDef::new(UserSubscriptions::PaypalSubscriptionId)
                            .string_len(64)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(UserSubscriptions::Status)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserSubscriptions::StartedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(UserSubscriptions::RemoteUpdatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(UserSubscriptions::Raw).json_binary().null())
                    .col(
                        ColumnDef::new(UserSubscriptions::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::cust("NOW()"))
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_user_subscriptions_user")
                    .table(UserSubscriptions::Table)
                    .col(UserSubscriptions::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .if_exists()
                    .table(UserSubscriptions::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .if_exists()
                    .table(SubscriptionPlans::Table)
                    .to_owned(),
            )
            .await?;
        Ok(())
    }
}
