use crate::entities::user_subscription_entity as us;
use crate::error::AppResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde_json::Value;
use uuid::Uuid;

pub type LedgerRow = us::Model;

/// Columns only written when a row is first inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionOwner {
    pub user_id: Uuid,
    pub plan_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerUpsert {
    pub paypal_subscription_id: String,
    /// `None` keeps the stored status.
    pub status: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    /// PayPal `update_time` of `snapshot`.
    pub remote_updated_at: Option<DateTime<Utc>>,
    pub snapshot: Value,
    /// Present only on creation; enables the insert path.
    pub owner: Option<SubscriptionOwner>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerWrite {
    Inserted,
    Updated,
    /// The stored snapshot is newer than the incoming one.
    SkippedStale,
    /// No row for this id and nothing to insert with.
    NoMatchingRow,
}

/// True when `incoming` must not overwrite a row holding `stored`.
pub fn is_stale(stored: Option<DateTime<Utc>>, incoming: Option<DateTime<Utc>>) -> bool {
    matches!((stored, incoming), (Some(s), Some(i)) if i < s)
}

/// Writer for the local subscription ledger, keyed by PayPal subscription id.
#[async_trait]
pub trait SubscriptionLedger: Send + Sync {
    async fn upsert_by_external_id(&self, write: LedgerUpsert) -> AppResult<LedgerWrite>;

    async fn find_by_external_id(&self, paypal_subscription_id: &str)
    -> AppResult<Option<LedgerRow>>;
}

#[derive(Clone)]
pub struct LedgerService {
    pool: DatabaseConnection,
}

impl LedgerService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    /// Conditional update; the marker guard runs inside the UPDATE so that a
    /// concurrent writer with a newer snapshot cannot be overwritten.
    async fn update_existing(&self, write: &LedgerUpsert) -> AppResult<u64> {
        let mut update = us::Entity::update_many()
            .col_expr(us::Column::StartedAt, Expr::value(write.started_at))
            .col_expr(us::Column::Raw, Expr::value(write.snapshot.clone()))
            .filter(us::Column::PaypalSubscriptionId.eq(write.paypal_subscription_id.as_str()));

        if let Some(status) = &write.status {
            update = update.col_expr(us::Column::Status, Expr::value(status.clone()));
        }
        if let Some(marker) = write.remote_updated_at {
            update = update
                .col_expr(us::Column::RemoteUpdatedAt, Expr::value(marker))
                .filter(
                    Condition::any()
                        .add(us::Column::RemoteUpdatedAt.is_null())
                        .add(us::Column::RemoteUpdatedAt.lte(marker)),
                );
        }

        let result = update.exec(&self.pool).await?;
        Ok(result.rows_affected)
    }

    async fn insert_new(&self, write: &LedgerUpsert, owner: &SubscriptionOwner) -> AppResult<()> {
        let row = us::ActiveModel {
            user_id: Set(owner.user_id),
            plan_id: Set(Some(owner.plan_id.clone())),
            paypal_subscription_id: Set(write.paypal_subscription_id.clone()),
            status: Set(write
                .status
                .clone()
                .unwrap_or_else(|| crate::external::STATUS_APPROVAL_PENDING.to_string())),
            started_at: Set(write.started_at),
            remote_updated_at: Set(write.remote_updated_at),
            raw: Set(Some(write.snapshot.clone())),
            created_at: Set(Some(Utc::now())),
            ..Default::default()
        };

        // A concurrent insert for the same id turns into an update.
        us::Entity::insert(row)
            .on_conflict(
                OnConflict::column(us::Column::PaypalSubscriptionId)
                    .update_columns([
                        us::Column::Status,
                        us::Column::StartedAt,
                        us::Column::RemoteUpdatedAt,
                        us::Column::Raw,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl SubscriptionLedger for LedgerService {
    async fn upsert_by_external_id(&self, write: LedgerUpsert) -> AppResult<LedgerWrite> {
        if self.update_existing(&write).await? > 0 {
            return Ok(LedgerWrite::Updated);
        }

        if let Some(existing) = self
            .find_by_external_id(&write.paypal_subscription_id)
            .await?
        {
            if is_stale(existing.remote_updated_at, write.remote_updated_at) {
                log::info!(
                    "Skipped stale snapshot for subscription {}",
                    write.paypal_subscription_id
                );
                return Ok(LedgerWrite::SkippedStale);
            }
            // row appeared between the update and the lookup
            self.update_existing(&write).await?;
            return Ok(LedgerWrite::Updated);
        }

        match &write.owner {
            Some(owner) => {
                self.insert_new(&write, owner).await?;
                Ok(LedgerWrite::Inserted)
            }
            None => Ok(LedgerWrite::NoMatchingRow),
        }
    }

    async fn find_by_external_id(
        &self,
        paypal_subscription_id: &str,
    ) -> AppResult<Option<LedgerRow>> {
        let row = us::Entity::find()
            .filter(us::Column::PaypalSubscriptionId.eq(paypal_subscription_id))
            .one(&self.pool)
            .await?;
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use serde_json::json;

    const SUB_ID: &str = "I-BW452GLLEP1G";

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
    }

    fn stored(marker: Option<DateTime<Utc>>) -> LedgerRow {
        LedgerRow {
            id: 7,
            user_id: Uuid::nil(),
            plan_id: Some("pro-monthly".to_string()),
            paypal_subscription_id: SUB_ID.to_string(),
            status: "ACTIVE".to_string(),
            started_at: Some(at(1)),
            remote_updated_at: marker,
            raw: Some(json!({"id": SUB_ID})),
            created_at: Some(at(1)),
        }
    }

    fn snapshot(marker: Option<DateTime<Utc>>, owner: Option<SubscriptionOwner>) -> LedgerUpsert {
        LedgerUpsert {
            paypal_subscription_id: SUB_ID.to_string(),
            status: Some("CANCELLED".to_string()),
            started_at: Some(at(1)),
            remote_updated_at: marker,
            snapshot: json!({"id": SUB_ID, "status": "CANCELLED"}),
            owner,
        }
    }

    fn affected(rows_affected: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected,
        }
    }

    fn statements(service: LedgerService) -> (usize, String) {
        let log = service.pool.into_transaction_log();
        (log.len(), format!("{log:?}"))
    }

    #[test]
    fn test_stale_only_when_both_markers_present() {
        let older = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let newer = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();

        assert!(is_stale(Some(newer), Some(older)));
        assert!(!is_stale(Some(older), Some(newer)));
        assert!(!is_stale(Some(older), Some(older)));
        assert!(!is_stale(None, Some(older)));
        assert!(!is_stale(Some(newer), None));
        assert!(!is_stale(None, None));
    }

    #[tokio::test]
    async fn test_update_is_guarded_by_marker() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([affected(1)])
            .into_connection();
        let service = LedgerService::new(db);

        let write = service
            .upsert_by_external_id(snapshot(Some(at(2)), None))
            .await
            .unwrap();

        assert_eq!(write, LedgerWrite::Updated);
        let (count, sql) = statements(service);
        assert_eq!(count, 1);
        assert!(sql.contains("UPDATE"), "{sql}");
        assert!(sql.contains("IS NULL OR"), "{sql}");
        assert!(sql.contains("<="), "{sql}");
    }

    #[tokio::test]
    async fn test_update_without_marker_is_unconditional() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([affected(1)])
            .into_connection();
        let service = LedgerService::new(db);

        let write = service
            .upsert_by_external_id(snapshot(None, None))
            .await
            .unwrap();

        assert_eq!(write, LedgerWrite::Updated);
        let (count, sql) = statements(service);
        assert_eq!(count, 1);
        assert!(!sql.contains("IS NULL"), "{sql}");
    }

    #[tokio::test]
    async fn test_older_snapshot_is_skipped() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([affected(0)])
            .append_query_results([vec![stored(Some(at(3)))]])
            .into_connection();
        let service = LedgerService::new(db);

        let write = service
            .upsert_by_external_id(snapshot(Some(at(2)), None))
            .await
            .unwrap();

        assert_eq!(write, LedgerWrite::SkippedStale);
        let (count, sql) = statements(service);
        // guarded UPDATE, then the lookup; no second write
        assert_eq!(count, 2);
        assert!(sql.contains("SELECT"), "{sql}");
        assert!(!sql.contains("INSERT"), "{sql}");
    }

    #[tokio::test]
    async fn test_row_found_after_empty_update_is_rewritten() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([affected(0), affected(1)])
            .append_query_results([vec![stored(Some(at(1)))]])
            .into_connection();
        let service = LedgerService::new(db);

        let write = service
            .upsert_by_external_id(snapshot(Some(at(2)), None))
            .await
            .unwrap();

        assert_eq!(write, LedgerWrite::Updated);
        let (count, sql) = statements(service);
        assert_eq!(count, 3);
        assert!(!sql.contains("INSERT"), "{sql}");
    }

    #[tokio::test]
    async fn test_missing_row_with_owner_is_inserted_on_conflict_update() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([affected(0), affected(1)])
            .append_query_results([Vec::<LedgerRow>::new()])
            .into_connection();
        let service = LedgerService::new(db);
        let owner = SubscriptionOwner {
            user_id: Uuid::nil(),
            plan_id: "pro-monthly".to_string(),
        };

        let write = service
            .upsert_by_external_id(snapshot(None, Some(owner)))
            .await
            .unwrap();

        assert_eq!(write, LedgerWrite::Inserted);
        let (count, sql) = statements(service);
        assert_eq!(count, 3);
        assert!(sql.contains("INSERT INTO"), "{sql}");
        assert!(sql.contains("ON CONFLICT"), "{sql}");
        assert!(sql.contains("DO UPDATE SET"), "{sql}");
    }

    #[tokio::test]
    async fn test_missing_row_without_owner_writes_nothing() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([affected(0)])
            .append_query_results([Vec::<LedgerRow>::new()])
            .into_connection();
        let service = LedgerService::new(db);

        let write = service
            .upsert_by_external_id(snapshot(Some(at(2)), None))
            .await
            .unwrap();

        assert_eq!(write, LedgerWrite::NoMatchingRow);
        let (count, sql) = statements(service);
        assert_eq!(count, 2);
        assert!(!sql.contains("INSERT"), "{sql}");
    }

    #[tokio::test]
    async fn test_find_by_external_id_returns_row() {
        let row = stored(Some(at(1)));
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![row.clone()]])
            .into_connection();
        let service = LedgerService::new(db);

        let found = service.find_by_external_id(SUB_ID).await.unwrap();

        assert_eq!(found, Some(row));
    }
}
