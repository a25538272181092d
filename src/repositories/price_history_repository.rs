use crate::config::DatabaseConfig;
use crate::database::{create_pool, run_migrations};
use crate::error::{AppError, AppResult, RepositoryError};
use crate::models::{JournalStats, PriceAction, PriceRecord, PriceUpdate, StrategyCount, TIMESTAMP_FORMAT};
use crate::providers::PriceWriter;
use chrono::{NaiveDate, NaiveDateTime, TimeDelta, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::time::Duration as StdDuration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

const SELECT_COLUMNS: &str = "id, item_id, vendor_code, title, old_price, old_discount, \
    new_price, new_discount, strategy_name, reason, applied, rolled_back, created_at";

/// Raw journal row; money and time columns are stored as text
#[derive(Debug, FromRow)]
struct PriceHistoryRow {
    id: i64,
    item_id: i64,
    vendor_code: String,
    title: String,
    old_price: String,
    old_discount: i64,
    new_price: String,
    new_discount: i64,
    strategy_name: String,
    reason: String,
    applied: i64,
    rolled_back: i64,
    created_at: String,
}

impl TryFrom<PriceHistoryRow> for PriceRecord {
    type Error = RepositoryError;

    fn try_from(row: PriceHistoryRow) -> Result<Self, Self::Error> {
        let corrupt = |reason: String| RepositoryError::Corrupt { id: row.id, reason };

        let old_price = Decimal::from_str(&row.old_price)
            .map_err(|e| corrupt(format!("old_price '{}': {}", row.old_price, e)))?;
        let new_price = Decimal::from_str(&row.new_price)
            .map_err(|e| corrupt(format!("new_price '{}': {}", row.new_price, e)))?;
        let created_at = NaiveDateTime::parse_from_str(&row.created_at, TIMESTAMP_FORMAT)
            .map_err(|e| corrupt(format!("created_at '{}': {}", row.created_at, e)))?;
        let old_discount = i32::try_from(row.old_discount)
            .map_err(|_| corrupt(format!("old_discount {} out of range", row.old_discount)))?;
        let new_discount = i32::try_from(row.new_discount)
            .map_err(|_| corrupt(format!("new_discount {} out of range", row.new_discount)))?;

        Ok(PriceRecord {
            id: row.id,
            item_id: row.item_id,
            vendor_code: row.vendor_code,
            title: row.title,
            old_price,
            old_discount,
            new_price,
            new_discount,
            strategy_name: row.strategy_name,
            reason: row.reason,
            applied: row.applied != 0,
            rolled_back: row.rolled_back != 0,
            created_at,
        })
    }
}

fn format_timestamp(at: NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

/// `now()` minus a window, rejecting windows the calendar cannot hold
fn cutoff(span: Option<TimeDelta>, unit: &str, amount: i64) -> Result<NaiveDateTime, RepositoryError> {
    span.and_then(|span| now().checked_sub_signed(span))
        .ok_or_else(|| RepositoryError::InvalidInput(format!("{} out of range, got {}", unit, amount)))
}

fn rows_to_records(rows: Vec<PriceHistoryRow>) -> Result<Vec<PriceRecord>, RepositoryError> {
    rows.into_iter().map(PriceRecord::try_from).collect()
}

fn check_limit(limit: i64) -> Result<(), RepositoryError> {
    if limit <= 0 {
        return Err(RepositoryError::InvalidInput(format!(
            "limit must be positive, got {}",
            limit
        )));
    }
    Ok(())
}

/// Append-only journal of price changes with rollback support
///
/// Every mutating call takes the same write lock, so finding the last
/// applied record and marking it rolled back cannot interleave with another
/// insert or rollback.
pub struct PriceHistoryRepository {
    pool: SqlitePool,
    write_lock: Mutex<()>,
    write_timeout: StdDuration,
}

impl PriceHistoryRepository {
    /// Create a new PriceHistoryRepository over a migrated pool
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            write_lock: Mutex::new(()),
            write_timeout: StdDuration::from_secs(30),
        }
    }

    /// Open the configured database and apply migrations
    pub async fn open(config: &DatabaseConfig) -> AppResult<Self> {
        let pool = create_pool(config).await?;
        run_migrations(&pool).await?;
        Ok(Self::new(pool))
    }

    /// Bound each rollback submission to the price writer
    pub fn with_write_timeout(mut self, timeout: StdDuration) -> Self {
        self.write_timeout = timeout;
        self
    }

    async fn insert<'e, E>(executor: E, action: &PriceAction, created_at: NaiveDateTime) -> Result<i64, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            r#"
            INSERT INTO price_history
                (item_id, vendor_code, title,
                 old_price, old_discount, new_price, new_discount,
                 strategy_name, reason, applied, rolled_back, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?)
            "#,
        )
        .bind(action.item_id)
        .bind(&action.vendor_code)
        .bind(&action.title)
        .bind(action.old_price.to_string())
        .bind(action.old_discount)
        .bind(action.new_price.to_string())
        .bind(action.new_discount)
        .bind(&action.strategy_name)
        .bind(&action.reason)
        .bind(i64::from(action.applied))
        .bind(format_timestamp(created_at))
        .execute(executor)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Append one action, timestamped now; returns the new record id
    pub async fn record(&self, action: &PriceAction) -> AppResult<i64> {
        self.record_at(action, now()).await
    }

    /// Append one action with an explicit creation time
    pub async fn record_at(&self, action: &PriceAction, created_at: NaiveDateTime) -> AppResult<i64> {
        let _guard = self.write_lock.lock().await;
        let id = Self::insert(&self.pool, action, created_at).await?;

        debug!(
            "price_history: recorded id={} item={} {} -> {} (discount {}%)",
            id, action.item_id, action.vendor_code, action.new_price, action.new_discount
        );
        Ok(id)
    }

    /// Append a run's actions in one transaction, preserving their order
    pub async fn record_many(&self, actions: &[PriceAction]) -> AppResult<usize> {
        if actions.is_empty() {
            return Ok(0);
        }

        let _guard = self.write_lock.lock().await;
        let created_at = now();
        let mut tx = self.pool.begin().await?;
        for action in actions {
            Self::insert(&mut *tx, action, created_at).await?;
        }
        tx.commit().await?;

        info!("price_history: recorded {} changes", actions.len());
        Ok(actions.len())
    }

    /// History of one item, newest first
    pub async fn get_by_item(&self, item_id: i64, limit: i64) -> AppResult<Vec<PriceRecord>> {
        check_limit(limit)?;

        let sql = format!(
            "SELECT {} FROM price_history WHERE item_id = ? ORDER BY created_at DESC, id DESC LIMIT ?",
            SELECT_COLUMNS
        );
        let rows = sqlx::query_as::<_, PriceHistoryRow>(&sql)
            .bind(item_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows_to_records(rows)?)
    }

    /// All changes in an optional date range, newest first
    ///
    /// `date_to` is inclusive through the end of that day.
    pub async fn get_all(
        &self,
        date_from: Option<NaiveDate>,
        date_to: Option<NaiveDate>,
        applied_only: bool,
        limit: i64,
    ) -> AppResult<Vec<PriceRecord>> {
        check_limit(limit)?;

        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM price_history WHERE 1 = 1", SELECT_COLUMNS));

        if let Some(from) = date_from {
            query.push(" AND created_at >= ").push_bind(format!("{}T00:00:00", from));
        }
        if let Some(to) = date_to {
            query.push(" AND created_at <= ").push_bind(format!("{}T23:59:59", to));
        }
        if applied_only {
            query.push(" AND applied = 1");
        }
        query.push(" ORDER BY created_at DESC, id DESC LIMIT ").push_bind(limit);

        let rows = query
            .build_query_as::<PriceHistoryRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows_to_records(rows)?)
    }

    /// Newest applied, not rolled back record for the item
    pub async fn get_last_applied(&self, item_id: i64) -> AppResult<Option<PriceRecord>> {
        let sql = format!(
            r#"
            SELECT {} FROM price_history
            WHERE item_id = ? AND applied = 1 AND rolled_back = 0
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
            SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, PriceHistoryRow>(&sql)
            .bind(item_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(PriceRecord::try_from).transpose()?)
    }

    /// Revert the item's last applied change
    ///
    /// Returns `false` when there is nothing to roll back or the writer
    /// rejected the restore; in the latter case the record stays live so the
    /// rollback can be retried.
    pub async fn rollback_last(&self, item_id: i64, writer: &dyn PriceWriter) -> AppResult<bool> {
        let _guard = self.write_lock.lock().await;

        let Some(record) = self.get_last_applied(item_id).await? else {
            warn!("rollback_last: no applied changes for item {}", item_id);
            return Ok(false);
        };

        if !self.restore(&record, writer).await {
            return Ok(false);
        }
        self.mark_rolled_back(record.id).await?;

        info!(
            "rollback_last: item {} {} restored price {} (discount {}%)",
            item_id, record.vendor_code, record.old_price, record.old_discount
        );
        Ok(true)
    }

    /// Revert every item changed in the last `hours`
    ///
    /// Only the newest live record per item is reverted. Items are handled
    /// independently; the map says which ones succeeded.
    pub async fn rollback_since(&self, hours: i64, writer: &dyn PriceWriter) -> AppResult<HashMap<i64, bool>> {
        if hours < 0 {
            return Err(RepositoryError::InvalidInput(format!("hours must not be negative, got {}", hours)).into());
        }
        let since = cutoff(TimeDelta::try_hours(hours), "hours", hours)?;

        let _guard = self.write_lock.lock().await;
        let sql = format!(
            r#"
            SELECT {} FROM price_history
            WHERE applied = 1 AND rolled_back = 0 AND created_at >= ?
            ORDER BY created_at DESC, id DESC
            "#,
            SELECT_COLUMNS
        );
        let rows = sqlx::query_as::<_, PriceHistoryRow>(&sql)
            .bind(format_timestamp(since))
            .fetch_all(&self.pool)
            .await?;

        if rows.is_empty() {
            info!("rollback_since: no changes in the last {}h", hours);
            return Ok(HashMap::new());
        }

        let mut seen = HashSet::new();
        let latest: Vec<PriceRecord> = rows_to_records(rows)?
            .into_iter()
            .filter(|record| seen.insert(record.item_id))
            .collect();

        info!("rollback_since: rolling back {} items from the last {}h", latest.len(), hours);

        let mut results = HashMap::with_capacity(latest.len());
        for record in &latest {
            let restored = self.restore(record, writer).await;
            if restored {
                self.mark_rolled_back(record.id).await?;
                info!("rollback_since: item {} restored price {}", record.item_id, record.old_price);
            }
            results.insert(record.item_id, restored);
        }

        let succeeded = results.values().filter(|ok| **ok).count();
        info!("rollback_since: {} / {} succeeded", succeeded, results.len());
        Ok(results)
    }

    /// Send the record's previous price back through the writer
    async fn restore(&self, record: &PriceRecord, writer: &dyn PriceWriter) -> bool {
        let update = PriceUpdate {
            item_id: record.item_id,
            price: record.old_price,
            discount: record.old_discount,
        };

        match tokio::time::timeout(self.write_timeout, writer.submit_batch(std::slice::from_ref(&update))).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                error!("rollback: failed to restore item {}: {}", record.item_id, e);
                false
            }
            Err(_) => {
                error!(
                    "rollback: failed to restore item {}: {}",
                    record.item_id,
                    AppError::Timeout(self.write_timeout)
                );
                false
            }
        }
    }

    async fn mark_rolled_back(&self, record_id: i64) -> AppResult<()> {
        sqlx::query("UPDATE price_history SET rolled_back = 1 WHERE id = ?")
            .bind(record_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Aggregate counters for operational visibility
    pub async fn stats(&self) -> AppResult<JournalStats> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM price_history")
            .fetch_one(&self.pool)
            .await?;
        let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM price_history WHERE applied = 1")
            .fetch_one(&self.pool)
            .await?;
        let rolled_back: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM price_history WHERE rolled_back = 1")
            .fetch_one(&self.pool)
            .await?;
        let unique_items: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT item_id) FROM price_history")
            .fetch_one(&self.pool)
            .await?;
        let first_at: Option<String> = sqlx::query_scalar("SELECT MIN(created_at) FROM price_history")
            .fetch_one(&self.pool)
            .await?;
        let last_at: Option<String> = sqlx::query_scalar("SELECT MAX(created_at) FROM price_history")
            .fetch_one(&self.pool)
            .await?;
        let by_strategy: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT strategy_name, COUNT(*) AS cnt
            FROM price_history
            GROUP BY strategy_name
            ORDER BY cnt DESC, strategy_name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let parse = |raw: Option<String>| {
            raw.and_then(|s| NaiveDateTime::parse_from_str(&s, TIMESTAMP_FORMAT).ok())
        };

        Ok(JournalStats {
            total,
            applied,
            rolled_back,
            unique_items,
            first_at: parse(first_at),
            last_at: parse(last_at),
            by_strategy: by_strategy
                .into_iter()
                .map(|(strategy_name, count)| StrategyCount { strategy_name, count })
                .collect(),
        })
    }

    /// Delete records older than `days`; returns how many were removed
    pub async fn purge_old(&self, days: i64) -> AppResult<u64> {
        if days < 0 {
            return Err(RepositoryError::InvalidInput(format!("days must not be negative, got {}", days)).into());
        }

        let before = cutoff(TimeDelta::try_days(days), "days", days)?;

        let _guard = self.write_lock.lock().await;
        let deleted = sqlx::query("DELETE FROM price_history WHERE created_at < ?")
            .bind(format_timestamp(before))
            .execute(&self.pool)
            .await?
            .rows_affected();

        info!("purge_old: deleted {} records older than {} days", deleted, days);
        Ok(deleted)
    }
}
