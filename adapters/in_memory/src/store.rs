//! In-memory implementation of RecordStore

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tidyhub_core::prelude::*;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Configuration for in-memory store
#[derive(Debug, Clone)]
pub struct InMemoryConfig {
    /// Maximum number of rows per table
    pub max_rows_per_table: Option<usize>,
    /// Whether to enable verbose logging
    pub verbose: bool,
}

impl Default for InMemoryConfig {
    fn default() -> Self {
        Self {
            max_rows_per_table: Some(100_000),
            verbose: false,
        }
    }
}

/// Internal storage for a row
#[derive(Debug, Clone)]
struct StoredRecord {
    record: Record,
    /// Insertion sequence, used as the natural order
    seq: u64,
}

#[derive(Debug, Default)]
struct MemoryTables {
    tables: HashMap<Table, HashMap<Uuid, StoredRecord>>,
    next_seq: u64,
}

impl MemoryTables {
    fn table(&self, table: Table) -> Option<&HashMap<Uuid, StoredRecord>> {
        self.tables.get(&table)
    }

    fn insert(&mut self, table: Table, record: Record) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.tables
            .entry(table)
            .or_default()
            .insert(record.id, StoredRecord { record, seq });
    }

    fn contains(&self, table: Table, id: &Uuid) -> bool {
        self.table(table).map_or(false, |rows| rows.contains_key(id))
    }

    /// Rows visible to `scope` that match every filter, in insertion order
    fn matching(&self, scope: &Scope, table: Table, filters: &[Filter]) -> Vec<&StoredRecord> {
        let mut rows: Vec<&StoredRecord> = self
            .table(table)
            .map(|rows| {
                rows.values()
                    .filter(|row| scope.allows(row.record.tenant_id.as_ref()))
                    .filter(|row| filters.iter().all(|f| filter_matches(f, &row.record.data)))
                    .collect()
            })
            .unwrap_or_default();
        rows.sort_by_key(|row| row.seq);
        rows
    }

    fn row_count(&self) -> usize {
        self.tables.values().map(|rows| rows.len()).sum()
    }
}

/// Compare two JSON values the way the database would compare column values.
///
/// Numbers compare numerically and RFC 3339 strings compare as instants.
fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => {
            match (DateTime::parse_from_rfc3339(x), DateTime::parse_from_rfc3339(y)) {
                (Ok(x), Ok(y)) => Some(x.cmp(&y)),
                _ => Some(x.cmp(y)),
            }
        }
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    a == b || compare_values(a, b) == Some(Ordering::Equal)
}

fn filter_matches(filter: &Filter, data: &Value) -> bool {
    let actual = data.get(filter.field()).unwrap_or(&Value::Null);
    match filter {
        Filter::Eq(_, expected) => values_equal(actual, expected),
        Filter::Neq(_, expected) => !values_equal(actual, expected),
        Filter::In(_, options) => options.iter().any(|o| values_equal(actual, o)),
        Filter::Gte(_, bound) => matches!(
            compare_values(actual, bound),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Filter::Lte(_, bound) => matches!(
            compare_values(actual, bound),
            Some(Ordering::Less | Ordering::Equal)
        ),
    }
}

/// In-memory RecordStore implementation
pub struct InMemoryStore {
    tables: Arc<RwLock<MemoryTables>>,
    config: InMemoryConfig,
}

impl InMemoryStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self::new_with_config(InMemoryConfig::default())
    }

    /// Create a new in-memory store with configuration
    pub fn new_with_config(config: InMemoryConfig) -> Self {
        info!("Creating in-memory store with config: {:?}", config);
        Self {
            tables: Arc::new(RwLock::new(MemoryTables::default())),
            config,
        }
    }

    /// Total number of rows across all tables
    pub async fn row_count(&self) -> usize {
        self.tables.read().await.row_count()
    }

    /// Clear all data from the store
    pub async fn clear(&self) {
        let mut tables = self.tables.write().await;
        *tables = MemoryTables::default();
        info!("Cleared in-memory store");
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn insert(&self, scope: &Scope, table: Table, record: Record) -> Result<Record, StoreError> {
        let mut tables = self.tables.write().await;

        if !scope.allows(record.tenant_id.as_ref()) {
            return Err(StoreError::TenantIsolationViolation(format!(
                "Cannot insert {} row for another tenant",
                table
            )));
        }
        if let Some(max_rows) = self.config.max_rows_per_table {
            if tables.table(table).map_or(0, |rows| rows.len()) >= max_rows {
                return Err(StoreError::ConstraintViolation(format!(
                    "Maximum row limit ({}) reached for {}",
                    max_rows, table
                )));
            }
        }
        if tables.contains(table, &record.id) {
            return Err(StoreError::ConstraintViolation(format!(
                "duplicate key value violates unique constraint \"{}_pkey\"",
                table
            )));
        }

        if self.config.verbose {
            debug!("Inserting {} row {}", table, record.id);
        }
        tables.insert(table, record.clone());
        Ok(record)
    }

    async fn get(&self, scope: &Scope, table: Table, id: Uuid) -> Result<Option<Record>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .table(table)
            .and_then(|rows| rows.get(&id))
            .filter(|row| scope.allows(row.record.tenant_id.as_ref()))
            .map(|row| row.record.clone()))
    }

    async fn select(&self, scope: &Scope, table: Table, query: RecordQuery) -> Result<Vec<Record>, StoreError> {
        let tables = self.tables.read().await;
        if self.config.verbose {
            debug!("Selecting from {}: {:?}", table, query);
        }

        let mut rows = tables.matching(scope, table, &query.filters);
        if let Some((field, order)) = &query.order_by {
            // Stable sort keeps insertion order among equal keys
            rows.sort_by(|a, b| {
                let x = a.record.data.get(field).unwrap_or(&Value::Null);
                let y = b.record.data.get(field).unwrap_or(&Value::Null);
                let ordering = compare_values(x, y).unwrap_or(Ordering::Equal);
                match order {
                    Order::Asc => ordering,
                    Order::Desc => ordering.reverse(),
                }
            });
        }

        let offset = query.offset.unwrap_or(0) as usize;
        let limit = query.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        Ok(rows
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|row| row.record.clone())
            .collect())
    }

    async fn update(&self, scope: &Scope, table: Table, id: Uuid, patch: Value) -> Result<Option<Record>, StoreError> {
        let Value::Object(patch) = patch else {
            return Err(StoreError::QueryFailed("Update patch must be a JSON object".to_string()));
        };

        let mut tables = self.tables.write().await;
        let Some(row) = tables
            .tables
            .get_mut(&table)
            .and_then(|rows| rows.get_mut(&id))
            .filter(|row| scope.allows(row.record.tenant_id.as_ref()))
        else {
            return Ok(None);
        };

        if patch.contains_key("id") || patch.contains_key("tenant_id") {
            return Err(StoreError::ConstraintViolation("id and tenant_id are immutable".to_string()));
        }
        if let Value::Object(data) = &mut row.record.data {
            for (key, value) in patch {
                data.insert(key, value);
            }
        }

        if self.config.verbose {
            debug!("Updated {} row {}", table, id);
        }
        Ok(Some(row.record.clone()))
    }

    async fn delete(&self, scope: &Scope, table: Table, id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(rows) = tables.tables.get_mut(&table) else {
            return Ok(false);
        };
        match rows.get(&id) {
            Some(row) if scope.allows(row.record.tenant_id.as_ref()) => {
                rows.remove(&id);
                Ok(true)
            }
            // Row exists but not in this tenant
            _ => Ok(false),
        }
    }

    async fn count(&self, scope: &Scope, table: Table, filters: Vec<Filter>) -> Result<u64, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.matching(scope, table, &filters).len() as u64)
    }

    async fn apply_points(&self, tenant: &TenantId, delta: PointsDelta) -> Result<i64, StoreError> {
        // One write lock covers the balance check, the ledger insert and the
        // balance update
        let mut tables = self.tables.write().await;
        let scope = Scope::Tenant(*tenant);

        let entry_id = delta
            .entry
            .get("id")
            .and_then(|v| v.as_str())
            .and_then(|v| Uuid::parse_str(v).ok())
            .ok_or_else(|| StoreError::QueryFailed("Ledger entry needs an id".to_string()))?;
        if tables.contains(Table::LoyaltyLedger, &entry_id) {
            return Err(StoreError::ConstraintViolation(format!(
                "duplicate ledger entry {}",
                entry_id
            )));
        }

        let account = tables
            .matching(&scope, Table::LoyaltyAccounts, &[Filter::eq("user_id", delta.user_id)])
            .first()
            .map(|row| row.record.clone());
        let mut account = match account {
            Some(account) => account,
            None => Record {
                id: Uuid::new_v4(),
                tenant_id: Some(*tenant),
                data: serde_json::json!({
                    "user_id": delta.user_id,
                    "balance": 0,
                    "lifetime_points": 0,
                    "tier": "bronze",
                }),
            },
        };

        let balance = account.field("balance").and_then(|v| v.as_i64()).unwrap_or(0);
        let new_balance = balance + delta.delta;
        if new_balance < 0 {
            return Err(StoreError::InsufficientBalance {
                balance,
                required: -delta.delta,
            });
        }

        let counts_as_lifetime = delta.delta > 0 && delta.entry.get("reason").and_then(|v| v.as_str()) != Some("refund");
        let lifetime = account.field("lifetime_points").and_then(|v| v.as_i64()).unwrap_or(0)
            + if counts_as_lifetime { delta.delta } else { 0 };

        if let Value::Object(data) = &mut account.data {
            data.insert("id".to_string(), serde_json::json!(account.id));
            data.insert("tenant_id".to_string(), serde_json::json!(tenant));
            data.insert("balance".to_string(), serde_json::json!(new_balance));
            data.insert("lifetime_points".to_string(), serde_json::json!(lifetime));
            data.insert("updated_at".to_string(), serde_json::json!(Utc::now()));
        }

        let ledger = Record {
            id: entry_id,
            tenant_id: Some(*tenant),
            data: delta.entry,
        };

        let existing = tables.contains(Table::LoyaltyAccounts, &account.id);
        if existing {
            if let Some(row) = tables
                .tables
                .get_mut(&Table::LoyaltyAccounts)
                .and_then(|rows| rows.get_mut(&account.id))
            {
                row.record = account;
            }
        } else {
            tables.insert(Table::LoyaltyAccounts, account);
        }
        tables.insert(Table::LoyaltyLedger, ledger);

        debug!("Applied {} points for user {}: balance {}", delta.delta, delta.user_id, new_balance);
        Ok(new_balance)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        let rows = self.row_count().await;
        debug!("In-memory store health check: {} rows", rows);
        Ok(())
    }
}

