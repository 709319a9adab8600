//! Conversion helpers between PostgREST payloads and core types

use crate::queries::{tenant_column, INSUFFICIENT_BALANCE, UNIQUE_VIOLATION};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use tidyhub_core::prelude::*;

/// Error body returned by PostgREST
#[derive(Debug, Default, Deserialize)]
pub struct PostgrestError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BalanceDetails {
    balance: i64,
    required: i64,
}

/// Convert a returned row into a record
pub fn row_to_record(table: Table, row: Value) -> Result<Record, StoreError> {
    let id = row
        .get("id")
        .and_then(|v| v.as_str())
        .and_then(|v| Uuid::parse_str(v).ok())
        .ok_or_else(|| StoreError::QueryFailed(format!("{} row without a valid id", table)))?;
    let tenant_id = row
        .get(tenant_column(table))
        .and_then(|v| v.as_str())
        .and_then(|v| Uuid::parse_str(v).ok())
        .map(TenantId);
    Ok(Record { id, tenant_id, data: row })
}

/// Convert a JSON array response into records
pub fn rows_to_records(table: Table, body: Value) -> Result<Vec<Record>, StoreError> {
    match body {
        Value::Array(rows) => rows.into_iter().map(|row| row_to_record(table, row)).collect(),
        other => Err(StoreError::QueryFailed(format!(
            "Expected an array of {} rows, got {}",
            table, other
        ))),
    }
}

/// Map a failed PostgREST response onto a store error
pub fn map_error(status: StatusCode, body: &str) -> StoreError {
    let parsed: PostgrestError = serde_json::from_str(body).unwrap_or_default();
    let message = parsed.message.clone().unwrap_or_else(|| body.to_string());

    if parsed.message.as_deref() == Some(INSUFFICIENT_BALANCE) {
        if let Some(details) = parsed
            .details
            .as_deref()
            .and_then(|d| serde_json::from_str::<BalanceDetails>(d).ok())
        {
            return StoreError::InsufficientBalance {
                balance: details.balance,
                required: details.required,
            };
        }
    }
    if status == StatusCode::CONFLICT || parsed.code.as_deref() == Some(UNIQUE_VIOLATION) {
        return StoreError::ConstraintViolation(message);
    }

    match status {
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => StoreError::Timeout(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::ConnectionFailed(format!("Credentials rejected: {}", message)),
        s if s.is_server_error() => StoreError::DatabaseError(format!("Database error {}: {}", s, message)),
        s => StoreError::QueryFailed(format!("Query rejected {}: {}", s, message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_row_to_record_reads_owner_column() {
        let tenant = TenantId::new_v4();
        let id = Uuid::new_v4();
        let record = row_to_record(Table::Bookings, json!({"id": id, "tenant_id": tenant, "status": "pending"})).unwrap();
        assert_eq!(record.id, id);
        assert_eq!(record.tenant_id, Some(tenant));

        let tenant_row = row_to_record(Table::Tenants, json!({"id": id, "slug": "sparkle"})).unwrap();
        assert_eq!(tenant_row.tenant_id, Some(TenantId(id)));

        assert!(row_to_record(Table::Bookings, json!({"status": "pending"})).is_err());
    }

    #[test]
    fn test_error_mapping() {
        let duplicate = r#"{"code":"23505","message":"duplicate key value violates unique constraint"}"#;
        assert!(matches!(
            map_error(StatusCode::CONFLICT, duplicate),
            StoreError::ConstraintViolation(_)
        ));

        let short = r#"{"code":"P0001","message":"insufficient_balance","details":"{\"balance\":40,\"required\":100}"}"#;
        assert!(matches!(
            map_error(StatusCode::BAD_REQUEST, short),
            StoreError::InsufficientBalance { balance: 40, required: 100 }
        ));

        assert!(matches!(
            map_error(StatusCode::SERVICE_UNAVAILABLE, "upstream down"),
            StoreError::DatabaseError(_)
        ));
        assert!(matches!(
            map_error(StatusCode::BAD_REQUEST, r#"{"message":"column does not exist"}"#),
            StoreError::QueryFailed(_)
        ));
    }
}
