//! PostgREST query-string builders and wire constants

use serde_json::Value;
use tidyhub_core::prelude::*;

/// Header asking PostgREST to echo written rows
pub const PREFER_REPRESENTATION: &str = "return=representation";

/// Header asking PostgREST to report the exact row count in `Content-Range`
pub const PREFER_COUNT: &str = "count=exact";

/// Stored procedure that moves a loyalty balance and writes the ledger row
pub const APPLY_LOYALTY_DELTA: &str = "rpc/apply_loyalty_delta";

/// Postgres error raised by the loyalty procedure when a balance would go negative
pub const INSUFFICIENT_BALANCE: &str = "insufficient_balance";

/// Postgres unique-violation SQLSTATE
pub const UNIQUE_VIOLATION: &str = "23505";

/// Column that carries row ownership for a table
pub fn tenant_column(table: Table) -> &'static str {
    match table {
        Table::Tenants => "id",
        _ => "tenant_id",
    }
}

/// Render a JSON scalar the way PostgREST expects it in a filter
pub fn literal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Quote a list member when it contains PostgREST reserved characters
fn list_member(value: &Value) -> String {
    let raw = literal(value);
    if raw.contains([',', '(', ')', '"', ' ']) {
        format!("\"{}\"", raw.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        raw
    }
}

/// Translate a filter into a `(column, operator.value)` query pair
pub fn filter_param(filter: &Filter) -> (String, String) {
    match filter {
        Filter::Eq(field, Value::Null) => (field.clone(), "is.null".to_string()),
        Filter::Neq(field, Value::Null) => (field.clone(), "not.is.null".to_string()),
        Filter::Eq(field, value) => (field.clone(), format!("eq.{}", literal(value))),
        Filter::Neq(field, value) => (field.clone(), format!("neq.{}", literal(value))),
        Filter::Gte(field, value) => (field.clone(), format!("gte.{}", literal(value))),
        Filter::Lte(field, value) => (field.clone(), format!("lte.{}", literal(value))),
        Filter::In(field, values) => {
            let members: Vec<String> = values.iter().map(list_member).collect();
            (field.clone(), format!("in.({})", members.join(",")))
        }
    }
}

/// Query pairs that pin a request to the caller's tenant
pub fn scope_params(scope: &Scope, table: Table) -> Vec<(String, String)> {
    match scope.tenant() {
        Some(tenant) => vec![(tenant_column(table).to_string(), format!("eq.{}", tenant))],
        None => Vec::new(),
    }
}

/// Full query string for a select
pub fn select_params(scope: &Scope, table: Table, query: &RecordQuery) -> Vec<(String, String)> {
    let mut params = vec![("select".to_string(), "*".to_string())];
    params.extend(scope_params(scope, table));
    params.extend(query.filters.iter().map(filter_param));

    if let Some((field, order)) = &query.order_by {
        let direction = match order {
            Order::Asc => "asc",
            Order::Desc => "desc",
        };
        params.push(("order".to_string(), format!("{}.{}", field, direction)));
    }
    if let Some(limit) = query.limit {
        params.push(("limit".to_string(), limit.to_string()));
    }
    if let Some(offset) = query.offset {
        params.push(("offset".to_string(), offset.to_string()));
    }
    params
}

/// Query pairs addressing a single row by primary key inside a scope
pub fn row_params(scope: &Scope, table: Table, id: Uuid) -> Vec<(String, String)> {
    let mut params = vec![("id".to_string(), format!("eq.{}", id))];
    params.extend(scope_params(scope, table));
    params
}

/// Parse the total from a `Content-Range` header such as `0-24/3573` or `*/0`
pub fn parse_content_range(header: &str) -> Option<u64> {
    header.rsplit_once('/').and_then(|(_, total)| total.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_operators() {
        assert_eq!(
            filter_param(&Filter::eq("status", "pending")),
            ("status".to_string(), "eq.pending".to_string())
        );
        assert_eq!(filter_param(&Filter::gte("total_cents", 500)).1, "gte.500");
        assert_eq!(filter_param(&Filter::Eq("provider_id".into(), Value::Null)).1, "is.null");
        assert_eq!(
            filter_param(&Filter::is_in("status", ["pending", "in progress"])).1,
            "in.(pending,\"in progress\")"
        );
        assert_eq!(filter_param(&Filter::neq("verified", json!(true))).1, "neq.true");
    }

    #[test]
    fn test_select_params_pin_tenant() {
        let tenant = TenantId::new_v4();
        let query = RecordQuery::new()
            .eq("customer_id", "abc")
            .order_by("created_at", Order::Desc)
            .limit(20)
            .offset(40);
        let params = select_params(&Scope::Tenant(tenant), Table::Bookings, &query);

        assert!(params.contains(&("tenant_id".to_string(), format!("eq.{}", tenant))));
        assert!(params.contains(&("order".to_string(), "created_at.desc".to_string())));
        assert!(params.contains(&("limit".to_string(), "20".to_string())));
        assert!(params.contains(&("offset".to_string(), "40".to_string())));

        let service = select_params(&Scope::Service, Table::Tenants, &RecordQuery::new());
        assert_eq!(service, vec![("select".to_string(), "*".to_string())]);
        assert_eq!(scope_params(&Scope::Tenant(tenant), Table::Tenants)[0].0, "id");
    }

    #[test]
    fn test_content_range() {
        assert_eq!(parse_content_range("0-24/3573"), Some(3573));
        assert_eq!(parse_content_range("*/0"), Some(0));
        assert_eq!(parse_content_range("*/*"), None);
    }
}
