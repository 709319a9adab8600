//! Record store backed by the hosted Postgres REST gateway

use crate::config::HostedConfig;
use crate::queries::{self, APPLY_LOYALTY_DELTA, PREFER_COUNT, PREFER_REPRESENTATION};
use crate::utils::{map_error, rows_to_records};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::{json, Value};
use std::time::Duration;
use tidyhub_core::prelude::*;
use tracing::{debug, info, warn};

/// Header carrying the tenant a request acts for, read by row-level policies
const TENANT_CLAIM_HEADER: &str = "x-tenant-id";

/// PostgREST-backed implementation of [`RecordStore`].
///
/// Requests authenticate with the service-role key. Tenant scoping is applied
/// twice: every tenant-scoped request carries an owner-column filter and the
/// tenant header the database policies check.
pub struct HostedStore {
    client: Client,
    config: HostedConfig,
}

impl HostedStore {
    /// Create a new store client
    pub fn new(config: HostedConfig) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| StoreError::ConnectionFailed(format!("Failed to create HTTP client: {}", e)))?;

        info!("Hosted record store configured for {}", config.url);
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HostedConfig {
        &self.config
    }

    fn authorize(&self, request: RequestBuilder, scope: &Scope) -> RequestBuilder {
        let request = request
            .header("apikey", &self.config.service_role_key)
            .bearer_auth(&self.config.service_role_key);
        match scope.tenant() {
            Some(tenant) => request.header(TENANT_CLAIM_HEADER, tenant.to_string()),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                StoreError::Timeout(format!("HTTP request timed out: {}", e))
            } else {
                StoreError::ConnectionFailed(format!("HTTP request failed: {}", e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = map_error(status, &body);
            warn!("Record store request failed: {}", error);
            return Err(error);
        }
        Ok(response)
    }

    async fn rows(&self, table: Table, response: Response) -> Result<Vec<Record>, StoreError> {
        let body: Value = response
            .json()
            .await
            .map_err(|e| StoreError::QueryFailed(format!("Failed to parse {} rows: {}", table, e)))?;
        rows_to_records(table, body)
    }
}

#[async_trait]
impl RecordStore for HostedStore {
    async fn insert(&self, scope: &Scope, table: Table, record: Record) -> Result<Record, StoreError> {
        if !scope.allows(record.tenant_id.as_ref()) {
            return Err(StoreError::TenantIsolationViolation(format!(
                "Cannot insert {} row for another tenant",
                table
            )));
        }

        debug!("Inserting {} row {}", table, record.id);
        let request = self
            .client
            .post(self.config.rest_url(table.as_str()))
            .header("Prefer", PREFER_REPRESENTATION)
            .json(&record.data);
        let response = self.send(self.authorize(request, scope)).await?;

        self.rows(table, response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::QueryFailed(format!("Insert into {} returned no row", table)))
    }

    async fn get(&self, scope: &Scope, table: Table, id: Uuid) -> Result<Option<Record>, StoreError> {
        let mut params = queries::row_params(scope, table, id);
        params.push(("select".to_string(), "*".to_string()));

        let request = self.client.get(self.config.rest_url(table.as_str())).query(&params);
        let response = self.send(self.authorize(request, scope)).await?;
        Ok(self.rows(table, response).await?.into_iter().next())
    }

    async fn select(&self, scope: &Scope, table: Table, query: RecordQuery) -> Result<Vec<Record>, StoreError> {
        debug!("Selecting from {}: {:?}", table, query);
        let params = queries::select_params(scope, table, &query);

        let request = self.client.get(self.config.rest_url(table.as_str())).query(&params);
        let response = self.send(self.authorize(request, scope)).await?;
        self.rows(table, response).await
    }

    async fn update(&self, scope: &Scope, table: Table, id: Uuid, patch: Value) -> Result<Option<Record>, StoreError> {
        let Value::Object(fields) = &patch else {
            return Err(StoreError::QueryFailed("Update patch must be a JSON object".to_string()));
        };
        if fields.contains_key("id") || fields.contains_key("tenant_id") {
            return Err(StoreError::ConstraintViolation("id and tenant_id are immutable".to_string()));
        }

        let request = self
            .client
            .patch(self.config.rest_url(table.as_str()))
            .query(&queries::row_params(scope, table, id))
            .header("Prefer", PREFER_REPRESENTATION)
            .json(&patch);
        let response = self.send(self.authorize(request, scope)).await?;
        Ok(self.rows(table, response).await?.into_iter().next())
    }

    async fn delete(&self, scope: &Scope, table: Table, id: Uuid) -> Result<bool, StoreError> {
        let request = self
            .client
            .delete(self.config.rest_url(table.as_str()))
            .query(&queries::row_params(scope, table, id))
            .header("Prefer", PREFER_REPRESENTATION);
        let response = self.send(self.authorize(request, scope)).await?;
        Ok(!self.rows(table, response).await?.is_empty())
    }

    async fn count(&self, scope: &Scope, table: Table, filters: Vec<Filter>) -> Result<u64, StoreError> {
        let mut params = vec![("select".to_string(), "id".to_string())];
        params.extend(queries::scope_params(scope, table));
        params.extend(filters.iter().map(queries::filter_param));

        let request = self
            .client
            .head(self.config.rest_url(table.as_str()))
            .query(&params)
            .header("Prefer", PREFER_COUNT);
        let response = self.send(self.authorize(request, scope)).await?;

        response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(queries::parse_content_range)
            .ok_or_else(|| StoreError::QueryFailed(format!("Count of {} returned no Content-Range", table)))
    }

    async fn apply_points(&self, tenant: &TenantId, delta: PointsDelta) -> Result<i64, StoreError> {
        let scope = Scope::Tenant(*tenant);
        let body = json!({
            "p_tenant_id": tenant,
            "p_user_id": delta.user_id,
            "p_delta": delta.delta,
            "p_entry": delta.entry,
        });

        let request = self.client.post(self.config.rest_url(APPLY_LOYALTY_DELTA)).json(&body);
        let response = self.send(self.authorize(request, &scope)).await?;

        let balance: Value = response
            .json()
            .await
            .map_err(|e| StoreError::QueryFailed(format!("Failed to parse loyalty balance: {}", e)))?;
        balance
            .as_i64()
            .ok_or_else(|| StoreError::QueryFailed(format!("Unexpected loyalty balance: {}", balance)))
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        let request = self.client.get(self.config.rest_url(""));
        self.send(self.authorize(request, &Scope::Service)).await?;
        Ok(())
    }
}
