//! Request processing pipeline implementation

use crate::prelude::*;
use crate::tenant::{cookie_value, resolve_tenant, TENANT_COOKIE, TENANT_HEADER};
use crate::traits::RecordStore;
use crate::types::{Record, Scope};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Pipeline stages
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    PreOperation,
    Operation,
    PostOperation,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineStage::PreOperation => write!(f, "pre-operation"),
            PipelineStage::Operation => write!(f, "operation"),
            PipelineStage::PostOperation => write!(f, "post-operation"),
        }
    }
}

/// The main pipeline runner that executes plugins in stages
pub struct PipelineRunner {
    plugins: HashMap<PipelineStage, Vec<Arc<dyn PipelinePlugin>>>,
}

impl PipelineRunner {
    /// Create a new pipeline runner
    pub fn new() -> Self {
        Self {
            plugins: HashMap::new(),
        }
    }

    /// Pipeline with the built-in plugins wired against a store
    pub fn with_defaults(store: Arc<dyn RecordStore>) -> Self {
        let mut runner = Self::new();
        runner.register_plugin(PipelineStage::PreOperation, Arc::new(RequestLoggingPlugin::new()));
        runner.register_plugin(PipelineStage::PreOperation, Arc::new(TenantScopePlugin::new()));
        runner.register_plugin(PipelineStage::PostOperation, Arc::new(AuditTrailPlugin::new(store)));
        runner
    }

    /// Register a plugin for a specific stage
    pub fn register_plugin(&mut self, stage: PipelineStage, plugin: Arc<dyn PipelinePlugin>) {
        self.plugins.entry(stage).or_insert_with(Vec::new).push(plugin);
    }

    /// Run every stage in order, stopping early once a stage sets an error
    pub async fn execute(&self, mut ctx: RequestContext) -> RequestContext {
        debug!("Starting pipeline execution for request {}", ctx.request_id);

        for stage in [PipelineStage::PreOperation, PipelineStage::Operation, PipelineStage::PostOperation] {
            ctx = self.execute_stage(stage, ctx).await;
            if ctx.error.is_some() {
                return ctx;
            }
        }

        info!(
            "Pipeline execution completed for request {} in {:?}",
            ctx.request_id,
            ctx.elapsed()
        );

        ctx
    }

    /// Execute plugins for a specific stage
    pub async fn execute_stage(&self, stage: PipelineStage, mut ctx: RequestContext) -> RequestContext {
        if let Some(plugins) = self.plugins.get(&stage) {
            debug!("Executing {} plugins for stage {}", plugins.len(), stage);

            for plugin in plugins {
                match plugin.call(&mut ctx).await {
                    PluginOutcome::Continue => continue,
                    PluginOutcome::Halt => {
                        debug!("Plugin {} halted pipeline execution", plugin.name());
                        break;
                    }
                    PluginOutcome::HaltWithError(e) => {
                        error!("Plugin {} halted with error: {}", plugin.name(), e);
                        ctx.error = Some(e.to_string());
                        break;
                    }
                }
            }
        }

        ctx
    }

    /// Get the number of plugins registered for a stage
    pub fn plugin_count(&self, stage: &PipelineStage) -> usize {
        self.plugins.get(stage).map_or(0, |plugins| plugins.len())
    }
}

impl Default for PipelineRunner {
    fn default() -> Self {
        Self::new()
    }
}

/// Paths that never need a tenant
fn tenant_exempt(path: &str) -> bool {
    !path.starts_with("/api/")
        || path == "/api/health"
        || path == "/api/auth/session"
        || path == "/api/membership/plans"
        || path.starts_with("/api/root/")
        || path.starts_with("/api/admin/")
}

/// Built-in audit trail plugin: records privileged mutations
pub struct AuditTrailPlugin {
    name: &'static str,
    store: Arc<dyn RecordStore>,
}

impl AuditTrailPlugin {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            name: "AuditTrail",
            store,
        }
    }

    fn should_audit(ctx: &RequestContext) -> bool {
        ctx.method != "GET"
            && (ctx.path.starts_with("/api/admin/") || ctx.path.starts_with("/api/root/"))
            && ctx.status.map_or(false, |s| s < 400)
    }
}

#[async_trait]
impl PipelinePlugin for AuditTrailPlugin {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn init(&mut self, _config: PluginConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!("Initialized AuditTrail plugin");
        Ok(())
    }

    async fn call(&self, ctx: &mut RequestContext) -> PluginOutcome {
        if !Self::should_audit(ctx) {
            return PluginOutcome::Continue;
        }

        info!(
            "Audit: {} {} by tenant {:?} (request_id: {})",
            ctx.method, ctx.path, ctx.tenant_id, ctx.request_id
        );

        let id = Uuid::new_v4();
        let record = Record {
            id,
            tenant_id: ctx.tenant_id,
            data: serde_json::json!({
                "id": id,
                "tenant_id": ctx.tenant_id,
                "request_id": ctx.request_id,
                "method": ctx.method,
                "path": ctx.path,
                "status": ctx.status,
                "created_at": Utc::now(),
            }),
        };

        // Audit failures never fail the request that was already served
        match self.store.insert(&Scope::Service, Table::AuditLogs, record).await {
            Ok(_) => ctx.set_attribute("audit_logged", serde_json::json!(true)),
            Err(e) => warn!("Failed to write audit log for {}: {}", ctx.request_id, e),
        }

        PluginOutcome::Continue
    }
}

/// Built-in request logging plugin
pub struct RequestLoggingPlugin {
    name: &'static str,
}

impl RequestLoggingPlugin {
    pub fn new() -> Self {
        Self {
            name: "RequestLogging",
        }
    }
}

impl Default for RequestLoggingPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PipelinePlugin for RequestLoggingPlugin {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn init(&mut self, _config: PluginConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!("Initialized RequestLogging plugin");
        Ok(())
    }

    async fn call(&self, ctx: &mut RequestContext) -> PluginOutcome {
        debug!(
            "Request: {} {} (ID: {}, Elapsed: {:?})",
            ctx.method,
            ctx.path,
            ctx.request_id,
            ctx.elapsed()
        );

        PluginOutcome::Continue
    }
}

/// Built-in tenant scope plugin: resolves the tenant and enforces it on
/// tenant-scoped paths
pub struct TenantScopePlugin {
    name: &'static str,
}

impl TenantScopePlugin {
    pub fn new() -> Self {
        Self {
            name: "TenantScope",
        }
    }
}

impl Default for TenantScopePlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PipelinePlugin for TenantScopePlugin {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn init(&mut self, _config: PluginConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!("Initialized TenantScope plugin");
        Ok(())
    }

    async fn call(&self, ctx: &mut RequestContext) -> PluginOutcome {
        if ctx.path.starts_with("/api/root/") {
            return PluginOutcome::Continue;
        }

        let header = ctx.header(TENANT_HEADER).map(str::to_string);
        let cookie = ctx
            .header("cookie")
            .and_then(|raw| cookie_value(raw, TENANT_COOKIE))
            .map(str::to_string);

        match resolve_tenant(header.as_deref(), cookie.as_deref()) {
            Ok(tenant) => {
                ctx.tenant_id = Some(tenant);
                PluginOutcome::Continue
            }
            Err(e) => {
                let missing = header.is_none() && cookie.is_none();
                if missing && tenant_exempt(&ctx.path) {
                    return PluginOutcome::Continue;
                }
                warn!("Request to {} rejected: {}", ctx.path, e);
                ctx.error = Some(e.to_string());
                PluginOutcome::Halt
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TestPlugin {
        name: &'static str,
        call_count: Arc<AtomicUsize>,
    }

    impl TestPlugin {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                call_count: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PipelinePlugin for TestPlugin {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn init(&mut self, _config: PluginConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            Ok(())
        }

        async fn call(&self, _ctx: &mut RequestContext) -> PluginOutcome {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            PluginOutcome::Continue
        }
    }

    fn ctx_with(path: &str, headers: &[(&str, String)]) -> RequestContext {
        let mut ctx = RequestContext::new("GET".to_string(), path.to_string());
        for (k, v) in headers {
            ctx.headers.insert(k.to_string(), v.clone());
        }
        ctx
    }

    #[tokio::test]
    async fn test_pipeline_execution() {
        let mut runner = PipelineRunner::new();

        let plugin1 = Arc::new(TestPlugin::new("TestPlugin1"));
        let plugin2 = Arc::new(TestPlugin::new("TestPlugin2"));

        runner.register_plugin(PipelineStage::PreOperation, plugin1.clone());
        runner.register_plugin(PipelineStage::PostOperation, plugin2.clone());

        let ctx = RequestContext::new("GET".to_string(), "/test".to_string());
        let ctx = runner.execute(ctx).await;

        assert!(ctx.error.is_none());
        assert_eq!(plugin1.call_count(), 1);
        assert_eq!(plugin2.call_count(), 1);
    }

    #[tokio::test]
    async fn test_tenant_scope_halts_before_later_plugins() {
        let mut runner = PipelineRunner::new();
        let after = Arc::new(TestPlugin::new("AfterScope"));

        runner.register_plugin(PipelineStage::PreOperation, Arc::new(TenantScopePlugin::new()));
        runner.register_plugin(PipelineStage::PreOperation, after.clone());

        let ctx = runner.execute(ctx_with("/api/bookings", &[])).await;

        assert_eq!(ctx.error.as_deref(), Some("Tenant context required"));
        assert_eq!(after.call_count(), 0);
    }

    #[tokio::test]
    async fn test_tenant_scope_resolves_header_and_cookie() {
        let plugin = TenantScopePlugin::new();
        let tenant = TenantId::new_v4();

        let mut ctx = ctx_with("/api/bookings", &[("X-Tenant-ID", tenant.to_string())]);
        assert!(matches!(plugin.call(&mut ctx).await, PluginOutcome::Continue));
        assert_eq!(ctx.tenant_id, Some(tenant));

        let mut ctx = ctx_with("/api/claims", &[("cookie", format!("a=b; tenant_id={}", tenant))]);
        assert!(matches!(plugin.call(&mut ctx).await, PluginOutcome::Continue));
        assert_eq!(ctx.tenant_id, Some(tenant));
    }

    #[tokio::test]
    async fn test_tenant_scope_exemptions() {
        let plugin = TenantScopePlugin::new();

        for path in ["/health", "/api/health", "/api/admin/users", "/api/root/tenants", "/api/auth/session"] {
            let mut ctx = ctx_with(path, &[]);
            assert!(matches!(plugin.call(&mut ctx).await, PluginOutcome::Continue), "{}", path);
            assert!(ctx.error.is_none());
            assert!(ctx.tenant_id.is_none());
        }

        // A malformed tenant is rejected even on admin paths
        let mut ctx = ctx_with("/api/admin/users", &[("x-tenant-id", "nope".to_string())]);
        assert!(matches!(plugin.call(&mut ctx).await, PluginOutcome::Halt));
        assert_eq!(ctx.error.as_deref(), Some("Invalid tenant id"));
    }

    #[test]
    fn test_request_context() {
        let mut ctx = RequestContext::new("POST".to_string(), "/api/test".to_string());

        assert_eq!(ctx.method, "POST");
        assert!(ctx.tenant_id.is_none());

        ctx.headers.insert("X-Tenant-Id".to_string(), "abc".to_string());
        assert_eq!(ctx.header("x-tenant-id"), Some("abc"));

        ctx.set_attribute("test_key", serde_json::json!("test_value"));
        assert_eq!(ctx.get_attribute("test_key"), Some(&serde_json::json!("test_value")));
    }
}
