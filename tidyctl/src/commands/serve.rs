//! Run the HTTP API server until Ctrl-C

use crate::cli::{Backend, ServeArgs};
use crate::config::TidyConfig;
use std::sync::Arc;
use tidyhub_adapter_hosted::HostedBackends;
use tidyhub_adapter_in_memory::InMemoryBackends;
use tidyhub_connector_messaging::MessagingConnector;
use tidyhub_connector_payments::PaymentsConnector;
use tidyhub_core::prelude::*;
use tidyhub_http::HttpServer;
use tracing::{info, warn};

const DEV_ROOT_EMAIL: &str = "root@localhost";

pub async fn handle_serve_command(args: ServeArgs, mut config: TidyConfig) -> Result<(), CoreError> {
    if let Some(bind) = args.bind {
        config.server.bind_address = bind;
    }
    if let Some(backend) = args.backend {
        config.backend = backend;
    }

    let marketplace = Arc::new(build_marketplace(&config).await?);
    marketplace.health_check().await?;

    let server = Arc::new(HttpServer::new(config.http_config()));
    let mut task = {
        let server = server.clone();
        let marketplace = marketplace.clone();
        tokio::spawn(async move { server.start(marketplace).await })
    };

    tokio::select! {
        finished = &mut task => return join_server(finished),
        signal = tokio::signal::ctrl_c() => {
            signal.map_err(|e| CoreError::Internal(format!("Failed to listen for Ctrl-C: {}", e)))?;
            info!("Shutdown requested");
        }
    }

    server
        .stop()
        .await
        .map_err(|e| CoreError::Internal(e.to_string()))?;
    join_server(task.await)
}

fn join_server(
    finished: Result<Result<(), PresentationError>, tokio::task::JoinError>,
) -> Result<(), CoreError> {
    finished
        .map_err(|e| CoreError::Internal(format!("Server task failed: {}", e)))?
        .map_err(|e| CoreError::Internal(e.to_string()))
}

/// Wire the configured backend and connectors into a marketplace
async fn build_marketplace(config: &TidyConfig) -> Result<Marketplace, CoreError> {
    info!("Using {} backend", config.backend);

    let marketplace = match config.backend {
        Backend::InMemory => {
            warn!("The in-memory backend keeps data in this process only");
            let backends = InMemoryBackends::new();
            seed_dev_root(&backends).await?;
            backends.marketplace()
        }
        Backend::Hosted => {
            let hosted = HostedBackends::connect(config.hosted_config()?, config.doh_config())?;
            let notifier = MessagingConnector::new(config.messaging_config())?;
            let payments = PaymentsConnector::new(config.payments_config())?;
            Marketplace::new(
                Arc::new(hosted.store),
                Arc::new(hosted.auth),
                Arc::new(hosted.storage),
                Arc::new(notifier),
                Arc::new(payments),
                Arc::new(hosted.dns),
            )
        }
    };

    Ok(marketplace.with_settings(config.marketplace_settings()))
}

/// Give the in-memory backend a root admin so tenants can be created
async fn seed_dev_root(backends: &InMemoryBackends) -> Result<(), CoreError> {
    let identity = Identity {
        id: Uuid::new_v4(),
        email: DEV_ROOT_EMAIL.to_string(),
        role: Role::RootAdmin,
        tenant_id: None,
    };
    let id = identity.id;
    backends.auth.seed_user(identity, &Uuid::new_v4().to_string()).await;
    let token = backends
        .auth
        .issue_token(id)
        .await
        .ok_or_else(|| CoreError::Internal("Failed to issue root admin token".to_string()))?;
    info!("Root admin token for this session: {}", token);
    println!("Root admin token: {}", token);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_marketplace_is_healthy() {
        let config = TidyConfig::default();
        let marketplace = build_marketplace(&config).await.unwrap();
        assert!(marketplace.health_check().await.is_ok());
        assert_eq!(marketplace.settings.cname_target, config.platform.cname_target);
    }

    #[tokio::test]
    async fn test_hosted_backend_needs_credentials() {
        let config = TidyConfig {
            backend: Backend::Hosted,
            ..Default::default()
        };
        let result = build_marketplace(&config).await;
        assert!(matches!(result, Err(CoreError::Configuration(_))));
    }
}
