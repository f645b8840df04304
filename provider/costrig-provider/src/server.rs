use crate::{
    api::{create_middleware_stack, handlers, middleware},
    config::ServerConfig,
    coordinator::FailoverCoordinator,
    registry::TriggerRegistry,
};
use axum::{Router, middleware::from_fn_with_state, routing::get};
use std::{net::SocketAddr, sync::Arc};
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<TriggerRegistry>,
    pub coordinator: Arc<FailoverCoordinator>,
    pub endpoint_auth: Option<String>,
}

pub struct ApiServer {
    app: Router,
    config: ServerConfig,
}

impl ApiServer {
    pub fn new(
        registry: Arc<TriggerRegistry>,
        coordinator: Arc<FailoverCoordinator>,
        config: ServerConfig,
        endpoint_auth: Option<String>,
    ) -> Self {
        let state = AppState {
            registry,
            coordinator,
            endpoint_auth,
        };

        let app = Router::new()
            .route("/active", get(handlers::get_active))
            .route("/health", get(handlers::get_health))
            .layer(from_fn_with_state(
                state.clone(),
                middleware::endpoint_auth,
            ))
            .layer(create_middleware_stack())
            .with_state(state);

        Self { app, config }
    }

    pub async fn serve(self) -> Result<(), Box<dyn std::error::Error>> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        let listener = tokio::net::TcpListener::bind(addr).await?;

        info!("diagnostic API listening on {}", addr);
        axum::serve(listener, self.app).await?;

        Ok(())
    }

    /// Consume and return the underlying Axum Router so callers can serve it
    /// themselves (e.g., on an ephemeral port in tests) and discover the
    /// bound address.
    pub fn into_router(self) -> Router {
        self.app
    }
}
