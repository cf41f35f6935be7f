use axum::{middleware, routing::get};
use axum_helpers::server::{create_production_app, create_router, health_router};
use core_config::tracing::{init_tracing, install_color_eyre};
use domain_prediction::{
    EntityCache, GrpcEmbeddingClient, InMemoryCache, PgEntityStore, PipelineDeps,
    PredictionPipeline, PredictionState, QdrantIndexClient, RedisEntityCache, RedisResponseCache,
    ResponseCache,
};
use eyre::WrapErr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

mod config;
mod openapi;
mod ready;
mod state;

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    install_color_eyre();

    let config = Config::from_env().wrap_err("failed to load configuration")?;
    init_tracing(&config.environment);
    observability::init_metrics().wrap_err("failed to install metrics recorder")?;

    let db = database::postgres::connect_with_retry(config.database.clone(), None)
        .await
        .wrap_err("PostgreSQL connection failed")?;

    let redis = match &config.redis {
        Some(redis_config) => Some(
            database::redis::connect_with_retry(redis_config, None)
                .await
                .wrap_err("Redis connection failed")?,
        ),
        None => {
            warn!("REDIS_URL not set, caching in process memory");
            None
        }
    };

    let index = QdrantIndexClient::new(&config.qdrant).wrap_err("invalid Qdrant configuration")?;
    index
        .verify_collection()
        .await
        .wrap_err("vector collection check failed")?;

    info!(url = %config.embedding.url, model = %config.embedding.model, "embedding service configured");
    let embedding = GrpcEmbeddingClient::connect_lazy(&config.embedding)
        .wrap_err("invalid embedding service address")?;

    let (response_cache, entity_cache): (Arc<dyn ResponseCache>, Arc<dyn EntityCache>) =
        match &redis {
            Some(conn) => (
                Arc::new(RedisResponseCache::new(conn.clone())),
                Arc::new(RedisEntityCache::new(conn.clone())),
            ),
            None => {
                let cache = InMemoryCache::new();
                (Arc::new(cache.clone()), Arc::new(cache))
            }
        };

    let pipeline = Arc::new(PredictionPipeline::new(
        PipelineDeps {
            embedding: Arc::new(embedding.clone()),
            index: Arc::new(index.clone()),
            store: Arc::new(PgEntityStore::new(db.clone())),
            response_cache,
            entity_cache,
        },
        config.pipeline.clone(),
    ));

    let state = AppState {
        db,
        redis,
        index,
        embedding,
    };

    let api_routes = domain_prediction::router(
        PredictionState {
            pipeline: pipeline.clone(),
            verify_md5: config.verify_md5,
        },
        config.server.max_upload_bytes,
    )
    .route_layer(middleware::from_fn(observability::metrics_middleware));

    // - /health: liveness with name and version
    // - /ready: checks every backend the pipeline talks to
    let app = create_router::<openapi::ApiDoc>(api_routes, &config.server)?
        .merge(health_router(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")))
        .merge(ready::ready_router(state.clone()))
        .route("/metrics", get(observability::metrics_handler));

    let grace = config.shutdown_grace;
    info!("Starting zerg prediction API ({:?} shutdown grace)", grace);

    create_production_app(
        app,
        &config.server,
        grace + Duration::from_secs(5),
        async move {
            if !pipeline.writer().shutdown(grace).await {
                warn!("some cache writes were abandoned");
            }

            match state.db.close().await {
                Ok(()) => info!("PostgreSQL connection closed successfully"),
                Err(e) => tracing::error!("Error closing PostgreSQL: {}", e),
            }
        },
    )
    .await
    .wrap_err("server error")?;

    info!("Zerg prediction API shutdown complete");
    Ok(())
}
