//! semantic-cache-tier server binary.

use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use semantic_cache_tier::cache::exact::{DisabledExactStore, ExactMatchStore, InMemoryExactStore};
use semantic_cache_tier::cache::orchestrator::TieredCache;
use semantic_cache_tier::cache::semantic::InMemorySemanticStore;
use semantic_cache_tier::config::{Cli, Config, ExactBackend, ExactStoreConfig, GenerationBackend};
use semantic_cache_tier::metrics::CacheMetrics;
use semantic_cache_tier::provider::gemini::GeminiProvider;
use semantic_cache_tier::provider::openai::OpenAiCompatProvider;
use semantic_cache_tier::provider::GenerationProvider;
use semantic_cache_tier::server::api::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments.
    let cli = Cli::parse();

    // Pick up a local .env before reading any overrides.
    let dotenv = dotenvy::dotenv();

    // Initialize tracing/logging.
    let filter = if cli.verbose {
        "semantic_cache_tier=debug,tower_http=debug"
    } else {
        "semantic_cache_tier=info,tower_http=info"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| filter.into());

    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }

    info!("semantic-cache-tier v{}", env!("CARGO_PKG_VERSION"));
    if let Ok(path) = dotenv {
        info!(path = %path.display(), "Loaded .env");
    }

    // Load configuration.
    let mut config = Config::load(&cli.config)?;
    config.apply_env()?;
    if let Some(listen) = cli.listen {
        config.server.listen = listen;
    }
    config.validate()?;
    let config = Arc::new(config);

    info!(
        max_size = config.cache.max_size,
        threshold = config.cache.similarity_threshold,
        generation_cost_secs = config.cache.generation_cost_secs,
        provider_timeout_secs = config.cache.provider_timeout_secs,
        "Configuration loaded"
    );

    // Tier 1 and Tier 2 stores.
    let exact = build_exact_store(&config.exact_store).await;
    let semantic = Arc::new(InMemorySemanticStore::new());

    // Providers.
    let embedder = Arc::new(OpenAiCompatProvider::new(
        config.embedding.base_url.clone(),
        config.embedding.model.clone(),
        config.embedding.api_key.clone(),
    ));
    let generator = build_generator(&config);

    info!(
        exact_store = exact.backend_name(),
        embedding_model = config.embedding.model,
        generation = generator.provider_name(),
        generation_model = config.generation.model,
        "Providers configured"
    );

    let metrics = Arc::new(CacheMetrics::new()?);
    let cache = Arc::new(TieredCache::new(
        &config, exact, semantic, embedder, generator, metrics,
    ));

    // Build application state.
    let state = Arc::new(AppState {
        cache,
        config: config.clone(),
        start_time: Instant::now(),
    });

    // Build the HTTP router.
    let app = build_router(state);

    // Start the server.
    let listen_addr = config.server.listen.clone();
    let listener = TcpListener::bind(&listen_addr).await?;
    info!("Listening on {listen_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}

async fn build_exact_store(config: &ExactStoreConfig) -> Arc<dyn ExactMatchStore> {
    match config.backend {
        ExactBackend::Memory => Arc::new(InMemoryExactStore::new()),
        ExactBackend::Redis => connect_redis(config).await,
    }
}

#[cfg(feature = "redis")]
async fn connect_redis(config: &ExactStoreConfig) -> Arc<dyn ExactMatchStore> {
    use semantic_cache_tier::cache::exact::RedisExactStore;

    match RedisExactStore::connect(&config.redis_url, config.key_prefix.clone()).await {
        Ok(store) => {
            info!(url = config.redis_url, "Connected to Redis");
            Arc::new(store)
        }
        Err(e) => {
            error!(url = config.redis_url, "Error connecting to Redis, T1 disabled: {e}");
            Arc::new(DisabledExactStore::new(e.to_string()))
        }
    }
}

#[cfg(not(feature = "redis"))]
async fn connect_redis(config: &ExactStoreConfig) -> Arc<dyn ExactMatchStore> {
    error!(
        url = config.redis_url,
        "Redis backend requested but built without the `redis` feature, T1 disabled"
    );
    Arc::new(DisabledExactStore::new("built without redis support"))
}

fn build_generator(config: &Config) -> Arc<dyn GenerationProvider> {
    let generation = &config.generation;
    match generation.backend {
        GenerationBackend::Gemini => {
            let provider = match &generation.base_url {
                Some(url) => GeminiProvider::with_base_url(
                    url.clone(),
                    generation.model.clone(),
                    generation.api_key.clone(),
                ),
                None => GeminiProvider::new(generation.model.clone(), generation.api_key.clone()),
            };
            if !provider.is_configured() {
                warn!("Gemini API key not set; every cache miss will return the fallback response");
            }
            Arc::new(provider)
        }
        GenerationBackend::OpenAi => Arc::new(OpenAiCompatProvider::new(
            generation
                .base_url
                .clone()
                .unwrap_or_else(|| "https://api.openai.com".to_string()),
            generation.model.clone(),
            generation.api_key.clone(),
        )),
    }
}
