use std::sync::Arc;

use bus_gateway::bridge::{JobLocator, MemoryJobStore, MessageBridge};
use bus_gateway::config::{AppState, Config};
use bus_gateway::gateway::Gateway;
use bus_gateway::routing::ApiRegistry;
use bus_gateway::{catalog, logger, server};

fn main() {
    // Config path without extension, e.g. `config` for config.toml
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config".to_string());

    if let Err(e) = run(&config_path) {
        eprintln!("[ERROR] {e}");
        std::process::exit(1);
    }
}

fn run(config_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let cfg = Config::load_from(config_path)?;
    logger::init(&cfg)?;

    // Tokio runtime sized by `server.workers`, CPU cores otherwise
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.get_socket_addr()?;
    let settings = &cfg.gateway;

    let registry = ApiRegistry::build(&settings.api_version, catalog::message_types())?;
    logger::log_registry_built(registry.api_count(), registry.table().len());

    let locator = JobLocator::new(
        Arc::new(cfg.base_url()?),
        &settings.api_version,
        &settings.async_job_path,
    );
    let bridge = MessageBridge::new(
        Arc::new(catalog::local_bus()),
        Arc::new(MemoryJobStore::new(cfg.job_expiry())),
        locator,
    );
    let gateway = Gateway::new(
        registry,
        bridge,
        &settings.api_version,
        &settings.async_job_path,
        &settings.schema_header,
    )?;

    let listener = server::create_reusable_listener(addr, cfg.server.backlog)?;
    logger::log_server_start(&addr, &cfg);

    let state = Arc::new(AppState::new(cfg, gateway));
    server::start_server_loop(listener, state).await;
    Ok(())
}
