use std::sync::Arc;

use dotenvy::dotenv;
use tracing::info;
use tracing_subscriber::EnvFilter;

use registry_hub_api::apicurio::{ApicurioClient, ArtifactRegistryClient};
use registry_hub_api::background::{BackgroundTaskConfig, HubBackgroundTasks};
use registry_hub_api::config::HubConfig;
use registry_hub_api::db::session::init_pool;
use registry_hub_api::db::store::{PostgresRegistryStore, RegistryStore};
use registry_hub_api::discovery::client::{ConsulDiscoveryClient, DiscoveryClient};
use registry_hub_api::discovery::surface::DiscoveryQueryService;
use registry_hub_api::events::{EventEmitter, KafkaEventEmitter};
use registry_hub_api::orchestrator::module_stub::{HttpModuleStubFactory, ModuleStubFactory};
use registry_hub_api::orchestrator::RegistrationOrchestrator;
use registry_hub_api::readiness::ReadinessService;
use registry_hub_api::schemas::SchemaLookupService;
use registry_hub_api::RegistrationHubService;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = HubConfig::from_env()?;
    info!(
        consul = %config.consul_base_url(),
        apicurio = %config.apicurio_url,
        kafka = %config.kafka_bootstrap_servers,
        "Starting registration hub v{}", registry_hub_api::VERSION
    );

    let pool = init_pool(&config.database_url)?;

    let discovery: Arc<dyn DiscoveryClient> =
        Arc::new(ConsulDiscoveryClient::new(config.consul_base_url()));
    let artifacts: Arc<dyn ArtifactRegistryClient> =
        Arc::new(ApicurioClient::new(&config.apicurio_url));
    let store: Arc<dyn RegistryStore> = Arc::new(PostgresRegistryStore::new(
        pool.clone(),
        Arc::clone(&artifacts),
    ));
    let emitter: Arc<dyn EventEmitter> =
        Arc::new(KafkaEventEmitter::new(&config.kafka_bootstrap_servers)?);
    let stubs: Arc<dyn ModuleStubFactory> =
        Arc::new(HttpModuleStubFactory::new(Arc::clone(&discovery)));

    let orchestrator = RegistrationOrchestrator::new(
        Arc::clone(&discovery),
        Arc::clone(&store),
        Arc::clone(&artifacts),
        emitter,
        Arc::clone(&stubs),
    );
    let surface = DiscoveryQueryService::new(Arc::clone(&discovery));
    let schemas = SchemaLookupService::new(
        Arc::clone(&store),
        Arc::clone(&artifacts),
        Arc::clone(&stubs),
    );
    let readiness = ReadinessService::new(
        pool,
        Arc::clone(&discovery),
        Arc::clone(&artifacts),
    );

    let hub = RegistrationHubService::new(orchestrator, surface, schemas, readiness, store.clone());

    let background = HubBackgroundTasks::new(
        Arc::clone(&store),
        Arc::clone(&artifacts),
        BackgroundTaskConfig::default(),
    );
    background.start();

    let report = hub.readiness().await;
    info!(status = %report.status, "Initial readiness probe");

    info!("Registration hub initialised; waiting for shutdown signal");
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, stopping registration hub");

    Ok(())
}
