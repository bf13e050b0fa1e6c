use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use appointment_cell::{AppointmentConflictValidator, BusinessHoursResolver, SchedulingState};
use reminder_cell::{
    DeliveryStatusTracker, NotificationDispatcher, ReminderSettings, ReminderState, ReminderStores,
    ReminderWindowScheduler, RetryCoordinator, SchedulerStats, WhatsAppClient,
};
use shared_config::{AppConfig, StorageBackend};
use shared_database::{ClinicStore, InMemoryStore, SupabaseStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting clinic reminders API server");

    let config = AppConfig::from_env();
    if !config.is_configured() {
        warn!("Supabase credentials missing, storage calls will fail");
    }

    let backend = config.storage_backend.clone();
    match backend {
        StorageBackend::Supabase => run(config.clone(), Arc::new(SupabaseStore::new(&config))).await,
        StorageBackend::Memory => {
            warn!("Using in-memory storage, data is lost on restart");
            run(config, Arc::new(InMemoryStore::new())).await
        }
    }
}

async fn run<S: ClinicStore + 'static>(config: AppConfig, store: Arc<S>) -> anyhow::Result<()> {
    let settings = ReminderSettings::from_config(&config);
    let stores = ReminderStores::from_store(store.clone());

    // Appointment validation
    let resolver = Arc::new(BusinessHoursResolver::new(store.clone()));
    let validator = AppointmentConflictValidator::new(store.clone(), resolver, settings.clinic_offset);
    let scheduling_state = SchedulingState::new(validator);

    // Reminder pipeline
    let provider = Arc::new(WhatsAppClient::new(&config));
    let dispatcher = Arc::new(NotificationDispatcher::new(
        provider,
        stores.notifications.clone(),
        settings.clinic_offset,
    ));
    let retry = Arc::new(RetryCoordinator::new(stores.clone(), dispatcher.clone(), &settings));
    let stats = Arc::new(SchedulerStats::default());
    let scheduler = Arc::new(ReminderWindowScheduler::new(
        stores.clone(),
        dispatcher,
        retry,
        settings,
        stats.clone(),
    ));

    let reminder_state = Arc::new(ReminderState {
        tracker: Arc::new(DeliveryStatusTracker::new(stores.notifications.clone())),
        messaging_config: stores.messaging_config.clone(),
        stats,
        app_secret: config.whatsapp_app_secret.clone(),
    });
    if reminder_state.app_secret.is_none() {
        warn!("WHATSAPP_APP_SECRET not set, webhook signatures will not be checked");
    }

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router::create_router(scheduling_state, reminder_state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    let handle = scheduler.start();

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    info!("Stopping reminder scheduler");
    handle.stop().await;

    served.context("HTTP server error")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Could not listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
