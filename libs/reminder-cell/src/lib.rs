//! # Reminder Cell
//!
//! Sends WhatsApp appointment reminders and tracks their delivery.
//!
//! ## Architecture
//!
//! ```text
//! +------------------------------------------------------------+
//! |                      Reminder Cell                         |
//! +------------------------------------------------------------+
//! |  handlers.rs      |  Webhook, config, stats handlers       |
//! |  router.rs        |  Route definitions                     |
//! |  models.rs        |  Settings, wire types, reports         |
//! |  services/        |                                        |
//! |    scheduler.rs   |  Periodic window scan (one task)       |
//! |    dispatcher.rs  |  Render, send, record one reminder     |
//! |    retry.rs       |  Re-attempt failed reminders           |
//! |    tracker.rs     |  Apply delivered/read callbacks        |
//! |    whatsapp.rs    |  WhatsApp Cloud API client + webhook   |
//! +------------------------------------------------------------+
//! ```
//!
//! Each tick loads the messaging configuration, scans one window per
//! enabled reminder kind (`3_days`, `1_day`, `2_hours`), and dispatches
//! reminders for appointments that do not already have a successful one.
//! Every attempt is written under the `(appointment_id, message_type)` key,
//! so repeated ticks never produce a second record. A retry pass follows.
//!
//! Nothing raised while dispatching stops the loop: failures are recorded
//! on the notification and counted in [`SchedulerStats`].
//!
//! ## API Endpoints
//!
//! - `GET /whatsapp/webhook` - Subscription handshake
//! - `POST /whatsapp/webhook` - Delivery status callbacks
//! - `GET /whatsapp/config` - Messaging settings, tokens omitted
//! - `PUT /whatsapp/config` - Partial settings update
//! - `GET /reminders/stats` - Scheduler counters
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use reminder_cell::*;
//! use shared_config::AppConfig;
//! use shared_database::InMemoryStore;
//!
//! # async fn run() {
//! let config = AppConfig::from_env();
//! let store = Arc::new(InMemoryStore::new());
//! let settings = ReminderSettings::from_config(&config);
//! let stores = ReminderStores::from_store(store);
//!
//! let provider: Arc<dyn MessagingProvider> = Arc::new(WhatsAppClient::new(&config));
//! let dispatcher = Arc::new(NotificationDispatcher::new(
//!     provider,
//!     stores.notifications.clone(),
//!     settings.clinic_offset,
//! ));
//! let retry = Arc::new(RetryCoordinator::new(stores.clone(), dispatcher.clone(), &settings));
//! let scheduler = Arc::new(ReminderWindowScheduler::new(
//!     stores,
//!     dispatcher,
//!     retry,
//!     settings,
//!     Arc::new(SchedulerStats::default()),
//! ));
//!
//! let handle = scheduler.start();
//! // ...
//! handle.stop().await;
//! # }
//! ```

pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use error::*;
pub use handlers::ReminderState;
pub use models::*;
pub use router::reminder_routes;
pub use services::*;
