pub mod dispatcher;
pub mod retry;
pub mod scheduler;
pub mod tracker;
pub mod whatsapp;

pub use dispatcher::{NotificationDispatcher, ReminderStores};
pub use retry::RetryCoordinator;
pub use scheduler::{
    reminder_window, ReminderWindowScheduler, SchedulerHandle, SchedulerStats, SchedulerStatsSnapshot,
};
pub use tracker::DeliveryStatusTracker;
pub use whatsapp::{verify_signature, verify_subscription, MessagingProvider, WhatsAppClient};
