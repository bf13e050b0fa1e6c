//! Appointment validation: resolves the clinic's open hours for a date and
//! checks a proposed appointment against existing bookings and those hours.
//! The create/update path calls [`AppointmentConflictValidator`] before it
//! persists anything.

pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use error::*;
pub use models::*;
pub use router::appointment_routes;
pub use services::*;
