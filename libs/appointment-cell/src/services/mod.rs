pub mod business_hours;
pub mod conflict;

pub use business_hours::BusinessHoursResolver;
pub use conflict::{is_within_business_hours, AppointmentConflictValidator};
pub use shared_models::intervals_overlap;
