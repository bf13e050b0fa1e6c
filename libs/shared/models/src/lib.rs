pub mod appointment;
pub mod business_hours;
pub mod error;
pub mod messaging;
pub mod notification;

pub use appointment::*;
pub use business_hours::*;
pub use messaging::*;
pub use notification::*;
