pub mod booking;
pub mod lifecycle;

pub use booking::{BookingService, SlotLocks};
pub use lifecycle::AppointmentLifecycleService;
