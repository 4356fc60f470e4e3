pub mod checker;
pub mod schedule;
pub mod slots;

pub use checker::AvailabilityChecker;
pub use schedule::ScheduleService;
pub use slots::SlotGenerator;
