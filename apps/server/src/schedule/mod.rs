//! Availability engine: working-hours config, slot generation, month grids
//! and reconciliation against the appointment ledger.

pub mod config;
pub mod grid;
pub mod reconcile;
pub mod slots;

pub use config::{parse_clock, ConfigError, ScheduleConfig, TimeRange};
pub use grid::{build_month_grid, MonthGrid};
pub use reconcile::{annotate, AnnotatedDay, AnnotatedMonthGrid};
pub use slots::{generate_slots, TimeSlot};
