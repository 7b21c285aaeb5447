//! Structural normalizers for loosely typed portal fields.

pub mod notifications;
pub mod periods;
pub mod timetable;
pub mod values;
pub mod weeks;

use periods::ScheduleTable;

/// Immutable settings shared by the normalizers of one client.
#[derive(Debug, Clone, Default)]
pub struct NormalizerConfig {
    /// Daily class-period table used to render display windows.
    pub schedule: ScheduleTable,
}

impl NormalizerConfig {
    pub fn with_schedule(schedule: ScheduleTable) -> Self {
        Self { schedule }
    }
}
