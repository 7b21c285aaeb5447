//! Canonical records produced from portal responses, each next to the raw row
//! shape it is decoded from.

pub mod evaluation;
pub mod grades;
pub mod notifications;
pub mod profile;
pub mod schedule;
pub mod selection;

pub use evaluation::{EvaluationCourse, EvaluationForm, EvaluationItem, EvaluationMenu, EvaluationSubmission, SubmitMode};
pub use grades::{ExamEntry, ExamReport, GradeEntry, GradeReport};
pub use notifications::Notification;
pub use profile::StudentProfile;
pub use schedule::{Schedule, ScheduleEntry};
pub use selection::{BlockCatalog, CourseClasses, DropResult, SelectableCourseEntry, SelectedCourseEntry, SelectedCourses};
