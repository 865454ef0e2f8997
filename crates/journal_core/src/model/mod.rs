pub mod goal;
pub mod task;

pub use goal::{Goal, GoalDocument, GoalFields, NewGoal};
pub use task::{NewTask, Occurrence, Schedule, Task, TaskDocument, TaskFields, TaskKind, TimeSlot};
