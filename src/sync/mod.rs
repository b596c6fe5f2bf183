//! Keeping locally computed payroll in step with the snapshot store.

pub mod autosave;
pub mod session;
pub mod tracker;

pub use autosave::{AutosaveScheduler, AutosaveSettings, AutosaveState, AutosaveStatus, FlushOutcome};
pub use session::{EditOutcome, EditSession, PreviousFlush, SelectOutcome, SessionStatus};
pub use tracker::DirtyTracker;
