pub mod calculator;
pub mod history;
pub mod roster;
pub mod rules;

pub use calculator::{PayrollCalculator, round_half_up};
pub use history::CalculationLog;
pub use roster::Roster;
pub use rules::PayrollRules;
