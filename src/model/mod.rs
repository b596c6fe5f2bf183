pub mod salary;
pub mod snapshot;
pub mod tax_bracket;

pub use salary::{SalaryInput, SalaryResult};
pub use snapshot::{BulkField, PayrollSnapshot, SnapshotUpdate};
pub use tax_bracket::{TaxBracket, TaxTable};
