use crate::api::payroll::{BulkUpdate, ResetQuery, ResetResponse};
use crate::api::salary::TaxBracketsResponse;
use crate::api::session::SelectEmployee;
use crate::model::{BulkField, PayrollSnapshot, SalaryInput, SalaryResult, TaxBracket};
use crate::sync::{
    AutosaveState, AutosaveStatus, EditOutcome, FlushOutcome, PreviousFlush, SelectOutcome,
    SessionStatus,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Payroll Sync API",
        version = "0.1.0",
        description = r#"
## Payroll calculator with autosave

Computes Vietnamese monthly payroll (insurance, union fee, progressive
personal income tax, overtime split into taxable and tax-exempt parts) and
keeps one snapshot per employee in a store.

### Key Features
- **Salary**
  - Calculation, the log of calculations since startup, and the tax
    bracket table in use
- **Payroll**
  - List, create, patch, delete stored snapshots; bulk field updates; reset
- **Session**
  - Select and edit an employee; edits are autosaved after a short pause,
    never with two writes in flight, and flushed before switching employee

### Response Format
- JSON with camelCase field names
- Errors are `{"message": ...}`; validation errors add an `errors` list
"#,
    ),
    paths(
        crate::api::salary::calculate,
        crate::api::salary::list_calculations,
        crate::api::salary::tax_brackets,

        crate::api::payroll::list_payrolls,
        crate::api::payroll::create_payroll,
        crate::api::payroll::get_payroll,
        crate::api::payroll::patch_payroll,
        crate::api::payroll::delete_payroll,
        crate::api::payroll::bulk_update,
        crate::api::payroll::reset_payrolls,

        crate::api::session::select_employee,
        crate::api::session::edit_employee,
        crate::api::session::flush_employee,
        crate::api::session::retry_employee,
        crate::api::session::employee_status
    ),
    components(
        schemas(
            SalaryInput,
            SalaryResult,
            TaxBracket,
            TaxBracketsResponse,
            PayrollSnapshot,
            BulkField,
            BulkUpdate,
            ResetQuery,
            ResetResponse,
            SelectEmployee,
            SelectOutcome,
            EditOutcome,
            PreviousFlush,
            FlushOutcome,
            SessionStatus,
            AutosaveState,
            AutosaveStatus
        )
    ),
    tags(
        (name = "Salary", description = "Payroll calculation APIs"),
        (name = "Payroll", description = "Stored payroll snapshot APIs"),
        (name = "Session", description = "Editing session and autosave APIs"),
    )
)]
pub struct ApiDoc;
