use crate::model::TaxTable;

/// Statutory rates and reliefs used by the calculator. One instance is
/// built at startup and shared by every caller.
#[derive(Debug, Clone, PartialEq)]
pub struct PayrollRules {
    /// Employee share of social/health/unemployment insurance.
    pub employee_insurance_rate: f64,
    /// Employer share, reported but not deducted from net income.
    pub company_insurance_rate: f64,
    pub union_fee_rate: f64,
    pub union_fee_cap: f64,
    pub personal_relief_default: f64,
    pub dependent_relief_per_head: f64,
    pub tax_table: TaxTable,
    pub standard_work_hours_per_day: f64,
    pub standard_work_days_per_month: f64,
}

impl Default for PayrollRules {
    fn default() -> Self {
        Self {
            employee_insurance_rate: 0.105,
            company_insurance_rate: 0.215,
            union_fee_rate: 0.005,
            union_fee_cap: 234_000.0,
            personal_relief_default: 11_000_000.0,
            dependent_relief_per_head: 4_400_000.0,
            tax_table: TaxTable::default(),
            standard_work_hours_per_day: 8.0,
            standard_work_days_per_month: 22.0,
        }
    }
}

impl PayrollRules {
    /// Hourly base used for both overtime components.
    pub fn hourly_rate(&self, aug_salary: f64) -> f64 {
        aug_salary / self.standard_work_days_per_month / self.standard_work_hours_per_day
    }
}
