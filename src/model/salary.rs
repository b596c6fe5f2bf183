use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ValidationError;

fn default_workdays() -> f64 {
    20.0
}

/// User-editable pay inputs for one employee and one pay period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SalaryInput {
    #[schema(example = "VIVN-0001")]
    pub employee_no: String,

    #[schema(example = "Huỳnh Nguyễn Minh Hoàng")]
    pub name: String,

    #[schema(example = 10000000.0)]
    pub salary: f64,

    #[serde(default)]
    #[schema(example = 500000.0)]
    pub bonus: f64,

    #[serde(default)]
    #[schema(example = 200000.0)]
    pub allowance_tax: f64,

    /// Overtime hours paid at 150%.
    #[serde(default)]
    #[schema(example = 10.0)]
    pub ot15: f64,

    /// Overtime hours paid at 200%.
    #[serde(default)]
    #[schema(example = 5.0)]
    pub ot20: f64,

    /// Overtime hours paid at 300%.
    #[serde(default)]
    #[schema(example = 2.0)]
    pub ot30: f64,

    #[serde(default)]
    #[schema(example = 2.0)]
    pub dependants: f64,

    #[serde(default)]
    #[schema(example = 0.0)]
    pub advance: f64,

    #[serde(default = "default_workdays")]
    #[schema(example = 20.0)]
    pub actual_days_worked: f64,

    #[serde(default = "default_workdays")]
    #[schema(example = 20.0)]
    pub total_workdays: f64,

    // manual overrides
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personal_relief: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependent_relief: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aug_salary: Option<f64>,
}

impl SalaryInput {
    pub fn new(employee_no: impl Into<String>, name: impl Into<String>, salary: f64) -> Self {
        Self {
            employee_no: employee_no.into(),
            name: name.into(),
            salary,
            bonus: 0.0,
            allowance_tax: 0.0,
            ot15: 0.0,
            ot20: 0.0,
            ot30: 0.0,
            dependants: 0.0,
            advance: 0.0,
            actual_days_worked: default_workdays(),
            total_workdays: default_workdays(),
            personal_relief: None,
            dependent_relief: None,
            aug_salary: None,
        }
    }

    /// Collects every violation instead of stopping at the first one.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.employee_no.trim().is_empty() {
            errors.push(ValidationError::Required("employeeNo"));
        }
        if self.name.trim().is_empty() {
            errors.push(ValidationError::Required("name"));
        }

        let amounts = [
            ("salary", self.salary),
            ("bonus", self.bonus),
            ("allowanceTax", self.allowance_tax),
            ("ot15", self.ot15),
            ("ot20", self.ot20),
            ("ot30", self.ot30),
            ("dependants", self.dependants),
            ("advance", self.advance),
            ("actualDaysWorked", self.actual_days_worked),
        ];
        for (field, value) in amounts {
            if !value.is_finite() || value < 0.0 {
                errors.push(ValidationError::Negative { field, value });
            }
        }

        if !self.total_workdays.is_finite() || self.total_workdays <= 0.0 {
            errors.push(ValidationError::NonPositive {
                field: "totalWorkdays",
                value: self.total_workdays,
            });
        }

        let overrides = [
            ("personalRelief", self.personal_relief),
            ("dependentRelief", self.dependent_relief),
            ("augSalary", self.aug_salary),
        ];
        for (field, value) in overrides {
            if let Some(value) = value {
                if !value.is_finite() || value < 0.0 {
                    errors.push(ValidationError::Negative { field, value });
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Fully itemized payroll for one employee. Always derived from a
/// [`SalaryInput`]; never edited field by field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SalaryResult {
    pub employee_no: String,
    pub name: String,
    pub salary: f64,
    pub bonus: f64,
    pub allowance_tax: f64,
    pub ot15: f64,
    pub ot20: f64,
    pub ot30: f64,
    pub dependants: f64,
    pub advance: f64,
    pub actual_days_worked: f64,
    pub total_workdays: f64,

    #[schema(example = 10000000.0)]
    pub aug_salary: f64,
    #[serde(rename = "overtimePayPIT")]
    #[schema(example = 965909.0)]
    pub overtime_pay_pit: f64,
    #[serde(rename = "overtimePayNonPIT")]
    #[schema(example = 795455.0)]
    pub overtime_pay_non_pit: f64,
    #[serde(rename = "heSo")]
    #[schema(example = 14.0)]
    pub heso_coeff: f64,
    #[serde(rename = "totalOTHours")]
    #[schema(example = 17.0)]
    pub total_ot_hours: f64,
    #[schema(example = 11665909.0)]
    pub total_salary: f64,
    pub employee_insurance: f64,
    pub company_insurance: f64,
    pub union_fee: f64,
    pub personal_relief: f64,
    pub dependent_relief: f64,
    pub assessable_income: f64,
    pub personal_income_tax: f64,
    #[schema(example = 11361364.0)]
    pub total_net_income: f64,

    /// ISO-8601 UTC timestamp of the computation.
    #[schema(example = "2026-01-01T00:00:00.000Z")]
    pub calculated_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_optional_fields_take_defaults() {
        let input: SalaryInput = serde_json::from_str(
            r#"{"employeeNo": "E-1", "name": "An", "salary": 12000000}"#,
        )
        .unwrap();
        assert_eq!(input.bonus, 0.0);
        assert_eq!(input.ot30, 0.0);
        assert_eq!(input.actual_days_worked, 20.0);
        assert_eq!(input.total_workdays, 20.0);
        assert!(input.personal_relief.is_none());
        assert!(input.validate().is_ok());
    }

    #[test]
    fn validate_reports_every_violation() {
        let mut input = SalaryInput::new(" ", "", -1.0);
        input.ot15 = -2.0;
        input.total_workdays = 0.0;
        input.personal_relief = Some(-5.0);

        let errors = input.validate().unwrap_err();
        assert_eq!(errors.len(), 6);
        assert!(errors.contains(&ValidationError::Required("employeeNo")));
        assert!(errors.contains(&ValidationError::Required("name")));
        assert!(errors.contains(&ValidationError::NonPositive {
            field: "totalWorkdays",
            value: 0.0
        }));
    }

    #[test]
    fn validate_rejects_non_finite_amounts() {
        let mut input = SalaryInput::new("E-1", "An", f64::NAN);
        input.advance = f64::INFINITY;
        let errors = input.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn input_serializes_camel_case() {
        let input = SalaryInput::new("E-1", "An", 1.0);
        let json = serde_json::to_value(&input).unwrap();
        assert!(json.get("employeeNo").is_some());
        assert!(json.get("allowanceTax").is_some());
        assert!(json.get("personalRelief").is_none());
    }
}
