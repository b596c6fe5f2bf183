use chrono::{DateTime, SecondsFormat, Utc};

use super::rules::PayrollRules;
use crate::model::{SalaryInput, SalaryResult};

/// Half rounds toward +inf, matching the figures produced by the web client.
#[inline]
pub fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

/// The single implementation of the payroll formulas. Preview, autosave,
/// API writes and bulk recomputes all go through here.
#[derive(Debug, Clone, Default)]
pub struct PayrollCalculator {
    rules: PayrollRules,
}

impl PayrollCalculator {
    pub fn new(rules: PayrollRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &PayrollRules {
        &self.rules
    }

    pub fn compute(&self, input: &SalaryInput) -> SalaryResult {
        self.compute_at(input, Utc::now())
    }

    /// Never fails. Unusable proration parameters fall back to a ratio of 1.
    pub fn compute_at(&self, input: &SalaryInput, now: DateTime<Utc>) -> SalaryResult {
        let rules = &self.rules;

        let aug_salary = input
            .aug_salary
            .unwrap_or_else(|| round_half_up(input.salary * self.workday_ratio(input)));
        let hourly = rules.hourly_rate(aug_salary);

        let total_ot_hours = input.ot15 + input.ot20 + input.ot30;
        let overtime_pay_pit = (hourly * total_ot_hours).floor();

        // premium part of each overtime tier is not taxable
        let heso_coeff = input.ot15 * 0.5 + input.ot20 + input.ot30 * 2.0;
        let overtime_pay_non_pit = round_half_up(hourly * heso_coeff);

        let total_salary =
            round_half_up(aug_salary + input.bonus + input.allowance_tax + overtime_pay_pit);

        let employee_insurance = input.salary * rules.employee_insurance_rate;
        let company_insurance = input.salary * rules.company_insurance_rate;
        let union_fee = (input.salary * rules.union_fee_rate).min(rules.union_fee_cap);

        let personal_relief = input
            .personal_relief
            .unwrap_or(rules.personal_relief_default);
        let dependent_relief = input
            .dependent_relief
            .unwrap_or(rules.dependent_relief_per_head * input.dependants);

        let assessable_income =
            (total_salary - (employee_insurance + personal_relief + dependent_relief)).max(0.0);
        let personal_income_tax = self.personal_income_tax(assessable_income);

        let total_net_income = round_half_up(
            total_salary - personal_income_tax - employee_insurance - union_fee
                + overtime_pay_non_pit
                - input.advance,
        );

        SalaryResult {
            employee_no: input.employee_no.clone(),
            name: input.name.clone(),
            salary: input.salary,
            bonus: input.bonus,
            allowance_tax: input.allowance_tax,
            ot15: input.ot15,
            ot20: input.ot20,
            ot30: input.ot30,
            dependants: input.dependants,
            advance: input.advance,
            actual_days_worked: input.actual_days_worked,
            total_workdays: input.total_workdays,
            aug_salary,
            overtime_pay_pit,
            overtime_pay_non_pit,
            heso_coeff,
            total_ot_hours,
            total_salary,
            employee_insurance,
            company_insurance,
            union_fee,
            personal_relief,
            dependent_relief,
            assessable_income,
            personal_income_tax,
            total_net_income,
            calculated_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    /// Rebuilds the input behind a stored result. Amounts that differ from
    /// what the rules would derive come back as manual overrides; a stored
    /// amount equal to the derived one is not an override and follows later
    /// changes to its inputs (e.g. `dependentRelief` after a `dependants`
    /// patch).
    pub fn input_from(&self, result: &SalaryResult) -> SalaryInput {
        let mut input = SalaryInput {
            employee_no: result.employee_no.clone(),
            name: result.name.clone(),
            salary: result.salary,
            bonus: result.bonus,
            allowance_tax: result.allowance_tax,
            ot15: result.ot15,
            ot20: result.ot20,
            ot30: result.ot30,
            dependants: result.dependants,
            advance: result.advance,
            actual_days_worked: result.actual_days_worked,
            total_workdays: result.total_workdays,
            personal_relief: None,
            dependent_relief: None,
            aug_salary: None,
        };

        if result.aug_salary != round_half_up(result.salary * self.workday_ratio(&input)) {
            input.aug_salary = Some(result.aug_salary);
        }
        if result.personal_relief != self.rules.personal_relief_default {
            input.personal_relief = Some(result.personal_relief);
        }
        if result.dependent_relief != self.rules.dependent_relief_per_head * result.dependants {
            input.dependent_relief = Some(result.dependent_relief);
        }
        input
    }

    /// Progressive tax on an already-assessable amount, rounded and never
    /// negative.
    pub fn personal_income_tax(&self, assessable_income: f64) -> f64 {
        let bracket = self.rules.tax_table.bracket_for(assessable_income);
        round_half_up(assessable_income * bracket.rate - bracket.deduction).max(0.0)
    }

    fn workday_ratio(&self, input: &SalaryInput) -> f64 {
        let total = input.total_workdays;
        let actual = input.actual_days_worked;
        if total.is_finite() && total > 0.0 && actual.is_finite() {
            actual / total
        } else {
            1.0
        }
    }
}
