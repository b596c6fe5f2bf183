use std::collections::VecDeque;
use std::sync::{PoisonError, RwLock};

use crate::model::SalaryResult;

/// Results kept before the oldest calculation is dropped.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Process-local log of ad-hoc calculations, oldest first.
#[derive(Debug)]
pub struct CalculationLog {
    entries: RwLock<VecDeque<SalaryResult>>,
    capacity: usize,
}

impl Default for CalculationLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl CalculationLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn record(&self, result: SalaryResult) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(result);
    }

    pub fn all(&self) -> Vec<SalaryResult> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SalaryInput;
    use crate::payroll::PayrollCalculator;

    fn compute(no: &str) -> SalaryResult {
        PayrollCalculator::default().compute(&SalaryInput::new(no, no, 1_000_000.0))
    }

    #[test]
    fn keeps_calculations_in_order() {
        let log = CalculationLog::default();
        log.record(compute("E-1"));
        log.record(compute("E-2"));

        let all: Vec<_> = log.all().into_iter().map(|r| r.employee_no).collect();
        assert_eq!(all, ["E-1", "E-2"]);
    }

    #[test]
    fn drops_oldest_past_capacity() {
        let log = CalculationLog::with_capacity(2);
        for no in ["E-1", "E-2", "E-3"] {
            log.record(compute(no));
        }

        let all: Vec<_> = log.all().into_iter().map(|r| r.employee_no).collect();
        assert_eq!(all, ["E-2", "E-3"]);
    }
}
