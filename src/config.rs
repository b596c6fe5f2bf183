use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::model::{TaxBracket, TaxTable};
use crate::payroll::PayrollRules;
use crate::sync::AutosaveSettings;

#[derive(Clone, Debug)]
pub struct Config {
    pub server_addr: String,
    /// Snapshots are kept in memory when unset.
    pub database_url: Option<String>,
    pub api_prefix: String,
    pub log_dir: String,

    // Rate limiting
    pub rate_api_per_min: u32,

    pub autosave_debounce_ms: u64,
    pub autosave_saved_display_ms: u64,
    pub seed_sample_data: bool,

    pub personal_relief: Option<f64>,
    pub dependent_relief: Option<f64>,
    pub insurance_rate: Option<f64>,
    /// JSON array of `{limit, rate, deduction}`; a null limit is unbounded.
    pub tax_brackets: Option<String>,
}

fn env_opt<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{key} has an invalid value: {raw:?}")),
        _ => Ok(None),
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    Ok(env_opt(key)?.unwrap_or(default))
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            server_addr: env_or("SERVER_ADDR", "127.0.0.1:8080".to_string())?,
            database_url: env_opt("DATABASE_URL")?,
            api_prefix: env_or("API_PREFIX", "/api".to_string())?,
            log_dir: env_or("LOG_DIR", "logs".to_string())?,

            rate_api_per_min: env_or("RATE_API_PER_MIN", 1000)?,

            autosave_debounce_ms: env_or("AUTOSAVE_DEBOUNCE_MS", 800)?,
            autosave_saved_display_ms: env_or("AUTOSAVE_SAVED_DISPLAY_MS", 1500)?,
            seed_sample_data: env_or("SEED_SAMPLE_DATA", true)?,

            personal_relief: env_opt("PAYROLL_PERSONAL_RELIEF")?,
            dependent_relief: env_opt("PAYROLL_DEPENDENT_RELIEF")?,
            insurance_rate: env_opt("PAYROLL_INSURANCE_RATE")?,
            tax_brackets: env_opt("PAYROLL_TAX_BRACKETS")?,
        })
    }

    pub fn autosave(&self) -> AutosaveSettings {
        AutosaveSettings {
            debounce: Duration::from_millis(self.autosave_debounce_ms),
            saved_display: Duration::from_millis(self.autosave_saved_display_ms),
        }
    }

    /// Statutory defaults with any configured overrides applied.
    pub fn payroll_rules(&self) -> Result<PayrollRules> {
        let mut rules = PayrollRules::default();

        if let Some(relief) = self.personal_relief {
            anyhow::ensure!(relief >= 0.0, "PAYROLL_PERSONAL_RELIEF must not be negative");
            rules.personal_relief_default = relief;
        }
        if let Some(relief) = self.dependent_relief {
            anyhow::ensure!(relief >= 0.0, "PAYROLL_DEPENDENT_RELIEF must not be negative");
            rules.dependent_relief_per_head = relief;
        }
        if let Some(rate) = self.insurance_rate {
            anyhow::ensure!(
                (0.0..=1.0).contains(&rate),
                "PAYROLL_INSURANCE_RATE must be within [0, 1]"
            );
            rules.employee_insurance_rate = rate;
        }
        if let Some(raw) = &self.tax_brackets {
            let brackets: Vec<TaxBracket> =
                serde_json::from_str(raw).context("PAYROLL_TAX_BRACKETS is not valid JSON")?;
            rules.tax_table = TaxTable::new(brackets).context("PAYROLL_TAX_BRACKETS rejected")?;
        }
        Ok(rules)
    }
}
