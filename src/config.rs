use std::env;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,
    pub refresh_token_ttl: usize,
    pub db_max_connections: u32,
    pub run_migrations: bool,
    pub log_dir: String,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_refresh_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,

    /// Legal identity printed on fiscal artifacts and bank files
    pub company_rif: String,
    pub company_name: String,

    pub legal: LegalParams,
}

/// Statutory rates and limits. Percentages are stored as fractions (0.04 = 4 %).
#[derive(Clone, Debug, PartialEq)]
pub struct LegalParams {
    pub minimum_wage: Decimal,
    pub sso_employee_rate: Decimal,
    pub sso_employer_rate: Decimal,
    pub rpe_employee_rate: Decimal,
    pub rpe_employer_rate: Decimal,
    pub faov_employee_rate: Decimal,
    pub faov_employer_rate: Decimal,
    pub inces_employer_rate: Decimal,
    pub inces_employee_rate: Decimal,
    pub sso_cap_wages: Decimal,
    pub rpe_cap_wages: Decimal,
    pub utilidades_days: Decimal,
    pub iva_general_rate: Decimal,
    pub iva_reduced_rate: Decimal,
    pub igtf_rate: Decimal,
}

impl Default for LegalParams {
    fn default() -> Self {
        Self {
            minimum_wage: dec!(130.00),
            sso_employee_rate: dec!(0.04),
            sso_employer_rate: dec!(0.09),
            rpe_employee_rate: dec!(0.005),
            rpe_employer_rate: dec!(0.02),
            faov_employee_rate: dec!(0.01),
            faov_employer_rate: dec!(0.02),
            inces_employer_rate: dec!(0.02),
            inces_employee_rate: dec!(0.005),
            sso_cap_wages: dec!(5),
            rpe_cap_wages: dec!(10),
            utilidades_days: dec!(30),
            iva_general_rate: dec!(0.16),
            iva_reduced_rate: dec!(0.08),
            igtf_rate: dec!(0.03),
        }
    }
}

fn required(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("{key} must be set"))
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{key} is invalid: {e}")),
        Err(_) => Ok(default),
    }
}

fn parse_bool_or(key: &str, default: bool) -> Result<bool> {
    match env::var(key) {
        Ok(raw) => parse_bool(&raw).with_context(|| format!("{key} is invalid")),
        Err(_) => Ok(default),
    }
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("expected a boolean, got {other:?}"),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            access_token_ttl: parse_or("ACCESS_TOKEN_TTL", 900)?, // 15 min
            refresh_token_ttl: parse_or("REFRESH_TOKEN_TTL", 604_800)?, // 7 days
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", 10)?,
            run_migrations: parse_bool_or("RUN_MIGRATIONS", true)?,
            log_dir: env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string()),

            rate_login_per_min: parse_or("RATE_LOGIN_PER_MIN", 60)?,
            rate_refresh_per_min: parse_or("RATE_REFRESH_PER_MIN", 30)?,
            rate_protected_per_min: parse_or("RATE_PROTECTED_PER_MIN", 1000)?,

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api/v1".to_string()),

            company_rif: env::var("COMPANY_RIF").unwrap_or_else(|_| "J-00000000-0".to_string()),
            company_name: env::var("COMPANY_NAME").unwrap_or_else(|_| "EMPRESA".to_string()),

            legal: LegalParams::from_env()?,
        })
    }
}

impl LegalParams {
    pub fn from_env() -> Result<Self> {
        let d = LegalParams::default();
        let params = Self {
            minimum_wage: parse_or("MINIMUM_WAGE", d.minimum_wage)?,
            sso_employee_rate: parse_or("SSO_EMPLOYEE_RATE", d.sso_employee_rate)?,
            sso_employer_rate: parse_or("SSO_EMPLOYER_RATE", d.sso_employer_rate)?,
            rpe_employee_rate: parse_or("RPE_EMPLOYEE_RATE", d.rpe_employee_rate)?,
            rpe_employer_rate: parse_or("RPE_EMPLOYER_RATE", d.rpe_employer_rate)?,
            faov_employee_rate: parse_or("FAOV_EMPLOYEE_RATE", d.faov_employee_rate)?,
            faov_employer_rate: parse_or("FAOV_EMPLOYER_RATE", d.faov_employer_rate)?,
            inces_employer_rate: parse_or("INCES_EMPLOYER_RATE", d.inces_employer_rate)?,
            inces_employee_rate: parse_or("INCES_EMPLOYEE_RATE", d.inces_employee_rate)?,
            sso_cap_wages: parse_or("SSO_CAP_WAGES", d.sso_cap_wages)?,
            rpe_cap_wages: parse_or("RPE_CAP_WAGES", d.rpe_cap_wages)?,
            utilidades_days: parse_or("UTILIDADES_DAYS", d.utilidades_days)?,
            iva_general_rate: parse_or("IVA_GENERAL_RATE", d.iva_general_rate)?,
            iva_reduced_rate: parse_or("IVA_REDUCED_RATE", d.iva_reduced_rate)?,
            igtf_rate: parse_or("IGTF_RATE", d.igtf_rate)?,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        // LOTTT art. 131: between 30 and 120 days
        if self.utilidades_days < dec!(30) || self.utilidades_days > dec!(120) {
            bail!(
                "UTILIDADES_DAYS must be between 30 and 120, got {}",
                self.utilidades_days
            );
        }
        if self.minimum_wage <= Decimal::ZERO {
            bail!("MINIMUM_WAGE must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(LegalParams::default().validate().is_ok());
    }

    #[test]
    fn utilidades_days_out_of_range_is_rejected() {
        let params = LegalParams {
            utilidades_days: dec!(121),
            ..LegalParams::default()
        };
        assert!(params.validate().is_err());

        let params = LegalParams {
            utilidades_days: dec!(15),
            ..LegalParams::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn parses_booleans() {
        assert!(parse_bool("TRUE").unwrap());
        assert!(parse_bool(" on ").unwrap());
        assert!(!parse_bool("0").unwrap());
        assert!(parse_bool("maybe").is_err());
    }
}
