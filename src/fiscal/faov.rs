//! Monthly FAOV contribution file for BANAVIH.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use super::FISCAL_EOL;
use crate::utils::text::{decimal_dot, fold_upper};

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct FaovLine {
    pub nationality: String,
    pub cedula: String,
    pub first_name: String,
    pub last_name: String,
    /// Sum of payroll gross paid in the month
    pub salary: Decimal,
    pub hire_date: NaiveDate,
    pub termination_date: Option<NaiveDate>,
}

pub fn faov_file(lines: &[FaovLine]) -> String {
    let mut out = String::new();
    for l in lines {
        let fields = [
            l.nationality.to_ascii_uppercase(),
            l.cedula.clone(),
            fold_upper(&l.first_name),
            fold_upper(&l.last_name),
            decimal_dot(l.salary),
            l.hire_date.format("%d%m%Y").to_string(),
            l.termination_date
                .map(|d| d.format("%d%m%Y").to_string())
                .unwrap_or_default(),
        ];
        out.push_str(&fields.join(","));
        out.push_str(FISCAL_EOL);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn writes_one_line_per_employee() {
        let lines = vec![
            FaovLine {
                nationality: "V".into(),
                cedula: "12345678".into(),
                first_name: "María José".into(),
                last_name: "Pérez, Núñez".into(),
                salary: dec!(1500.5),
                hire_date: NaiveDate::from_ymd_opt(2022, 5, 10).unwrap(),
                termination_date: None,
            },
            FaovLine {
                nationality: "e".into(),
                cedula: "8123456".into(),
                first_name: "Ana".into(),
                last_name: "Gómez".into(),
                salary: dec!(900),
                hire_date: NaiveDate::from_ymd_opt(2020, 1, 2).unwrap(),
                termination_date: NaiveDate::from_ymd_opt(2026, 1, 20),
            },
        ];

        assert_eq!(
            faov_file(&lines),
            "V,12345678,MARIA JOSE,PEREZ NUNEZ,1500.50,10052022,\r\n\
             E,8123456,ANA,GOMEZ,900.00,02012020,20012026\r\n"
        );
    }
}
