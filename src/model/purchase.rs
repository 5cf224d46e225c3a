use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

/// Supplier invoice with the retentions applied at registration.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct Purchase {
    pub id: u64,
    pub supplier_rif: String,
    pub supplier_name: String,
    pub invoice_number: String,
    pub control_number: String,
    #[schema(value_type = String, format = "date")]
    pub invoice_date: NaiveDate,
    pub exento: Decimal,
    pub base: Decimal,
    pub iva_rate: Decimal,
    pub iva: Decimal,
    pub total: Decimal,
    pub islr_concept: Option<String>,
    pub iva_retention_pct: Decimal,
    pub iva_retained: Decimal,
    pub islr_retained: Decimal,
    #[schema(example = "20260100000001")]
    pub retention_voucher: String,
    pub supplier_bank_code: Option<String>,
    pub supplier_account: Option<String>,
    pub paid: bool,
}

impl Purchase {
    /// Amount actually transferred to the supplier.
    pub fn payable(&self) -> Decimal {
        self.total - self.iva_retained - self.islr_retained
    }
}
