use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum InvoiceStatus {
    Issued,
    Void,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct Invoice {
    pub id: u64,
    pub invoice_number: u64,
    #[schema(example = "00-00000001")]
    pub control_number: String,
    pub order_id: Option<u64>,
    pub customer_rif: String,
    pub customer_name: String,
    #[schema(value_type = String, format = "date")]
    pub invoice_date: NaiveDate,
    #[schema(example = "VES")]
    pub payment_currency: String,
    pub exchange_rate: Decimal,
    pub exento: Decimal,
    pub base_general: Decimal,
    pub iva_general: Decimal,
    pub base_reducida: Decimal,
    pub iva_reducida: Decimal,
    pub subtotal: Decimal,
    pub iva: Decimal,
    pub igtf: Decimal,
    pub total: Decimal,
    #[schema(example = "issued")]
    pub status: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct InvoiceLine {
    pub id: u64,
    pub invoice_id: u64,
    pub product_id: u64,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub tax_kind: String,
    pub amount: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InvoiceWithLines {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub lines: Vec<InvoiceLine>,
}
