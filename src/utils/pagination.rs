use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::model::{
    bank_account::BankTransaction, employee::Employee, exchange_rate::ExchangeRate,
    invoice::Invoice, order::Order, payroll::PayrollRun, product::InventoryMove,
    product::Product, purchase::Purchase,
};

pub const DEFAULT_PER_PAGE: u32 = 20;
pub const MAX_PER_PAGE: u32 = 100;

#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct PageQuery {
    #[schema(example = 1)]
    /// Pagination page number (start with 1)
    pub page: Option<u32>,
    #[schema(example = 20)]
    /// Items per page, at most 100
    pub per_page: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub per_page: u32,
}

impl Page {
    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE),
        }
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.per_page)
    }

    pub fn wrap<T>(self, data: Vec<T>, total: i64) -> Paginated<T> {
        Paginated {
            data,
            page: self.page,
            per_page: self.per_page,
            total,
        }
    }
}

impl From<&PageQuery> for Page {
    fn from(q: &PageQuery) -> Self {
        Page::new(q.page, q.per_page)
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[aliases(
    PaginatedEmployee = Paginated<Employee>,
    PaginatedPayrollRun = Paginated<PayrollRun>,
    PaginatedExchangeRate = Paginated<ExchangeRate>,
    PaginatedProduct = Paginated<Product>,
    PaginatedInventoryMove = Paginated<InventoryMove>,
    PaginatedOrder = Paginated<Order>,
    PaginatedInvoice = Paginated<Invoice>,
    PaginatedPurchase = Paginated<Purchase>,
    PaginatedBankTransaction = Paginated<BankTransaction>
)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 57)]
    pub total: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_inputs() {
        assert_eq!(Page::new(None, None), Page { page: 1, per_page: 20 });
        assert_eq!(Page::new(Some(0), Some(500)), Page { page: 1, per_page: 100 });
        assert_eq!(Page::new(Some(3), Some(0)), Page { page: 3, per_page: 1 });
    }

    #[test]
    fn computes_offset() {
        let p = Page::new(Some(3), Some(25));
        assert_eq!(p.limit(), 25);
        assert_eq!(p.offset(), 50);
    }
}
