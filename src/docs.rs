use crate::api::benefit::{
    AccrualReport, AccrueRequest, AccruedEmployee, AdvanceRequest, BenefitStatement, SkippedEmployee,
    UtilidadesRow,
};
use crate::api::contract::{CreateContract, EndContract};
use crate::api::employee::CreateEmployee;
use crate::api::exchange_rate::{Conversion, CreateExchangeRate};
use crate::api::inventory::{CreateMove, CreateProduct};
use crate::api::invoice::{CreateInvoice, InvoiceOrder};
use crate::api::order::{CreateOrder, OrderLineInput};
use crate::api::payroll::{CreatePayrollRun, PayrollRunDetail};
use crate::api::purchase::{CreatePurchase, IslrConceptView};
use crate::api::termination::{SettlementPreview, TerminationRequest};
use crate::api::treasury::{
    CreateBankAccount, CreateBankTransaction, CreateTransfer, TransferResult, VendorPaymentFile,
};
use crate::domain::benefits::{AccrualEntry, BenefitKind, LedgerTotals, UtilidadesLine};
use crate::domain::currency::Currency;
use crate::domain::invoicing::{InvoiceTotals, TaxKind};
use crate::domain::payroll::{PayFrequency, PayrollAdjustment, PayrollLine, RunTotals};
use crate::domain::retention::PurchaseRetentions;
use crate::domain::service::ServiceTime;
use crate::domain::severance::{SeveranceMethod, Settlement, TerminationReason};
use crate::fiscal::PeriodQuery;
use crate::fiscal::books::{
    BookCompany, BookFormat, PurchaseBook, PurchaseBookRow, PurchaseBookTotals, SalesBook, SalesBookRow,
    SalesBookTotals,
};
use crate::model::bank_account::{BankAccount, BankTransaction, TxKind};
use crate::model::benefit::BenefitEntry;
use crate::model::contract::{Contract, ContractStatus, ContractType};
use crate::model::employee::{Employee, EmployeeStatus};
use crate::model::exchange_rate::ExchangeRate;
use crate::model::invoice::{Invoice, InvoiceLine, InvoiceStatus, InvoiceWithLines};
use crate::model::order::{Order, OrderLine, OrderStatus, OrderWithLines};
use crate::model::payroll::{PayrollItem, PayrollRun, RunStatus};
use crate::model::product::{InventoryMove, MoveKind, Product, StockLevel, Unit};
use crate::model::purchase::Purchase;
use crate::model::termination::Termination;
use crate::models::{LoginReqDto, TokenPair, UserReq};
use crate::utils::pagination::{
    PaginatedBankTransaction, PaginatedEmployee, PaginatedExchangeRate, PaginatedInventoryMove,
    PaginatedInvoice, PaginatedOrder, PaginatedPayrollRun, PaginatedProduct, PaginatedPurchase,
};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "VE ERP API",
        version = "1.0.0",
        description = r#"
## ERP for Venezuelan small and medium businesses

Payroll, labor benefits, inventory, sales, purchases, treasury and the fiscal
artifacts SENIAT and BANAVIH expect.

### 🔹 Key Features
- **RRHH**
  - Employees, contracts, payroll runs with SSO, RPE, FAOV and ISLR
  - Prestaciones sociales, utilidades and liquidación
- **Operations**
  - Products, stock moves, orders and invoices with IVA and IGTF
  - Purchases with IVA and ISLR withholding vouchers
- **Finance**
  - BCV exchange rates, bank accounts, transfers and bank payment files
  - Sales and purchase books, IVA TXT, ISLR XML and FAOV files

### 🔐 Security
Endpoints under `/api/v1` require a **JWT Bearer** access token. Roles:
`admin`, `rrhh`, `finanzas`, `ventas`, `almacen`, `empleado`.

### 📦 Response Format
- JSON bodies; monetary amounts are decimal strings
- Pagination supported for list endpoints
- Fiscal and bank files are returned as attachments
"#,
    ),
    paths(
        crate::api::health::health,

        crate::auth::handlers::register,
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,
        crate::auth::handlers::me,

        crate::api::employee::create_employee,
        crate::api::employee::get_employee,
        crate::api::employee::list_employees,
        crate::api::employee::update_employee,
        crate::api::employee::delete_employee,

        crate::api::contract::create_contract,
        crate::api::contract::list_contracts,
        crate::api::contract::get_contract,
        crate::api::contract::end_contract,

        crate::api::payroll::create_run,
        crate::api::payroll::list_runs,
        crate::api::payroll::get_run,
        crate::api::payroll::approve_run,
        crate::api::payroll::pay_run,
        crate::api::payroll::delete_run,
        crate::api::payroll::bank_file,

        crate::api::benefit::accrue,
        crate::api::benefit::advance,
        crate::api::benefit::statement,
        crate::api::benefit::utilidades_preview,

        crate::api::termination::preview,
        crate::api::termination::create_termination,
        crate::api::termination::get_termination,

        crate::api::exchange_rate::create_rate,
        crate::api::exchange_rate::list_rates,
        crate::api::exchange_rate::latest_rate,
        crate::api::exchange_rate::convert_amount,

        crate::api::inventory::create_product,
        crate::api::inventory::get_product,
        crate::api::inventory::list_products,
        crate::api::inventory::update_product,
        crate::api::inventory::create_move,
        crate::api::inventory::list_moves,
        crate::api::inventory::stock,
        crate::api::inventory::low_stock,

        crate::api::order::create_order,
        crate::api::order::get_order,
        crate::api::order::list_orders,
        crate::api::order::confirm_order,
        crate::api::order::cancel_order,

        crate::api::invoice::create_invoice,
        crate::api::invoice::invoice_order,
        crate::api::invoice::get_invoice,
        crate::api::invoice::list_invoices,
        crate::api::invoice::void_invoice,

        crate::api::purchase::create_purchase,
        crate::api::purchase::get_purchase,
        crate::api::purchase::list_purchases,
        crate::api::purchase::mark_paid,
        crate::api::purchase::islr_concepts,

        crate::api::treasury::create_account,
        crate::api::treasury::list_accounts,
        crate::api::treasury::get_account,
        crate::api::treasury::create_transaction,
        crate::api::treasury::list_transactions,
        crate::api::treasury::transfer,
        crate::api::treasury::vendor_bank_file,

        crate::api::fiscal::sales_book_report,
        crate::api::fiscal::purchase_book_report,
        crate::api::fiscal::iva_retentions,
        crate::api::fiscal::islr_retentions,
        crate::api::fiscal::faov
    ),
    components(
        schemas(
            UserReq,
            LoginReqDto,
            TokenPair,

            Employee,
            EmployeeStatus,
            CreateEmployee,
            PaginatedEmployee,

            Contract,
            ContractType,
            ContractStatus,
            CreateContract,
            EndContract,

            PayrollRun,
            PayrollItem,
            RunStatus,
            PayFrequency,
            PayrollAdjustment,
            PayrollLine,
            RunTotals,
            CreatePayrollRun,
            PayrollRunDetail,
            PaginatedPayrollRun,

            BenefitEntry,
            BenefitKind,
            AccrualEntry,
            LedgerTotals,
            UtilidadesLine,
            AccrueRequest,
            AccruedEmployee,
            SkippedEmployee,
            AccrualReport,
            AdvanceRequest,
            BenefitStatement,
            UtilidadesRow,

            Termination,
            TerminationReason,
            SeveranceMethod,
            Settlement,
            ServiceTime,
            TerminationRequest,
            SettlementPreview,

            Currency,
            ExchangeRate,
            CreateExchangeRate,
            Conversion,
            PaginatedExchangeRate,

            Product,
            Unit,
            TaxKind,
            InventoryMove,
            MoveKind,
            StockLevel,
            CreateProduct,
            CreateMove,
            PaginatedProduct,
            PaginatedInventoryMove,

            Order,
            OrderLine,
            OrderStatus,
            OrderWithLines,
            OrderLineInput,
            CreateOrder,
            PaginatedOrder,

            Invoice,
            InvoiceLine,
            InvoiceStatus,
            InvoiceWithLines,
            InvoiceTotals,
            CreateInvoice,
            InvoiceOrder,
            PaginatedInvoice,

            Purchase,
            PurchaseRetentions,
            CreatePurchase,
            IslrConceptView,
            PaginatedPurchase,

            BankAccount,
            BankTransaction,
            TxKind,
            CreateBankAccount,
            CreateBankTransaction,
            CreateTransfer,
            TransferResult,
            VendorPaymentFile,
            PaginatedBankTransaction,

            PeriodQuery,
            BookFormat,
            BookCompany,
            SalesBook,
            SalesBookRow,
            SalesBookTotals,
            PurchaseBook,
            PurchaseBookRow,
            PurchaseBookTotals
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness check"),
        (name = "Auth", description = "Login, token rotation and user registration"),
        (name = "Employee", description = "Employee records"),
        (name = "Contract", description = "Employment contracts"),
        (name = "Payroll", description = "Payroll runs and salary bank files"),
        (name = "Benefits", description = "Prestaciones sociales and utilidades"),
        (name = "Termination", description = "Liquidación on termination"),
        (name = "Exchange rates", description = "BCV reference rates and conversion"),
        (name = "Inventory", description = "Products and stock moves"),
        (name = "Sales", description = "Orders and invoices with IVA and IGTF"),
        (name = "Purchases", description = "Supplier invoices and withholdings"),
        (name = "Treasury", description = "Bank accounts, transfers and vendor payments"),
        (name = "Fiscal", description = "Books and SENIAT/BANAVIH files"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_bearer_scheme_and_routes() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
        assert!(doc.paths.paths.contains_key("/api/v1/payroll/runs"));
        assert!(doc.paths.paths.contains_key("/api/v1/fiscal/islr-retentions"));
    }
}
