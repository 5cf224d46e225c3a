use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{MySql, MySqlPool, QueryBuilder, Transaction};
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};

use super::purchase::PURCHASE_COLUMNS;
use super::{bank_file_response, db_error, stored, today};
use crate::auth::auth::AuthUser;
use crate::bank::{Payment, PaymentBatch, format_for, is_bank_account};
use crate::config::Config;
use crate::domain::currency::Currency;
use crate::error::{AppError, AppResult};
use crate::model::bank_account::{BankAccount, BankTransaction, TxKind};
use crate::model::purchase::Purchase;
use crate::model::role::Role;
use crate::utils::db_utils::{Filters, SqlValue};
use crate::utils::pagination::Page;

const ACCOUNT_SELECT: &str = r#"
    SELECT a.id, a.bank_code, a.bank_name, a.account_number, a.currency, a.holder, a.opening_balance,
           a.opening_balance + COALESCE(SUM(
               CASE WHEN t.kind IN ('deposito', 'transferencia_entrada') THEN t.amount ELSE -t.amount END
           ), 0) AS balance
    FROM bank_accounts a
    LEFT JOIN bank_transactions t ON t.account_id = a.id
"#;

const TX_COLUMNS: &str = "id, account_id, tx_date, kind, amount, reference, description";

#[derive(Deserialize, ToSchema)]
pub struct CreateBankAccount {
    #[schema(example = "0134")]
    pub bank_code: String,
    #[schema(example = "Banesco")]
    pub bank_name: String,
    #[schema(example = "01340000000000000001")]
    pub account_number: String,
    pub currency: Currency,
    #[schema(example = "Comercial Ejemplo C.A.")]
    pub holder: String,
    #[serde(default)]
    #[schema(example = "0", value_type = String)]
    pub opening_balance: Decimal,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateBankTransaction {
    /// deposito or retiro; transfers go through `/treasury/transfers`
    pub kind: TxKind,
    #[schema(example = "250.00", value_type = String)]
    pub amount: Decimal,
    /// Defaults to today
    #[schema(value_type = Option<String>, format = "date")]
    pub tx_date: Option<NaiveDate>,
    pub reference: Option<String>,
    pub description: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateTransfer {
    pub from_account_id: u64,
    pub to_account_id: u64,
    #[schema(example = "1000.00", value_type = String)]
    pub amount: Decimal,
    #[schema(value_type = Option<String>, format = "date")]
    pub tx_date: Option<NaiveDate>,
    pub reference: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct TransferResult {
    pub outgoing: BankTransaction,
    pub incoming: BankTransaction,
}

#[derive(Deserialize, IntoParams)]
pub struct TransactionQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    #[param(value_type = Option<String>, format = "date")]
    pub from: Option<NaiveDate>,
    #[param(value_type = Option<String>, format = "date")]
    pub to: Option<NaiveDate>,
}

#[derive(Deserialize, ToSchema)]
pub struct VendorPaymentFile {
    #[schema(example = "0134")]
    pub bank: String,
    #[schema(example = "01340000000000000001")]
    pub debit_account: String,
    pub purchase_ids: Vec<u64>,
}

async fn fetch_account(pool: &MySqlPool, account_id: u64) -> AppResult<BankAccount> {
    sqlx::query_as::<_, BankAccount>(&format!("{ACCOUNT_SELECT} WHERE a.id = ? GROUP BY a.id"))
        .bind(account_id)
        .fetch_optional(pool)
        .await
        .map_err(db_error("fetch bank account"))?
        .ok_or_else(|| AppError::not_found("Bank account"))
}

/// Locks the account row and returns its currency and current balance.
async fn locked_balance(
    tx: &mut Transaction<'_, MySql>,
    account_id: u64,
) -> AppResult<(Currency, Decimal)> {
    let (currency, opening): (String, Decimal) =
        sqlx::query_as("SELECT currency, opening_balance FROM bank_accounts WHERE id = ? FOR UPDATE")
            .bind(account_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(db_error("lock bank account"))?
            .ok_or_else(|| AppError::not_found(&format!("Bank account {account_id}")))?;

    let (movement,): (Decimal,) = sqlx::query_as(
        r#"
        SELECT COALESCE(SUM(
            CASE WHEN kind IN ('deposito', 'transferencia_entrada') THEN amount ELSE -amount END
        ), 0)
        FROM bank_transactions WHERE account_id = ?
        "#,
    )
    .bind(account_id)
    .fetch_one(&mut **tx)
    .await
    .map_err(db_error("sum bank transactions"))?;

    Ok((stored(&currency, "bank_accounts.currency")?, opening + movement))
}

async fn insert_transaction(
    tx: &mut Transaction<'_, MySql>,
    account_id: u64,
    kind: TxKind,
    amount: Decimal,
    tx_date: NaiveDate,
    reference: Option<&str>,
    description: Option<&str>,
) -> AppResult<BankTransaction> {
    let id = sqlx::query(
        r#"
        INSERT INTO bank_transactions (account_id, tx_date, kind, amount, reference, description)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(account_id)
    .bind(tx_date)
    .bind(kind.as_ref())
    .bind(amount)
    .bind(reference)
    .bind(description)
    .execute(&mut **tx)
    .await
    .map_err(db_error("insert bank transaction"))?
    .last_insert_id();

    Ok(BankTransaction {
        id,
        account_id,
        tx_date,
        kind: kind.to_string(),
        amount,
        reference: reference.map(str::to_string),
        description: description.map(str::to_string),
    })
}

#[utoipa::path(
    post,
    path = "/api/v1/treasury/accounts",
    request_body = CreateBankAccount,
    responses(
        (status = 201, body = BankAccount),
        (status = 409, description = "Account number already registered"),
        (status = 422, description = "Account does not match the bank code")
    ),
    tag = "Treasury",
    security(("bearer_auth" = []))
)]
pub async fn create_account(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateBankAccount>,
) -> Result<HttpResponse, AppError> {
    auth.require_any(&[Role::Finanzas])?;

    let bank_code = payload.bank_code.trim();
    let account_number = payload.account_number.trim();
    if !is_bank_account(account_number, bank_code) {
        return Err(AppError::Validation(
            "account_number must have 20 digits and start with bank_code".into(),
        ));
    }
    if payload.bank_name.trim().is_empty() || payload.holder.trim().is_empty() {
        return Err(AppError::BadRequest("bank_name and holder are required".into()));
    }
    if payload.opening_balance < Decimal::ZERO {
        return Err(AppError::Validation("opening_balance must not be negative".into()));
    }

    let account_id = sqlx::query(
        r#"
        INSERT INTO bank_accounts (bank_code, bank_name, account_number, currency, holder, opening_balance)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(bank_code)
    .bind(payload.bank_name.trim())
    .bind(account_number)
    .bind(payload.currency.as_ref())
    .bind(payload.holder.trim())
    .bind(payload.opening_balance)
    .execute(pool.get_ref())
    .await
    .map_err(|e| AppError::from_insert(e, "Account number already registered"))?
    .last_insert_id();

    info!(account_id, bank_code, currency = %payload.currency, "Bank account created");
    Ok(HttpResponse::Created().json(fetch_account(pool.get_ref(), account_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/treasury/accounts",
    responses((status = 200, body = [BankAccount])),
    tag = "Treasury",
    security(("bearer_auth" = []))
)]
pub async fn list_accounts(auth: AuthUser, pool: web::Data<MySqlPool>) -> Result<HttpResponse, AppError> {
    auth.require_any(&[Role::Finanzas])?;
    let accounts = sqlx::query_as::<_, BankAccount>(&format!(
        "{ACCOUNT_SELECT} GROUP BY a.id ORDER BY a.bank_code, a.account_number"
    ))
    .fetch_all(pool.get_ref())
    .await
    .map_err(db_error("list bank accounts"))?;
    Ok(HttpResponse::Ok().json(accounts))
}

#[utoipa::path(
    get,
    path = "/api/v1/treasury/accounts/{account_id}",
    params(("account_id", Path, description = "Bank account ID")),
    responses((status = 200, body = BankAccount), (status = 404, description = "Not found")),
    tag = "Treasury",
    security(("bearer_auth" = []))
)]
pub async fn get_account(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_any(&[Role::Finanzas])?;
    Ok(HttpResponse::Ok().json(fetch_account(pool.get_ref(), path.into_inner()).await?))
}

/// Register a deposit or withdrawal
#[utoipa::path(
    post,
    path = "/api/v1/treasury/accounts/{account_id}/transactions",
    params(("account_id", Path, description = "Bank account ID")),
    request_body = CreateBankTransaction,
    responses(
        (status = 201, body = BankTransaction),
        (status = 404, description = "Not found"),
        (status = 422, description = "Non-positive amount, transfer kind, or insufficient balance")
    ),
    tag = "Treasury",
    security(("bearer_auth" = []))
)]
pub async fn create_transaction(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<CreateBankTransaction>,
) -> Result<HttpResponse, AppError> {
    auth.require_any(&[Role::Finanzas])?;
    let account_id = path.into_inner();

    if payload.amount <= Decimal::ZERO {
        return Err(AppError::Validation("amount must be positive".into()));
    }
    if !matches!(payload.kind, TxKind::Deposito | TxKind::Retiro) {
        return Err(AppError::Validation(
            "Use /treasury/transfers to move money between accounts".into(),
        ));
    }

    let mut tx = pool.begin().await.map_err(db_error("begin bank transaction"))?;
    let (_, balance) = locked_balance(&mut tx, account_id).await?;
    if !payload.kind.is_inflow() && balance < payload.amount {
        return Err(AppError::Validation(format!(
            "Insufficient balance: {balance} available"
        )));
    }

    let created = insert_transaction(
        &mut tx,
        account_id,
        payload.kind,
        payload.amount,
        payload.tx_date.unwrap_or_else(today),
        payload.reference.as_deref(),
        payload.description.as_deref(),
    )
    .await?;
    tx.commit().await.map_err(db_error("commit bank transaction"))?;

    info!(account_id, tx_id = created.id, kind = %payload.kind, amount = %payload.amount, "Bank transaction registered");
    Ok(HttpResponse::Created().json(created))
}

#[utoipa::path(
    get,
    path = "/api/v1/treasury/accounts/{account_id}/transactions",
    params(("account_id", Path, description = "Bank account ID"), TransactionQuery),
    responses((status = 200, body = PaginatedBankTransaction)),
    tag = "Treasury",
    security(("bearer_auth" = []))
)]
pub async fn list_transactions(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    query: web::Query<TransactionQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require_any(&[Role::Finanzas])?;
    let account_id = path.into_inner();
    let page = Page::new(query.page, query.per_page);

    let mut filters = Filters::default();
    filters.add("account_id = ?", vec![SqlValue::U64(account_id)]);
    if let Some(from) = query.from {
        filters.add("tx_date >= ?", vec![SqlValue::Date(from)]);
    }
    if let Some(to) = query.to {
        filters.add("tx_date <= ?", vec![SqlValue::Date(to)]);
    }

    let mut count = QueryBuilder::<MySql>::new("SELECT COUNT(*) FROM bank_transactions");
    filters.write_where(&mut count);
    let total: i64 = count
        .build_query_scalar()
        .fetch_one(pool.get_ref())
        .await
        .map_err(db_error("count bank transactions"))?;

    let mut select = QueryBuilder::<MySql>::new(format!("SELECT {TX_COLUMNS} FROM bank_transactions"));
    filters.write_where(&mut select);
    select
        .push(" ORDER BY tx_date DESC, id DESC LIMIT ")
        .push_bind(page.limit())
        .push(" OFFSET ")
        .push_bind(page.offset());

    let transactions = select
        .build_query_as::<BankTransaction>()
        .fetch_all(pool.get_ref())
        .await
        .map_err(db_error("list bank transactions"))?;

    Ok(HttpResponse::Ok().json(page.wrap(transactions, total)))
}

/// Move money between two own accounts of the same currency
#[utoipa::path(
    post,
    path = "/api/v1/treasury/transfers",
    request_body = CreateTransfer,
    responses(
        (status = 201, body = TransferResult),
        (status = 404, description = "Not found"),
        (status = 422, description = "Same account, currency mismatch or insufficient balance")
    ),
    tag = "Treasury",
    security(("bearer_auth" = []))
)]
pub async fn transfer(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateTransfer>,
) -> Result<HttpResponse, AppError> {
    auth.require_any(&[Role::Finanzas])?;

    if payload.amount <= Decimal::ZERO {
        return Err(AppError::Validation("amount must be positive".into()));
    }
    if payload.from_account_id == payload.to_account_id {
        return Err(AppError::Validation("Source and target accounts must differ".into()));
    }

    let mut tx = pool.begin().await.map_err(db_error("begin transfer"))?;

    // Lock in id order so concurrent opposite transfers cannot deadlock.
    let (first, second) = if payload.from_account_id < payload.to_account_id {
        (payload.from_account_id, payload.to_account_id)
    } else {
        (payload.to_account_id, payload.from_account_id)
    };
    let first_state = locked_balance(&mut tx, first).await?;
    let second_state = locked_balance(&mut tx, second).await?;
    let ((from_currency, from_balance), (to_currency, _)) = if first == payload.from_account_id {
        (first_state, second_state)
    } else {
        (second_state, first_state)
    };

    if from_currency != to_currency {
        return Err(AppError::Validation(format!(
            "Cannot transfer between {from_currency} and {to_currency} accounts"
        )));
    }
    if from_balance < payload.amount {
        return Err(AppError::Validation(format!(
            "Insufficient balance: {from_balance} available"
        )));
    }

    let tx_date = payload.tx_date.unwrap_or_else(today);
    let reference = payload.reference.as_deref();
    let outgoing_note = format!("Transferencia a cuenta {}", payload.to_account_id);
    let incoming_note = format!("Transferencia desde cuenta {}", payload.from_account_id);
    let outgoing = insert_transaction(
        &mut tx,
        payload.from_account_id,
        TxKind::TransferenciaSalida,
        payload.amount,
        tx_date,
        reference,
        Some(outgoing_note.as_str()),
    )
    .await?;
    let incoming = insert_transaction(
        &mut tx,
        payload.to_account_id,
        TxKind::TransferenciaEntrada,
        payload.amount,
        tx_date,
        reference,
        Some(incoming_note.as_str()),
    )
    .await?;

    tx.commit().await.map_err(db_error("commit transfer"))?;

    info!(
        from = payload.from_account_id,
        to = payload.to_account_id,
        amount = %payload.amount,
        "Transfer registered"
    );
    Ok(HttpResponse::Created().json(TransferResult { outgoing, incoming }))
}

/// Bank file paying supplier invoices net of retentions
#[utoipa::path(
    post,
    path = "/api/v1/treasury/vendor-payments/bank-file",
    request_body = VendorPaymentFile,
    responses(
        (status = 200, description = "Bank file; skipped purchase ids in X-Skipped-Purchases", content_type = "text/plain", body = String),
        (status = 400, description = "Unknown bank"),
        (status = 422, description = "Nothing payable or invalid debit account")
    ),
    tag = "Treasury",
    security(("bearer_auth" = []))
)]
pub async fn vendor_bank_file(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<VendorPaymentFile>,
) -> Result<HttpResponse, AppError> {
    auth.require_any(&[Role::Finanzas])?;
    let format = format_for(payload.bank.trim())?;

    if payload.purchase_ids.is_empty() {
        return Err(AppError::Validation("purchase_ids must not be empty".into()));
    }

    let mut select = QueryBuilder::<MySql>::new(format!(
        "SELECT {PURCHASE_COLUMNS} FROM purchases WHERE id IN ("
    ));
    let mut ids = select.separated(", ");
    for id in &payload.purchase_ids {
        ids.push_bind(*id);
    }
    select.push(") ORDER BY id");

    let purchases = select
        .build_query_as::<Purchase>()
        .fetch_all(pool.get_ref())
        .await
        .map_err(db_error("fetch purchases to pay"))?;

    if let Some(missing) = payload
        .purchase_ids
        .iter()
        .find(|id| !purchases.iter().any(|p| p.id == **id))
    {
        return Err(AppError::not_found(&format!("Purchase {missing}")));
    }

    let mut payments = Vec::with_capacity(purchases.len());
    let mut skipped = Vec::new();
    for purchase in &purchases {
        let payable = purchase.payable();
        match &purchase.supplier_account {
            Some(account)
                if !purchase.paid
                    && purchase.supplier_bank_code.as_deref() == Some(format.bank_code())
                    && payable > Decimal::ZERO =>
            {
                payments.push(Payment {
                    beneficiary_id: purchase.supplier_rif.clone(),
                    name: purchase.supplier_name.clone(),
                    account: account.clone(),
                    amount: payable,
                });
            }
            _ => skipped.push(purchase.id),
        }
    }

    let batch = PaymentBatch {
        company_rif: config.company_rif.clone(),
        debit_account: payload.debit_account.trim().to_string(),
        value_date: today(),
        reference: format!("PROV-{}", today().format("%Y%m%d")),
        payments,
    };
    let content = format.render(&batch)?;
    let file_name = format.file_name(&batch);

    if !skipped.is_empty() {
        warn!(bank = format.bank_code(), skipped = ?skipped, "Purchases left out of bank file");
    }
    info!(
        bank = format.bank_code(),
        payments = batch.payments.len(),
        total = %batch.total(),
        "Vendor payment file generated"
    );

    Ok(bank_file_response(&file_name, content, "X-Skipped-Purchases", &skipped))
}
