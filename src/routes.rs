use crate::{
    api::{
        benefit, contract, employee, exchange_rate, fiscal, health, inventory, invoice, order,
        payroll, purchase, termination, treasury,
    },
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfig, GovernorConfigBuilder, PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use anyhow::{Context, Result};

type LimiterConfig = GovernorConfig<PeerIpKeyExtractor, NoOpMiddleware>;

/// Per-route limiter settings, built once so every worker shares the same buckets.
#[derive(Clone)]
pub struct Limiters {
    login: LimiterConfig,
    refresh: LimiterConfig,
    protected: LimiterConfig,
}

fn build_limiter(name: &str, requests_per_min: u32) -> Result<LimiterConfig> {
    let burst = requests_per_min.max(1);
    GovernorConfigBuilder::default()
        .milliseconds_per_request((60_000 / u64::from(burst)).max(1))
        .burst_size(burst)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .with_context(|| format!("invalid {name} rate limit: {requests_per_min}/min"))
}

impl Limiters {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            login: build_limiter("login", config.rate_login_per_min)?,
            refresh: build_limiter("refresh", config.rate_refresh_per_min)?,
            protected: build_limiter("protected", config.rate_protected_per_min)?,
        })
    }
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config, limiters: &Limiters) {
    cfg.service(web::resource("/health").route(web::get().to(health::health)));

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(Governor::new(&limiters.login))
                    .route(web::post().to(handlers::login)),
            )
            .service(
                // admin-only, checked by the handler
                web::resource("/register")
                    .wrap(Governor::new(&limiters.login))
                    .route(web::post().to(handlers::register)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(Governor::new(&limiters.refresh))
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(Governor::new(&limiters.refresh))
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware))
            .wrap(Governor::new(&limiters.protected))
            .service(web::resource("/me").route(web::get().to(handlers::me)))
            .service(
                web::scope("/employees")
                    .service(
                        web::resource("")
                            .route(web::post().to(employee::create_employee))
                            .route(web::get().to(employee::list_employees)),
                    )
                    .service(
                        web::resource("/{employee_id}")
                            .route(web::get().to(employee::get_employee))
                            .route(web::put().to(employee::update_employee))
                            .route(web::delete().to(employee::delete_employee)),
                    )
                    .service(
                        web::resource("/{employee_id}/contracts")
                            .route(web::post().to(contract::create_contract))
                            .route(web::get().to(contract::list_contracts)),
                    ),
            )
            .service(
                web::scope("/contracts")
                    .service(web::resource("/{contract_id}").route(web::get().to(contract::get_contract)))
                    .service(
                        web::resource("/{contract_id}/end").route(web::put().to(contract::end_contract)),
                    ),
            )
            .service(
                web::scope("/payroll/runs")
                    .service(
                        web::resource("")
                            .route(web::post().to(payroll::create_run))
                            .route(web::get().to(payroll::list_runs)),
                    )
                    .service(
                        web::resource("/{run_id}")
                            .route(web::get().to(payroll::get_run))
                            .route(web::delete().to(payroll::delete_run)),
                    )
                    .service(web::resource("/{run_id}/approve").route(web::put().to(payroll::approve_run)))
                    .service(web::resource("/{run_id}/pay").route(web::put().to(payroll::pay_run)))
                    .service(
                        web::resource("/{run_id}/bank-file").route(web::get().to(payroll::bank_file)),
                    ),
            )
            .service(
                web::scope("/benefits")
                    // literal segments before /{employee_id}
                    .service(web::resource("/accrue").route(web::post().to(benefit::accrue)))
                    .service(
                        web::resource("/utilidades").route(web::get().to(benefit::utilidades_preview)),
                    )
                    .service(web::resource("/{employee_id}").route(web::get().to(benefit::statement)))
                    .service(
                        web::resource("/{employee_id}/advance").route(web::post().to(benefit::advance)),
                    ),
            )
            .service(
                web::scope("/terminations")
                    .service(web::resource("").route(web::post().to(termination::create_termination)))
                    .service(web::resource("/preview").route(web::post().to(termination::preview)))
                    .service(
                        web::resource("/{termination_id}")
                            .route(web::get().to(termination::get_termination)),
                    ),
            )
            .service(
                web::scope("/exchange-rates")
                    .service(
                        web::resource("")
                            .route(web::post().to(exchange_rate::create_rate))
                            .route(web::get().to(exchange_rate::list_rates)),
                    )
                    .service(
                        web::resource("/convert").route(web::get().to(exchange_rate::convert_amount)),
                    )
                    .service(
                        web::resource("/latest/{currency}")
                            .route(web::get().to(exchange_rate::latest_rate)),
                    ),
            )
            .service(
                web::scope("/products")
                    .service(
                        web::resource("")
                            .route(web::post().to(inventory::create_product))
                            .route(web::get().to(inventory::list_products)),
                    )
                    .service(
                        web::resource("/{product_id}")
                            .route(web::get().to(inventory::get_product))
                            .route(web::put().to(inventory::update_product)),
                    ),
            )
            .service(
                web::scope("/inventory")
                    .service(
                        web::resource("/moves")
                            .route(web::post().to(inventory::create_move))
                            .route(web::get().to(inventory::list_moves)),
                    )
                    .service(web::resource("/stock").route(web::get().to(inventory::stock)))
                    .service(web::resource("/low-stock").route(web::get().to(inventory::low_stock))),
            )
            .service(
                web::scope("/orders")
                    .service(
                        web::resource("")
                            .route(web::post().to(order::create_order))
                            .route(web::get().to(order::list_orders)),
                    )
                    .service(web::resource("/{order_id}").route(web::get().to(order::get_order)))
                    .service(web::resource("/{order_id}/confirm").route(web::put().to(order::confirm_order)))
                    .service(web::resource("/{order_id}/cancel").route(web::put().to(order::cancel_order)))
                    .service(
                        web::resource("/{order_id}/invoice").route(web::post().to(invoice::invoice_order)),
                    ),
            )
            .service(
                web::scope("/invoices")
                    .service(
                        web::resource("")
                            .route(web::post().to(invoice::create_invoice))
                            .route(web::get().to(invoice::list_invoices)),
                    )
                    .service(web::resource("/{invoice_id}").route(web::get().to(invoice::get_invoice)))
                    .service(
                        web::resource("/{invoice_id}/void").route(web::put().to(invoice::void_invoice)),
                    ),
            )
            .service(
                web::scope("/purchases")
                    .service(
                        web::resource("")
                            .route(web::post().to(purchase::create_purchase))
                            .route(web::get().to(purchase::list_purchases)),
                    )
                    .service(
                        web::resource("/islr-concepts").route(web::get().to(purchase::islr_concepts)),
                    )
                    .service(web::resource("/{purchase_id}").route(web::get().to(purchase::get_purchase)))
                    .service(
                        web::resource("/{purchase_id}/paid").route(web::put().to(purchase::mark_paid)),
                    ),
            )
            .service(
                web::scope("/treasury")
                    .service(
                        web::resource("/accounts")
                            .route(web::post().to(treasury::create_account))
                            .route(web::get().to(treasury::list_accounts)),
                    )
                    .service(
                        web::resource("/accounts/{account_id}").route(web::get().to(treasury::get_account)),
                    )
                    .service(
                        web::resource("/accounts/{account_id}/transactions")
                            .route(web::post().to(treasury::create_transaction))
                            .route(web::get().to(treasury::list_transactions)),
                    )
                    .service(web::resource("/transfers").route(web::post().to(treasury::transfer)))
                    .service(
                        web::resource("/vendor-payments/bank-file")
                            .route(web::post().to(treasury::vendor_bank_file)),
                    ),
            )
            .service(
                web::scope("/fiscal")
                    .service(web::resource("/sales-book").route(web::get().to(fiscal::sales_book_report)))
                    .service(
                        web::resource("/purchase-book").route(web::get().to(fiscal::purchase_book_report)),
                    )
                    .service(web::resource("/iva-retentions").route(web::get().to(fiscal::iva_retentions)))
                    .service(web::resource("/islr-retentions").route(web::get().to(fiscal::islr_retentions)))
                    .service(web::resource("/faov").route(web::get().to(fiscal::faov))),
            ),
    );
}

// LOGIN
//  ├─ access_token (15 min)
//  └─ refresh_token (7 days)

// API REQUEST
//  └─ Authorization: Bearer access_token

// ACCESS EXPIRED
//  └─ POST /refresh with refresh_token
//       └─ returns new access_token

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limiter_accepts_zero_and_large_rates() {
        assert!(build_limiter("login", 0).is_ok());
        assert!(build_limiter("protected", 120_000).is_ok());
    }
}
