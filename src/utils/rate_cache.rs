use chrono::{Local, NaiveDate};
use moka::future::Cache;
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use sqlx::{MySql, MySqlPool, Transaction};
use std::time::Duration;

use crate::domain::currency::Currency;
use crate::model::exchange_rate::ExchangeRate;

/// Latest known rate per currency. Entries expire after ten minutes and are
/// dropped whenever a new rate for that currency is stored.
pub static LATEST_RATE_CACHE: Lazy<Cache<Currency, ExchangeRate>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(16)
        .time_to_live(Duration::from_secs(600))
        .build()
});

const RATE_ON_OR_BEFORE: &str = r#"
    SELECT id, currency, rate_date, rate, source
    FROM exchange_rates
    WHERE currency = ? AND rate_date <= ?
    ORDER BY rate_date DESC
    LIMIT 1
"#;

/// Most recent rate on or before `date`, straight from the database.
pub async fn rate_on(
    pool: &MySqlPool,
    currency: Currency,
    date: NaiveDate,
) -> Result<Option<ExchangeRate>, sqlx::Error> {
    sqlx::query_as::<_, ExchangeRate>(RATE_ON_OR_BEFORE)
        .bind(currency.as_ref())
        .bind(date)
        .fetch_optional(pool)
        .await
}

/// Same lookup inside a running transaction.
pub async fn rate_on_tx(
    tx: &mut Transaction<'_, MySql>,
    currency: Currency,
    date: NaiveDate,
) -> Result<Option<ExchangeRate>, sqlx::Error> {
    sqlx::query_as::<_, ExchangeRate>(RATE_ON_OR_BEFORE)
        .bind(currency.as_ref())
        .bind(date)
        .fetch_optional(&mut **tx)
        .await
}

/// Latest rate on or before today, served from the cache when possible.
pub async fn latest_rate(
    pool: &MySqlPool,
    currency: Currency,
) -> Result<Option<ExchangeRate>, sqlx::Error> {
    if let Some(rate) = LATEST_RATE_CACHE.get(&currency).await {
        return Ok(Some(rate));
    }

    let today = Local::now().date_naive();
    let rate = rate_on(pool, currency, today).await?;
    if let Some(rate) = &rate {
        LATEST_RATE_CACHE.insert(currency, rate.clone()).await;
    }
    Ok(rate)
}

/// VES per unit of `currency` on `date`; VES itself is always 1.
pub async fn ves_per_unit(
    pool: &MySqlPool,
    currency: Currency,
    date: NaiveDate,
) -> Result<Option<Decimal>, sqlx::Error> {
    if currency.is_local() {
        return Ok(Some(Decimal::ONE));
    }
    Ok(rate_on(pool, currency, date).await?.map(|r| r.rate))
}

pub async fn invalidate(currency: Currency) {
    LATEST_RATE_CACHE.invalidate(&currency).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn usd(rate: Decimal) -> ExchangeRate {
        ExchangeRate {
            id: 1,
            currency: "USD".into(),
            rate_date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            rate,
            source: "BCV".into(),
        }
    }

    #[actix_web::test]
    async fn invalidation_drops_cached_rate() {
        LATEST_RATE_CACHE.insert(Currency::Eur, usd(dec!(40))).await;
        assert_eq!(
            LATEST_RATE_CACHE.get(&Currency::Eur).await.map(|r| r.rate),
            Some(dec!(40))
        );

        invalidate(Currency::Eur).await;
        assert!(LATEST_RATE_CACHE.get(&Currency::Eur).await.is_none());
    }
}
