//! Banco Central do Brasil PTAX client
//!
//! Queries the olinda odata endpoint for the daily USD/BRL quote pair. The
//! service returns an empty `value` array (or a 404) for days without a
//! quote, which the resolver treats as "try an earlier day".

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

use super::{RatePair, RateProvider};
use crate::error::{CalcError, Result};

const BASE_URL: &str = "https://olinda.bcb.gov.br/olinda/servico/PTAX/versao/v1/odata";

#[derive(Debug, Deserialize)]
struct PtaxResponse {
    value: Vec<PtaxQuote>,
}

#[derive(Debug, Deserialize)]
struct PtaxQuote {
    #[serde(rename = "cotacaoCompra")]
    buy: f64,
    #[serde(rename = "cotacaoVenda")]
    sell: f64,
}

/// HTTP client for the PTAX daily-quote service
pub struct BcbClient {
    client: Client,
    base_url: String,
}

impl BcbClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent("Mozilla/5.0 (compatible; CambioBot/1.0)")
            .build()?;
        Ok(Self {
            client,
            base_url: BASE_URL.to_string(),
        })
    }

    /// Point the client at a different endpoint root (test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn quote_url(&self, date: NaiveDate) -> String {
        // The odata endpoint expects the date as MM-dd-YYYY
        format!(
            "{}/CotacaoDolarDia(dataCotacao=@dataCotacao)?@dataCotacao='{}'&$format=json",
            self.base_url,
            date.format("%m-%d-%Y")
        )
    }
}

#[async_trait]
impl RateProvider for BcbClient {
    async fn fetch_daily(&self, date: NaiveDate) -> Result<Option<RatePair>> {
        let url = self.quote_url(date);
        debug!("Fetching PTAX quote: {}", url);

        let response = self.client.get(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(CalcError::RateServiceStatus(response.status()));
        }

        let data: PtaxResponse = response.json().await?;

        let Some(quote) = data.value.into_iter().next() else {
            return Ok(None);
        };

        let buy = Decimal::from_f64_retain(quote.buy).ok_or(CalcError::InvalidQuote(date))?;
        let sell = Decimal::from_f64_retain(quote.sell).ok_or(CalcError::InvalidQuote(date))?;

        Ok(Some(RatePair { buy, sell }))
    }
}
