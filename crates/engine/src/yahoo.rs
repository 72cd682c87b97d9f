use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use common::{Bar, Error, MarketDataProvider, ProviderQuote, Result};

/// Market-data provider backed by the Yahoo Finance v8 chart endpoint.
pub struct YahooChartClient {
    base_url: Url,
    range: String,
    interval: String,
    request_timeout: Duration,
    http: Client,
}

impl YahooChartClient {
    pub fn new(
        base_url: &str,
        range: impl Into<String>,
        interval: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::Config(format!("invalid market data URL '{base_url}': {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Config(format!("market data URL '{base_url}' cannot be a base")));
        }
        let http = Client::builder()
            .use_rustls_tls()
            .timeout(request_timeout)
            .user_agent("volscan/0.1")
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            base_url,
            range: range.into(),
            interval: interval.into(),
            request_timeout,
            http,
        })
    }

    fn chart_url(&self, symbol: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["v8", "finance", "chart", symbol]);
        }
        url.query_pairs_mut()
            .append_pair("range", &self.range)
            .append_pair("interval", &self.interval);
        url
    }

    fn transport_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::Timeout(self.request_timeout)
        } else {
            Error::Http(e.to_string())
        }
    }
}

#[async_trait]
impl MarketDataProvider for YahooChartClient {
    async fn fetch(&self, symbol: &str) -> Result<ProviderQuote> {
        let url = self.chart_url(symbol);
        debug!(symbol = %symbol, url = %url, "Requesting chart");

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(Error::Http(format!("HTTP {status} for {symbol}")));
        }

        let envelope: ChartEnvelope = serde_json::from_str(&body)
            .map_err(|e| Error::MalformedPayload(format!("{symbol}: {e}")))?;
        parse_chart(symbol, envelope.chart)
    }
}

// ─── Response types ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    regular_market_price: Option<f64>,
}

#[derive(Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<QuoteSeries>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct QuoteSeries {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<f64>>,
}

fn parse_chart(symbol: &str, chart: Chart) -> Result<ProviderQuote> {
    if let Some(err) = chart.error {
        return Err(Error::Provider {
            symbol: symbol.to_string(),
            reason: format!("{}: {}", err.code, err.description),
        });
    }
    let result = chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| Error::Provider {
            symbol: symbol.to_string(),
            reason: "empty chart result".into(),
        })?;

    let series = result.indicators.quote.into_iter().next().unwrap_or_default();
    let bars: Vec<Bar> = result
        .timestamp
        .iter()
        .enumerate()
        .filter_map(|(i, &ts)| {
            let field = |v: &Vec<Option<f64>>| v.get(i).copied().flatten();
            Some(Bar {
                timestamp: DateTime::<Utc>::from_timestamp(ts, 0)?,
                open: field(&series.open)?,
                high: field(&series.high)?,
                low: field(&series.low)?,
                close: field(&series.close)?,
                volume: field(&series.volume).unwrap_or(0.0),
            })
        })
        .collect();

    let price = result
        .meta
        .regular_market_price
        .or_else(|| bars.last().map(|b| b.close))
        .unwrap_or(0.0);
    if !price.is_finite() || price <= 0.0 {
        return Err(Error::Provider {
            symbol: symbol.to_string(),
            reason: format!("non-positive price {price}"),
        });
    }

    Ok(ProviderQuote {
        symbol: symbol.to_string(),
        price,
        bars,
        implied_volatility: None,
    })
}
