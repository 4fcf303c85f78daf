//! Google Sheets v4 `spreadsheets.values` adapter.

use std::time::Duration;

use async_trait::async_trait;
use outreach_core::config::SheetsConfig;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{StatusCode, Url};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::store::{RangeUpdate, Row, RowStore, RowStoreError};

const VALUE_INPUT_OPTION: &str = "USER_ENTERED";

#[derive(Clone, Debug)]
pub struct GoogleSheetsRowStore {
    client: reqwest::Client,
    base_url: String,
    spreadsheet_id: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Serialize)]
struct ValueRangeBody<'a> {
    range: &'a str,
    values: &'a [Row],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchUpdateBody<'a> {
    value_input_option: &'static str,
    data: Vec<ValueRangeBody<'a>>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

impl GoogleSheetsRowStore {
    pub fn new(config: &SheetsConfig) -> Result<Self, RowStoreError> {
        let mut headers = HeaderMap::new();
        let bearer = format!("Bearer {}", config.access_token.expose_secret());
        let mut authorization = HeaderValue::from_str(&bearer).map_err(|error| {
            RowStoreError::Transport(format!("invalid access token header value: {error}"))
        })?;
        authorization.set_sensitive(true);
        headers.insert(AUTHORIZATION, authorization);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| {
                RowStoreError::Transport(format!("failed to build HTTP client: {error}"))
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            spreadsheet_id: config.spreadsheet_id.clone(),
        })
    }

    fn values_url(&self, range: &str) -> Result<Url, RowStoreError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|error| RowStoreError::Transport(format!("invalid base url: {error}")))?;
        url.path_segments_mut()
            .map_err(|_| RowStoreError::Transport("base url cannot carry a path".to_owned()))?
            .extend(["v4", "spreadsheets", self.spreadsheet_id.as_str(), "values", range]);
        Ok(url)
    }

    fn batch_url(&self) -> String {
        format!("{}/v4/spreadsheets/{}/values:batchUpdate", self.base_url, self.spreadsheet_id)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, RowStoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorResponse>(&body)
        .map(|parsed| parsed.error.message)
        .unwrap_or(body);
    Err(RowStoreError::Http { status: status.as_u16(), message: describe(status, message) })
}

fn describe(status: StatusCode, message: String) -> String {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            format!("{message} (check sheets.access_token and sheet sharing)")
        }
        _ => message,
    }
}

fn cell_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl RowStore for GoogleSheetsRowStore {
    async fn read_range(&self, range: &str) -> Result<Vec<Row>, RowStoreError> {
        let url = self.values_url(range)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|error| RowStoreError::Transport(error.to_string()))?;
        let response = check_status(response).await?;
        let body: ValueRange =
            response.json().await.map_err(|error| RowStoreError::Decode(error.to_string()))?;

        debug!(range, rows = body.values.len(), "sheet range read");
        Ok(body.values.into_iter().map(|row| row.into_iter().map(cell_text).collect()).collect())
    }

    async fn write_range(&self, range: &str, values: Vec<Row>) -> Result<(), RowStoreError> {
        let url = self.values_url(range)?;
        let response = self
            .client
            .put(url)
            .query(&[("valueInputOption", VALUE_INPUT_OPTION)])
            .json(&ValueRangeBody { range, values: &values })
            .send()
            .await
            .map_err(|error| RowStoreError::Transport(error.to_string()))?;
        check_status(response).await?;

        debug!(range, rows = values.len(), "sheet range written");
        Ok(())
    }

    async fn batch_write(&self, updates: Vec<RangeUpdate>) -> Result<(), RowStoreError> {
        let body = BatchUpdateBody {
            value_input_option: VALUE_INPUT_OPTION,
            data: updates
                .iter()
                .map(|update| ValueRangeBody { range: &update.range, values: &update.values })
                .collect(),
        };
        let response = self
            .client
            .post(self.batch_url())
            .json(&body)
            .send()
            .await
            .map_err(|error| RowStoreError::Transport(error.to_string()))?;
        check_status(response).await?;

        debug!(ranges = updates.len(), "sheet ranges batch written");
        Ok(())
    }
}
