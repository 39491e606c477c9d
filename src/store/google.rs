use super::{Grid, RangeWrite, SheetStore, ValueInputMode};
use crate::address::RangeSpec;
use crate::errors::StoreError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, Url};
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;

/// Google Sheets v4 over REST with a pre-issued bearer token.
#[derive(Debug, Clone)]
pub struct GoogleSheetsStore {
    base_url: Url,
    token: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

impl GoogleSheetsStore {
    pub fn new(base_url: &str, token: &str, timeout: Option<Duration>) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("invalid spreadsheet API base url '{base_url}'"))?;
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("failed to build HTTP client")?;
        Ok(Self {
            base_url,
            token: token.to_string(),
            client,
        })
    }

    /// `{base}/v4/spreadsheets/{id}{suffix}` followed by any extra path segments.
    fn url(&self, spreadsheet_id: &str, suffix: &str, extra: &[&str]) -> Result<Url, StoreError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| StoreError::rejected("spreadsheet API base url cannot be a base"))?;
            segments
                .pop_if_empty()
                .push("v4")
                .push("spreadsheets")
                .push(&format!("{spreadsheet_id}{suffix}"));
            for segment in extra {
                segments.push(segment);
            }
        }
        Ok(url)
    }

    /// Raw cell values: number formats such as `$1,000.00` would not survive being
    /// pasted into formula text. Dates stay formatted.
    fn read_request(&self, spreadsheet_id: &str, range: &RangeSpec) -> Result<RequestBuilder, StoreError> {
        let url = self.url(spreadsheet_id, "", &["values", &range.to_string()])?;
        Ok(self.client.get(url).query(&[
            ("valueRenderOption", "UNFORMATTED_VALUE"),
            ("dateTimeRenderOption", "FORMATTED_STRING"),
        ]))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        let resp = request.bearer_auth(&self.token).send().await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::Api { status, body });
        }
        Ok(resp)
    }
}

#[async_trait]
impl SheetStore for GoogleSheetsStore {
    fn name(&self) -> &'static str {
        "google"
    }

    async fn list_sheet_names(&self, spreadsheet_id: &str) -> Result<Vec<String>, StoreError> {
        let url = self.url(spreadsheet_id, "", &[])?;
        let resp = self
            .send(
                self.client
                    .get(url)
                    .query(&[("fields", "sheets.properties.title")]),
            )
            .await?;
        let meta: SpreadsheetMeta = resp
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        Ok(meta
            .sheets
            .into_iter()
            .map(|entry| entry.properties.title)
            .collect())
    }

    async fn create_sheet(&self, spreadsheet_id: &str, title: &str) -> Result<(), StoreError> {
        let url = self.url(spreadsheet_id, ":batchUpdate", &[])?;
        let body = json!({
            "requests": [{ "addSheet": { "properties": { "title": title } } }]
        });
        self.send(self.client.post(url).json(&body)).await?;
        Ok(())
    }

    async fn read_range(&self, spreadsheet_id: &str, range: &RangeSpec) -> Result<Grid, StoreError> {
        let resp = self.send(self.read_request(spreadsheet_id, range)?).await?;
        let value_range: ValueRange = resp
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        Ok(value_range
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect())
    }

    async fn write_range(
        &self,
        spreadsheet_id: &str,
        write: &RangeWrite,
        mode: ValueInputMode,
    ) -> Result<(), StoreError> {
        let range = write.range.to_string();
        let url = self.url(spreadsheet_id, "", &["values", &range])?;
        let body = json!({
            "range": range,
            "majorDimension": "ROWS",
            "values": write.values,
        });
        self.send(
            self.client
                .put(url)
                .query(&[("valueInputOption", mode.as_str())])
                .json(&body),
        )
        .await?;
        Ok(())
    }

    async fn batch_write(
        &self,
        spreadsheet_id: &str,
        writes: &[RangeWrite],
        mode: ValueInputMode,
    ) -> Result<(), StoreError> {
        let url = self.url(spreadsheet_id, "", &["values:batchUpdate"])?;
        let data: Vec<Value> = writes
            .iter()
            .map(|write| {
                json!({
                    "range": write.range.to_string(),
                    "majorDimension": "ROWS",
                    "values": write.values,
                })
            })
            .collect();
        let body = json!({ "valueInputOption": mode.as_str(), "data": data });
        self.send(self.client.post(url).json(&body)).await?;
        Ok(())
    }
}

fn cell_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_sheets_v4_urls() {
        let store = GoogleSheetsStore::new("https://sheets.googleapis.com", "t", None).unwrap();

        let meta = store.url("abc", "", &[]).unwrap();
        assert_eq!(meta.as_str(), "https://sheets.googleapis.com/v4/spreadsheets/abc");

        let batch = store.url("abc", ":batchUpdate", &[]).unwrap();
        assert_eq!(
            batch.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/abc:batchUpdate"
        );

        let range = RangeSpec::open_ended("2024-01-06", 2, 1, 8).to_string();
        let values = store.url("abc", "", &["values", &range]).unwrap();
        assert!(values.as_str().starts_with("https://sheets.googleapis.com/v4/spreadsheets/abc/values/"));
        assert!(values.as_str().ends_with("!A2:H"));
    }

    #[test]
    fn reads_ask_for_unformatted_values() {
        let store = GoogleSheetsStore::new("https://sheets.googleapis.com", "t", None).unwrap();
        let range = RangeSpec::open_ended("2024-01-06", 2, 1, 7);
        let request = store.read_request("abc", &range).unwrap().build().unwrap();

        let query: Vec<(String, String)> = request
            .url()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(query.contains(&("valueRenderOption".to_string(), "UNFORMATTED_VALUE".to_string())));
        assert!(query.contains(&("dateTimeRenderOption".to_string(), "FORMATTED_STRING".to_string())));
        assert_eq!(request.method(), reqwest::Method::GET);
        assert!(request.url().path().ends_with("!A2:G"));
    }

    #[test]
    fn stringifies_non_text_cells() {
        assert_eq!(cell_to_string(json!("x")), "x");
        assert_eq!(cell_to_string(json!(12.5)), "12.5");
        assert_eq!(cell_to_string(json!(true)), "true");
        assert_eq!(cell_to_string(Value::Null), "");
    }
}
