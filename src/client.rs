//! Solarman API client for fetching inverter telemetry.
//!
//! This module provides a client for the Solarman OpenAPI. The client
//! exchanges the account credentials for a bearer token once, at
//! construction, and reuses it for every `currentData` request.

use crate::config::Settings;
use crate::error::{Result, SolarmanError};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

const CURRENT_DATA_ENDPOINT: &str = "currentData";

/// Source of current inverter telemetry.
///
/// The scrape collector only depends on this trait, so tests can swap the
/// real client for an instrumented one.
pub trait TelemetrySource: Send + Sync + 'static {
    /// Fetch the current data snapshot for the given device serial number.
    fn current_data(&self, device_sn: &str) -> impl Future<Output = Result<CurrentData>> + Send;
}

/// Bearer token returned by the Solarman token endpoint.
#[derive(Clone, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("access_token", &"***REDACTED***")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "***REDACTED***"))
            .field("token_type", &self.token_type)
            .finish()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenRequest<'a> {
    app_secret: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CurrentDataRequest<'a> {
    device_sn: &'a str,
}

/// Solarman API client.
#[derive(Clone)]
pub struct SolarmanClient {
    client: Client,
    settings: Settings,
    token: AccessToken,
}

impl SolarmanClient {
    /// Create a new Solarman API client and authenticate it.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use solarman_exporter::client::SolarmanClient;
    /// use solarman_exporter::config::Settings;
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     let settings = Settings::load(None).unwrap();
    ///     let client = SolarmanClient::new(settings).await.unwrap();
    /// }
    /// ```
    pub async fn new(settings: Settings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()?;

        let token = Self::authenticate(&client, &settings).await?;

        Ok(Self {
            client,
            settings,
            token,
        })
    }

    /// Exchange the account credentials for an access token.
    ///
    /// Every failure here is reported as [`SolarmanError::Auth`]; there is no
    /// client without a token.
    pub async fn authenticate(client: &Client, settings: &Settings) -> Result<AccessToken> {
        let url = format!("{}/account/v1.0/token", settings.api_url);
        debug!("Requesting access token from: {}", url);

        let response = client
            .post(&url)
            .query(&[("appId", settings.app_id.as_str()), ("language", "en")])
            .json(&TokenRequest {
                app_secret: &settings.app_secret,
                email: &settings.email,
                password: &settings.password,
            })
            .send()
            .await
            .map_err(|e| SolarmanError::Auth(format!("token request failed: {}", e)))?;

        if response.status() != StatusCode::OK {
            warn!("Failed to get access token: {}", response.status());
            return Err(SolarmanError::Auth(format!(
                "token endpoint returned HTTP {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SolarmanError::Auth(format!("failed to read token response: {}", e)))?;

        serde_json::from_str::<AccessToken>(&body).map_err(|e| {
            SolarmanError::Auth(format!(
                "unexpected token response: {}. Body preview: {}",
                e,
                preview(&body)
            ))
        })
    }

    /// The token obtained at construction.
    pub fn token(&self) -> &AccessToken {
        &self.token
    }

    /// Get the current data snapshot of a device.
    pub async fn get_current_data(&self, device_sn: &str) -> Result<CurrentData> {
        let url = format!("{}/device/v1.0/currentData", self.settings.api_url);
        debug!("Fetching current data for {} from: {}", device_sn, url);

        let response = self
            .client
            .post(&url)
            .query(&[("appId", self.settings.app_id.as_str()), ("language", "en")])
            .bearer_auth(&self.token.access_token)
            .json(&CurrentDataRequest { device_sn })
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            warn!("Failed to get current data: {}", response.status());
            return Err(SolarmanError::Status {
                endpoint: CURRENT_DATA_ENDPOINT,
                status: response.status(),
            });
        }

        let body = response.text().await?;
        debug!("Raw current data response: {} bytes", body.len());

        let data: CurrentData = serde_json::from_str(&body).map_err(|e| {
            SolarmanError::ParseError(format!(
                "Failed to parse current data: {}. Body preview: {}",
                e,
                preview(&body)
            ))
        })?;

        if data.success == Some(false) {
            return Err(SolarmanError::Rejected {
                code: display_json(&data.code),
                msg: display_json(&data.msg),
            });
        }

        Ok(data)
    }
}

impl TelemetrySource for SolarmanClient {
    async fn current_data(&self, device_sn: &str) -> Result<CurrentData> {
        self.get_current_data(device_sn).await
    }
}

fn preview(body: &str) -> &str {
    let mut end = body.len().min(200);
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

fn display_json(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "none".to_string(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Current data snapshot of a single device.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentData {
    /// Whether the API considers the request successful
    #[serde(default)]
    pub success: Option<bool>,
    /// API status code (string or number depending on the endpoint)
    #[serde(default)]
    pub code: serde_json::Value,
    /// API status message
    #[serde(default)]
    pub msg: serde_json::Value,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub device_sn: Option<String>,
    #[serde(default)]
    pub device_id: Option<i64>,
    #[serde(default)]
    pub device_type: Option<String>,
    #[serde(default)]
    pub device_state: Option<i64>,
    /// Collection time (Unix epoch seconds)
    #[serde(default)]
    pub collection_time: Option<i64>,
    /// Readings, in the order the API returned them
    #[serde(default)]
    pub data_list: Vec<DataEntry>,
}

/// One reading in a current data snapshot.
///
/// Every field may be missing or `null`. The API sends `null` for values and
/// names it has no data for, and units of varying type.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DataEntry {
    /// Reading key, e.g. `APo_t1`
    #[serde(default, deserialize_with = "null_as_empty")]
    pub key: String,
    /// Reading value as sent by the API
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub unit: serde_json::Value,
    /// Human readable name
    #[serde(default)]
    pub name: Option<String>,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl CurrentData {
    /// Numeric value of the first reading with the given key.
    ///
    /// Returns `0.0` when the key is absent, its value is `null`, or the
    /// value does not parse as a float. The value is parsed as sent, so
    /// surrounding whitespace is a parse failure. Parse failures are logged
    /// but never surface as errors, so a single odd reading cannot fail the
    /// whole scrape.
    pub fn value(&self, key: &str) -> f64 {
        let Some(entry) = self.data_list.iter().find(|entry| entry.key == key) else {
            return 0.0;
        };

        let Some(raw) = entry.value.as_deref() else {
            debug!("Reading {} has no value", key);
            return 0.0;
        };

        match raw.parse::<f64>() {
            Ok(value) => value,
            Err(e) => {
                warn!(
                    "Reading {} has non-numeric value {:?}: {}",
                    key, raw, e
                );
                0.0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(entries: &[(&str, &str)]) -> CurrentData {
        CurrentData {
            data_list: entries
                .iter()
                .map(|(key, value)| DataEntry {
                    key: key.to_string(),
                    value: Some(value.to_string()),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_value_parses_matching_entry() {
        let data = snapshot(&[("Pr1", "5000.5"), ("APo_t1", "3200")]);
        assert_eq!(data.value("Pr1"), 5000.5);
        assert_eq!(data.value("APo_t1"), 3200.0);
    }

    #[test]
    fn test_value_defaults_to_zero_when_absent() {
        let data = snapshot(&[("Pr1", "5000.5")]);
        assert_eq!(data.value("Et_ge0"), 0.0);
        assert_eq!(CurrentData::default().value("Pr1"), 0.0);
    }

    #[test]
    fn test_value_defaults_to_zero_when_unparsable() {
        let data = snapshot(&[("T_AC_RDT1", "n/a"), ("Pr1", "")]);
        assert_eq!(data.value("T_AC_RDT1"), 0.0);
        assert_eq!(data.value("Pr1"), 0.0);
    }

    #[test]
    fn test_value_first_match_wins() {
        let data = snapshot(&[("Etdy_ge1", "12.5"), ("Etdy_ge1", "99")]);
        assert_eq!(data.value("Etdy_ge1"), 12.5);
    }

    #[test]
    fn test_value_first_match_wins_even_if_unparsable() {
        let data = snapshot(&[("Pr1", "oops"), ("Pr1", "42")]);
        assert_eq!(data.value("Pr1"), 0.0);
    }

    #[test]
    fn test_current_data_deserializes_api_shape() {
        let body = r#"{
            "code": null,
            "msg": null,
            "success": true,
            "requestId": "abc",
            "deviceSn": "2104281234",
            "deviceId": 123456,
            "deviceType": "INVERTER",
            "deviceState": 1,
            "collectionTime": 1700000000,
            "dataList": [
                {"key": "Pr1", "value": "5000", "unit": "W", "name": "Rated Power"},
                {"key": "SN1", "value": "2104281234", "unit": null, "name": "SN"}
            ]
        }"#;

        let data: CurrentData = serde_json::from_str(body).unwrap();
        assert_eq!(data.success, Some(true));
        assert_eq!(data.device_sn.as_deref(), Some("2104281234"));
        assert_eq!(data.device_id, Some(123456));
        assert_eq!(data.device_state, Some(1));
        assert_eq!(data.collection_time, Some(1700000000));
        assert_eq!(data.data_list.len(), 2);
        assert_eq!(data.data_list[0].unit, serde_json::json!("W"));
        assert!(data.data_list[1].unit.is_null());
        assert_eq!(data.value("Pr1"), 5000.0);
    }

    #[test]
    fn test_null_fields_do_not_fail_decoding() {
        let body = r#"{
            "success": true,
            "dataList": [
                {"key": "X", "value": null, "unit": null, "name": "Unused"},
                {"key": "Pr1", "value": "5000", "unit": "W", "name": null},
                {"key": "APo_t1", "value": "3200", "unit": 1, "name": "Output"},
                {"key": "T_AC_RDT1", "value": null, "unit": {"id": 7}, "name": null}
            ]
        }"#;

        let data: CurrentData = serde_json::from_str(body).unwrap();
        assert_eq!(data.data_list.len(), 4);
        assert_eq!(data.data_list[1].name, None);
        assert_eq!(data.data_list[2].unit, serde_json::json!(1));
        assert_eq!(data.value("Pr1"), 5000.0);
        assert_eq!(data.value("APo_t1"), 3200.0);
        assert_eq!(data.value("T_AC_RDT1"), 0.0);
        assert_eq!(data.value("X"), 0.0);
    }

    #[test]
    fn test_null_key_decodes_as_empty() {
        let body = r#"{"dataList": [{"key": null, "value": "1"}, {"key": "Pr1", "value": "2"}]}"#;

        let data: CurrentData = serde_json::from_str(body).unwrap();
        assert_eq!(data.data_list[0].key, "");
        assert_eq!(data.value("Pr1"), 2.0);
    }

    #[test]
    fn test_value_with_surrounding_whitespace_is_unparsable() {
        let data = snapshot(&[("Pr1", " 5000 "), ("APo_t1", "3200\n")]);
        assert_eq!(data.value("Pr1"), 0.0);
        assert_eq!(data.value("APo_t1"), 0.0);
    }

    #[test]
    fn test_preview_respects_char_boundaries() {
        let body = "é".repeat(150);
        let cut = preview(&body);
        assert!(cut.len() <= 200);
        assert!(body.starts_with(cut));
    }

    #[test]
    fn test_access_token_debug_redacts() {
        let token: AccessToken =
            serde_json::from_str(r#"{"access_token":"abc","refresh_token":"def"}"#).unwrap();
        let rendered = format!("{:?}", token);
        assert!(!rendered.contains("abc"));
        assert!(!rendered.contains("def"));
    }
}
