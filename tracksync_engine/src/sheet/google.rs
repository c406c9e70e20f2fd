//! Reading the supplier sheet from Google Sheets with a service account.
//!
//! The service account's JSON key is used to sign a short-lived JWT, which is exchanged at the key's `token_uri` for
//! an access token. The range is then fetched with the Sheets v4 `values.get` call. The spreadsheet must be shared
//! with the service account's email address.
use std::{
    fmt,
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use log::*;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracksync_common::{env_or_default, Secret};

use super::{Sheet, SheetError};

pub const SHEETS_API_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";
pub const SHEETS_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets.readonly";
pub const DEFAULT_RANGE: &str = "Sheet1";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleSheetsConfig {
    pub credentials_file: PathBuf,
    pub spreadsheet_id: String,
    /// A sheet name ("Orders") or an A1 range ("Orders!A:F").
    pub range: String,
}

impl GoogleSheetsConfig {
    /// Reads `TRACKSYNC_SHEETS_*`. Returns `Ok(None)` when no spreadsheet id is set, meaning Google Sheets is not the
    /// input for this run.
    pub fn from_env() -> Result<Option<Self>, SheetError> {
        let Some(spreadsheet_id) = env_or_default("TRACKSYNC_SHEETS_SPREADSHEET_ID") else {
            return Ok(None);
        };
        let credentials_file = env_or_default("TRACKSYNC_SHEETS_CREDENTIALS_FILE").ok_or_else(|| {
            SheetError::GoogleConfig(
                "TRACKSYNC_SHEETS_CREDENTIALS_FILE must point to the service account key when \
                 TRACKSYNC_SHEETS_SPREADSHEET_ID is set"
                    .into(),
            )
        })?;
        let range = env_or_default("TRACKSYNC_SHEETS_RANGE").unwrap_or_else(|| {
            debug!("🪛️ TRACKSYNC_SHEETS_RANGE not set, using {DEFAULT_RANGE}");
            DEFAULT_RANGE.to_string()
        });
        Ok(Some(Self { credentials_file: PathBuf::from(credentials_file), spreadsheet_id, range }))
    }
}

/// The parts of a service account key file needed to request a token.
#[derive(Clone)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub token_uri: String,
    private_key: Secret<String>,
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .field("private_key", &self.private_key)
            .finish()
    }
}

impl ServiceAccountKey {
    pub fn from_json(json: &str) -> Result<Self, SheetError> {
        #[derive(Deserialize)]
        struct KeyFile {
            client_email: String,
            private_key: String,
            token_uri: String,
        }
        let key: KeyFile = serde_json::from_str(json)
            .map_err(|e| SheetError::GoogleConfig(format!("Invalid service account key. {e}")))?;
        Ok(Self { client_email: key.client_email, token_uri: key.token_uri, private_key: Secret::new(key.private_key) })
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, SheetError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| SheetError::GoogleConfig(format!("Could not read {}. {e}", path.display())))?;
        Self::from_json(&json)
    }

    /// Signs the JWT that is traded for an access token.
    pub fn sign_assertion(&self, scope: &str, issued_at: i64) -> Result<String, SheetError> {
        #[derive(Serialize)]
        struct Claims<'a> {
            iss: &'a str,
            scope: &'a str,
            aud: &'a str,
            iat: i64,
            exp: i64,
        }
        let claims = Claims {
            iss: &self.client_email,
            scope,
            aud: &self.token_uri,
            iat: issued_at,
            exp: issued_at + ASSERTION_LIFETIME_SECS,
        };
        let key = EncodingKey::from_rsa_pem(self.private_key.reveal().as_bytes())
            .map_err(|e| SheetError::GoogleConfig(format!("The service account private key is unusable. {e}")))?;
        encode(&Header::new(Algorithm::RS256), &claims, &key).map_err(|e| SheetError::GoogleAuth(e.to_string()))
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

fn cell_text(cell: Value) -> String {
    match cell {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub struct GoogleSheetsSource {
    config: GoogleSheetsConfig,
    api_url: String,
    client: Client,
}

impl GoogleSheetsSource {
    pub fn new(config: GoogleSheetsConfig) -> Result<Self, SheetError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SheetError::GoogleConfig(format!("Could not create the HTTP client. {e}")))?;
        Ok(Self { config, api_url: SHEETS_API_URL.to_string(), client })
    }

    #[cfg(test)]
    fn with_api_url(mut self, api_url: &str) -> Self {
        self.api_url = api_url.to_string();
        self
    }

    /// The `values.get` URL for the configured range, with the id and range percent-encoded.
    pub fn values_url(&self) -> Result<Url, SheetError> {
        let mut url = Url::parse(&self.api_url).map_err(|e| SheetError::GoogleConfig(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| SheetError::GoogleConfig(format!("{} cannot be a base URL", self.api_url)))?
            .push(&self.config.spreadsheet_id)
            .push("values")
            .push(&self.config.range);
        url.query_pairs_mut().append_pair("majorDimension", "ROWS").append_pair("valueRenderOption", "FORMATTED_VALUE");
        Ok(url)
    }

    pub async fn access_token(&self, key: &ServiceAccountKey) -> Result<Secret<String>, SheetError> {
        let assertion = key.sign_assertion(SHEETS_READONLY_SCOPE, Utc::now().timestamp())?;
        debug!("📄️ Requesting a Google access token for {}", key.client_email);
        let response = self
            .client
            .post(&key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| SheetError::GoogleAuth(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SheetError::GoogleAuth(format!("Token request failed with {status}. {body}")));
        }
        let token = response.json::<TokenResponse>().await.map_err(|e| SheetError::GoogleAuth(e.to_string()))?;
        Ok(Secret::new(token.access_token))
    }

    /// Authenticates and reads the configured range into a [`Sheet`].
    pub async fn fetch(&self) -> Result<Sheet, SheetError> {
        let key = ServiceAccountKey::from_path(&self.config.credentials_file)?;
        let token = self.access_token(&key).await?;
        let url = self.values_url()?;
        info!("📄️ Reading '{}' from spreadsheet {}", self.config.range, self.config.spreadsheet_id);
        let response = self
            .client
            .get(url)
            .bearer_auth(token.reveal())
            .send()
            .await
            .map_err(|e| SheetError::GoogleRequest(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SheetError::GoogleRequest(format!("{status}. {body}")));
        }
        let range = response.json::<ValueRange>().await.map_err(|e| SheetError::GoogleRequest(e.to_string()))?;
        if range.values.is_empty() {
            warn!("📄️ The range '{}' is empty", self.config.range);
        }
        let values =
            range.values.into_iter().map(|row| row.into_iter().map(cell_text).collect::<Vec<_>>()).collect::<Vec<_>>();
        Ok(Sheet::from_values(values))
    }
}
