//! SharePoint Online access with an app-only (client id + secret) token.
//!
//! The realm is discovered once from the `WWW-Authenticate` challenge of the site, then
//! tokens are requested from Azure ACS and cached until shortly before they expire.

use std::time::{Duration, Instant};

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{HeaderValue, ACCEPT, AUTHORIZATION, WWW_AUTHENTICATE};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::SharePointSettings;
use crate::store::DocumentStore;

const SHAREPOINT_PRINCIPAL: &str = "00000003-0000-0ff1-ce00-000000000000";
const ACS_HOST: &str = "https://accounts.accesscontrol.windows.net";
const ODATA_JSON: &str = "application/json;odata=nometadata";
const TOKEN_SLACK: Duration = Duration::from_secs(60);

static REALM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"realm="([^"]+)""#).expect("realm regex"));

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    /// ACS sends this as a string.
    #[serde(default)]
    expires_in: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct FileList {
    value: Vec<FileEntry>,
}

#[derive(Debug, Deserialize)]
struct FileEntry {
    #[serde(rename = "Name")]
    name: String,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

pub struct SharePointClient {
    http: Client,
    settings: SharePointSettings,
    realm: String,
    token: RwLock<Option<CachedToken>>,
}

impl SharePointClient {
    /// Discovers the tenant realm and checks that the site is reachable with our credentials.
    pub async fn connect(settings: SharePointSettings) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("build http client")?;
        let realm = discover_realm(&http, &settings.site_url()).await?;
        let client = Self {
            http,
            settings,
            realm,
            token: RwLock::new(None),
        };
        let response = client.get(&format!("{}/_api/web", client.settings.site_url())).await?;
        check_response(response).await.context("sharepoint site check")?;
        info!(site = %client.settings.site_url(), "connected to sharepoint");
        Ok(client)
    }

    async fn access_token(&self) -> anyhow::Result<String> {
        if let Some(t) = self.token.read().await.as_ref() {
            if t.expires_at > Instant::now() {
                return Ok(t.value.clone());
            }
        }
        let mut guard = self.token.write().await;
        if let Some(t) = guard.as_ref() {
            if t.expires_at > Instant::now() {
                return Ok(t.value.clone());
            }
        }
        let fresh = self.request_token().await?;
        let value = fresh.value.clone();
        *guard = Some(fresh);
        Ok(value)
    }

    async fn request_token(&self) -> anyhow::Result<CachedToken> {
        let host = &self.settings.site_hostname;
        let realm = &self.realm;
        let url = format!("{ACS_HOST}/{realm}/tokens/OAuth/2");
        let client_id = format!("{}@{realm}", self.settings.client_id);
        let resource = format!("{SHAREPOINT_PRINCIPAL}/{host}@{realm}");
        debug!(%url, "requesting sharepoint app token");
        let response = self
            .http
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", client_id.as_str()),
                ("client_secret", self.settings.client_secret.as_str()),
                ("resource", resource.as_str()),
            ])
            .send()
            .await
            .context("token request")?;
        let body: TokenResponse = check_response(response)
            .await
            .context("token request")?
            .json()
            .await
            .context("decode token response")?;
        let lifetime = body
            .expires_in
            .as_ref()
            .and_then(expires_in_secs)
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(3600));
        Ok(CachedToken {
            value: body.access_token,
            expires_at: Instant::now() + lifetime.saturating_sub(TOKEN_SLACK),
        })
    }

    async fn get(&self, url: &str) -> anyhow::Result<Response> {
        let token = self.access_token().await?;
        self.http
            .get(url)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .header(ACCEPT, ODATA_JSON)
            .send()
            .await
            .with_context(|| format!("GET {url}"))
    }
}

#[async_trait]
impl DocumentStore for SharePointClient {
    async fn list_files(&self) -> anyhow::Result<Vec<String>> {
        let url = format!(
            "{}/_api/web/GetFolderByServerRelativeUrl('{}')/Files",
            self.settings.site_url(),
            odata_literal(&self.settings.folder_path())
        );
        let list: FileList = check_response(self.get(&url).await?)
            .await
            .context("list template folder")?
            .json()
            .await
            .context("decode file list")?;
        Ok(list.value.into_iter().map(|f| f.name).collect())
    }

    async fn download_file(&self, name: &str) -> anyhow::Result<Vec<u8>> {
        let path = format!("{}/{}", self.settings.folder_path(), name);
        let url = format!(
            "{}/_api/web/GetFileByServerRelativeUrl('{}')/$value",
            self.settings.site_url(),
            odata_literal(&path)
        );
        let response = self.get(&url).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(anyhow!("template not found: {name}"));
        }
        let bytes = check_response(response)
            .await
            .with_context(|| format!("download {name}"))?
            .bytes()
            .await
            .with_context(|| format!("read body of {name}"))?;
        debug!(file = name, size = bytes.len(), "downloaded template");
        Ok(bytes.to_vec())
    }
}

async fn discover_realm(http: &Client, site_url: &str) -> anyhow::Result<String> {
    let url = format!("{site_url}/_vti_bin/client.svc");
    let response = http
        .get(&url)
        .header(AUTHORIZATION, "Bearer")
        .send()
        .await
        .with_context(|| format!("realm discovery: {url}"))?;
    response
        .headers()
        .get(WWW_AUTHENTICATE)
        .and_then(realm_from_challenge)
        .ok_or_else(|| anyhow!("no realm in WWW-Authenticate from {url}"))
}

fn realm_from_challenge(header: &HeaderValue) -> Option<String> {
    let text = header.to_str().ok()?;
    REALM_RE.captures(text).map(|c| c[1].to_string())
}

fn expires_in_secs(v: &serde_json::Value) -> Option<u64> {
    match v {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Quotes doubled for the OData string literal; `%`, `#` and `?` escaped so the path survives as a URL.
fn odata_literal(s: &str) -> String {
    s.replace('%', "%25")
        .replace('#', "%23")
        .replace('?', "%3F")
        .replace('\'', "''")
}

async fn check_response(response: Response) -> anyhow::Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    let message = serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|v| {
            v["odata.error"]["message"]["value"]
                .as_str()
                .or_else(|| v["error_description"].as_str())
                .map(String::from)
        })
        .unwrap_or(text);
    Err(anyhow!("sharepoint returned {status}: {message}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn realm_is_read_from_bearer_challenge() {
        let header = HeaderValue::from_static(
            r#"Bearer realm="1b2c3d4e-0000-1111-2222-333344445555",client_id="00000003-0000-0ff1-ce00-000000000000",trusted_issuers="x@*""#,
        );
        assert_eq!(
            realm_from_challenge(&header).as_deref(),
            Some("1b2c3d4e-0000-1111-2222-333344445555")
        );
        assert!(realm_from_challenge(&HeaderValue::from_static("NTLM")).is_none());
    }

    #[test]
    fn expires_in_accepts_string_or_number() {
        assert_eq!(expires_in_secs(&serde_json::json!("86399")), Some(86399));
        assert_eq!(expires_in_secs(&serde_json::json!(3600)), Some(3600));
        assert_eq!(expires_in_secs(&serde_json::json!(null)), None);
    }

    #[test]
    fn odata_literal_escapes_quotes_and_url_specials() {
        assert_eq!(
            odata_literal("/sites/HR/Shared Documents/Mitarbeiter's Antrag #2.docx"),
            "/sites/HR/Shared Documents/Mitarbeiter''s Antrag %232.docx"
        );
    }

    #[test]
    fn file_list_decodes_nometadata_payload() {
        let list: FileList = serde_json::from_str(
            r#"{"value":[{"Name":"Urlaubsantrag.docx","Length":"1234"},{"Name":"Teilzeit.docx"}]}"#,
        )
        .expect("decode");
        let names: Vec<String> = list.value.into_iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["Urlaubsantrag.docx", "Teilzeit.docx"]);
    }
}
