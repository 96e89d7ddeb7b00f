//! SharePoint Online document repository over its REST API
//!
//! Authentication uses the OAuth client-credentials grant; the token is
//! cached until shortly before it expires.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{DocumentHit, DocumentSource, DocumentSourceKind};
use crate::config::{DocumentRepositorySettings, Secret};
use crate::{AssistError, Result};

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Tokens are refreshed this long before they expire
const TOKEN_EXPIRY_MARGIN_SECS: u64 = 60;

const ODATA_JSON: &str = "application/json;odata=nometadata";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// SharePoint site client
#[derive(Debug)]
pub struct SharePointSource {
    client: reqwest::Client,
    token_url: String,
    site_url: String,
    client_id: String,
    client_secret: Secret,
    token: Mutex<Option<CachedToken>>,
}

impl SharePointSource {
    pub fn new(settings: &DocumentRepositorySettings) -> Result<Self> {
        let (Some(token_url), Some(site_url), Some(client_id), Some(client_secret)) = (
            settings.token_url.clone(),
            settings.site_url.clone(),
            settings.client_id.clone(),
            settings.client_secret.clone(),
        ) else {
            return Err(AssistError::config("SharePoint settings are incomplete"));
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AssistError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            token_url,
            site_url: site_url.trim_end_matches('/').to_string(),
            client_id,
            client_secret,
            token: Mutex::new(None),
        })
    }

    async fn access_token(&self) -> std::result::Result<String, reqwest::Error> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.expires_at > Instant::now()) {
            return Ok(token.value.clone());
        }

        let scope = format!("{}/.default", site_origin(&self.site_url));
        let response: TokenResponse = self
            .client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.expose()),
                ("scope", scope.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let lifetime = response
            .expires_in
            .unwrap_or(3600)
            .saturating_sub(TOKEN_EXPIRY_MARGIN_SECS);
        debug!(lifetime_secs = lifetime, "SharePoint token acquired");
        *cached = Some(CachedToken {
            value: response.access_token.clone(),
            expires_at: Instant::now() + Duration::from_secs(lifetime),
        });
        Ok(response.access_token)
    }

    async fn get_json(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> std::result::Result<Value, reqwest::Error> {
        let token = self.access_token().await?;
        self.client
            .get(url)
            .bearer_auth(token)
            .header(ACCEPT, ODATA_JSON)
            .query(query)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }

    async fn fetch_text(&self, url: &str) -> std::result::Result<String, reqwest::Error> {
        let token = self.access_token().await?;
        let bytes = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[async_trait]
impl DocumentSource for SharePointSource {
    fn kind(&self) -> DocumentSourceKind {
        DocumentSourceKind::DocumentRepository
    }

    async fn search(&self, query: &str, max_results: usize) -> Vec<DocumentHit> {
        let url = format!("{}/_api/search/query", self.site_url);
        let params = [
            ("querytext", odata_string(query)),
            ("rowlimit", max_results.to_string()),
        ];
        match self.get_json(&url, &params).await {
            Ok(body) => {
                let mut hits = parse_search_rows(&body);
                hits.truncate(max_results);
                hits
            }
            Err(e) => {
                warn!("SharePoint search failed: {}", e);
                Vec::new()
            }
        }
    }

    async fn read(&self, location: &str) -> String {
        let path = server_relative_path(location);
        let url = format!(
            "{}/_api/web/GetFileByServerRelativeUrl({})/$value",
            self.site_url,
            odata_string(&path)
        );
        match self.fetch_text(&url).await {
            Ok(text) => text,
            Err(e) => {
                warn!(location, "SharePoint document could not be read: {}", e);
                String::new()
            }
        }
    }

    async fn recent(&self, collection: &str, max_results: usize) -> Vec<DocumentHit> {
        let url = format!(
            "{}/_api/web/lists/GetByTitle({})/items",
            self.site_url,
            odata_string(collection)
        );
        let params = [
            ("$top", max_results.to_string()),
            ("$orderby", "Modified desc".to_string()),
            ("$select", "Id,Title,FileRef,Modified,Created,Author/Title".to_string()),
            ("$expand", "Author".to_string()),
        ];
        match self.get_json(&url, &params).await {
            Ok(body) => parse_list_items(&body),
            Err(e) => {
                warn!(collection, "SharePoint library listing failed: {}", e);
                Vec::new()
            }
        }
    }
}

/// Quote a value for an OData string literal
fn odata_string(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// `https://host/sites/x` -> `https://host`
fn site_origin(site_url: &str) -> String {
    match reqwest::Url::parse(site_url) {
        Ok(url) => url.origin().ascii_serialization(),
        Err(_) => site_url.to_string(),
    }
}

/// Absolute file URLs are reduced to their path; anything else is taken as
/// already server-relative.
fn server_relative_path(location: &str) -> String {
    match reqwest::Url::parse(location) {
        Ok(url) => url.path().to_string(),
        Err(_) => location.to_string(),
    }
}

/// Rows of a `_api/search/query` response. Each row is a list of
/// `{"Key": ..., "Value": ...}` cells.
fn parse_search_rows(body: &Value) -> Vec<DocumentHit> {
    let rows = body
        .pointer("/PrimaryQueryResult/RelevantResults/Table/Rows")
        .and_then(Value::as_array);

    rows.into_iter()
        .flatten()
        .map(|row| {
            let cell = |key: &str| -> Option<String> {
                row.get("Cells")?
                    .as_array()?
                    .iter()
                    .find(|c| c.get("Key").and_then(Value::as_str) == Some(key))?
                    .get("Value")?
                    .as_str()
                    .map(str::to_string)
            };
            DocumentHit {
                title: cell("Title").unwrap_or_default(),
                location: cell("Path").unwrap_or_default(),
                is_directory: false,
                size: cell("Size").and_then(|s| s.parse().ok()),
                author: cell("Author"),
                modified: cell("LastModifiedTime"),
                summary: cell("HitHighlightedSummary"),
            }
        })
        .filter(|hit| !hit.location.is_empty())
        .collect()
}

/// Items of a list query
fn parse_list_items(body: &Value) -> Vec<DocumentHit> {
    let items = body.get("value").and_then(Value::as_array);
    let text = |item: &Value, key: &str| item.get(key).and_then(Value::as_str).map(str::to_string);

    items
        .into_iter()
        .flatten()
        .map(|item| DocumentHit {
            title: text(item, "Title").unwrap_or_default(),
            location: text(item, "FileRef").unwrap_or_default(),
            is_directory: false,
            size: None,
            author: item.pointer("/Author/Title").and_then(Value::as_str).map(str::to_string),
            modified: text(item, "Modified"),
            summary: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings(token_url: &str) -> DocumentRepositorySettings {
        DocumentRepositorySettings {
            enabled: true,
            token_url: Some(token_url.to_string()),
            site_url: Some("https://corp.sharepoint.com/sites/intranet/".to_string()),
            client_id: Some("id".to_string()),
            client_secret: Some(Secret::new("secret")),
        }
    }

    #[test]
    fn test_parse_search_rows() {
        let body = json!({
            "PrimaryQueryResult": {"RelevantResults": {"Table": {"Rows": [
                {"Cells": [
                    {"Key": "Title", "Value": "Política de Férias"},
                    {"Key": "Path", "Value": "https://corp.sharepoint.com/sites/intranet/Docs/ferias.docx"},
                    {"Key": "Author", "Value": "RH"},
                    {"Key": "Size", "Value": "2048"},
                    {"Key": "HitHighlightedSummary", "Value": "<c0>férias</c0> anuais"}
                ]},
                {"Cells": [{"Key": "Title", "Value": "sem caminho"}]}
            ]}}}
        });
        let hits = parse_search_rows(&body);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Política de Férias");
        assert_eq!(hits[0].size, Some(2048));
        assert_eq!(hits[0].author.as_deref(), Some("RH"));
        assert!(parse_search_rows(&json!({})).is_empty());
    }

    #[test]
    fn test_parse_list_items() {
        let body = json!({"value": [{
            "Id": 7,
            "Title": "Manual",
            "FileRef": "/sites/intranet/Docs/manual.pdf",
            "Modified": "2024-03-01T10:00:00Z",
            "Author": {"Title": "Ana"}
        }]});
        let hits = parse_list_items(&body);
        assert_eq!(hits[0].location, "/sites/intranet/Docs/manual.pdf");
        assert_eq!(hits[0].author.as_deref(), Some("Ana"));
    }

    #[test]
    fn test_url_helpers() {
        assert_eq!(odata_string("d'água"), "'d''água'");
        assert_eq!(
            site_origin("https://corp.sharepoint.com/sites/intranet"),
            "https://corp.sharepoint.com"
        );
        assert_eq!(
            server_relative_path("https://corp.sharepoint.com/sites/intranet/Docs/a.txt"),
            "/sites/intranet/Docs/a.txt"
        );
        assert_eq!(server_relative_path("/sites/intranet/a.txt"), "/sites/intranet/a.txt");
    }

    #[test]
    fn test_incomplete_settings_rejected() {
        let mut s = settings("https://login.example.com/token");
        s.client_id = None;
        assert!(SharePointSource::new(&s).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_server_degrades_to_empty() {
        let source = SharePointSource::new(&settings("http://127.0.0.1:9/token")).unwrap();
        assert_eq!(source.kind(), DocumentSourceKind::DocumentRepository);
        assert!(source.search("férias", 5).await.is_empty());
        assert!(source.read("/sites/intranet/a.txt").await.is_empty());
        assert!(source.recent("Documentos", 5).await.is_empty());
    }
}
