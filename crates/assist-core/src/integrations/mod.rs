//! Optional document sources
//!
//! At most one source is active per process. It is chosen once at startup by
//! [`resolve_document_source`]; a disabled or misconfigured source resolves to
//! [`NoDocumentSource`]. Sources never fail their callers: errors are logged
//! and surface as empty results.

pub mod file_share;
pub mod sharepoint;

pub use file_share::FileShareSource;
pub use sharepoint::SharePointSource;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::IntegrationSettings;

/// Which backend serves documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentSourceKind {
    None,
    DocumentRepository,
    FileShare,
}

impl DocumentSourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::DocumentRepository => "document_repository",
            Self::FileShare => "file_share",
        }
    }
}

/// One search or listing result
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DocumentHit {
    pub title: String,
    /// Opaque handle accepted by [`DocumentSource::read`]
    pub location: String,
    pub is_directory: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// Read-only access to corporate documents
#[async_trait]
pub trait DocumentSource: Send + Sync {
    fn kind(&self) -> DocumentSourceKind;

    /// Keyword search, at most `max_results` hits
    async fn search(&self, query: &str, max_results: usize) -> Vec<DocumentHit>;

    /// Text content of one document; empty when unavailable
    async fn read(&self, location: &str) -> String;

    /// Most recently modified items of a library or folder
    async fn recent(&self, _collection: &str, _max_results: usize) -> Vec<DocumentHit> {
        Vec::new()
    }

    /// Entries of one folder whose names match a glob such as `*.pdf`
    async fn list(&self, _path: &str, _pattern: &str) -> Vec<DocumentHit> {
        Vec::new()
    }
}

/// Source used when no integration is enabled
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDocumentSource;

#[async_trait]
impl DocumentSource for NoDocumentSource {
    fn kind(&self) -> DocumentSourceKind {
        DocumentSourceKind::None
    }

    async fn search(&self, _query: &str, _max_results: usize) -> Vec<DocumentHit> {
        Vec::new()
    }

    async fn read(&self, _location: &str) -> String {
        String::new()
    }
}

/// Pick the active document source. The document repository wins over the
/// file share when both are enabled and configured.
pub fn resolve_document_source(settings: &IntegrationSettings) -> Arc<dyn DocumentSource> {
    let repo = &settings.document_repository;
    let share = &settings.file_share;

    if repo.enabled {
        if !repo.is_configured() {
            warn!("SharePoint enabled but its settings are incomplete; integration unavailable");
        } else {
            match SharePointSource::new(repo) {
                Ok(source) => {
                    if share.enabled {
                        warn!(share = %share.unc_name(), "File share ignored: SharePoint takes precedence");
                    }
                    info!("Document source: SharePoint");
                    return Arc::new(source);
                }
                Err(e) => warn!("SharePoint client could not be built: {}", e),
            }
        }
    }

    if share.enabled {
        match share.mount.as_deref() {
            Some(mount) => {
                info!(share = %share.unc_name(), mount = %mount.display(), "Document source: file share");
                return Arc::new(FileShareSource::new(mount, share.unc_name()));
            }
            None => warn!("File share enabled but FILESERVER_MOUNT is not set; integration unavailable"),
        }
    }

    Arc::new(NoDocumentSource)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DocumentRepositorySettings, FileShareSettings, Secret};
    use std::path::PathBuf;

    fn repository() -> DocumentRepositorySettings {
        DocumentRepositorySettings {
            enabled: true,
            token_url: Some("https://login.example.com/token".to_string()),
            site_url: Some("https://corp.sharepoint.com/sites/intranet".to_string()),
            client_id: Some("client".to_string()),
            client_secret: Some(Secret::new("secret")),
        }
    }

    fn share() -> FileShareSettings {
        FileShareSettings {
            enabled: true,
            host: Some("fs01".to_string()),
            share: Some("docs".to_string()),
            mount: Some(PathBuf::from("/mnt/docs")),
            ..FileShareSettings::default()
        }
    }

    #[test]
    fn test_nothing_enabled() {
        let source = resolve_document_source(&IntegrationSettings::default());
        assert_eq!(source.kind(), DocumentSourceKind::None);
    }

    #[test]
    fn test_repository_wins() {
        let settings = IntegrationSettings {
            document_repository: repository(),
            file_share: share(),
        };
        assert_eq!(
            resolve_document_source(&settings).kind(),
            DocumentSourceKind::DocumentRepository
        );
    }

    #[test]
    fn test_incomplete_repository_falls_through() {
        let mut repo = repository();
        repo.client_secret = None;
        let settings = IntegrationSettings {
            document_repository: repo,
            file_share: share(),
        };
        assert_eq!(resolve_document_source(&settings).kind(), DocumentSourceKind::FileShare);

        let settings = IntegrationSettings {
            document_repository: DocumentRepositorySettings {
                enabled: true,
                ..DocumentRepositorySettings::default()
            },
            file_share: FileShareSettings::default(),
        };
        assert_eq!(resolve_document_source(&settings).kind(), DocumentSourceKind::None);
    }

    #[test]
    fn test_share_without_mount() {
        let mut share = share();
        share.mount = None;
        let settings = IntegrationSettings {
            file_share: share,
            ..IntegrationSettings::default()
        };
        assert_eq!(resolve_document_source(&settings).kind(), DocumentSourceKind::None);
    }

    #[tokio::test]
    async fn test_none_source_is_empty() {
        let source = NoDocumentSource;
        assert!(source.search("férias", 10).await.is_empty());
        assert!(source.read("/politicas.txt").await.is_empty());
        assert!(source.recent("Documentos", 5).await.is_empty());
    }
}
