//! Network file share reached through its local mount point

use async_trait::async_trait;
use chrono::{DateTime, Local};
use globset::{GlobBuilder, GlobMatcher};
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use tracing::warn;
use walkdir::{DirEntry, WalkDir};

use super::{DocumentHit, DocumentSource, DocumentSourceKind};
use crate::TIMESTAMP_FORMAT;

/// Directory levels below the root visited by [`FileShareSource::search`]
pub const MAX_SEARCH_DEPTH: usize = 3;

/// Files and directories under a mounted share
#[derive(Debug, Clone)]
pub struct FileShareSource {
    root: PathBuf,
    name: String,
}

impl FileShareSource {
    pub fn new(root: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            name: name.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a share-relative path onto the mount, refusing anything that
    /// would step outside it.
    fn resolve(&self, relative: &str) -> Option<PathBuf> {
        let mut path = self.root.clone();
        for component in Path::new(relative).components() {
            match component {
                Component::Normal(part) => path.push(part),
                Component::RootDir | Component::CurDir => {}
                Component::ParentDir | Component::Prefix(_) => return None,
            }
        }
        Some(path)
    }
}

#[async_trait]
impl DocumentSource for FileShareSource {
    fn kind(&self) -> DocumentSourceKind {
        DocumentSourceKind::FileShare
    }

    /// Case-insensitive match on entry names, files and directories alike
    async fn search(&self, query: &str, max_results: usize) -> Vec<DocumentHit> {
        let keyword = query.trim().to_lowercase();
        let root = self.root.clone();

        let walked = tokio::task::spawn_blocking(move || {
            entries(&root, MAX_SEARCH_DEPTH + 1)
                .filter(|e| e.file_name().to_string_lossy().to_lowercase().contains(&keyword))
                .take(max_results)
                .map(|e| hit(&root, &e))
                .collect::<Vec<_>>()
        })
        .await;

        walked.unwrap_or_else(|e| {
            warn!(share = %self.name, "Search failed: {}", e);
            Vec::new()
        })
    }

    async fn read(&self, location: &str) -> String {
        let Some(path) = self.resolve(location) else {
            warn!(share = %self.name, location, "Refusing path outside the share");
            return String::new();
        };

        match tokio::fs::read(&path).await {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                warn!(share = %self.name, location, "Could not read file: {}", e);
                String::new()
            }
        }
    }

    /// Entries directly under `dir` whose name matches a case-insensitive glob
    async fn list(&self, dir: &str, pattern: &str) -> Vec<DocumentHit> {
        let Some(base) = self.resolve(dir) else {
            warn!(share = %self.name, dir, "Refusing path outside the share");
            return Vec::new();
        };
        let Some(matcher) = file_matcher(pattern) else {
            return Vec::new();
        };

        let root = self.root.clone();
        let name = self.name.clone();
        let walked = tokio::task::spawn_blocking(move || {
            entries(&base, 1)
                .filter(|e| matcher.is_match(e.file_name()))
                .map(|e| hit(&root, &e))
                .collect::<Vec<_>>()
        })
        .await;

        walked.unwrap_or_else(|e| {
            warn!(share = %name, "Listing failed: {}", e);
            Vec::new()
        })
    }

    /// Files of a folder, newest modification first
    async fn recent(&self, collection: &str, max_results: usize) -> Vec<DocumentHit> {
        let Some(base) = self.resolve(collection) else {
            warn!(share = %self.name, collection, "Refusing path outside the share");
            return Vec::new();
        };
        let root = self.root.clone();

        let walked = tokio::task::spawn_blocking(move || {
            let mut files: Vec<(SystemTime, DocumentHit)> = entries(&base, 1)
                .filter(|e| e.file_type().is_file())
                .map(|e| (modified_time(&e).unwrap_or(SystemTime::UNIX_EPOCH), hit(&root, &e)))
                .collect();
            files.sort_by(|a, b| b.0.cmp(&a.0));
            files.into_iter().take(max_results).map(|(_, h)| h).collect::<Vec<_>>()
        })
        .await;

        walked.unwrap_or_else(|e| {
            warn!(share = %self.name, "Listing failed: {}", e);
            Vec::new()
        })
    }
}

/// Entries below `base`, sorted by name; unreadable entries are skipped with a warning
fn entries(base: &Path, max_depth: usize) -> impl Iterator<Item = DirEntry> {
    WalkDir::new(base)
        .min_depth(1)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                None
            }
        })
}

fn hit(root: &Path, entry: &DirEntry) -> DocumentHit {
    let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
    let location = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .fold(String::new(), |acc, part| format!("{acc}/{part}"));
    let metadata = entry.metadata().ok();

    DocumentHit {
        title: entry.file_name().to_string_lossy().into_owned(),
        location,
        is_directory: entry.file_type().is_dir(),
        size: metadata.as_ref().filter(|m| m.is_file()).map(|m| m.len()),
        modified: modified_time(entry).map(|t| {
            DateTime::<Local>::from(t).format(TIMESTAMP_FORMAT).to_string()
        }),
        ..DocumentHit::default()
    }
}

fn modified_time(entry: &DirEntry) -> Option<SystemTime> {
    entry.metadata().ok().and_then(|m| m.modified().ok())
}

/// Blank means everything; the whole name must match
fn file_matcher(pattern: &str) -> Option<GlobMatcher> {
    let pattern = if pattern.trim().is_empty() { "*" } else { pattern.trim() };
    match GlobBuilder::new(pattern).case_insensitive(true).build() {
        Ok(glob) => Some(glob.compile_matcher()),
        Err(e) => {
            warn!(pattern, "Invalid file pattern: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn share() -> (tempfile::TempDir, FileShareSource) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("RH/Politicas")).unwrap();
        fs::create_dir_all(root.join("TI/a/b/c/d")).unwrap();
        fs::write(root.join("RH/Politicas/ferias.txt"), "Férias: 30 dias").unwrap();
        fs::write(root.join("RH/Manual_Ferias.pdf"), b"%PDF").unwrap();
        fs::write(root.join("TI/vpn.txt"), "Use o cliente VPN").unwrap();
        fs::write(root.join("TI/a/b/c/d/ferias-antigas.txt"), "muito fundo").unwrap();
        let source = FileShareSource::new(root, "//fs01/docs");
        (dir, source)
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_and_depth_limited() {
        let (_dir, source) = share();
        let hits = source.search("FERIAS", 10).await;
        let locations: Vec<&str> = hits.iter().map(|h| h.location.as_str()).collect();
        assert_eq!(locations, vec!["/RH/Manual_Ferias.pdf", "/RH/Politicas/ferias.txt"]);
        assert_eq!(hits[1].size, Some("Férias: 30 dias".len() as u64));
        assert!(hits[0].modified.is_some());
    }

    #[tokio::test]
    async fn test_search_respects_max() {
        let (_dir, source) = share();
        assert_eq!(source.search("", 2).await.len(), 2);
    }

    #[tokio::test]
    async fn test_read_and_refuse_escape() {
        let (_dir, source) = share();
        assert_eq!(source.read("/TI/vpn.txt").await, "Use o cliente VPN");
        assert_eq!(source.read("TI/vpn.txt").await, "Use o cliente VPN");
        assert!(source.read("../etc/passwd").await.is_empty());
        assert!(source.read("/TI/missing.txt").await.is_empty());
    }

    #[tokio::test]
    async fn test_list_with_pattern() {
        let (_dir, source) = share();
        let hits = source.list("/RH", "*.pdf").await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Manual_Ferias.pdf");

        let all = source.list("RH", "").await;
        assert_eq!(all.len(), 2);
        assert!(all.iter().any(|h| h.is_directory && h.title == "Politicas"));
    }

    #[tokio::test]
    async fn test_recent_lists_files_only() {
        let (_dir, source) = share();
        let hits = source.recent("TI", 10).await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].location, "/TI/vpn.txt");
    }

    #[test]
    fn test_file_matcher() {
        let matcher = file_matcher("rel?torio*.xlsx").unwrap();
        assert!(matcher.is_match("Relatorio_2024.XLSX"));
        assert!(!matcher.is_match("relatorio.xlsx.bak"));
        assert!(file_matcher("*").unwrap().is_match("qualquer"));
        assert!(file_matcher("  ").unwrap().is_match("qualquer"));
        assert!(file_matcher("[a-").is_none());
    }

    #[tokio::test]
    async fn test_list_through_trait_object() {
        let (_dir, source) = share();
        let source: std::sync::Arc<dyn DocumentSource> = std::sync::Arc::new(source);
        let hits = source.list("/TI", "*.TXT").await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].location, "/TI/vpn.txt");
        assert!(source.list("/RH", "[a-").await.is_empty());
        assert!(source.list("../..", "*").await.is_empty());
    }
}
