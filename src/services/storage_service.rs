use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Evidence blob storage, addressed by relative paths.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// `Ok(None)` when nothing is stored at `path`.
    async fn read(&self, path: &str) -> Result<Option<Vec<u8>>>;

    async fn write(&self, path: &str, content: &[u8]) -> Result<()>;
}

/// Where an imported evidence blob is stored.
pub fn evidence_path(evidence_id: Uuid, original_filename: &str) -> String {
    format!("evidence/{}/{}", evidence_id, sanitize_filename(original_filename))
}

fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => c,
            _ => '_',
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Files on local disk under the uploads directory.
#[derive(Debug, Clone)]
pub struct LocalFileStorage {
    root: PathBuf,
}

impl LocalFileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let contained = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !contained {
            return Err(Error::BadRequest(format!(
                "Storage path escapes the uploads directory: {}",
                path
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn read(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let full = self.resolve(path)?;
        match tokio::fs::read(&full).await {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn write(&self, path: &str, content: &[u8]) -> Result<()> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, content).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evidence_path_strips_directories_and_odd_characters() {
        let id = Uuid::nil();
        assert_eq!(
            evidence_path(id, "../../etc/pass wd.txt"),
            format!("evidence/{}/pass_wd.txt", id)
        );
        assert_eq!(
            evidence_path(id, "C:\\reports\\Q1 audit.pdf"),
            format!("evidence/{}/Q1_audit.pdf", id)
        );
        assert_eq!(evidence_path(id, ".."), format!("evidence/{}/file", id));
    }

    #[tokio::test]
    async fn local_storage_round_trips_and_reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFileStorage::new(dir.path());

        storage.write("evidence/a/report.pdf", b"%PDF").await.unwrap();

        assert_eq!(
            storage.read("evidence/a/report.pdf").await.unwrap(),
            Some(b"%PDF".to_vec())
        );
        assert_eq!(storage.read("evidence/b/none.pdf").await.unwrap(), None);
    }

    #[tokio::test]
    async fn local_storage_refuses_paths_outside_root() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFileStorage::new(dir.path());

        assert!(storage.read("../secret").await.is_err());
        assert!(storage.write("/tmp/abs", b"x").await.is_err());
    }
}
