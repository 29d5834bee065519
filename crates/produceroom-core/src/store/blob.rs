//! Binary object storage.

use std::fs;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::StoreError;

const META_SUFFIX: &str = ".meta.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobMeta {
    pub content_type: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobEntry {
    /// File name without the prefix.
    pub name: String,
    pub full_path: String,
    pub meta: BlobMeta,
}

pub trait BlobStore: Send + Sync {
    fn upload(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<BlobMeta, StoreError>;

    /// Fails with [`StoreError::NotFound`] when nothing is stored at `path`.
    fn download(&self, path: &str) -> Result<Vec<u8>, StoreError>;

    /// A retrievable URL, or `None` when nothing is stored at `path`.
    fn url(&self, path: &str) -> Result<Option<Url>, StoreError>;

    /// Deleting a missing object is not an error.
    fn delete(&self, path: &str) -> Result<(), StoreError>;

    /// Objects directly under `prefix`, sorted by name.
    fn list(&self, prefix: &str) -> Result<Vec<BlobEntry>, StoreError>;
}

/// Blob store rooted at a local directory. Each object gets a JSON sidecar
/// holding its [`BlobMeta`].
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StoreError> {
        let rel = Path::new(path.trim_matches('/'));
        let clean = rel
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !clean || rel.as_os_str().is_empty() {
            return Err(StoreError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(rel))
    }

    fn meta_path(file: &Path) -> PathBuf {
        let mut name = file.as_os_str().to_owned();
        name.push(META_SUFFIX);
        PathBuf::from(name)
    }

    fn read_meta(file: &Path) -> Result<Option<BlobMeta>, StoreError> {
        let meta_path = Self::meta_path(file);
        if !meta_path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&meta_path)?;
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| StoreError::Malformed {
                path: meta_path.display().to_string(),
                message: e.to_string(),
            })
    }
}

impl BlobStore for FsBlobStore {
    fn upload(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<BlobMeta, StoreError> {
        let file = self.resolve(path)?;
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&file, bytes)?;
        let meta = BlobMeta {
            content_type: content_type.to_string(),
            size: bytes.len() as u64,
            uploaded_at: Utc::now(),
        };
        fs::write(Self::meta_path(&file), serde_json::to_vec_pretty(&meta)?)?;
        tracing::debug!(path, size = meta.size, "blob uploaded");
        Ok(meta)
    }

    fn download(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        let file = self.resolve(path)?;
        if !file.is_file() {
            return Err(StoreError::NotFound(path.to_string()));
        }
        Ok(fs::read(file)?)
    }

    fn url(&self, path: &str) -> Result<Option<Url>, StoreError> {
        let file = self.resolve(path)?;
        if !file.is_file() {
            return Ok(None);
        }
        let absolute = file.canonicalize()?;
        Url::from_file_path(&absolute)
            .map(Some)
            .map_err(|()| StoreError::InvalidPath(absolute.display().to_string()))
    }

    fn delete(&self, path: &str) -> Result<(), StoreError> {
        let file = self.resolve(path)?;
        for target in [Self::meta_path(&file), file] {
            match fs::remove_file(&target) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<BlobEntry>, StoreError> {
        let dir = self.resolve(prefix)?;
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for dirent in fs::read_dir(&dir)? {
            let dirent = dirent?;
            let file = dirent.path();
            let name = dirent.file_name().to_string_lossy().into_owned();
            if !file.is_file() || name.ends_with(META_SUFFIX) {
                continue;
            }
            let meta = match Self::read_meta(&file)? {
                Some(meta) => meta,
                None => {
                    let md = dirent.metadata()?;
                    BlobMeta {
                        content_type: "application/octet-stream".into(),
                        size: md.len(),
                        uploaded_at: md.modified().map(DateTime::<Utc>::from).unwrap_or_else(|_| Utc::now()),
                    }
                }
            };
            entries.push(BlobEntry {
                full_path: format!("{}/{name}", prefix.trim_matches('/')),
                name,
                meta,
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_list_delete() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = FsBlobStore::new(dir.path());

        blobs.upload("produce-videos/77.webm", b"abc", "video/webm").unwrap();
        blobs.upload("produce-videos/12.webm", b"de", "video/webm").unwrap();

        let listed = blobs.list("produce-videos").unwrap();
        let names: Vec<_> = listed.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["12.webm", "77.webm"]);
        assert_eq!(listed[1].meta.size, 3);
        assert_eq!(listed[1].full_path, "produce-videos/77.webm");

        assert_eq!(blobs.download("produce-videos/77.webm").unwrap(), b"abc");
        assert!(blobs.url("produce-videos/77.webm").unwrap().is_some());

        blobs.delete("produce-videos/77.webm").unwrap();
        blobs.delete("produce-videos/77.webm").unwrap();
        assert!(matches!(
            blobs.download("produce-videos/77.webm"),
            Err(StoreError::NotFound(_))
        ));
        assert_eq!(blobs.url("produce-videos/77.webm").unwrap(), None);
    }

    #[test]
    fn missing_prefix_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = FsBlobStore::new(dir.path());
        assert!(blobs.list("produce-videos").unwrap().is_empty());
    }

    #[test]
    fn escaping_paths_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = FsBlobStore::new(dir.path());
        assert!(matches!(
            blobs.upload("../x.webm", b"x", "video/webm"),
            Err(StoreError::InvalidPath(_))
        ));
    }
}
