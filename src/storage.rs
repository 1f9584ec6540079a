use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

/// Attachment backend. Keys are relative paths like `projects/<file>`; the
/// returned string is what gets stored on the row.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn store(&self, key: &str, body: Bytes) -> anyhow::Result<String>;
    async fn delete(&self, path: &str) -> anyhow::Result<()>;
}

pub const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "jpg", "jpeg", "png"];

/// Request body ceiling for multipart uploads: the configured file cap plus
/// framing overhead, so the handler's own size check still gets to answer.
pub fn body_limit(max_bytes: usize) -> usize {
    max_bytes.saturating_add(64 * 1024)
}

/// Validates the original filename's extension and produces a random safe
/// name so uploads can never collide or traverse paths.
pub fn safe_filename(original: &str) -> Option<String> {
    let ext = Path::new(original).extension()?.to_str()?.to_lowercase();
    ALLOWED_EXTENSIONS
        .contains(&ext.as_str())
        .then(|| format!("{}.{ext}", Uuid::new_v4()))
}

pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub async fn new(root: &str) -> anyhow::Result<Self> {
        let root = PathBuf::from(root);
        for sub in ["projects", "tasks"] {
            tokio::fs::create_dir_all(root.join(sub))
                .await
                .with_context(|| format!("create upload dir {sub}"))?;
        }
        Ok(Self { root })
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn store(&self, key: &str, body: Bytes) -> anyhow::Result<String> {
        let full = self.root.join(key);
        tokio::fs::write(&full, &body)
            .await
            .with_context(|| format!("write upload {key}"))?;
        Ok(format!("uploads/{key}"))
    }

    async fn delete(&self, path: &str) -> anyhow::Result<()> {
        let key = path.strip_prefix("uploads/").unwrap_or(path);
        let full = self.root.join(key);
        if tokio::fs::try_exists(&full).await? {
            tokio::fs::remove_file(&full)
                .await
                .with_context(|| format!("delete upload {key}"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_whitelisted_extensions() {
        for name in ["report.pdf", "photo.JPG", "scan.jpeg", "logo.png"] {
            let safe = safe_filename(name).expect("allowed");
            let ext = name.rsplit('.').next().unwrap().to_lowercase();
            assert!(safe.ends_with(&format!(".{ext}")));
        }
    }

    #[test]
    fn rejects_other_extensions_and_missing_ones() {
        assert!(safe_filename("malware.exe").is_none());
        assert!(safe_filename("script.sh").is_none());
        assert!(safe_filename("noextension").is_none());
    }

    #[test]
    fn generated_names_never_keep_the_original_stem() {
        let safe = safe_filename("../../etc/passwd.png").expect("allowed ext");
        assert!(!safe.contains(".."));
        assert!(!safe.contains('/'));
    }

    #[test]
    fn body_limit_leaves_room_for_multipart_framing() {
        let max = 25 * 1024 * 1024;
        assert!(body_limit(max) > max);
        assert_eq!(body_limit(usize::MAX), usize::MAX);
    }

    #[tokio::test]
    async fn store_then_delete_round_trip() {
        let root = std::env::temp_dir().join(format!("uploads-{}", Uuid::new_v4()));
        let storage = LocalStorage::new(root.to_str().unwrap()).await.unwrap();

        let path = storage
            .store("tasks/a.pdf", Bytes::from_static(b"data"))
            .await
            .unwrap();
        assert_eq!(path, "uploads/tasks/a.pdf");
        assert!(tokio::fs::try_exists(root.join("tasks/a.pdf")).await.unwrap());

        storage.delete(&path).await.unwrap();
        assert!(!tokio::fs::try_exists(root.join("tasks/a.pdf")).await.unwrap());

        tokio::fs::remove_dir_all(&root).await.ok();
    }
}
