use std::path::{Path, PathBuf};

use docqa_error::{DocqaError, Result};
use tracing::debug;
use uuid::Uuid;

/// Uploaded originals on local disk, keyed `{user_id}/{document_id}/{name}`.
/// The document id in the key makes two uploads of the same file name
/// independent objects.
#[derive(Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn document_dir(&self, user_id: Uuid, document_id: Uuid) -> PathBuf {
        self.root
            .join(user_id.to_string())
            .join(document_id.to_string())
    }

    pub async fn put(
        &self,
        user_id: Uuid,
        document_id: Uuid,
        file_name: &str,
        data: &[u8],
    ) -> Result<PathBuf> {
        let dir = self.document_dir(user_id, document_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| storage_error("create_dir", &dir, e))?;

        let path = dir.join(sanitize_file_name(file_name));
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| storage_error("write", &path, e))?;
        debug!(path = %path.display(), bytes = data.len(), "stored upload");
        Ok(path)
    }

    pub async fn delete(&self, user_id: Uuid, document_id: Uuid) -> Result<()> {
        let dir = self.document_dir(user_id, document_id);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error("remove_dir", &dir, e)),
        }
    }
}

fn storage_error(operation: &str, path: &Path, e: std::io::Error) -> DocqaError {
    DocqaError::Storage {
        operation: operation.to_string(),
        message: format!("{}: {}", path.display(), e),
    }
}

/// Keep only the final path component so a crafted file name cannot escape
/// the store root.
fn sanitize_file_name(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(name)
        .trim()
        .to_string();
    if base.is_empty() || base == "." || base == ".." {
        "upload.pdf".to_string()
    } else {
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("report.pdf"), "report.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("c:\\docs\\file.pdf"), "file.pdf");
        assert_eq!(sanitize_file_name(".."), "upload.pdf");
        assert_eq!(sanitize_file_name("  "), "upload.pdf");
    }

    #[tokio::test]
    async fn test_put_and_delete_round_trip() {
        let dir = std::env::temp_dir().join(format!("docqa-files-{}", Uuid::new_v4()));
        let store = LocalFileStore::new(&dir);
        let user = Uuid::new_v4();
        let doc = Uuid::new_v4();

        let path = store.put(user, doc, "a.pdf", b"%PDF-1.4").await.unwrap();
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"%PDF-1.4");

        store.delete(user, doc).await.unwrap();
        assert!(!path.exists());
        // deleting again is fine
        store.delete(user, doc).await.unwrap();

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
