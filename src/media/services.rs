use std::path::{Path, PathBuf};

use anyhow::Context;
use bytes::Bytes;
use tracing::warn;
use uuid::Uuid;

use crate::storage::StorageClient;

/// A spooled upload on local disk.
///
/// The file must never outlive the request that produced it: `upload` removes
/// it on both success and failure, and `Drop` removes it if the request bails
/// out before the upload is attempted.
pub struct TempFile {
    path: PathBuf,
    content_type: String,
    removed: bool,
}

impl TempFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn remove(&mut self) {
        if self.removed {
            return;
        }
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            warn!(path = %self.path.display(), error = %e, "failed to remove temp file");
        }
        self.removed = true;
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if !self.removed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Spool multipart field bytes to a uniquely named file under `dir`.
pub async fn store_temp(dir: &str, body: Bytes, content_type: &str) -> anyhow::Result<TempFile> {
    let ext = ext_from_mime(content_type).unwrap_or("bin");
    let path = Path::new(dir).join(format!("{}.{}", Uuid::new_v4(), ext));
    tokio::fs::write(&path, &body)
        .await
        .with_context(|| format!("write temp file {}", path.display()))?;
    Ok(TempFile {
        path,
        content_type: content_type.to_string(),
        removed: false,
    })
}

/// Upload a local temp file to the media store and return its public URL.
///
/// Best-effort: returns `None` on failure so the caller decides criticality.
/// The temp file is deleted on every exit path.
pub async fn upload(storage: &dyn StorageClient, mut tmp: TempFile) -> Option<String> {
    let result = async {
        let body = tokio::fs::read(&tmp.path)
            .await
            .with_context(|| format!("read temp file {}", tmp.path.display()))?;
        let ext = tmp
            .path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin");
        let key = format!("uploads/{}.{}", Uuid::new_v4(), ext);
        storage
            .put_object(&key, Bytes::from(body), &tmp.content_type)
            .await?;
        anyhow::Ok(storage.object_url(&key))
    }
    .await;

    tmp.remove().await;

    match result {
        Ok(url) => Some(url),
        Err(e) => {
            warn!(error = %e, "media upload failed");
            None
        }
    }
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;
    use axum::async_trait;

    struct FailStorage;

    #[async_trait]
    impl StorageClient for FailStorage {
        async fn put_object(&self, _k: &str, _b: Bytes, _ct: &str) -> anyhow::Result<()> {
            anyhow::bail!("media host unreachable")
        }
        async fn delete_object(&self, _k: &str) -> anyhow::Result<()> {
            Ok(())
        }
        fn object_url(&self, k: &str) -> String {
            format!("https://unreachable.local/{}", k)
        }
    }

    fn tmp_dir() -> String {
        std::env::temp_dir().to_string_lossy().into_owned()
    }

    #[test]
    fn test_ext_from_mime() {
        assert_eq!(ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/png"), Some("png"));
        assert_eq!(ext_from_mime("image/webp"), Some("webp"));
        assert_eq!(ext_from_mime("application/octet-stream"), None);
    }

    #[tokio::test]
    async fn upload_returns_url_and_removes_temp_file() {
        let state = AppState::fake();
        let tmp = store_temp(&tmp_dir(), Bytes::from_static(b"png-bytes"), "image/png")
            .await
            .expect("store temp");
        let path = tmp.path().to_path_buf();
        assert!(path.exists());

        let url = upload(&*state.storage, tmp).await;
        assert!(url.expect("url").contains("uploads/"));
        assert!(!path.exists(), "temp file must be removed on success");
    }

    #[tokio::test]
    async fn failed_upload_returns_none_and_removes_temp_file() {
        let tmp = store_temp(&tmp_dir(), Bytes::from_static(b"jpeg-bytes"), "image/jpeg")
            .await
            .expect("store temp");
        let path = tmp.path().to_path_buf();

        let url = upload(&FailStorage, tmp).await;
        assert!(url.is_none());
        assert!(!path.exists(), "temp file must be removed on failure too");
    }

    #[tokio::test]
    async fn dropped_temp_file_is_removed() {
        let tmp = store_temp(&tmp_dir(), Bytes::from_static(b"bytes"), "image/webp")
            .await
            .expect("store temp");
        let path = tmp.path().to_path_buf();
        assert!(path.exists());
        drop(tmp);
        assert!(!path.exists(), "drop must clean up unspooled uploads");
    }
}
