//! Filesystem-backed artifact store.
//!
//! Screenshots for an assertion land in `<root>/<session>/<assertion>/`.
//! Path components are sanitized so a session id can never escape the root.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::device::ArtifactStore;
use crate::error::VerifyError;

#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }
}

/// Replaces anything other than alphanumerics, `-`, `_` and `.` with `_`,
/// and refuses the special names `.` and `..`.
fn sanitize_component(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn snapshot_directory(&self, session_id: &str, assertion_id: &str) -> Result<PathBuf, VerifyError> {
        let dir = self
            .root
            .join(sanitize_component(session_id))
            .join(sanitize_component(assertion_id));
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| VerifyError::ArtifactDirectory(format!("{}: {}", dir.display(), e)))?;
        Ok(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_path_components() {
        assert_eq!(sanitize_component("run 1/../x"), "run_1_.._x");
        assert_eq!(sanitize_component(".."), "_");
        assert_eq!(sanitize_component(""), "_");
        assert_eq!(sanitize_component("abc-123_x.y"), "abc-123_x.y");
    }

    #[tokio::test]
    async fn creates_directory_idempotently() {
        let root = std::env::temp_dir().join(format!("vigil-artifacts-{}", uuid::Uuid::new_v4()));
        let store = FsArtifactStore::new(&root);
        let first = store.snapshot_directory("session", "a1").await.unwrap();
        let second = store.snapshot_directory("session", "a1").await.unwrap();
        assert_eq!(first, second);
        assert!(first.is_dir());
        assert_eq!(first, root.join("session").join("a1"));
        std::fs::remove_dir_all(&root).ok();
    }
}
