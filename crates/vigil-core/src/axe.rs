//! Interface to the `axe` accessibility CLI.
//!
//! [`Axe`] is the reference [`UiInspector`]: it runs
//! `axe describe-ui --udid <udid>` and parses the JSON hierarchy into a
//! [`UIElement`] tree.

use std::io;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tokio::time::Instant;
use tracing::debug;

use crate::device::{UiInspector, UiSnapshot};
use crate::element::UIElement;
use crate::error::VerifyError;

/// Type tag of the synthetic node wrapping multi-root hierarchies.
pub const SYNTHETIC_ROOT_TYPE: &str = "Root";

#[derive(Error, Debug)]
pub enum AxeError {
    #[error("Command execution failed: {0}")]
    CommandFailed(String),
    #[error("axe tool not found - install with: brew install cameroncooke/axe/axe")]
    NotInstalled,
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Axe;

impl Axe {
    /// Dump the UI hierarchy of a simulator as a single tree.
    ///
    /// A missing `axe` binary is reported as [`AxeError::NotInstalled`]
    /// from the spawn itself, so a poll attempt costs a single process.
    pub async fn dump_hierarchy(udid: &str) -> Result<UIElement, AxeError> {
        Self::describe_ui("axe", udid).await
    }

    async fn describe_ui(program: &str, udid: &str) -> Result<UIElement, AxeError> {
        let output = Command::new(program)
            .args(["describe-ui", "--udid", udid])
            .output()
            .await
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => AxeError::NotInstalled,
                _ => AxeError::Io(e),
            })?;

        if !output.status.success() {
            return Err(AxeError::CommandFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        Self::parse_hierarchy(&output.stdout)
    }

    /// Parses `describe-ui` output.
    ///
    /// axe prints a top-level array. A single element is returned as-is;
    /// anything else is wrapped in a [`SYNTHETIC_ROOT_TYPE`] node so the
    /// matcher always sees exactly one root. A bare object is also accepted.
    pub fn parse_hierarchy(json: &[u8]) -> Result<UIElement, AxeError> {
        let value: serde_json::Value = serde_json::from_slice(json)?;
        if value.is_object() {
            return Ok(serde_json::from_value(value)?);
        }

        let mut roots: Vec<UIElement> = serde_json::from_value(value)?;
        if roots.len() == 1 {
            if let Some(root) = roots.pop() {
                return Ok(root);
            }
        }
        Ok(UIElement::new(SYNTHETIC_ROOT_TYPE).with_children(roots))
    }
}

#[async_trait]
impl UiInspector for Axe {
    async fn inspect(&self, device_id: &str, session_id: Option<&str>) -> Result<UiSnapshot, VerifyError> {
        let start = Instant::now();
        let tree = Self::dump_hierarchy(device_id)
            .await
            .map_err(|e| VerifyError::Snapshot(e.to_string()))?;
        let duration_ms = start.elapsed().as_millis() as u64;
        debug!(device_id, session_id, duration_ms, "captured hierarchy");
        Ok(UiSnapshot::new(tree, duration_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_HIERARCHY: &str = r#"[
        {
            "type": "Application",
            "AXLabel": "MyApp",
            "frame": {"x": 0, "y": 0, "width": 393, "height": 852},
            "role": "AXApplication",
            "children": [
                {
                    "type": "Button",
                    "AXUniqueId": "login_button",
                    "AXLabel": "Log In",
                    "enabled": true,
                    "frame": {"x": 20, "y": 400, "width": 353, "height": 44},
                    "children": []
                },
                {
                    "type": "TextField",
                    "AXUniqueId": "email",
                    "AXValue": "",
                    "enabled": false,
                    "children": []
                }
            ]
        }
    ]"#;

    #[tokio::test]
    async fn missing_binary_is_not_installed() {
        let err = Axe::describe_ui("vigil-no-such-axe-binary", "UDID").await.unwrap_err();
        assert!(matches!(err, AxeError::NotInstalled), "got {err:?}");
    }

    #[test]
    fn parses_single_root_without_wrapping() {
        let tree = Axe::parse_hierarchy(SAMPLE_HIERARCHY.as_bytes()).unwrap();
        assert_eq!(tree.element_type.as_deref(), Some("Application"));
        assert_eq!(tree.children.len(), 2);
        assert_eq!(tree.children[0].identifier.as_deref(), Some("login_button"));
        assert!(tree.children[0].is_hittable());
        assert!(!tree.children[1].enabled);
        assert_eq!(tree.children[1].value.as_deref(), Some(""));
    }

    #[test]
    fn wraps_multiple_roots() {
        let json = r#"[{"type": "Window"}, {"type": "Keyboard"}]"#;
        let tree = Axe::parse_hierarchy(json.as_bytes()).unwrap();
        assert_eq!(tree.element_type.as_deref(), Some(SYNTHETIC_ROOT_TYPE));
        assert_eq!(tree.children.len(), 2);
    }

    #[test]
    fn empty_array_yields_empty_root() {
        let tree = Axe::parse_hierarchy(b"[]").unwrap();
        assert!(tree.children.is_empty());
        assert_eq!(tree.count(), 1);
    }

    #[test]
    fn accepts_bare_object() {
        let tree = Axe::parse_hierarchy(br#"{"type": "Window", "AXUniqueId": "w"}"#).unwrap();
        assert_eq!(tree.identifier.as_deref(), Some("w"));
    }

    #[test]
    fn rejects_invalid_json() {
        assert!(matches!(Axe::parse_hierarchy(b"nope"), Err(AxeError::JsonParse(_))));
    }

    #[test]
    fn test_axe_error_display() {
        assert!(AxeError::NotInstalled.to_string().contains("brew install"));
    }
}
