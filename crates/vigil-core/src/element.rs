//! UI element tree types captured from the accessibility hierarchy.
//!
//! A [`UIElement`] is one node of a snapshot. Snapshots are produced by a
//! [`UiInspector`](crate::device::UiInspector), are immutable once captured,
//! and are discarded after each poll attempt.
//!
//! The serde representation accepts the accessibility JSON emitted by the
//! `axe` tool (`AXUniqueId`, `AXLabel`, `AXValue`, `type`) as well as the
//! plain field names, so fixtures can be written either way.

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

fn is_true(value: &bool) -> bool {
    *value
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// A node in a captured UI hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UIElement {
    /// The type of UI element (e.g., "Button", "TextField", "StaticText").
    #[serde(rename = "type", default)]
    pub element_type: Option<String>,

    /// The accessibility identifier (AXUniqueId).
    #[serde(rename = "AXUniqueId", alias = "identifier", default)]
    pub identifier: Option<String>,

    /// The accessibility label (AXLabel), typically the user-visible text.
    #[serde(rename = "AXLabel", alias = "label", default)]
    pub label: Option<String>,

    /// The current value (AXValue), e.g. text field contents.
    #[serde(rename = "AXValue", alias = "value", default)]
    pub value: Option<String>,

    /// Whether the element accepts interaction.
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub enabled: bool,

    /// Whether the element is currently on screen.
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub visible: bool,

    /// Whether the element is in a selected state (tabs, segments, toggles).
    #[serde(default, skip_serializing_if = "is_false")]
    pub selected: bool,

    /// Backend-reported hittability, when the backend knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hittable: Option<bool>,

    /// The element's frame in screen points.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame: Option<ElementFrame>,

    /// Child elements in document order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<UIElement>,
}

impl Default for UIElement {
    fn default() -> Self {
        Self {
            element_type: None,
            identifier: None,
            label: None,
            value: None,
            enabled: true,
            visible: true,
            selected: false,
            hittable: None,
            frame: None,
            children: Vec::new(),
        }
    }
}

/// The frame (position and dimensions) of a UI element.
///
/// Coordinates are in screen points, with the origin at the top-left
/// corner of the screen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElementFrame {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ElementFrame {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }
}

impl UIElement {
    /// Creates an element of the given type with default state
    /// (enabled, visible, not selected, no frame).
    pub fn new(element_type: impl Into<String>) -> Self {
        Self {
            element_type: Some(element_type.into()),
            ..Self::default()
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_frame(mut self, frame: ElementFrame) -> Self {
        self.frame = Some(frame);
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn with_selected(mut self, selected: bool) -> Self {
        self.selected = selected;
        self
    }

    pub fn with_children(mut self, children: Vec<UIElement>) -> Self {
        self.children = children;
        self
    }

    /// Whether a user could interact with this element right now.
    ///
    /// Requires the element to be visible, enabled, to occupy a non-zero
    /// area on screen, and not to be reported unhittable by the backend.
    pub fn is_hittable(&self) -> bool {
        self.visible
            && self.enabled
            && self.hittable != Some(false)
            && self.frame.map_or(false, |f| f.area() > 0.0)
    }

    /// Total number of nodes in this subtree, including `self`.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(UIElement::count).sum::<usize>()
    }

    /// A copy of this element without its children, for embedding in results.
    pub fn detached(&self) -> UIElement {
        UIElement {
            children: Vec::new(),
            ..self.clone()
        }
    }

    /// Short human-readable description, e.g. `Button "login_button"`.
    pub fn describe(&self) -> String {
        let kind = self.element_type.as_deref().unwrap_or("Element");
        match (&self.identifier, &self.label) {
            (Some(id), _) => format!("{} \"{}\"", kind, id),
            (None, Some(label)) => format!("{} labeled \"{}\"", kind, label),
            (None, None) => kind.to_string(),
        }
    }
}
