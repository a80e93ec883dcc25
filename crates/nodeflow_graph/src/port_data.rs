// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port descriptors.

use crate::value::ValueType;
use serde::{Deserialize, Serialize};

/// Shape of a single port generated for a node field.
///
/// Equality is structural. Identifiers are normalized so that an empty
/// identifier and no identifier compare equal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortData {
    /// Identifier, unique among the ports of one field
    pub identifier: Option<String>,
    /// Display name
    pub display_name: String,
    /// Type used for compatibility checks, `None` means the field's declared type
    pub display_type: Option<ValueType>,
    /// Whether multiple edges may be attached
    pub accept_multiple_edges: bool,
    /// Size hint for editors
    pub size_in_pixel: u32,
    /// Layout hint for editors
    pub vertical: bool,
    /// Tooltip for editors
    pub tooltip: Option<String>,
}

impl PortData {
    /// Create a port descriptor with a display name and type
    pub fn new(display_name: impl Into<String>, display_type: ValueType) -> Self {
        Self {
            display_name: display_name.into(),
            display_type: Some(display_type),
            ..Self::default()
        }
    }

    /// Set the identifier, empty strings mean "no identifier"
    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        let identifier = identifier.into();
        self.identifier = if identifier.is_empty() { None } else { Some(identifier) };
        self
    }

    /// Allow multiple edges
    pub fn multiple(mut self) -> Self {
        self.accept_multiple_edges = true;
        self
    }

    /// Set the size hint
    pub fn with_size(mut self, size_in_pixel: u32) -> Self {
        self.size_in_pixel = size_in_pixel;
        self
    }

    /// Normalized identifier
    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref().filter(|id| !id.is_empty())
    }

    /// Whether this descriptor has the given (normalized) identifier
    pub fn has_identifier(&self, identifier: Option<&str>) -> bool {
        self.identifier() == identifier.filter(|id| !id.is_empty())
    }

    /// Patch this descriptor in place so it matches `other`
    pub fn copy_from(&mut self, other: &PortData) {
        self.identifier = other.identifier().map(str::to_string);
        self.display_name.clone_from(&other.display_name);
        self.display_type.clone_from(&other.display_type);
        self.accept_multiple_edges = other.accept_multiple_edges;
        self.size_in_pixel = other.size_in_pixel;
        self.vertical = other.vertical;
        self.tooltip.clone_from(&other.tooltip);
    }
}

impl PartialEq for PortData {
    fn eq(&self, other: &Self) -> bool {
        self.identifier() == other.identifier()
            && self.display_name == other.display_name
            && self.display_type == other.display_type
            && self.accept_multiple_edges == other.accept_multiple_edges
            && self.size_in_pixel == other.size_in_pixel
            && self.vertical == other.vertical
            && self.tooltip == other.tooltip
    }
}
