// Typed edges
// A link connects one component's named output port to another component's
// named input port. Callers collect incoming links for a new component in a
// `Data` spec before handing it to the builder.

use serde::Serialize;
use std::fmt;

/// Reference to a named port on a named component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PortRef {
    pub component: String,
    pub port: String,
}

impl PortRef {
    pub fn new(component: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            port: port.into(),
        }
    }
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.component, self.port)
    }
}

/// A directed edge from an output port to an input port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    pub from: PortRef,
    pub to: PortRef,
}

/// Incoming links for a component about to be added, keyed by the input
/// port they feed. Declaration order is preserved.
#[derive(Debug, Clone, Default)]
pub struct Data {
    entries: Vec<(String, PortRef)>,
}

impl Data {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed an input port from an upstream output.
    pub fn with(mut self, input_port: impl Into<String>, source: PortRef) -> Self {
        self.entries.push((input_port.into(), source));
        self
    }

    /// Shorthand for the common single `data` input.
    pub fn data(source: PortRef) -> Self {
        Self::new().with("data", source)
    }

    /// Shorthand for a learner's `train_data` input.
    pub fn train_data(source: PortRef) -> Self {
        Self::new().with("train_data", source)
    }

    pub fn entries(&self) -> &[(String, PortRef)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
