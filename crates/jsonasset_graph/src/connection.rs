// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection (edge) definitions for the expression graph.

use crate::pin::{ChannelMask, Pin};
use jsonasset_core::ObjectHandle;

/// An edge from a node output into a pin
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Connection {
    /// Upstream node
    pub from_node: ObjectHandle,
    /// Output of the upstream node
    pub output_index: i64,
    /// Node (or parent asset) owning the pin
    pub to_node: ObjectHandle,
    /// Pin path on the target, e.g. `A`, `Inputs[2]` or `BaseColor`
    pub input: String,
    /// Channel mask of the pin
    pub mask: ChannelMask,
}

impl Connection {
    /// Create a new connection
    pub fn new(
        from_node: ObjectHandle,
        output_index: i64,
        to_node: ObjectHandle,
        input: impl Into<String>,
    ) -> Self {
        Self {
            from_node,
            output_index,
            to_node,
            input: input.into(),
            mask: ChannelMask::default(),
        }
    }

    /// Connection described by a connected pin
    pub fn from_pin(pin: &Pin, to_node: ObjectHandle, input: impl Into<String>) -> Option<Self> {
        let from_node = pin.expression?;
        Some(Self {
            mask: pin.mask,
            ..Self::new(from_node, pin.output_index, to_node, input)
        })
    }

    /// Check if this connection involves a specific node
    pub fn involves_node(&self, node: ObjectHandle) -> bool {
        self.from_node == node || self.to_node == node
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_pin() {
        let pin = Pin {
            expression: Some(ObjectHandle(4)),
            output_index: 1,
            ..Pin::default()
        };
        let connection = Connection::from_pin(&pin, ObjectHandle(9), "B").unwrap();
        assert_eq!(connection, Connection::new(ObjectHandle(4), 1, ObjectHandle(9), "B"));
        assert!(connection.involves_node(ObjectHandle(9)));
        assert!(!connection.involves_node(ObjectHandle(5)));

        assert!(Connection::from_pin(&Pin::default(), ObjectHandle(9), "B").is_none());
    }
}
