// SPDX-License-Identifier: MIT OR Apache-2.0
//! Material expression graph reconstruction.
//!
//! This crate rebuilds the node graph of a material or material function
//! from the flat export list:
//! - Expression node types and pin structs for the type registry
//! - Node type resolution with renames and placeholders
//! - A three-pass builder wiring pins between nodes
//! - Connection queries over the reconstructed graph
//!
//! ## Architecture
//!
//! Nodes are ordinary objects in the session's arena. The builder makes
//! every node exist first, then lets the property codec resolve pins by
//! name through the session's named scope.

pub mod builder;
pub mod connection;
pub mod graph;
pub mod graphs;
pub mod node;
pub mod pin;

pub use builder::{build_graph, prepare_session};
pub use connection::Connection;
pub use graph::{ExpressionGraph, GraphError, GraphResult};
pub use graphs::material::{register_material_types, MaterialTypes};
pub use node::{classify, resolve_node_class, NodeKind};
pub use pin::{expression_name, populate_pin, ChannelMask, Pin, PinConstant, PinType};
