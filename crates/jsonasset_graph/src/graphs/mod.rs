// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph types registered on top of the core type registry.

pub mod material;
