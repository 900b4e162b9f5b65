//! # Flattened Device Tree
//!
//! An owned, in-memory device-tree model together with an encoder for (and,
//! with the `decode` feature, a decoder of) the flattened device tree (FDT)
//! binary format, version 17.
//!
//! The model is deliberately small: a tree of [`Node`]s, each carrying an
//! ordered list of [`Property`] values and an ordered list of children.
//! Callers build or mutate the tree with plain methods and hand it to
//! [`Fdt::to_bytes`] once all edits are done.
//!
//! ## Codec
//!
//! Flattening is delegated to [`vm_fdt::FdtWriter`] and parsing to the
//! `fdt-rs` index. This crate only maps the owned model onto them and
//! their errors onto [`FdtError`].

#![no_std]

extern crate alloc;

#[cfg(feature = "decode")]
mod decode;
mod encode;
mod node;
mod property;

use alloc::string::String;
use alloc::vec::Vec;

pub use node::Node;
pub use property::Property;

/// Deepest node nesting accepted in either direction.
pub const MAX_DEPTH: usize = 64;

/// One entry of the memory reservation block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ReserveEntry {
    pub address: u64,
    pub size: u64,
}

/// A complete device tree: header-level fields plus the root node.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Fdt {
    /// Physical ID of the boot CPU, copied into the header.
    pub boot_cpuid_phys: u32,

    /// Memory reservation entries, emitted in order.
    pub reserved: Vec<ReserveEntry>,

    /// The root node. Its name is never written; the root is always unnamed.
    pub root: Node,
}

impl Fdt {
    #[must_use]
    pub const fn new(root: Node) -> Self {
        Self {
            boot_cpuid_phys: 0,
            reserved: Vec::new(),
            root,
        }
    }
}

/// Errors raised while flattening or parsing a device tree.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FdtError {
    #[error("invalid node name {0:?}")]
    InvalidNodeName(String),
    #[error("invalid property name {0:?}")]
    InvalidPropertyName(String),
    #[error("invalid memory reservation {address:#x}+{size:#x}")]
    InvalidReservation { address: u64, size: u64 },
    #[error("node nesting exceeds {0} levels")]
    TooDeep(usize),
    #[error("cannot flatten device tree: {0}")]
    Encode(String),
    #[error("blob is too short to hold an FDT header")]
    Truncated,
    #[error("bad FDT magic")]
    BadMagic,
    #[error("malformed device tree blob: {0}")]
    Malformed(String),
}
