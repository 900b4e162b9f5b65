//! # FDT Decoder

use crate::{Fdt, FdtError, MAX_DEPTH, Node, Property, ReserveEntry};
use alloc::string::ToString;
use alloc::vec;
use fdt_rs::base::DevTree;
use fdt_rs::error::DevTreeError;
use fdt_rs::index::{DevTreeIndex, DevTreeIndexNode};
use fdt_rs::prelude::*;

/// Alignment of the private copy handed to the parser.
const BLOB_ALIGN: usize = 8;

/// Size of the fixed FDT header.
const HEADER_LEN: usize = 40;

/// Extra room for the index; `get_layout` undershoots on some trees.
const INDEX_SLACK: usize = 64;

impl Fdt {
    /// Parse a flattened device tree.
    ///
    /// Trailing bytes past the header's `totalsize` are ignored, so a blob
    /// padded out to a page boundary parses the same as the unpadded one.
    ///
    /// # Errors
    /// Any structural problem with the blob is reported as an [`FdtError`];
    /// nothing is returned for partially valid input.
    pub fn from_bytes(blob: &[u8]) -> Result<Self, FdtError> {
        let blob = blob.get(..total_size(blob)?).ok_or(FdtError::Truncated)?;

        let mut storage = vec![0u8; blob.len() + BLOB_ALIGN];
        let start = storage.as_ptr().align_offset(BLOB_ALIGN);
        let copy = storage
            .get_mut(start..start + blob.len())
            .ok_or(FdtError::Truncated)?;
        copy.copy_from_slice(blob);
        let copy = &*copy;

        // SAFETY: `copy` is aligned, sized to exactly `totalsize` and
        // outlives every borrow the parser hands out below. The parser
        // validates the header itself.
        let tree = unsafe { DevTree::new(copy) }.map_err(|e| parse_error(&e))?;

        let boot_cpuid_phys = tree.boot_cpuid_phys();
        let reserved = tree
            .reserved_entries()
            .map(|entry| ReserveEntry {
                address: u64::from(entry.address),
                size: u64::from(entry.size),
            })
            .collect();

        let layout = DevTreeIndex::get_layout(&tree).map_err(|e| parse_error(&e))?;
        let mut index_storage = vec![0u8; layout.size() + layout.align() + INDEX_SLACK];
        let index = DevTreeIndex::new(tree, &mut index_storage).map_err(|e| parse_error(&e))?;

        let mut root = convert(&index.root(), 0)?;
        root.set_name("");

        Ok(Self {
            boot_cpuid_phys,
            reserved,
            root,
        })
    }
}

/// `totalsize` from the header, the second big-endian word.
fn total_size(blob: &[u8]) -> Result<usize, FdtError> {
    if blob.len() < HEADER_LEN {
        return Err(FdtError::Truncated);
    }
    let size = u32::from_be_bytes([blob[4], blob[5], blob[6], blob[7]]);
    match usize::try_from(size) {
        Ok(size) if size >= HEADER_LEN => Ok(size),
        _ => Err(FdtError::Truncated),
    }
}

fn convert(node: &DevTreeIndexNode<'_, '_, '_>, depth: usize) -> Result<Node, FdtError> {
    if depth >= MAX_DEPTH {
        return Err(FdtError::TooDeep(MAX_DEPTH));
    }

    let mut out = Node::new(node.name().map_err(|e| parse_error(&e))?);
    for prop in node.props() {
        let name = prop.name().map_err(|e| parse_error(&e))?;
        out.set_property(Property::new(name, prop.propbuf().to_vec()));
    }
    for child in node.children() {
        out.add_child(convert(&child, depth + 1)?);
    }
    Ok(out)
}

fn parse_error(e: &DevTreeError) -> FdtError {
    match e {
        DevTreeError::InvalidMagicNumber => FdtError::BadMagic,
        other => FdtError::Malformed(other.to_string()),
    }
}
