//! # Boot Metadata
//!
//! Produces the device-tree blob handed to the next kernel: a copy of the
//! running system's tree whose `/chosen` node describes the initramfs and
//! the command line.

use crate::options::KexecOptions;
use device_tree::{Fdt, FdtError, Node, Property};
use kexec_addresses::PhysicalRange;

pub const CHOSEN_NODE: &str = "chosen";
pub const PROP_INITRD_START: &str = "linux,initrd-start";
pub const PROP_INITRD_END: &str = "linux,initrd-end";
pub const PROP_BOOTARGS: &str = "bootargs";
pub const PROP_ADDRESS_CELLS: &str = "#address-cells";

/// `#address-cells` assumed when the root node does not say.
const DEFAULT_ADDRESS_CELLS: u32 = 2;

/// Join `cmdline` and the extra fragments with single spaces, dropping
/// surrounding whitespace and empty pieces.
#[must_use]
pub fn merge_cmdline(cmdline: &str, extra: &[String]) -> String {
    core::iter::once(cmdline)
        .chain(extra.iter().map(String::as_str))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Build the tree for the next kernel without serializing it.
///
/// `full_tree` and `chosen` are cloned; the caller's values stay untouched.
#[must_use]
pub fn build_tree(
    full_tree: &Fdt,
    chosen: &Node,
    secondary: Option<PhysicalRange>,
    cmdline: &str,
    options: &KexecOptions,
) -> Fdt {
    let mut tree = full_tree.clone();
    let mut chosen = chosen.clone();
    chosen.set_name(CHOSEN_NODE);

    chosen.remove_property(PROP_INITRD_START);
    chosen.remove_property(PROP_INITRD_END);
    if let Some(range) = secondary {
        let cells = address_cells(&tree.root);
        let start = range.start().as_u64();
        let end = range.end().as_u64();
        chosen.set_property(address_property(PROP_INITRD_START, start, cells));
        chosen.set_property(address_property(PROP_INITRD_END, end, cells));
    }

    let merged = merge_cmdline(cmdline, &options.extra_cmdline);
    if !merged.is_empty() {
        chosen.set_property(Property::string(PROP_BOOTARGS, &merged));
    } else if !options.reuse_cmdline {
        chosen.remove_property(PROP_BOOTARGS);
    }

    tree.root.upsert_child(chosen);
    tree
}

/// Build the tree for the next kernel and serialize it as an FDT blob.
///
/// # Errors
/// Any [`FdtError`] raised by the encoder.
pub fn augment(
    full_tree: &Fdt,
    chosen: &Node,
    secondary: Option<PhysicalRange>,
    cmdline: &str,
    options: &KexecOptions,
) -> Result<Vec<u8>, FdtError> {
    build_tree(full_tree, chosen, secondary, cmdline, options).to_bytes()
}

/// Root `#address-cells`, clamped to the one or two cells we can encode.
fn address_cells(root: &Node) -> u32 {
    root.property(PROP_ADDRESS_CELLS)
        .and_then(Property::as_u32)
        .unwrap_or(DEFAULT_ADDRESS_CELLS)
        .clamp(1, 2)
}

fn address_property(name: &str, value: u64, cells: u32) -> Property {
    match u32::try_from(value) {
        Ok(v) if cells == 1 => Property::u32(name, v),
        _ => Property::u64(name, value),
    }
}
