//! # FDT Encoder

use crate::{Fdt, FdtError, MAX_DEPTH, Node};
use alloc::string::ToString;
use alloc::vec::Vec;
use vm_fdt::{FdtReserveEntry, FdtWriter};

impl Fdt {
    /// Flatten the tree into an FDT v17 blob.
    ///
    /// The output is a pure function of the tree: identical trees always
    /// produce identical bytes.
    ///
    /// # Errors
    /// - [`FdtError::InvalidNodeName`] for an empty non-root node name, one
    ///   containing `/` or NUL, or one the writer refuses.
    /// - [`FdtError::InvalidPropertyName`] for an empty name, one containing
    ///   NUL, or one the writer refuses.
    /// - [`FdtError::InvalidReservation`] for an empty or wrapping entry.
    /// - [`FdtError::TooDeep`] past [`MAX_DEPTH`] levels.
    /// - [`FdtError::Encode`] for anything else the writer rejects.
    pub fn to_bytes(&self) -> Result<Vec<u8>, FdtError> {
        let reservations = self
            .reserved
            .iter()
            .map(|r| {
                let invalid = FdtError::InvalidReservation {
                    address: r.address,
                    size: r.size,
                };
                if r.size == 0 || r.address.checked_add(r.size).is_none() {
                    return Err(invalid);
                }
                FdtReserveEntry::new(r.address, r.size).map_err(|_| invalid)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut writer = FdtWriter::new_with_mem_reserv(&reservations).map_err(|e| writer_error(&e))?;
        writer.set_boot_cpuid_phys(self.boot_cpuid_phys);
        write_node(&mut writer, &self.root, "", 0)?;
        writer.finish().map_err(|e| writer_error(&e))
    }
}

fn write_node(writer: &mut FdtWriter, node: &Node, name: &str, depth: usize) -> Result<(), FdtError> {
    if depth >= MAX_DEPTH {
        return Err(FdtError::TooDeep(MAX_DEPTH));
    }
    // Only the root may be unnamed.
    if depth > 0 && (name.is_empty() || name.contains(['\0', '/'])) {
        return Err(FdtError::InvalidNodeName(name.to_string()));
    }

    let handle = writer.begin_node(name).map_err(|e| match e {
        vm_fdt::Error::InvalidNodeName => FdtError::InvalidNodeName(name.to_string()),
        other => writer_error(&other),
    })?;

    for prop in node.properties() {
        if prop.name().is_empty() || prop.name().contains('\0') {
            return Err(FdtError::InvalidPropertyName(prop.name().to_string()));
        }
        writer.property(prop.name(), prop.value()).map_err(|e| match e {
            vm_fdt::Error::InvalidPropertyName => FdtError::InvalidPropertyName(prop.name().to_string()),
            other => writer_error(&other),
        })?;
    }

    for child in node.children() {
        write_node(writer, child, child.name(), depth + 1)?;
    }

    writer.end_node(handle).map_err(|e| writer_error(&e))
}

fn writer_error(e: &vm_fdt::Error) -> FdtError {
    FdtError::Encode(e.to_string())
}
