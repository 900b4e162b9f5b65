//! # Boot Image Layout
//!
//! Placement constants for the image the loader builds, relative to the base
//! of the selected RAM region:
//!
//! ```text
//! region base         ┌────────────────────────────┐
//!                     │ device-tree blob (1 page+) │
//! + metadata slot     ├────────────────────────────┤ ← entry
//!                     │ boot stub (1 page)         │
//!                     ├────────────────────────────┤
//!                     │ unused                     │
//! + KERNEL_LOAD_OFFSET├────────────────────────────┤
//!                     │ kernel image               │
//!                     ├────────────────────────────┤ page aligned
//!                     │ initramfs (optional)       │
//!                     └────────────────────────────┘
//! ```

use kexec_addresses::{PageSize, Size4K, align_up};

/// Granularity of the metadata and boot-stub slots.
pub const PAGE_SIZE: u64 = Size4K::SIZE;

/// Distance from the region base to the kernel's load address.
pub const KERNEL_LOAD_OFFSET: u64 = 0x0010_0000; // 1 MiB

/// Minimum alignment of the selected RAM region.
pub const REGION_ALIGNMENT: u64 = Size4K::SIZE;

const _: () = {
    assert!(KERNEL_LOAD_OFFSET.is_multiple_of(PAGE_SIZE));
    assert!(KERNEL_LOAD_OFFSET >= 2 * PAGE_SIZE);
    assert!(REGION_ALIGNMENT.is_power_of_two() && REGION_ALIGNMENT >= PAGE_SIZE);
};

/// Layout parameters of one loader instance.
///
/// The defaults are the modeled arm64 values. Every field can be overridden
/// through [`KexecLoaderBuilder`](crate::KexecLoaderBuilder); overrides are
/// checked once by [`BootLayout::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BootLayout {
    /// Slot granularity for the metadata blob and the boot stub.
    pub page_size: u64,

    /// Offset of the kernel from the region base. Holds the metadata blob and
    /// the boot stub.
    pub kernel_offset: u64,

    /// Alignment of the region base. At least `page_size`, so the slots
    /// carved from the base stay page aligned.
    pub region_alignment: u64,
}

impl Default for BootLayout {
    fn default() -> Self {
        Self {
            page_size: PAGE_SIZE,
            kernel_offset: KERNEL_LOAD_OFFSET,
            region_alignment: REGION_ALIGNMENT,
        }
    }
}

impl BootLayout {
    /// Check the invariants the placement algorithm relies on.
    ///
    /// # Errors
    /// Returns a static description of the first violated rule.
    pub const fn validate(&self) -> Result<(), &'static str> {
        if !self.page_size.is_power_of_two() || self.page_size < PAGE_SIZE {
            return Err("page size must be a power of two of at least 4 KiB");
        }
        if !self.region_alignment.is_power_of_two() {
            return Err("region alignment must be a non-zero power of two");
        }
        if self.region_alignment < self.page_size {
            return Err("region alignment must be at least the page size");
        }
        if !self.kernel_offset.is_multiple_of(self.page_size) {
            return Err("kernel offset must be page aligned");
        }
        if self.kernel_offset < 2 * self.page_size {
            return Err("kernel offset must leave room for the metadata and boot stub pages");
        }
        Ok(())
    }

    /// Round `value` up to the page size, or `None` on overflow.
    #[must_use]
    pub const fn page_align(&self, value: u64) -> Option<u64> {
        align_up(value, self.page_size)
    }

    /// Largest metadata slot that still leaves a page for the boot stub.
    #[must_use]
    pub const fn metadata_capacity(&self) -> u64 {
        self.kernel_offset.saturating_sub(self.page_size)
    }
}
