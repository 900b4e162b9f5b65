//! # Physical Address Types
//!
//! Strongly typed wrappers for physical addresses and address ranges used when
//! laying out a kexec image in the physical memory of the running machine.
//!
//! ## Overview
//!
//! Everything the image loader places is bound to a *physical* address: the
//! kernel, the boot stub, the device-tree blob and the optional initramfs.
//! Mixing up a byte length with an address, or an unaligned address with an
//! aligned one, corrupts the next boot without any chance of recovery. This
//! crate therefore builds the loader's arithmetic from a few principal types:
//!
//! | Type | Description |
//! |------|-------------|
//! | [`PhysicalAddress`] | A raw 64-bit physical address. |
//! | [`PhysicalRange`] | A half-open interval `[start, start + size)` of physical memory. |
//! | [`PageSize`] | Marker trait for page granularities ([`Size4K`], [`Size2M`]). |
//!
//! ## Typical Usage
//!
//! ```rust
//! # use kexec_addresses::*;
//! let base = PhysicalAddress::new(0x0010_0123);
//! let aligned = base.checked_align_up::<Size4K>().unwrap();
//! assert_eq!(aligned.as_u64(), 0x0010_1000);
//!
//! let kernel = PhysicalRange::new(PhysicalAddress::new(0x0020_0000), 0x00A0_0000);
//! let ram = PhysicalRange::from_interval(0x0010_0000, 0x1010_0000);
//! assert!(ram.contains(&kernel));
//! ```
//!
//! ## Design Notes
//!
//! - All types are `Copy`, `Eq`, `Ord` and `Hash`, and all alignment helpers
//!   are `const fn`.
//! - Arithmetic that can leave the 64-bit address space is exposed as
//!   `checked_*` and returns `None` instead of wrapping.

#![cfg_attr(not(any(test, doctest)), no_std)]

mod page_size;
mod physical_address;
mod physical_range;

pub use page_size::{PageSize, Size2M, Size4K};
pub use physical_address::PhysicalAddress;
pub use physical_range::PhysicalRange;

/// Round `value` up to the next multiple of `alignment`.
///
/// An `alignment` of zero is treated as one. Returns `None` if the result
/// does not fit into a `u64`.
#[inline]
#[must_use]
pub const fn align_up(value: u64, alignment: u64) -> Option<u64> {
    let alignment = if alignment == 0 { 1 } else { alignment };
    value.checked_next_multiple_of(alignment)
}
