//! # Kexec Image Loader
//!
//! Prepares a kernel for a kexec-style handoff: given a map of the running
//! machine's physical memory, a kernel image, an optional initramfs and the
//! current device tree, it decides where every piece goes and produces the
//! byte blobs to copy there.
//!
//! ## Overview
//!
//! | Type | Description |
//! |------|-------------|
//! | [`MemoryMap`] | Typed physical ranges; only [`RangeType::Ram`] is used for placement. |
//! | [`KexecLoader`] | Entry point. Built once per target architecture, then [`KexecLoader::load`] per image. |
//! | [`LoadResult`] | Entry address plus the ordered, non-overlapping [`Segments`]. |
//! | [`BootStub`] | Architecture-specific purgatory code that jumps into the new kernel. |
//! | [`KexecOptions`] | Per-call command-line and header handling knobs. |
//!
//! The layout inside the selected region is fixed, see [`layout`]:
//! device tree at the base, boot stub right after it, kernel at
//! [`KERNEL_LOAD_OFFSET`], initramfs after the kernel.
//!
//! ## Typical Usage
//!
//! ```rust
//! # use kexec_loader::*;
//! # use device_tree::{Fdt, Node};
//! let loader = KexecLoader::new(Arch::Aarch64).unwrap();
//! let map: MemoryMap = [TypedRange::ram(0x0010_0000, 0x1010_0000)].into_iter().collect();
//! let tree = Fdt::new(Node::root().with_child(Node::new("chosen")));
//! let chosen = tree.root.child("chosen").unwrap().clone();
//!
//! let kernel = vec![0u8; 0x00A0_0000];
//! let result = loader
//!     .load(&map, &mut &kernel[..], None, &chosen, &tree, "console=ttyAMA0", &KexecOptions::default())
//!     .unwrap();
//!
//! assert_eq!(result.entry().as_u64(), 0x0010_1000);
//! assert_eq!(result.segments().len(), 3);
//! ```
//!
//! ## Logging
//!
//! The loader never touches the global `log` logger. Pass a `&'static dyn
//! log::Log` to [`KexecLoaderBuilder::logger`] to see its diagnostics;
//! [`StderrLogger`] is a ready-made one.

mod arch;
mod boot_stub;
mod image;
pub mod layout;
mod loader;
mod logger;
mod memory_map;
pub mod metadata;
mod options;
mod segment;

pub use arch::{Arch, UnknownArch};
pub use boot_stub::BootStub;
pub use image::{ARM64_IMAGE_MAGIC, Arm64ImageHeader, ImageFlags, KernelPageSize};
pub use layout::{BootLayout, KERNEL_LOAD_OFFSET, PAGE_SIZE};
pub use loader::{ImageKind, KexecLoader, KexecLoaderBuilder, LoadError, LoadResult};
pub use logger::{NULL_LOGGER, NullLogger, StderrLogger};
pub use memory_map::{
    InsufficientMemory, MemoryMap, Placement, RangeType, TypedRange, UnknownRangeType,
};
pub use options::KexecOptions;
pub use segment::{Segment, SegmentError, Segments};

pub use kexec_addresses::{PhysicalAddress, PhysicalRange};
