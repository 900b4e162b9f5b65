//! # Image Loader
//!
//! Lays out kernel, initramfs, device-tree blob and boot stub in one RAM
//! region and returns them as validated [`Segments`].

use crate::arch::Arch;
use crate::boot_stub::BootStub;
use crate::image::Arm64ImageHeader;
use crate::layout::BootLayout;
use crate::logger::{NULL_LOGGER, emit};
use crate::memory_map::{InsufficientMemory, MemoryMap};
use crate::metadata;
use crate::options::KexecOptions;
use crate::segment::{Segment, SegmentError, Segments};
use core::fmt;
use device_tree::{Fdt, FdtError, Node};
use kexec_addresses::{PhysicalAddress, PhysicalRange, Size2M};
use log::{Level, Log};
use std::io::{self, Read};

/// Which input stream an I/O error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageKind {
    Kernel,
    /// The initramfs.
    Secondary,
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Kernel => "kernel",
            Self::Secondary => "initramfs",
        })
    }
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum LoadError {
    #[error(transparent)]
    InsufficientMemory(#[from] InsufficientMemory),
    #[error("failed to read the {image} image")]
    ImageReadFailure {
        image: ImageKind,
        #[source]
        source: io::Error,
    },
    #[error("failed to serialize the device tree")]
    MetadataSerializationFailure(#[from] FdtError),
    #[error("device tree of {size:#x} bytes exceeds the {capacity:#x} bytes below the kernel")]
    MetadataTooLarge { size: u64, capacity: u64 },
    #[error("no boot stub for architecture {0}")]
    UnsupportedArchitecture(Arch),
    #[error("invalid kernel image: {0}")]
    InvalidKernelImage(&'static str),
    #[error("invalid boot layout: {0}")]
    InvalidLayout(&'static str),
    #[error("internal layout violation")]
    InternalLayoutViolation(#[source] SegmentError),
}

/// Output of a successful [`KexecLoader::load`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadResult {
    entry: PhysicalAddress,
    segments: Segments,
}

impl LoadResult {
    /// Address to jump to: the start of the boot stub.
    #[must_use]
    pub const fn entry(&self) -> PhysicalAddress {
        self.entry
    }

    /// Segments in ascending address order: device tree, boot stub, kernel
    /// and, if supplied, the initramfs.
    #[must_use]
    pub const fn segments(&self) -> &Segments {
        &self.segments
    }

    #[must_use]
    pub fn into_segments(self) -> Segments {
        self.segments
    }
}

/// Builds a [`KexecLoader`].
#[derive(Clone, Copy)]
pub struct KexecLoaderBuilder {
    arch: Arch,
    layout: BootLayout,
    logger: &'static dyn Log,
}

impl Default for KexecLoaderBuilder {
    fn default() -> Self {
        Self {
            arch: Arch::Aarch64,
            layout: BootLayout::default(),
            logger: &NULL_LOGGER,
        }
    }
}

impl KexecLoaderBuilder {
    #[must_use]
    pub const fn arch(mut self, arch: Arch) -> Self {
        self.arch = arch;
        self
    }

    #[must_use]
    pub const fn layout(mut self, layout: BootLayout) -> Self {
        self.layout = layout;
        self
    }

    #[must_use]
    pub const fn kernel_offset(mut self, offset: u64) -> Self {
        self.layout.kernel_offset = offset;
        self
    }

    #[must_use]
    pub const fn page_size(mut self, page_size: u64) -> Self {
        self.layout.page_size = page_size;
        self
    }

    #[must_use]
    pub const fn region_alignment(mut self, alignment: u64) -> Self {
        self.layout.region_alignment = alignment;
        self
    }

    /// Route diagnostics to `logger` instead of discarding them.
    #[must_use]
    pub const fn logger(mut self, logger: &'static dyn Log) -> Self {
        self.logger = logger;
        self
    }

    /// # Errors
    /// [`LoadError::InvalidLayout`] if the layout is inconsistent,
    /// [`LoadError::UnsupportedArchitecture`] if there is no boot stub for
    /// the architecture.
    pub fn build(self) -> Result<KexecLoader, LoadError> {
        self.layout.validate().map_err(LoadError::InvalidLayout)?;
        let stub = BootStub::for_arch(self.arch).ok_or(LoadError::UnsupportedArchitecture(self.arch))?;
        Ok(KexecLoader {
            stub,
            layout: self.layout,
            logger: self.logger,
        })
    }
}

impl fmt::Debug for KexecLoaderBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KexecLoaderBuilder")
            .field("arch", &self.arch)
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}

/// Places a kernel and its companions in physical memory.
///
/// Immutable once built; every [`KexecLoader::load`] call is independent.
#[derive(Clone, Copy)]
pub struct KexecLoader {
    stub: BootStub,
    layout: BootLayout,
    logger: &'static dyn Log,
}

impl fmt::Debug for KexecLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KexecLoader")
            .field("stub", &self.stub)
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}

impl KexecLoader {
    #[must_use]
    pub fn builder() -> KexecLoaderBuilder {
        KexecLoaderBuilder::default()
    }

    /// Loader for `arch` with the default layout and no logging.
    ///
    /// # Errors
    /// [`LoadError::UnsupportedArchitecture`] if there is no boot stub for
    /// the architecture.
    pub fn new(arch: Arch) -> Result<Self, LoadError> {
        Self::builder().arch(arch).build()
    }

    #[must_use]
    pub const fn arch(&self) -> Arch {
        self.stub.arch()
    }

    #[must_use]
    pub const fn layout(&self) -> &BootLayout {
        &self.layout
    }

    /// Read the kernel (and optional initramfs), update the device tree and
    /// lay everything out in the first RAM region of `memory_map` that fits.
    ///
    /// `chosen` is the template for the `/chosen` node of `full_tree`; both
    /// are copied, never modified.
    ///
    /// # Errors
    /// See [`LoadError`]. On error nothing is returned and no input is
    /// changed.
    #[allow(clippy::too_many_arguments)]
    pub fn load(
        &self,
        memory_map: &MemoryMap,
        kernel: &mut dyn Read,
        secondary: Option<&mut dyn Read>,
        chosen: &Node,
        full_tree: &Fdt,
        cmdline: &str,
        options: &KexecOptions,
    ) -> Result<LoadResult, LoadError> {
        let kernel = read_image(kernel, ImageKind::Kernel)?;
        if kernel.is_empty() {
            return Err(LoadError::InvalidKernelImage("kernel image is empty"));
        }

        let secondary = match secondary {
            Some(stream) => {
                let data = read_image(stream, ImageKind::Secondary)?;
                if data.is_empty() {
                    emit!(self.logger, Level::Warn, "initramfs is empty, loading without it");
                    None
                } else {
                    Some(data)
                }
            }
            None => None,
        };

        let header = self.kernel_header(&kernel, options)?;
        let kernel_len = kernel.len() as u64;
        let footprint = header.map_or(kernel_len, |h| h.footprint(kernel_len));

        let layout = &self.layout;
        let secondary_len = secondary.as_ref().map_or(0, |d| d.len() as u64);
        let required = layout
            .page_align(footprint)
            .zip(layout.page_align(secondary_len))
            .and_then(|(k, s)| layout.kernel_offset.checked_add(k)?.checked_add(s))
            .ok_or(InsufficientMemory {
                size: u64::MAX,
                alignment: layout.region_alignment,
            })?;

        let placement = memory_map
            .find_placement(required, layout.region_alignment)
            .inspect_err(|e| emit!(self.logger, Level::Error, "{e}"))?;
        let base = placement.start;
        let region = placement.region(required);
        emit!(
            self.logger,
            Level::Debug,
            "selected region {region} in {}",
            placement.ram
        );

        let kernel_start = offset(base, layout.kernel_offset)?;
        if header.is_some_and(|h| h.requires_2m_alignment()) && !kernel_start.is_aligned::<Size2M>() {
            emit!(
                self.logger,
                Level::Warn,
                "kernel at {kernel_start} is not 2 MiB aligned but its header asks for it"
            );
        }

        let secondary_range = match &secondary {
            Some(data) => {
                let after_kernel = layout
                    .page_align(footprint)
                    .ok_or(LoadError::InvalidKernelImage("kernel footprint overflows"))?;
                let start = offset(kernel_start, after_kernel)?;
                Some(PhysicalRange::new(start, data.len() as u64))
            }
            None => None,
        };

        let dtb = metadata::augment(full_tree, chosen, secondary_range, cmdline, options)
            .inspect_err(|e| emit!(self.logger, Level::Error, "device tree: {e}"))?;
        let dtb_len = dtb.len() as u64;
        let metadata_slot = layout
            .page_align(dtb_len)
            .map(|slot| slot.max(layout.page_size))
            .filter(|&slot| slot <= layout.metadata_capacity())
            .ok_or(LoadError::MetadataTooLarge {
                size: dtb_len,
                capacity: layout.metadata_capacity(),
            })?;

        let metadata_range = PhysicalRange::new(base, metadata_slot);
        let stub_start = offset(base, metadata_slot)?;
        let stub_range = PhysicalRange::new(stub_start, layout.page_size);
        let stub = self.stub.synthesize(kernel_start, base);

        let segments = self
            .assemble(
                region,
                [
                    Segment::padded(dtb, metadata_range),
                    Segment::padded(stub, stub_range),
                    Segment::new(kernel, kernel_start),
                ]
                .into_iter()
                .chain(
                    secondary
                        .zip(secondary_range)
                        .map(|(data, range)| Segment::new(data, range.start())),
                ),
            )
            .inspect_err(|e| emit!(self.logger, Level::Error, "{e}"))?;

        for (segment, name) in segments.iter().zip(["device tree", "boot stub", "kernel", "initramfs"]) {
            emit!(self.logger, Level::Debug, "{name:>11}: {segment}");
        }
        emit!(
            self.logger,
            Level::Info,
            "loaded {} segments ({:#x} bytes), entry {}",
            segments.len(),
            segments.total_size(),
            stub_start
        );

        Ok(LoadResult {
            entry: stub_start,
            segments,
        })
    }

    /// Parse the arm64 `Image` header, enforcing it if asked to.
    fn kernel_header(
        &self,
        kernel: &[u8],
        options: &KexecOptions,
    ) -> Result<Option<Arm64ImageHeader>, LoadError> {
        let header = match self.stub {
            BootStub::Aarch64 => Arm64ImageHeader::parse(kernel),
        };

        match header {
            Some(h) => {
                emit!(
                    self.logger,
                    Level::Debug,
                    "Image header: text_offset={:#x} image_size={:#x} page_size={:?}",
                    h.text_offset,
                    h.image_size,
                    h.page_size()
                );
                if h.flags.big_endian() {
                    emit!(self.logger, Level::Warn, "kernel image is built big-endian");
                }
            }
            None if options.strict_image_header => {
                return Err(LoadError::InvalidKernelImage("missing arm64 Image header"));
            }
            None => emit!(
                self.logger,
                Level::Debug,
                "no Image header, using the file size as footprint"
            ),
        }

        Ok(header)
    }

    /// Collect the segments and re-check that none overlap and all lie in
    /// `region`.
    fn assemble(
        &self,
        region: PhysicalRange,
        parts: impl Iterator<Item = Result<Segment, SegmentError>>,
    ) -> Result<Segments, LoadError> {
        let mut segments = Segments::new();
        for part in parts {
            segments
                .push(part.map_err(LoadError::InternalLayoutViolation)?)
                .map_err(LoadError::InternalLayoutViolation)?;
        }
        segments
            .validate()
            .and_then(|()| segments.validate_within(&region))
            .map_err(LoadError::InternalLayoutViolation)?;
        emit!(self.logger, Level::Trace, "segment layout:\n{segments}");
        Ok(segments)
    }
}

fn read_image(stream: &mut dyn Read, image: ImageKind) -> Result<Vec<u8>, LoadError> {
    let mut data = Vec::new();
    stream
        .read_to_end(&mut data)
        .map_err(|source| LoadError::ImageReadFailure { image, source })?;
    Ok(data)
}

fn offset(base: PhysicalAddress, by: u64) -> Result<PhysicalAddress, LoadError> {
    base.checked_add(by).ok_or(LoadError::InternalLayoutViolation(
        SegmentError::AddressOverflow {
            start: base,
            len: by,
        },
    ))
}
