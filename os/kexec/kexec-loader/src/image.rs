//! # arm64 Kernel Image Header
//!
//! The first 64 bytes of an arm64 Linux `Image`:
//!
//! ```text
//! u32 code0            executable code
//! u32 code1            executable code
//! u64 text_offset      image load offset, little endian
//! u64 image_size       effective image size, little endian
//! u64 flags            kernel flags, little endian
//! u64 res2..res4       reserved
//! u32 magic            "ARM\x64"
//! u32 res5             reserved (PE header offset)
//! ```
//!
//! Kernels older than 3.17 report an `image_size` of zero; the file length
//! is the only size hint then.

/// `"ARM\x64"` read as a little-endian `u32`.
pub const ARM64_IMAGE_MAGIC: u32 = 0x644d_5241;

/// Size of the header in bytes.
pub const ARM64_IMAGE_HEADER_SIZE: usize = 64;

const TEXT_OFFSET_OFFSET: usize = 8;
const IMAGE_SIZE_OFFSET: usize = 16;
const FLAGS_OFFSET: usize = 24;
const MAGIC_OFFSET: usize = 56;

/// Image header `flags` word.
///
/// - bit 0: kernel endianness (1 = big endian)
/// - bits 1..2: kernel page size (0 unspecified, 1 4K, 2 16K, 3 64K)
/// - bit 3: physical placement (0 = base must be 2 MiB aligned, 1 = anywhere)
/// - bits 4..63: reserved
#[bitfield_struct::bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct ImageFlags {
    #[bits(1)]
    pub big_endian: bool,
    #[bits(2)]
    pub page_size: u8,
    #[bits(1)]
    pub place_anywhere: bool,
    #[bits(60)]
    __: u64,
}

/// Page size the kernel was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelPageSize {
    Unspecified,
    Size4K,
    Size16K,
    Size64K,
}

impl KernelPageSize {
    #[must_use]
    pub const fn bytes(self) -> Option<u64> {
        match self {
            Self::Unspecified => None,
            Self::Size4K => Some(0x1000),
            Self::Size16K => Some(0x4000),
            Self::Size64K => Some(0x1_0000),
        }
    }
}

/// Decoded fields of an arm64 `Image` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arm64ImageHeader {
    pub text_offset: u64,
    pub image_size: u64,
    pub flags: ImageFlags,
}

impl Arm64ImageHeader {
    /// Parse the header at the start of `kernel`.
    ///
    /// Returns `None` when the data is shorter than a header or does not
    /// carry the `ARM\x64` magic.
    #[must_use]
    pub fn parse(kernel: &[u8]) -> Option<Self> {
        let hdr = kernel.get(..ARM64_IMAGE_HEADER_SIZE)?;
        if read_u32_le(hdr, MAGIC_OFFSET)? != ARM64_IMAGE_MAGIC {
            return None;
        }
        Some(Self {
            text_offset: read_u64_le(hdr, TEXT_OFFSET_OFFSET)?,
            image_size: read_u64_le(hdr, IMAGE_SIZE_OFFSET)?,
            flags: ImageFlags::from_bits(read_u64_le(hdr, FLAGS_OFFSET)?),
        })
    }

    #[must_use]
    pub const fn page_size(&self) -> KernelPageSize {
        match self.flags.page_size() {
            1 => KernelPageSize::Size4K,
            2 => KernelPageSize::Size16K,
            3 => KernelPageSize::Size64K,
            _ => KernelPageSize::Unspecified,
        }
    }

    /// Whether the kernel requires a 2 MiB aligned load base.
    #[must_use]
    pub const fn requires_2m_alignment(&self) -> bool {
        !self.flags.place_anywhere()
    }

    /// Bytes the kernel occupies once running: the larger of the file size
    /// and the header's `image_size`.
    #[must_use]
    pub const fn footprint(&self, file_len: u64) -> u64 {
        if self.image_size > file_len {
            self.image_size
        } else {
            file_len
        }
    }
}

#[inline]
fn read_u32_le(buf: &[u8], off: usize) -> Option<u32> {
    let s = buf.get(off..off.checked_add(4)?)?;
    Some(u32::from_le_bytes([s[0], s[1], s[2], s[3]]))
}

#[inline]
fn read_u64_le(buf: &[u8], off: usize) -> Option<u64> {
    let s = buf.get(off..off.checked_add(8)?)?;
    Some(u64::from_le_bytes([
        s[0], s[1], s[2], s[3], s[4], s[5], s[6], s[7],
    ]))
}
