use crate::PhysicalAddress;
use core::fmt;

/// Half-open interval `[start, start + size)` of physical memory.
///
/// ### Invariants
/// - `start + size` never exceeds `u64::MAX`; constructors clamp `size` so
///   that [`PhysicalRange::end`] is always representable.
/// - An empty range (`size == 0`) contains no address and overlaps nothing.
///
/// ### Examples
/// ```rust
/// # use kexec_addresses::*;
/// let ram = PhysicalRange::from_interval(0x0010_0000, 0x1000_0000);
/// let dtb = PhysicalRange::new(PhysicalAddress::new(0x0010_0000), 0x1000);
/// let stub = PhysicalRange::new(PhysicalAddress::new(0x0010_1000), 0x1000);
/// assert!(ram.contains(&dtb));
/// assert!(!dtb.overlaps(&stub));
/// ```
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalRange {
    start: PhysicalAddress,
    size: u64,
}

impl PhysicalRange {
    #[inline]
    #[must_use]
    pub const fn new(start: PhysicalAddress, size: u64) -> Self {
        let room = u64::MAX - start.as_u64();
        let size = if size > room { room } else { size };
        Self { start, size }
    }

    /// Build a range from `start` (inclusive) to `end` (exclusive).
    /// An `end` below `start` yields an empty range.
    #[inline]
    #[must_use]
    pub const fn from_interval(start: u64, end: u64) -> Self {
        let size = end.saturating_sub(start);
        Self::new(PhysicalAddress::new(start), size)
    }

    #[inline]
    #[must_use]
    pub const fn start(&self) -> PhysicalAddress {
        self.start
    }

    #[inline]
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// First address past the range.
    #[inline]
    #[must_use]
    pub const fn end(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.start.as_u64() + self.size)
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    #[inline]
    #[must_use]
    pub const fn contains_address(&self, addr: PhysicalAddress) -> bool {
        addr.as_u64() >= self.start.as_u64() && addr.as_u64() < self.end().as_u64()
    }

    /// Whether `other` lies entirely within this range.
    ///
    /// An empty `other` is contained if its start lies within `[start, end]`.
    #[inline]
    #[must_use]
    pub const fn contains(&self, other: &Self) -> bool {
        other.start.as_u64() >= self.start.as_u64()
            && other.end().as_u64() <= self.end().as_u64()
    }

    #[inline]
    #[must_use]
    pub const fn overlaps(&self, other: &Self) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.start.as_u64() < other.end().as_u64()
            && other.start.as_u64() < self.end().as_u64()
    }

    /// The common part of both ranges, if they overlap.
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        if !self.overlaps(other) {
            return None;
        }
        let start = self.start.max(other.start);
        let end = self.end().min(other.end());
        Some(Self::from_interval(start.as_u64(), end.as_u64()))
    }

    /// This range with `other` carved out.
    ///
    /// Returns up to two non-empty pieces (below and above `other`), in
    /// ascending order.
    #[must_use]
    pub fn minus(&self, other: &Self) -> [Option<Self>; 2] {
        if !self.overlaps(other) {
            return [(!self.is_empty()).then_some(*self), None];
        }

        let below = Self::from_interval(self.start.as_u64(), other.start.as_u64());
        let above = Self::from_interval(other.end().as_u64(), self.end().as_u64());
        [
            (!below.is_empty()).then_some(below),
            (!above.is_empty()).then_some(above),
        ]
    }
}

impl fmt::Debug for PhysicalRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PhysicalRange[0x{:016X}, 0x{:016X})",
            self.start.as_u64(),
            self.end().as_u64()
        )
    }
}

impl fmt::Display for PhysicalRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:#x}, {:#x})", self.start.as_u64(), self.end().as_u64())
    }
}
