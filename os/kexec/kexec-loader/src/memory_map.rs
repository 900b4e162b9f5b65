//! # Physical Memory Map
//!
//! Typed physical ranges describing the running machine, as firmware or
//! `/sys/firmware/memmap` would report them. The loader only ever places
//! segments inside [`RangeType::Ram`] ranges.

use crate::segment::Segments;
use core::fmt;
use core::str::FromStr;
use kexec_addresses::{PhysicalAddress, PhysicalRange, align_up};

/// Kind of a physical memory range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RangeType {
    /// Usable system RAM.
    Ram,
    Reserved,
    /// ACPI tables; reclaimable once the OS has parsed them.
    Acpi,
    AcpiNvs,
    /// Non-volatile memory.
    Persistent,
}

impl RangeType {
    /// Canonical firmware memmap name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ram => "System RAM",
            Self::Reserved => "Reserved",
            Self::Acpi => "ACPI Tables",
            Self::AcpiNvs => "ACPI Non-volatile Storage",
            Self::Persistent => "Persistent Memory",
        }
    }
}

impl fmt::Display for RangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown memory range type {0:?}")]
pub struct UnknownRangeType(pub String);

impl FromStr for RangeType {
    type Err = UnknownRangeType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "System RAM" => Ok(Self::Ram),
            "Reserved" => Ok(Self::Reserved),
            "ACPI Tables" => Ok(Self::Acpi),
            "ACPI Non-volatile Storage" => Ok(Self::AcpiNvs),
            "Persistent Memory" => Ok(Self::Persistent),
            _ => Err(UnknownRangeType(s.to_string())),
        }
    }
}

/// A physical range tagged with its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypedRange {
    pub range: PhysicalRange,
    pub kind: RangeType,
}

impl TypedRange {
    #[must_use]
    pub const fn new(range: PhysicalRange, kind: RangeType) -> Self {
        Self { range, kind }
    }

    /// RAM from `start` (inclusive) to `end` (exclusive).
    #[must_use]
    pub const fn ram(start: u64, end: u64) -> Self {
        Self::new(PhysicalRange::from_interval(start, end), RangeType::Ram)
    }

    #[must_use]
    pub const fn is_ram(&self) -> bool {
        matches!(self.kind, RangeType::Ram)
    }
}

impl fmt::Display for TypedRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.range, self.kind)
    }
}

/// No RAM range can hold a region of the requested size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("no RAM range holds {size:#x} bytes aligned to {alignment:#x}")]
pub struct InsufficientMemory {
    pub size: u64,
    pub alignment: u64,
}

/// Result of a successful region search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Aligned base address of the region.
    pub start: PhysicalAddress,
    /// The RAM range the region was carved from.
    pub ram: TypedRange,
}

impl Placement {
    /// The selected region, `size` bytes from [`Placement::start`].
    #[must_use]
    pub const fn region(&self, size: u64) -> PhysicalRange {
        PhysicalRange::new(self.start, size)
    }
}

/// Ordered collection of typed physical ranges.
///
/// Ranges are kept sorted by start address. Global non-overlap is the
/// producer's responsibility and is not checked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryMap {
    ranges: Vec<TypedRange>,
}

impl MemoryMap {
    #[must_use]
    pub const fn new() -> Self {
        Self { ranges: Vec::new() }
    }

    /// Add a range, keeping the map sorted by start address.
    pub fn insert(&mut self, range: TypedRange) {
        let at = self
            .ranges
            .partition_point(|r| r.range.start() <= range.range.start());
        self.ranges.insert(at, range);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn iter(&self) -> core::slice::Iter<'_, TypedRange> {
        self.ranges.iter()
    }

    /// RAM ranges in ascending order.
    pub fn ram(&self) -> impl Iterator<Item = &TypedRange> + '_ {
        self.ranges.iter().filter(|r| r.is_ram())
    }

    /// Lowest `alignment`-aligned address at which `min_size` bytes of RAM
    /// are available.
    ///
    /// First fit over the RAM ranges in ascending order. An `alignment` of
    /// zero is treated as one byte.
    ///
    /// # Errors
    /// [`InsufficientMemory`] if no RAM range is large enough.
    pub fn find_region(
        &self,
        min_size: u64,
        alignment: u64,
    ) -> Result<PhysicalAddress, InsufficientMemory> {
        self.find_placement(min_size, alignment).map(|p| p.start)
    }

    /// Like [`MemoryMap::find_region`], also returning the RAM range used.
    ///
    /// # Errors
    /// [`InsufficientMemory`] if no RAM range is large enough.
    pub fn find_placement(
        &self,
        min_size: u64,
        alignment: u64,
    ) -> Result<Placement, InsufficientMemory> {
        self.ram()
            .find_map(|ram| {
                let start = align_up(ram.range.start().as_u64(), alignment)?;
                let end = ram.range.end().as_u64();
                (start <= end && end - start >= min_size).then(|| Placement {
                    start: PhysicalAddress::new(start),
                    ram: *ram,
                })
            })
            .ok_or(InsufficientMemory {
                size: min_size,
                alignment,
            })
    }

    /// The RAM range fully containing `range`, if any.
    #[must_use]
    pub fn containing_ram(&self, range: &PhysicalRange) -> Option<&TypedRange> {
        self.ram().find(|r| r.range.contains(range))
    }

    /// RAM left over after carving out every segment, in ascending order.
    #[must_use]
    pub fn available_ram(&self, segments: &Segments) -> Self {
        let mut free: Vec<PhysicalRange> = self.ram().map(|r| r.range).collect();
        for used in segments.ranges() {
            free = free
                .iter()
                .flat_map(|r| r.minus(&used))
                .flatten()
                .collect();
        }
        free.into_iter()
            .map(|range| TypedRange::new(range, RangeType::Ram))
            .collect()
    }
}

impl FromIterator<TypedRange> for MemoryMap {
    fn from_iter<I: IntoIterator<Item = TypedRange>>(iter: I) -> Self {
        let mut map = Self::new();
        for range in iter {
            map.insert(range);
        }
        map
    }
}

impl<'a> IntoIterator for &'a MemoryMap {
    type Item = &'a TypedRange;
    type IntoIter = core::slice::Iter<'a, TypedRange>;

    fn into_iter(self) -> Self::IntoIter {
        self.ranges.iter()
    }
}

impl fmt::Display for MemoryMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for r in &self.ranges {
            writeln!(f, "{r}")?;
        }
        Ok(())
    }
}
