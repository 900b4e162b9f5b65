use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

/// A named property with a raw big-endian value.
///
/// Typed constructors encode values the way the device-tree format expects
/// them: integers as big-endian 32-bit cells, strings NUL-terminated.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Property {
    name: String,
    value: Vec<u8>,
}

impl Property {
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// A property without a value (a boolean flag).
    #[must_use]
    pub fn empty(name: impl Into<String>) -> Self {
        Self::new(name, Vec::new())
    }

    /// One 32-bit cell.
    #[must_use]
    pub fn u32(name: impl Into<String>, value: u32) -> Self {
        Self::new(name, value.to_be_bytes().to_vec())
    }

    /// Two 32-bit cells holding a 64-bit value, most significant cell first.
    #[must_use]
    pub fn u64(name: impl Into<String>, value: u64) -> Self {
        Self::new(name, value.to_be_bytes().to_vec())
    }

    /// An arbitrary number of 32-bit cells.
    #[must_use]
    pub fn cells(name: impl Into<String>, cells: &[u32]) -> Self {
        let value = cells.iter().flat_map(|c| c.to_be_bytes()).collect::<Vec<_>>();
        Self::new(name, value)
    }

    /// A single NUL-terminated string.
    #[must_use]
    pub fn string(name: impl Into<String>, value: &str) -> Self {
        let mut bytes = Vec::with_capacity(value.len() + 1);
        bytes.extend_from_slice(value.as_bytes());
        bytes.push(0);
        Self::new(name, bytes)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    #[must_use]
    pub fn as_u32(&self) -> Option<u32> {
        let bytes: [u8; 4] = self.value.as_slice().try_into().ok()?;
        Some(u32::from_be_bytes(bytes))
    }

    /// Read one or two cells as a 64-bit number.
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match self.value.len() {
            4 => self.as_u32().map(u64::from),
            8 => {
                let bytes: [u8; 8] = self.value.as_slice().try_into().ok()?;
                Some(u64::from_be_bytes(bytes))
            }
            _ => None,
        }
    }

    #[must_use]
    pub fn as_cells(&self) -> Option<Vec<u32>> {
        if !self.value.len().is_multiple_of(4) {
            return None;
        }
        Some(
            self.value
                .chunks_exact(4)
                .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        )
    }

    /// The value as a single NUL-terminated UTF-8 string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        let (last, body) = self.value.split_last()?;
        if *last != 0 || body.contains(&0) {
            return None;
        }
        core::str::from_utf8(body).ok()
    }
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(s) = self.as_str() {
            return write!(f, "{} = {s:?}", self.name);
        }
        write!(f, "{} = [", self.name)?;
        for (i, b) in self.value.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{b:02x}")?;
        }
        f.write_str("]")
    }
}
