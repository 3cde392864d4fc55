//! Memory image of a card.
//!
//! A [`Dump`] owns a fixed-capacity byte buffer that is carved into
//! `unit_count` units of `unit_size` bytes (4-byte pages for Type-2 tags,
//! 16-byte blocks for Classic cards). Every unit has a valid bit that is set
//! the first time the unit is written and cleared only by [`Dump::clear`] or
//! [`Dump::configure`]. Valid bits, not buffer contents, decide whether a unit
//! is known: a zero-filled unit that was never written stays a gap.
//!
//! # Examples
//!
//! ```
//! use cardlab_core::Dump;
//!
//! let mut dump = Dump::with_capacity(64);
//! dump.configure(4, 10).unwrap();
//! dump.write_unit(3, &[0xDE, 0xAD]).unwrap();
//!
//! assert_eq!(dump.unit(3), Some(&[0xDE, 0xAD, 0x00, 0x00][..]));
//! assert_eq!(dump.unit(2), None);
//! assert_eq!(dump.max_seen_unit(), Some(3));
//! ```

use crate::{Result, constants::T2T_PAGE_SIZE, error::Error};

const WORD_BITS: usize = u32::BITS as usize;

/// Fixed-capacity card memory image with per-unit valid bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dump {
    /// Backing buffer, always `capacity` bytes long.
    data: Vec<u8>,
    unit_size: usize,
    unit_count: usize,
    /// Card address of unit 0.
    origin: usize,
    valid_bits: Vec<u32>,
    max_seen_unit: Option<usize>,
    has_dump: bool,
}

impl Dump {
    /// Create an empty dump backed by `capacity` bytes.
    ///
    /// A zero capacity is allowed; such a dump rejects every geometry.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity],
            unit_size: T2T_PAGE_SIZE,
            unit_count: 0,
            origin: 0,
            valid_bits: Vec::new(),
            max_seen_unit: None,
            has_dump: false,
        }
    }

    /// Backing buffer capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Set the unit geometry, clearing all contents.
    ///
    /// # Errors
    /// - `Error::InvalidUnitSize` if `unit_size` is zero
    /// - `Error::Buffer` if `unit_size * unit_count` exceeds the capacity
    pub fn configure(&mut self, unit_size: usize, unit_count: usize) -> Result<()> {
        if unit_size == 0 {
            return Err(Error::InvalidUnitSize(unit_size));
        }
        let requested = unit_size.saturating_mul(unit_count);
        if requested > self.capacity() {
            return Err(Error::Buffer {
                requested,
                capacity: self.capacity(),
            });
        }

        self.clear();
        self.unit_size = unit_size;
        self.unit_count = unit_count;
        self.valid_bits = vec![0; unit_count.div_ceil(WORD_BITS)];
        Ok(())
    }

    /// Largest unit count that fits for the given unit size.
    #[must_use]
    pub fn max_units(&self, unit_size: usize) -> usize {
        self.capacity().checked_div(unit_size).unwrap_or(0)
    }

    /// Zero the buffer, drop all valid bits and the geometry.
    pub fn clear(&mut self) {
        self.data.fill(0);
        self.unit_size = T2T_PAGE_SIZE;
        self.unit_count = 0;
        self.origin = 0;
        self.valid_bits.clear();
        self.max_seen_unit = None;
        self.has_dump = false;
    }

    /// Reduce the unit count, dropping units past the new end.
    ///
    /// Growing is not allowed; a larger `unit_count` is ignored.
    pub fn truncate(&mut self, unit_count: usize) {
        if unit_count >= self.unit_count {
            return;
        }
        for index in unit_count..self.unit_count {
            self.set_valid(index, false);
            let start = index * self.unit_size;
            self.data[start..start + self.unit_size].fill(0);
        }
        self.unit_count = unit_count;
        self.valid_bits.truncate(unit_count.div_ceil(WORD_BITS));
        self.max_seen_unit = (0..unit_count).rev().find(|&i| self.is_valid(i));
    }

    #[must_use]
    pub fn unit_size(&self) -> usize {
        self.unit_size
    }

    #[must_use]
    pub fn unit_count(&self) -> usize {
        self.unit_count
    }

    #[must_use]
    pub fn origin(&self) -> usize {
        self.origin
    }

    pub fn set_origin(&mut self, origin: usize) {
        self.origin = origin;
    }

    /// Highest unit index written since the last clear.
    #[must_use]
    pub fn max_seen_unit(&self) -> Option<usize> {
        self.max_seen_unit
    }

    /// Whether the dump has been registered as holding card data.
    #[must_use]
    pub fn has_dump(&self) -> bool {
        self.has_dump
    }

    /// Register (or withdraw) the dump as holding card data.
    pub fn set_has_dump(&mut self, has_dump: bool) {
        self.has_dump = has_dump;
    }

    /// Write one unit, zero-padding short payloads.
    ///
    /// Bytes past `unit_size` are ignored.
    ///
    /// # Errors
    /// Returns `Error::UnitOutOfRange` if `index >= unit_count`.
    pub fn write_unit(&mut self, index: usize, bytes: &[u8]) -> Result<()> {
        let region = self.region_mut(index)?;
        let n = bytes.len().min(region.len());
        region[..n].copy_from_slice(&bytes[..n]);
        region[n..].fill(0);

        self.set_valid(index, true);
        self.max_seen_unit = Some(self.max_seen_unit.map_or(index, |m| m.max(index)));
        Ok(())
    }

    /// Contents of a unit that has been written, `None` for gaps.
    #[must_use]
    pub fn unit(&self, index: usize) -> Option<&[u8]> {
        if !self.is_valid(index) {
            return None;
        }
        let start = index * self.unit_size;
        Some(&self.data[start..start + self.unit_size])
    }

    /// Whether unit `index` has been written since the last clear.
    #[must_use]
    pub fn is_valid(&self, index: usize) -> bool {
        index < self.unit_count
            && self.valid_bits[index / WORD_BITS] & (1 << (index % WORD_BITS)) != 0
    }

    /// Number of valid units.
    #[must_use]
    pub fn valid_count(&self) -> usize {
        self.valid_bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Iterate over `(index, bytes)` of every valid unit in order.
    pub fn valid_units(&self) -> impl Iterator<Item = (usize, &[u8])> + '_ {
        (0..self.unit_count).filter_map(move |i| self.unit(i).map(|bytes| (i, bytes)))
    }

    /// Configured region of the buffer (`unit_size * unit_count` bytes).
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.unit_size * self.unit_count]
    }

    fn region_mut(&mut self, index: usize) -> Result<&mut [u8]> {
        if index >= self.unit_count {
            return Err(Error::UnitOutOfRange {
                index,
                count: self.unit_count,
            });
        }
        let start = index * self.unit_size;
        Ok(&mut self.data[start..start + self.unit_size])
    }

    fn set_valid(&mut self, index: usize, valid: bool) {
        let word = &mut self.valid_bits[index / WORD_BITS];
        let mask = 1 << (index % WORD_BITS);
        if valid {
            *word |= mask;
        } else {
            *word &= !mask;
        }
    }
}

impl Default for Dump {
    fn default() -> Self {
        Self::with_capacity(crate::constants::DEFAULT_DUMP_CAPACITY)
    }
}

/// Page-granular access to a Type-2 memory image.
///
/// Used by the emulated WRITE command and by page-dump rendering.
pub trait PageStore {
    /// The 4 bytes of a written page, `None` if absent.
    fn page(&self, index: usize) -> Option<[u8; 4]>;

    /// Overwrite one page.
    ///
    /// # Errors
    /// Returns an error if the page is outside the image or the image is
    /// not page-addressed.
    fn set_page(&mut self, index: usize, page: [u8; 4]) -> Result<()>;
}

impl PageStore for Dump {
    fn page(&self, index: usize) -> Option<[u8; 4]> {
        if self.unit_size != T2T_PAGE_SIZE {
            return None;
        }
        self.unit(index).and_then(|bytes| bytes.try_into().ok())
    }

    fn set_page(&mut self, index: usize, page: [u8; 4]) -> Result<()> {
        if self.unit_size != T2T_PAGE_SIZE {
            return Err(Error::InvalidUnitSize(self.unit_size));
        }
        self.write_unit(index, &page)
    }
}
