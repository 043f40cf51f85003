/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Authoritative channel-width vector.
//!
//! Widths are stored in microseconds and always lie in
//! `[MIN_WIDTH_US, MAX_WIDTH_US]`: out-of-range writes are clamped, never
//! rejected.  Structural mistakes (bad index, wrong vector length) are
//! rejected and leave the store untouched.

use crate::engine::UpdateError;

/// Shortest channel pulse (µs).
pub const MIN_WIDTH_US: u32 = 1_000;

/// Longest channel pulse (µs).
pub const MAX_WIDTH_US: u32 = 2_000;

/// Clamp a requested width into the valid pulse range.
pub fn clamp_width(width_us: u32) -> u32 {
    width_us.clamp(MIN_WIDTH_US, MAX_WIDTH_US)
}

/// Fixed-length vector of channel widths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelStore {
    widths: Vec<u32>,
}

impl ChannelStore {
    /// `count` channels, all at [`MIN_WIDTH_US`].
    pub fn new(count: usize) -> Self {
        Self {
            widths: vec![MIN_WIDTH_US; count],
        }
    }

    pub fn len(&self) -> usize {
        self.widths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.widths.is_empty()
    }

    pub fn widths(&self) -> &[u32] {
        &self.widths
    }

    /// Store one clamped width.  Returns the value actually stored.
    pub fn set(&mut self, index: usize, width_us: u32) -> Result<u32, UpdateError> {
        let channels = self.widths.len();
        let slot = self
            .widths
            .get_mut(index)
            .ok_or(UpdateError::ChannelOutOfRange { index, channels })?;
        *slot = clamp_width(width_us);
        Ok(*slot)
    }

    /// Replace every width at once.  `widths` must have exactly
    /// [`len`](Self::len) entries.
    pub fn set_all(&mut self, widths: &[u32]) -> Result<(), UpdateError> {
        if widths.len() != self.widths.len() {
            return Err(UpdateError::ChannelCount {
                given: widths.len(),
                expected: self.widths.len(),
            });
        }
        for (slot, &w) in self.widths.iter_mut().zip(widths) {
            *slot = clamp_width(w);
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_store_starts_at_minimum_width() {
        let store = ChannelStore::new(8);
        assert_eq!(store.len(), 8);
        assert!(store.widths().iter().all(|&w| w == MIN_WIDTH_US));
    }

    #[test]
    fn clamp_width_bounds() {
        for w in [0, 1, 500, 999] {
            assert_eq!(clamp_width(w), 1_000, "w={w}");
        }
        for w in [2_001, 2_500, u32::MAX] {
            assert_eq!(clamp_width(w), 2_000, "w={w}");
        }
        for w in [1_000, 1_001, 1_500, 1_999, 2_000] {
            assert_eq!(clamp_width(w), w, "w={w}");
        }
    }

    #[test]
    fn set_stores_clamped_value() {
        let mut store = ChannelStore::new(4);
        assert_eq!(store.set(0, 900).unwrap(), 1_000);
        assert_eq!(store.set(1, 2_400).unwrap(), 2_000);
        assert_eq!(store.set(2, 1_234).unwrap(), 1_234);
        assert_eq!(store.widths(), &[1_000, 2_000, 1_234, 1_000]);
    }

    #[test]
    fn set_out_of_range_leaves_store_untouched() {
        let mut store = ChannelStore::new(8);
        store.set(3, 1_700).unwrap();
        let before = store.clone();

        let err = store.set(9, 1_500).unwrap_err();
        assert!(matches!(
            err,
            UpdateError::ChannelOutOfRange {
                index: 9,
                channels: 8
            }
        ));
        assert_eq!(store, before);
    }

    #[test]
    fn set_all_requires_exact_length() {
        let mut store = ChannelStore::new(3);
        let before = store.clone();

        assert!(matches!(
            store.set_all(&[1_500, 1_500]),
            Err(UpdateError::ChannelCount {
                given: 2,
                expected: 3
            })
        ));
        assert!(store.set_all(&[1_500; 4]).is_err());
        assert_eq!(store, before);

        store.set_all(&[500, 1_500, 3_000]).unwrap();
        assert_eq!(store.widths(), &[1_000, 1_500, 2_000]);
    }
}
