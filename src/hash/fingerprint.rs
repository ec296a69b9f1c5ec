//! Series fingerprints used as merge keys.
//!
//! Two schemes are in use and they are not interchangeable. The legacy
//! path keys series by [`Labels::fingerprint`], an FNV-1a-64 over the sorted
//! label set. The streaming path keys series by [`Labels::fast_fingerprint`],
//! an XOR of per-label FNV-1a-64 hashes. Each matches the scheme its own
//! write path used, so do not swap one for the other.

use super::fnv::{hash_add64, hash_add_byte64, hash_new64};
use crate::model::Labels;
use std::fmt;

const SEPARATOR_BYTE: u8 = 255;

/// Hash identifying a label set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(pub u64);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl Labels {
    /// Order-sensitive fingerprint over name/value pairs sorted by name.
    pub fn fingerprint(&self) -> Fingerprint {
        let mut sum = hash_new64();
        for label in self {
            sum = hash_add64(sum, &label.name);
            sum = hash_add_byte64(sum, SEPARATOR_BYTE);
            sum = hash_add64(sum, &label.value);
            sum = hash_add_byte64(sum, SEPARATOR_BYTE);
        }
        Fingerprint(sum)
    }

    /// Order-independent fingerprint: XOR of one hash per label.
    pub fn fast_fingerprint(&self) -> Fingerprint {
        if self.is_empty() {
            return Fingerprint(hash_new64());
        }

        let mut result = 0u64;
        for label in self {
            let mut sum = hash_new64();
            sum = hash_add64(sum, &label.name);
            sum = hash_add_byte64(sum, SEPARATOR_BYTE);
            sum = hash_add64(sum, &label.value);
            result ^= sum;
        }
        Fingerprint(result)
    }
}
