//! Inline FNV-1a, usable without allocating the concatenated input.

const OFFSET_32: u32 = 2_166_136_261;
const PRIME_32: u32 = 16_777_619;
const OFFSET_64: u64 = 14_695_981_039_346_656_037;
const PRIME_64: u64 = 1_099_511_628_211;

pub fn hash_new32() -> u32 {
    OFFSET_32
}

pub fn hash_add32(mut h: u32, s: &str) -> u32 {
    for b in s.bytes() {
        h ^= b as u32;
        h = h.wrapping_mul(PRIME_32);
    }
    h
}

pub fn hash_new64() -> u64 {
    OFFSET_64
}

pub fn hash_add64(mut h: u64, s: &str) -> u64 {
    for b in s.bytes() {
        h = hash_add_byte64(h, b);
    }
    h
}

pub fn hash_add_byte64(mut h: u64, b: u8) -> u64 {
    h ^= b as u64;
    h.wrapping_mul(PRIME_64)
}
