//! ABI-stable string hashing for extra discrimination.
//!
//! The hash must not change across compiler versions or host platforms,
//! since signed pointers produced by one compilation are authenticated by
//! code from another. It is SipHash-2-4 under a fixed key, read as a
//! little-endian `u64`.

use siphasher::sip::SipHasher24;
use std::hash::Hasher;

/// Key shared by every toolchain that agrees on this ABI.
pub const STABLE_HASH_KEY: [u8; 16] = [
    0xb5, 0xd4, 0xc9, 0xeb, 0x79, 0x10, 0x4a, 0x79, 0x6f, 0xec, 0x8b, 0x1b, 0x42, 0x87, 0x81, 0xd4,
];

/// Plain SipHash-2-4 of `bytes` under `key`.
pub fn sip_hash_2_4(key: &[u8; 16], bytes: &[u8]) -> u64 {
    let mut hasher = SipHasher24::new_with_key(key);
    hasher.write(bytes);
    hasher.finish()
}

pub fn stable_string_hash(string: &str) -> u64 {
    sip_hash_2_4(&STABLE_HASH_KEY, string.as_bytes())
}

/// Folds the stable hash into a non-zero 16-bit discriminator, the width
/// the hardware blend instruction accepts.
pub fn string_discriminator(string: &str) -> u16 {
    let folded = stable_string_hash(string) % 0xFFFF;
    // folded < 0xFFFF, so the sum fits in u16 and is never zero.
    (folded + 1) as u16
}
