// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Fixed-width key slices.
//!
//! A key of arbitrary length is viewed, at a given tree layer, as an
//! unsigned 64-bit `ikey` (8 bytes of the key, big-endian, zero-padded)
//! plus an `ikeylen` in `0..=8`, plus a `suffix` holding the remaining
//! bytes beyond this layer's 8-byte window. Descending a layer shifts
//! the key: the first 8 consumed bytes are discarded and the window
//! re-centers on what follows.
//!
//! Ported from `original_source/fixsizedkey.hh` and the `key<ikey_type>`
//! usage throughout `masstree_tcursor.hh`; comparison order follows
//! `masstree_get.hh`'s unsigned-ikey-then-suffix walk.

use std::cmp::Ordering;

/// A key as seen at one tree layer: an 8-byte window plus whatever
/// wasn't consumed by that window.
#[derive(Debug, Clone)]
pub struct Key {
    ikey: u64,
    ikeylen: u8,
    suffix: Vec<u8>,
}

impl Key {
    /// Build the layer-0 view of a full key.
    pub fn new(bytes: &[u8]) -> Self {
        let (ikey, ikeylen) = pack_window(bytes);
        let suffix = if bytes.len() > 8 {
            bytes[8..].to_vec()
        } else {
            Vec::new()
        };
        Key {
            ikey,
            ikeylen,
            suffix,
        }
    }

    pub fn ikey(&self) -> u64 {
        self.ikey
    }

    /// Number of bytes of the original key consumed by this layer's
    /// 8-byte window: `0..=8`. A value of 8 with a nonempty suffix means
    /// "more layers may follow"; a value of 8 with an empty suffix is
    /// the canonical "exactly 8 bytes consumed, nothing left" case,
    /// encoded identically to a key that is a suffix-bearing 8-byte
    /// boundary (see `node/leaf.rs` keylenx encoding).
    pub fn ikeylen(&self) -> u8 {
        self.ikeylen
    }

    pub fn suffix(&self) -> &[u8] {
        &self.suffix
    }

    pub fn has_suffix(&self) -> bool {
        !self.suffix.is_empty()
    }

    /// Discard the first 8 consumed bytes and re-window on the suffix.
    /// Used when descending into a nested tree layer.
    pub fn shift(&self) -> Key {
        Key::new(&self.suffix)
    }

    /// Reconstruct the full original byte string this key represents,
    /// for the cases (error messages, debug printing) that need it.
    pub fn unshift_all(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + self.suffix.len());
        out.extend_from_slice(&self.ikey.to_be_bytes()[..self.ikeylen as usize]);
        out.extend_from_slice(&self.suffix);
        out
    }
}

/// Pack up to the first 8 bytes of `bytes` into a big-endian `u64`,
/// zero-padded, returning the packed value and how many bytes were
/// actually consumed (capped at 8).
fn pack_window(bytes: &[u8]) -> (u64, u8) {
    let n = bytes.len().min(8);
    let mut buf = [0u8; 8];
    buf[..n].copy_from_slice(&bytes[..n]);
    (u64::from_be_bytes(buf), n as u8)
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for Key {}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ikey
            .cmp(&other.ikey)
            .then_with(|| self.ikeylen.cmp(&other.ikeylen))
            .then_with(|| self.suffix.cmp(&other.suffix))
    }
}

/// Compare a full byte string against another lexicographically. Used
/// by scan/range bounds which operate on whole keys rather than the
/// per-layer `Key` view.
pub fn compare_bytes(a: &[u8], b: &[u8]) -> Ordering {
    a.cmp(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_key_packs_into_ikey_with_padding() {
        let k = Key::new(b"ab");
        assert_eq!(k.ikeylen(), 2);
        assert!(!k.has_suffix());
        assert_eq!(k.ikey(), u64::from_be_bytes(*b"ab\0\0\0\0\0\0"));
    }

    #[test]
    fn eight_byte_key_has_no_suffix() {
        let k = Key::new(b"abcdefgh");
        assert_eq!(k.ikeylen(), 8);
        assert!(!k.has_suffix());
    }

    #[test]
    fn long_key_carries_suffix() {
        let k = Key::new(b"abcdefghIJKL");
        assert_eq!(k.ikeylen(), 8);
        assert_eq!(k.suffix(), b"IJKL");
    }

    #[test]
    fn shift_rewindows_on_suffix() {
        let k = Key::new(b"abcdefghIJKLMNOP");
        let shifted = k.shift();
        assert_eq!(shifted.ikeylen(), 8);
        assert_eq!(shifted.suffix(), b"");
        assert_eq!(&shifted.unshift_all(), b"IJKLMNOP");
    }

    #[test]
    fn ordering_is_unsigned_on_ikey_then_ikeylen_then_suffix() {
        let a = Key::new(b"aaaaaaaa1");
        let b = Key::new(b"aaaaaaaa2");
        assert!(a < b);

        let short = Key::new(b"aaaaaaa"); // 7 bytes, no suffix
        let eight = Key::new(b"aaaaaaa\0"); // 8 bytes, ikey bits equal
        assert!(short < eight);
    }

    #[test]
    fn empty_key_round_trips() {
        let k = Key::new(b"");
        assert_eq!(k.ikeylen(), 0);
        assert_eq!(k.ikey(), 0);
        assert_eq!(k.unshift_all(), Vec::<u8>::new());
    }
}
