//! Backend key layout.
//!
//! One backend holds three key spaces, separated by a fixed prefix:
//!
//! ```text
//! n/ || node_hash            → encoded tree node
//! i/ || key                  → empty (iteration index entry)
//! m/latest                   → latest committed version (u64 BE)
//! m/working                  → working (uncommitted) root hash
//! m/initial                  → initial version (u64 BE)
//! m/v/ || version (u64 BE)   → root hash committed at that version
//! ```
//!
//! Index entries share one prefix, so the backend's byte order over index
//! keys is exactly the byte order of the original keys.

use smtstore_primitives::{Hash, Version};

/// Prefix of tree node records.
pub const NODE_PREFIX: &[u8] = b"n/";
/// Prefix of iteration index entries.
pub const INDEX_PREFIX: &[u8] = b"i/";
/// Prefix of commit metadata.
pub const META_PREFIX: &[u8] = b"m/";

pub(crate) const LATEST_KEY: &[u8] = b"m/latest";
pub(crate) const WORKING_ROOT_KEY: &[u8] = b"m/working";
pub(crate) const INITIAL_VERSION_KEY: &[u8] = b"m/initial";
pub(crate) const VERSION_PREFIX: &[u8] = b"m/v/";

/// Concatenate byte slices into a single Vec.
pub fn concat_bytes(slices: &[&[u8]]) -> Vec<u8> {
    let total: usize = slices.iter().map(|s| s.len()).sum();
    let mut out = Vec::with_capacity(total);
    for s in slices {
        out.extend_from_slice(s);
    }
    out
}

pub fn node_key(hash: &Hash) -> Vec<u8> {
    concat_bytes(&[NODE_PREFIX, hash])
}

pub fn index_key(key: &[u8]) -> Vec<u8> {
    concat_bytes(&[INDEX_PREFIX, key])
}

pub(crate) fn version_key(version: Version) -> Vec<u8> {
    concat_bytes(&[VERSION_PREFIX, &encode_version(version)])
}

pub(crate) fn encode_version(version: Version) -> [u8; 8] {
    (version as u64).to_be_bytes()
}

pub(crate) fn decode_version(bytes: &[u8]) -> Option<Version> {
    let buf: [u8; 8] = bytes.try_into().ok()?;
    Version::try_from(u64::from_be_bytes(buf)).ok()
}

/// Smallest key greater than every key starting with `prefix`, or `None` if
/// no such key exists (prefix is all `0xff`).
pub fn prefix_end(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < 0xff {
            end.push(last + 1);
            return Some(end);
        }
    }
    None
}
