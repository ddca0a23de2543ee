//! Deterministic serialization for tree nodes and proofs.
//!
//! Uses a custom binary encoding so that identical nodes always produce
//! identical bytes. All numeric values are little-endian.
//!
//! Encoding format:
//! - Fixed-size fields (Hash, u32, flags) are written directly
//! - Variable-length fields (Vec<u8>) are length-prefixed (u32 LE)
//! - Repeated fields are count-prefixed (u32 LE) then concatenated
//! - Optional values: 1-byte flag (0=None, 1=Some) followed by the value
//!
//! Node layout:
//! ```text
//! leaf:   [0x00] [path: 32] [value_len: 4 LE] [value]
//! branch: [0x01] [left: 32] [right: 32]
//! ```

use crate::error::{TreeError, TreeResult};
use crate::merkle::Node;
use crate::proof::{ProofLeaf, SparseMerkleProof};
use crate::types::{Hash, PATH_BITS};

/// Node tag for leaves. Also the domain separator in leaf hashes.
pub const LEAF_TAG: u8 = 0x00;
/// Node tag for branches. Also the domain separator in branch hashes.
pub const BRANCH_TAG: u8 = 0x01;

/// A cursor for reading bytes during decoding.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    fn read_bytes(&mut self, n: usize) -> TreeResult<&'a [u8]> {
        if n > self.remaining() {
            return Err(TreeError::Codec("unexpected end of data".into()));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u8(&mut self) -> TreeResult<u8> {
        let bytes = self.read_bytes(1)?;
        Ok(bytes[0])
    }

    fn read_u32(&mut self) -> TreeResult<u32> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_hash(&mut self) -> TreeResult<Hash> {
        let bytes = self.read_bytes(32)?;
        let mut hash = [0u8; 32];
        hash.copy_from_slice(bytes);
        Ok(hash)
    }

    fn read_var_bytes(&mut self) -> TreeResult<Vec<u8>> {
        let len = self.read_u32()? as usize;
        Ok(self.read_bytes(len)?.to_vec())
    }

    fn finish(&self) -> TreeResult<()> {
        if self.remaining() != 0 {
            return Err(TreeError::Codec(format!(
                "{} trailing bytes",
                self.remaining()
            )));
        }
        Ok(())
    }
}

// ── Encoding helpers ──

fn write_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn write_hash(buf: &mut Vec<u8>, h: &Hash) {
    buf.extend_from_slice(h);
}

fn write_var_bytes(buf: &mut Vec<u8>, data: &[u8]) {
    write_u32(buf, data.len() as u32);
    buf.extend_from_slice(data);
}

// ── Node encoding ──

/// Encode a tree node to deterministic bytes.
pub fn encode_node(node: &Node) -> Vec<u8> {
    match node {
        Node::Leaf { path, value } => {
            let mut buf = Vec::with_capacity(1 + 32 + 4 + value.len());
            buf.push(LEAF_TAG);
            write_hash(&mut buf, path);
            write_var_bytes(&mut buf, value);
            buf
        }
        Node::Branch { left, right } => {
            let mut buf = Vec::with_capacity(1 + 64);
            buf.push(BRANCH_TAG);
            write_hash(&mut buf, left);
            write_hash(&mut buf, right);
            buf
        }
    }
}

/// Decode a tree node from bytes produced by [`encode_node`].
pub fn decode_node(data: &[u8]) -> TreeResult<Node> {
    let mut r = Reader::new(data);
    let node = match r.read_u8()? {
        LEAF_TAG => Node::Leaf {
            path: r.read_hash()?,
            value: r.read_var_bytes()?,
        },
        BRANCH_TAG => Node::Branch {
            left: r.read_hash()?,
            right: r.read_hash()?,
        },
        tag => return Err(TreeError::Codec(format!("unknown node tag {:#04x}", tag))),
    };
    r.finish()?;
    Ok(node)
}

// ── Proof encoding ──

/// Encode a proof for transport (e.g. in a query response).
///
/// ```text
/// [sibling_count: 4 LE] [siblings: 32 each] [leaf_flag: 1] ([path: 32] [value_hash: 32])?
/// ```
pub fn encode_proof(proof: &SparseMerkleProof) -> Vec<u8> {
    let mut buf = Vec::with_capacity(4 + proof.siblings.len() * 32 + 65);
    write_u32(&mut buf, proof.siblings.len() as u32);
    for sibling in &proof.siblings {
        write_hash(&mut buf, sibling);
    }
    match &proof.leaf {
        None => buf.push(0),
        Some(leaf) => {
            buf.push(1);
            write_hash(&mut buf, &leaf.path);
            write_hash(&mut buf, &leaf.value_hash);
        }
    }
    buf
}

/// Decode a proof produced by [`encode_proof`].
pub fn decode_proof(data: &[u8]) -> TreeResult<SparseMerkleProof> {
    let mut r = Reader::new(data);

    let count = r.read_u32()? as usize;
    if count > PATH_BITS {
        return Err(TreeError::Codec(format!(
            "proof has {} siblings, max {}",
            count, PATH_BITS
        )));
    }
    let mut siblings = Vec::with_capacity(count);
    for _ in 0..count {
        siblings.push(r.read_hash()?);
    }

    let leaf = match r.read_u8()? {
        0 => None,
        1 => Some(ProofLeaf {
            path: r.read_hash()?,
            value_hash: r.read_hash()?,
        }),
        _ => return Err(TreeError::Codec("invalid optional flag".into())),
    };
    r.finish()?;

    Ok(SparseMerkleProof { siblings, leaf })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_layout() {
        let node = Node::Leaf {
            path: [0x11; 32],
            value: b"abc".to_vec(),
        };
        let bytes = encode_node(&node);
        assert_eq!(bytes.len(), 1 + 32 + 4 + 3);
        assert_eq!(bytes[0], LEAF_TAG);
        assert_eq!(&bytes[33..37], &3u32.to_le_bytes());
        assert_eq!(decode_node(&bytes).unwrap(), node);
    }

    #[test]
    fn test_branch_layout() {
        let node = Node::Branch {
            left: [0x01; 32],
            right: [0x02; 32],
        };
        let bytes = encode_node(&node);
        assert_eq!(bytes.len(), 65);
        assert_eq!(bytes[0], BRANCH_TAG);
        assert_eq!(decode_node(&bytes).unwrap(), node);
    }

    #[test]
    fn test_decode_node_rejects_unknown_tag() {
        let mut bytes = vec![0x07];
        bytes.extend_from_slice(&[0u8; 64]);
        assert!(matches!(decode_node(&bytes), Err(TreeError::Codec(_))));
    }

    #[test]
    fn test_decode_node_rejects_truncated_and_trailing() {
        let node = Node::Branch {
            left: [0x01; 32],
            right: [0x02; 32],
        };
        let bytes = encode_node(&node);
        assert!(decode_node(&bytes[..40]).is_err());

        let mut padded = bytes.clone();
        padded.push(0);
        assert!(decode_node(&padded).is_err());
    }

    #[test]
    fn test_proof_with_leaf() {
        let proof = SparseMerkleProof {
            siblings: vec![[0xAA; 32], [0xBB; 32]],
            leaf: Some(ProofLeaf {
                path: [0xCC; 32],
                value_hash: [0xDD; 32],
            }),
        };
        let bytes = encode_proof(&proof);
        assert_eq!(bytes.len(), 4 + 64 + 1 + 64);
        assert_eq!(decode_proof(&bytes).unwrap(), proof);
    }

    #[test]
    fn test_decode_proof_rejects_oversized_count() {
        let mut bytes = Vec::new();
        write_u32(&mut bytes, (PATH_BITS + 1) as u32);
        assert!(matches!(decode_proof(&bytes), Err(TreeError::Codec(_))));
    }

    #[test]
    fn test_decode_proof_rejects_bad_flag() {
        let mut bytes = Vec::new();
        write_u32(&mut bytes, 0);
        bytes.push(2);
        assert!(decode_proof(&bytes).is_err());
    }
}
