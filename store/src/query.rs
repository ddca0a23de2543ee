//! Query interface for an RPC layer sitting on top of the store.
//!
//! Two paths are served:
//!
//! - `/key`: point lookup of `data` at `height`, with an optional proof
//!   against the root committed at that height.
//! - `/subspace`: every pair whose key starts with `data`, at the latest
//!   committed height only.
//!
//! `height == 0` selects the latest committed version. A height that was
//! never committed or has been pruned fails with
//! [`StoreError::VersionUnavailable`], which is distinct from a missing key
//! (`value == None`).

use serde::{Deserialize, Serialize};

use smtstore_primitives::codec::encode_proof;
use smtstore_primitives::{Hash, SparseMerkleProof, TreeHasher, Version};
use tracing::error;

use crate::backend::KvBackend;
use crate::error::{StoreError, StoreResult};
use crate::keys::prefix_end;
use crate::store::SmtStore;

pub const KEY_PATH: &str = "/key";
pub const SUBSPACE_PATH: &str = "/subspace";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub path: String,
    /// Key for `/key`, prefix for `/subspace`.
    pub data: Vec<u8>,
    /// Version to read; `0` means latest committed.
    pub height: Version,
    /// Attach a proof to a `/key` response.
    pub prove: bool,
}

impl QueryRequest {
    /// Point lookup of `key` at `height`.
    pub fn key(key: &[u8], height: Version) -> Self {
        Self {
            path: KEY_PATH.to_string(),
            data: key.to_vec(),
            height,
            prove: false,
        }
    }

    /// Prefix scan of `prefix` at the latest committed height.
    pub fn subspace(prefix: &[u8]) -> Self {
        Self {
            path: SUBSPACE_PATH.to_string(),
            data: prefix.to_vec(),
            height: 0,
            prove: false,
        }
    }

    pub fn with_proof(mut self) -> Self {
        self.prove = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResponse {
    /// The queried key (or prefix).
    pub key: Vec<u8>,
    /// Value at the served height, `None` if the key is absent.
    pub value: Option<Vec<u8>>,
    /// Membership or non-membership proof, when requested.
    pub proof: Option<SparseMerkleProof>,
    /// Version actually served.
    pub height: Version,
    /// Root committed at `height`.
    pub root: Hash,
    /// Matching pairs of a `/subspace` query, in key order.
    pub pairs: Vec<(Vec<u8>, Vec<u8>)>,
}

impl QueryResponse {
    /// Check the attached proof against `root`. False if there is no proof.
    pub fn verify<H: TreeHasher>(&self) -> bool {
        match &self.proof {
            Some(proof) => proof.verify::<H>(&self.root, &self.key, self.value.as_deref()),
            None => false,
        }
    }

    /// Attached proof in the binary proof encoding.
    pub fn encoded_proof(&self) -> Option<Vec<u8>> {
        self.proof.as_ref().map(encode_proof)
    }
}

enum QueryPath {
    Key,
    Subspace,
}

impl<B: KvBackend, H: TreeHasher> SmtStore<B, H> {
    /// Answer `req` from committed state.
    pub fn query(&self, req: &QueryRequest) -> StoreResult<QueryResponse> {
        let path = match req.path.as_str() {
            KEY_PATH => QueryPath::Key,
            SUBSPACE_PATH => QueryPath::Subspace,
            other => return Err(StoreError::UnknownQueryPath(other.to_string())),
        };
        if req.data.is_empty() {
            return Err(StoreError::InvalidRequest("query data is empty".into()));
        }
        if req.height < 0 {
            return Err(StoreError::InvalidVersion(req.height));
        }

        let state = self.shared.state.read();
        let latest = state.versions.latest().version;
        let height = if req.height == 0 { latest } else { req.height };
        let root = state
            .versions
            .root_at(height)
            .ok_or(StoreError::VersionUnavailable {
                requested: height,
                latest,
            })?;

        match path {
            QueryPath::Key => {
                let value = state.tree.get_at(&root, &req.data)?;
                let proof = if req.prove {
                    Some(state.tree.prove_at(&root, &req.data)?)
                } else {
                    None
                };
                Ok(QueryResponse {
                    key: req.data.clone(),
                    value,
                    proof,
                    height,
                    root,
                    pairs: Vec::new(),
                })
            }
            QueryPath::Subspace => {
                if req.prove {
                    return Err(StoreError::Unimplemented("proofs for subspace queries"));
                }
                // The index tracks the working state only.
                if height != latest || state.tree.root() != root {
                    return Err(StoreError::Unimplemented(
                        "subspace query at a height other than the working state",
                    ));
                }
                let end = prefix_end(&req.data);
                let keys = self
                    .shared
                    .index
                    .scan(Some(req.data.as_slice()), end.as_deref(), false)?;
                let mut pairs = Vec::with_capacity(keys.len());
                for key in keys {
                    match state.tree.get_at(&root, &key)? {
                        Some(value) => pairs.push((key, value)),
                        None => error!(
                            key = %hex::encode(&key),
                            "index entry without a value in the tree"
                        ),
                    }
                }
                Ok(QueryResponse {
                    key: req.data.clone(),
                    value: None,
                    proof: None,
                    height,
                    root,
                    pairs,
                })
            }
        }
    }
}
