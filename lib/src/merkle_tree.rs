use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PoolError, Result};
use crate::field::FieldElement;
use crate::poseidon::{NodeHasher, PoseidonHasher};

/// Sentinel for empty leaves in the pool tree.
pub const DEFAULT_ZERO: &str =
    "14522046728041339886521211779101644712859239303505368468566383402165481390632";

pub fn default_zero_element() -> FieldElement {
    // Constant literal below FIELD_SIZE.
    FieldElement::from_decimal(DEFAULT_ZERO).unwrap_or_default()
}

/// Membership witness for one leaf, exactly as the circuit consumes it.
///
/// `path_indices[l]` is 0 when the running node is a left child at level `l`
/// and 1 when it is a right child.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerklePath {
    pub path_elements: Vec<FieldElement>,
    pub path_indices: Vec<u8>,
}

impl MerklePath {
    /// All-zero witness used for unfunded inputs.
    pub fn empty(levels: usize) -> Self {
        MerklePath {
            path_elements: vec![FieldElement::zero(); levels],
            path_indices: vec![0; levels],
        }
    }

    /// Leaf position encoded by the direction bits.
    pub fn leaf_index(&self) -> u64 {
        self.path_indices
            .iter()
            .enumerate()
            .fold(0u64, |acc, (level, bit)| acc | (u64::from(*bit & 1) << level))
    }
}

// =============================================================================
//                          CLIENT-SIDE MERKLE TREE
// =============================================================================

/// Fixed-height binary tree with every layer materialized.
///
/// Layer 0 holds the leaves; missing nodes read as `zeros[level]`.
///   zeros[0]     = zero_element
///   zeros[l]     = H(zeros[l-1], zeros[l-1])
///   layers[l][i] = H(layers[l-1][2i] or zeros[l-1], layers[l-1][2i+1] or zeros[l-1])
///
/// The tree is a mirror of on-chain leaves. Rebuild it with `bulk_insert`
/// from freshly fetched leaves rather than trusting an old copy.
///
/// Serialization covers `{levels, zero_element, zeros, layers}` only. The
/// hasher is not recorded: deserializing data built with a different hasher
/// yields a tree whose roots are meaningless, and nothing here detects that.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct MerkleTree<H: NodeHasher = PoseidonHasher> {
    levels: usize,
    zero_element: FieldElement,
    zeros: Vec<FieldElement>,
    layers: Vec<Vec<FieldElement>>,
    #[serde(skip)]
    hasher: H,
}

impl MerkleTree<PoseidonHasher> {
    /// Empty Poseidon tree with the default zero element.
    pub fn new(levels: usize) -> Result<Self> {
        Self::with_hasher(levels, default_zero_element(), PoseidonHasher)
    }

    /// Poseidon tree pre-filled with `elements`.
    pub fn with_elements(levels: usize, elements: &[FieldElement]) -> Result<Self> {
        let mut tree = Self::new(levels)?;
        tree.bulk_insert(elements)?;
        Ok(tree)
    }
}

impl<H: NodeHasher> MerkleTree<H> {
    pub fn with_hasher(levels: usize, zero_element: FieldElement, hasher: H) -> Result<Self> {
        if levels == 0 || levels >= usize::BITS as usize {
            return Err(PoolError::Config(format!(
                "tree height {levels} is outside 1..{}",
                usize::BITS
            )));
        }
        let mut zeros = Vec::with_capacity(levels + 1);
        zeros.push(zero_element);
        for level in 1..=levels {
            let below = zeros[level - 1];
            zeros.push(hasher.hash_pair(&below, &below)?);
        }
        Ok(MerkleTree {
            levels,
            zero_element,
            zeros,
            layers: vec![Vec::new(); levels + 1],
            hasher,
        })
    }

    pub fn levels(&self) -> usize {
        self.levels
    }

    pub fn capacity(&self) -> usize {
        1usize << self.levels
    }

    pub fn len(&self) -> usize {
        self.layers[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers[0].is_empty()
    }

    pub fn elements(&self) -> &[FieldElement] {
        &self.layers[0]
    }

    pub fn zeros(&self) -> &[FieldElement] {
        &self.zeros
    }

    pub fn zero_element(&self) -> FieldElement {
        self.zero_element
    }

    pub fn root(&self) -> FieldElement {
        self.layers[self.levels]
            .first()
            .copied()
            .unwrap_or(self.zeros[self.levels])
    }

    /// Appends one leaf and recomputes only its path to the root.
    pub fn insert(&mut self, element: FieldElement) -> Result<usize> {
        if self.len() >= self.capacity() {
            return Err(PoolError::CapacityExceeded {
                capacity: self.capacity(),
            });
        }
        let index = self.len();
        self.layers[0].push(element);
        self.update_path(index)?;
        Ok(index)
    }

    /// Appends many leaves and rebuilds every layer in one bottom-up pass.
    pub fn bulk_insert(&mut self, elements: &[FieldElement]) -> Result<()> {
        if self.len() + elements.len() > self.capacity() {
            return Err(PoolError::CapacityExceeded {
                capacity: self.capacity(),
            });
        }
        self.layers[0].extend_from_slice(elements);
        self.rebuild()
    }

    pub fn update(&mut self, index: usize, element: FieldElement) -> Result<()> {
        if index >= self.len() {
            return Err(PoolError::IndexOutOfRange {
                index,
                len: self.len(),
            });
        }
        self.layers[0][index] = element;
        self.update_path(index)
    }

    /// Sibling nodes and direction bits from leaf `index` up to the root.
    pub fn path(&self, index: usize) -> Result<MerklePath> {
        if index >= self.len() {
            return Err(PoolError::IndexOutOfRange {
                index,
                len: self.len(),
            });
        }
        let mut path_elements = Vec::with_capacity(self.levels);
        let mut path_indices = Vec::with_capacity(self.levels);
        let mut idx = index;
        for level in 0..self.levels {
            path_indices.push((idx % 2) as u8);
            path_elements.push(self.node(level, idx ^ 1));
            idx >>= 1;
        }
        Ok(MerklePath {
            path_elements,
            path_indices,
        })
    }

    /// Position of `element` among the leaves. Absence is the common case
    /// while a deposit is still in flight.
    pub fn index_of(&self, element: &FieldElement) -> Option<usize> {
        self.layers[0].iter().position(|leaf| leaf == element)
    }

    pub fn index_of_by<F>(&self, mut matches: F) -> Option<usize>
    where
        F: FnMut(&FieldElement) -> bool,
    {
        self.layers[0].iter().position(|leaf| matches(leaf))
    }

    /// Folds `leaf` up through `path` and compares against `root`.
    pub fn verify_path(&self, leaf: &FieldElement, path: &MerklePath, root: &FieldElement) -> Result<bool> {
        if path.path_elements.len() != self.levels || path.path_indices.len() != self.levels {
            return Ok(false);
        }
        let mut current = *leaf;
        for (sibling, bit) in path.path_elements.iter().zip(&path.path_indices) {
            current = if *bit == 0 {
                self.hasher.hash_pair(&current, sibling)?
            } else {
                self.hasher.hash_pair(sibling, &current)?
            };
        }
        Ok(current == *root)
    }

    fn node(&self, level: usize, index: usize) -> FieldElement {
        self.layers[level]
            .get(index)
            .copied()
            .unwrap_or(self.zeros[level])
    }

    fn update_path(&mut self, index: usize) -> Result<()> {
        let mut idx = index;
        for level in 1..=self.levels {
            idx >>= 1;
            let left = self.node(level - 1, idx * 2);
            let right = self.node(level - 1, idx * 2 + 1);
            let parent = self.hasher.hash_pair(&left, &right)?;
            let layer = &mut self.layers[level];
            if idx < layer.len() {
                layer[idx] = parent;
            } else {
                layer.push(parent);
            }
        }
        Ok(())
    }

    fn rebuild(&mut self) -> Result<()> {
        for level in 1..=self.levels {
            let below = &self.layers[level - 1];
            let zero = self.zeros[level - 1];
            let mut layer = Vec::with_capacity(below.len().div_ceil(2));
            for pair in below.chunks(2) {
                let right = pair.get(1).copied().unwrap_or(zero);
                layer.push(self.hasher.hash_pair(&pair[0], &right)?);
            }
            self.layers[level] = layer;
        }
        debug!(leaves = self.len(), levels = self.levels, "merkle tree rebuilt");
        Ok(())
    }
}
