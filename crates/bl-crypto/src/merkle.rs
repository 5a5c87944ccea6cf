//! Binary Merkle tree over transaction canonical records. Leaf = SHA-256 of
//! the record; internal = SHA-256(left || right); odd trailing leaves are
//! duplicated (spec §6).

use crate::hash::sha256_hex;

#[derive(Clone, Debug)]
pub struct MerkleTree {
    pub root: String,
    /// Level 0 = leaves, last level = `[root]`.
    pub levels: Vec<Vec<String>>,
}

impl MerkleTree {
    /// Build a tree from canonical transaction record strings (already
    /// hashed leaves are *not* expected here — `records` are raw canonical
    /// bytes-as-utf8, hashed once to form the leaf layer).
    pub fn build(records: &[String]) -> Self {
        if records.is_empty() {
            let empty_hash = sha256_hex(b"");
            return MerkleTree {
                root: empty_hash.clone(),
                levels: vec![vec![empty_hash]],
            };
        }

        let mut level: Vec<String> = records.iter().map(|r| sha256_hex(r.as_bytes())).collect();
        let mut levels = vec![level.clone()];

        while level.len() > 1 {
            if level.len() % 2 == 1 {
                level.push(level.last().unwrap().clone());
            }
            let mut next = Vec::with_capacity(level.len() / 2);
            for pair in level.chunks(2) {
                let combined = format!("{}{}", pair[0], pair[1]);
                next.push(sha256_hex(combined.as_bytes()));
            }
            levels.push(next.clone());
            level = next;
        }

        MerkleTree {
            root: level[0].clone(),
            levels,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_leaf_root_equals_leaf_hash() {
        let tree = MerkleTree::build(&["tx1".to_string()]);
        assert_eq!(tree.root, sha256_hex(b"tx1"));
    }

    #[test]
    fn odd_leaves_duplicate_last() {
        let records = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let tree = MerkleTree::build(&records);
        // 3 leaves -> padded to 4 -> 2 -> 1
        assert_eq!(tree.levels[0].len(), 3);
        assert_eq!(tree.levels.last().unwrap().len(), 1);
    }

    #[test]
    fn deterministic() {
        let records = vec!["x".to_string(), "y".to_string()];
        let t1 = MerkleTree::build(&records);
        let t2 = MerkleTree::build(&records);
        assert_eq!(t1.root, t2.root);
    }

    #[test]
    fn order_sensitive() {
        let a = MerkleTree::build(&["x".to_string(), "y".to_string()]);
        let b = MerkleTree::build(&["y".to_string(), "x".to_string()]);
        assert_ne!(a.root, b.root);
    }
}
