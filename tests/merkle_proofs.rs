use leafbook::merkle::{leaf_hex, verify_proof, MerkleError, MerkleTree, Position};

fn leaves(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| leaf_hex(format!("doc-{i}").as_bytes()))
        .collect()
}

#[test]
fn every_index_verifies_for_a_range_of_sizes() {
    for n in 1..=16 {
        let ls = leaves(n);
        let tree = MerkleTree::build(&ls).unwrap();
        for (i, leaf) in ls.iter().enumerate() {
            let proof = tree.proof(i).unwrap();
            assert!(
                verify_proof(leaf, &proof, tree.root()),
                "n={n} index={i} should verify"
            );
        }
    }
}

#[test]
fn changing_any_single_leaf_changes_the_root() {
    let ls = leaves(7);
    let base = MerkleTree::build(&ls).unwrap();
    for i in 0..ls.len() {
        let mut altered = ls.clone();
        altered[i] = leaf_hex(b"something else");
        let tree = MerkleTree::build(&altered).unwrap();
        assert_ne!(tree.root(), base.root(), "leaf {i} change must move root");
    }
}

#[test]
fn tampered_sibling_fails_verification() {
    let ls = leaves(8);
    let tree = MerkleTree::build(&ls).unwrap();
    let mut proof = tree.proof(3).unwrap();
    proof[1].sibling = leaf_hex(b"forged");
    assert!(!verify_proof(&ls[3], &proof, tree.root()));
}

#[test]
fn flipped_position_fails_verification() {
    let ls = leaves(8);
    let tree = MerkleTree::build(&ls).unwrap();
    let mut proof = tree.proof(5).unwrap();
    proof[0].position = match proof[0].position {
        Position::Left => Position::Right,
        Position::Right => Position::Left,
    };
    assert!(!verify_proof(&ls[5], &proof, tree.root()));
}

#[test]
fn wrong_leaf_fails_against_valid_proof() {
    let ls = leaves(6);
    let tree = MerkleTree::build(&ls).unwrap();
    let proof = tree.proof(2).unwrap();
    assert!(!verify_proof(&ls[4], &proof, tree.root()));
}

#[test]
fn out_of_range_is_a_defined_error_not_a_malformed_proof() {
    let tree = MerkleTree::build(&leaves(5)).unwrap();
    assert_eq!(
        tree.proof(5).unwrap_err(),
        MerkleError::IndexOutOfRange { index: 5, len: 5 }
    );
    assert_eq!(
        tree.proof(usize::MAX).unwrap_err(),
        MerkleError::IndexOutOfRange {
            index: usize::MAX,
            len: 5
        }
    );
}

#[test]
fn empty_leaf_set_is_rejected() {
    assert_eq!(MerkleTree::build(&[]).unwrap_err(), MerkleError::EmptyLeaves);
}

#[test]
fn proof_length_is_logarithmic() {
    let tree = MerkleTree::build(&leaves(16)).unwrap();
    assert_eq!(tree.proof(0).unwrap().len(), 4);
    let tree = MerkleTree::build(&leaves(9)).unwrap();
    assert_eq!(tree.proof(8).unwrap().len(), 4);
}

#[test]
fn duplicate_pairing_keeps_last_odd_leaf_provable() {
    // n=5: indices 4 sits alone on its level twice before joining
    let ls = leaves(5);
    let tree = MerkleTree::build(&ls).unwrap();
    let proof = tree.proof(4).unwrap();
    assert!(verify_proof(&ls[4], &proof, tree.root()));
}
