use rand::RngCore;

/// A fresh 64-bit identity for a newly created inode.
///
/// Two writers that independently issue the same inode id will, with
/// overwhelming probability, pick different identities; merges use this to
/// tell a coincidental id collision from a genuine shared object. Zero is
/// never returned.
pub fn random_identity() -> u64 {
    let mut rng = rand::thread_rng();
    loop {
        let value = rng.next_u64();
        if value != 0 {
            return value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identities_are_nonzero_and_distinct() {
        let a = random_identity();
        let b = random_identity();
        assert_ne!(a, 0);
        assert_ne!(a, b);
    }
}
