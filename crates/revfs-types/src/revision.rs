use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::object::ObjectId;

/// Identifies one committed, immutable tree state.
///
/// `id` is the content hash of the stored revision record; `height` is the
/// length of the longest parent chain back to a root revision. Tags are cheap
/// to copy and compare by value.
///
/// Ordering: `height` → `id`. This is the canonical sort order for candidate
/// lists, not a recency judgement; recency comes from the revision graph.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RevisionTag {
    pub height: u64,
    pub id: ObjectId,
}

impl RevisionTag {
    pub fn new(id: ObjectId, height: u64) -> Self {
        Self { height, id }
    }

    pub fn short_hex(&self) -> String {
        self.id.short_hex()
    }
}

impl fmt::Debug for RevisionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RevisionTag({}@{})", self.id.short_hex(), self.height)
    }
}

impl fmt::Display for RevisionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id.short_hex(), self.height)
    }
}

/// Parses the long form `<64 hex chars>@<height>`.
impl FromStr for RevisionTag {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hex, height) = s
            .split_once('@')
            .ok_or_else(|| TypeError::InvalidRevisionTag(s.to_string()))?;
        let height = height
            .parse::<u64>()
            .map_err(|_| TypeError::InvalidRevisionTag(s.to_string()))?;
        Ok(Self::new(ObjectId::from_hex(hex)?, height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn tag(seed: u8, height: u64) -> RevisionTag {
        RevisionTag::new(ObjectId::from_hash([seed; 32]), height)
    }

    #[test]
    fn ordering_height_first() {
        assert!(tag(9, 1) < tag(0, 2));
        assert!(tag(1, 3) < tag(2, 3));
    }

    #[test]
    fn parse_long_form() {
        let t = tag(7, 12);
        let s = format!("{}@{}", t.id.to_hex(), t.height);
        assert_eq!(s.parse::<RevisionTag>().unwrap(), t);
        assert!("deadbeef".parse::<RevisionTag>().is_err());
        assert!(format!("{}@x", t.id.to_hex()).parse::<RevisionTag>().is_err());
    }

    #[test]
    fn display_is_short() {
        assert_eq!(format!("{}", tag(0xab, 3)), "abababab@3");
    }

    proptest! {
        #[test]
        fn ordering_is_antisymmetric(a in any::<u8>(), b in any::<u8>(), ha in 0u64..4, hb in 0u64..4) {
            let (x, y) = (tag(a, ha), tag(b, hb));
            prop_assert_eq!(x.cmp(&y), y.cmp(&x).reverse());
            prop_assert_eq!(x == y, x.cmp(&y) == std::cmp::Ordering::Equal);
        }
    }
}
