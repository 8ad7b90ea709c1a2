/// Distance between the current node and the end of the undo or redo path.
///
/// A compacted node is one tree hop but counts as many edits as it holds commands,
/// so [edits](Depth::edits) reflects what the user perceives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Depth {
    hops: usize,
    edits: usize,
}

impl Depth {
    pub fn zero() -> Self {
        Self::default()
    }

    /// Number of parent/child edges walked.
    pub fn hops(&self) -> usize {
        self.hops
    }

    /// Number of user-visible edits walked.
    pub fn edits(&self) -> usize {
        self.edits
    }

    pub(crate) fn make_next(&self, hops: usize, edits: usize) -> Self {
        Self {
            hops: self.hops + hops,
            edits: self.edits + edits,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn accumulate() {
        let d = Depth::zero().make_next(1, 1).make_next(1, 5).make_next(0, 2);

        assert_eq!(2, d.hops());
        assert_eq!(8, d.edits());
        assert_eq!(Depth::zero(), Depth::default());
    }
}
