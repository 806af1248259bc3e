use core::fmt;
use core::num::NonZeroU32;

/// Handle of a link registered with a network, in registration order.
///
/// Stored as `index + 1` in a `NonZeroU32` so `Option<LinkId>` costs nothing
/// extra. Nodes need no handle: they are plain `usize` indices with ground
/// one past the last regular node.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LinkId(NonZeroU32);

impl LinkId {
    pub fn from_index(index: u32) -> Self {
        Self(NonZeroU32::MIN.saturating_add(index))
    }

    pub fn index(self) -> u32 {
        self.0.get() - 1
    }
}

impl fmt::Debug for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LinkId({})", self.index())
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_survives_offset() {
        for i in [0_u32, 1, 7, 4096] {
            assert_eq!(LinkId::from_index(i).index(), i);
        }
        assert_eq!(format!("{:?}", LinkId::from_index(3)), "LinkId(3)");
    }

    #[test]
    fn optional_handle_is_niche_packed() {
        assert_eq!(
            core::mem::size_of::<LinkId>(),
            core::mem::size_of::<Option<LinkId>>()
        );
    }
}
