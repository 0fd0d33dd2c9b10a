//! Record identifier.

use std::fmt;

use super::PageId;

/// Stable handle to one record: the page it lives on and its slot.
///
/// A RID stays valid until the record it names is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Rid {
    pub page_no: PageId,
    pub slot_no: u16,
}

impl Rid {
    #[inline]
    pub fn new(page_no: PageId, slot_no: u16) -> Self {
        Self { page_no, slot_no }
    }
}

impl fmt::Display for Rid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}.{})", self.page_no.0, self.slot_no)
    }
}
