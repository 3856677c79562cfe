use crate::types::RoundId;

/// Pagination over round ids, newest first.
///
/// The cursor holds an exclusive upper bound: the next page starts right
/// below it. Round 1 is the oldest round, so emitting it ends pagination
/// even in the middle of a page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundCursor {
    min_round_id: Option<RoundId>,
    has_more: bool,
}

impl Default for RoundCursor {
    fn default() -> Self {
        Self {
            min_round_id: None,
            has_more: true,
        }
    }
}

impl RoundCursor {
    /// Cursor that still has to learn the current round id, see
    /// [`RoundCursor::initialize`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Cursor whose first page starts at `bound - 1`.
    pub fn below(bound: RoundId) -> Self {
        Self {
            min_round_id: Some(bound),
            has_more: bound > 1,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.min_round_id.is_some()
    }

    /// Seeds the bound from the contract's current round so that the first
    /// page includes the current round itself. No-op once initialised.
    pub fn initialize(&mut self, current_round_id: RoundId) {
        if self.is_initialized() {
            return;
        }
        *self = Self::below(current_round_id.saturating_add(1));
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// Lowest id handed out so far, or the initial bound before any page.
    pub fn min_round_id(&self) -> Option<RoundId> {
        self.min_round_id
    }

    /// Up to `page_size` ids counting down from the bound. Empty once
    /// exhausted or before initialisation.
    pub fn next_page(&mut self, page_size: usize) -> Vec<RoundId> {
        let Some(bound) = self.min_round_id else {
            return Vec::new();
        };
        if !self.has_more {
            return Vec::new();
        }
        let page_size = page_size.max(1);

        let mut ids = Vec::with_capacity(page_size.min(bound as usize));
        let mut next = bound;
        while ids.len() < page_size && next > 1 {
            next -= 1;
            ids.push(next);
        }

        self.min_round_id = Some(next);
        if next <= 1 {
            self.has_more = false;
        }
        ids
    }
}
