//! History validity shared by the per-view and per-light temporal states.

/// Whether the previous frame's output can be read this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryState {
    /// `initialize` has never been called.
    #[default]
    Uninitialized,
    /// Initialized, but nothing reusable from the previous frame.
    HistoryInvalid,
    /// Initialized, and the previous slot holds a committed frame matching the
    /// current layout.
    HistoryValid,
}

impl HistoryState {
    /// State after a per-frame update.
    ///
    /// `reusable` is false on reallocation, on rotation cuts, and when the
    /// previous slot was never committed.
    pub fn advance(self, reusable: bool) -> Self {
        if reusable {
            Self::HistoryValid
        } else {
            Self::HistoryInvalid
        }
    }

    pub fn is_initialized(self) -> bool {
        self != Self::Uninitialized
    }

    pub fn is_valid(self) -> bool {
        self == Self::HistoryValid
    }
}
