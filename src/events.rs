use crate::error::PreloadFailed;

/// Abstract navigation request produced by the input side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Advance,
    Retreat,
    JumpTo(usize),
    /// Jump to a random index other than the current one.
    Shuffle,
    /// A drag was released below the swipe threshold.
    CancelReturn,
}

/// Display positions the renderer knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Prev,
    Current,
    Next,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Normal,
    /// Placeholder shown while the next image is still warming up.
    Loading,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationPhase {
    /// Before `initialize` has produced a first record.
    Uninitialized,
    Idle,
    Transitioning,
    /// Terminal: nothing but a restart leaves this state.
    Error,
}

/// What the controller publishes after every state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigationSnapshot {
    pub phase: NavigationPhase,
    pub current_index: Option<usize>,
}

/// Why an intent was turned away without side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    NotInitialized,
    Errored,
    AtEnd,
    AtStart,
    OutOfRange { index: usize, len: usize },
    AlreadyCurrent,
    TooFewRecords,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentOutcome {
    Committed { from: usize, to: usize },
    /// The target never became ready; the previous view was put back.
    Restored { index: usize, cause: PreloadFailed },
    SnappedBack,
    Rejected(Rejection),
    /// Another transition was in flight; the intent was dropped.
    Busy,
}
