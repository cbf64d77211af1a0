//! Presentation model lifecycle states and the legal transition table

use serde::{Deserialize, Serialize};

/// Binding phase of a presentation model relative to its host view.
///
/// Variants are declared in their natural order. A model starts with no
/// lifecycle value at all and ends in [`Lifecycle::Destroyed`], which is
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    Created,
    Binded,
    Resumed,
    Paused,
    Unbinded,
    Destroyed,
}

impl Lifecycle {
    /// All states in declaration order
    pub const ALL: [Lifecycle; 6] = [
        Lifecycle::Created,
        Lifecycle::Binded,
        Lifecycle::Resumed,
        Lifecycle::Paused,
        Lifecycle::Unbinded,
        Lifecycle::Destroyed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Lifecycle::Created => "created",
            Lifecycle::Binded => "binded",
            Lifecycle::Resumed => "resumed",
            Lifecycle::Paused => "paused",
            Lifecycle::Unbinded => "unbinded",
            Lifecycle::Destroyed => "destroyed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Lifecycle::Destroyed)
    }

    /// Whether a model in this state counts as idle (paused or not yet resumed).
    pub fn is_idle(&self) -> bool {
        !matches!(self, Lifecycle::Resumed)
    }

    /// Check whether `from -> to` is a legal step.
    ///
    /// Repeating the current state is not a step; callers collapse it before
    /// asking.
    pub fn can_transition(from: Option<Lifecycle>, to: Lifecycle) -> bool {
        use Lifecycle::*;
        matches!(
            (from, to),
            (None, Created)
                | (Some(Created), Binded)
                | (Some(Created), Destroyed)
                | (Some(Binded), Resumed)
                | (Some(Binded), Unbinded)
                | (Some(Resumed), Paused)
                | (Some(Paused), Resumed)
                | (Some(Paused), Unbinded)
                | (Some(Unbinded), Binded)
                | (Some(Unbinded), Destroyed)
        )
    }

    /// Minimal sequence of transitions that takes a model from `current` to
    /// [`Lifecycle::Destroyed`].
    ///
    /// Empty for a model that was never created or is already destroyed.
    pub fn teardown_path(current: Option<Lifecycle>) -> &'static [Lifecycle] {
        use Lifecycle::*;
        match current {
            Some(Created) => &[Destroyed],
            Some(Binded) => &[Unbinded, Destroyed],
            Some(Resumed) => &[Paused, Unbinded, Destroyed],
            Some(Paused) => &[Unbinded, Destroyed],
            Some(Unbinded) => &[Destroyed],
            None | Some(Destroyed) => &[],
        }
    }
}

impl std::fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
