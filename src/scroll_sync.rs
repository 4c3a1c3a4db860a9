use std::time::{Duration, Instant};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pane {
    Source,
    Diff,
}

impl Pane {
    pub fn other(self) -> Pane {
        match self {
            Pane::Source => Pane::Diff,
            Pane::Diff => Pane::Source,
        }
    }

    fn index(self) -> usize {
        match self {
            Pane::Source => 0,
            Pane::Diff => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    SyncPending,
}

/// A mirrored scroll the caller should apply to `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollWrite {
    pub target: Pane,
    pub offset: usize,
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    offset: usize,
    due: Instant,
}

/// Couples the scroll offsets of the source and diff panes. Each direction
/// has one pending slot; a newer scroll on the same pane overwrites it, so a
/// burst collapses into a single mirrored write once the pane settles.
#[derive(Debug)]
pub struct ScrollSync {
    delay: Duration,
    last_offset: [usize; 2],
    // Indexed by the pane that scrolled.
    pending: [Option<Pending>; 2],
    // Offset most recently written into each pane by the synchronizer.
    mirrored: [Option<usize>; 2],
}

impl ScrollSync {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_offset: [0; 2],
            pending: [None; 2],
            mirrored: [None; 2],
        }
    }

    pub fn state(&self, pane: Pane) -> SyncState {
        if self.pending[pane.index()].is_some() {
            SyncState::SyncPending
        } else {
            SyncState::Idle
        }
    }

    pub fn last_offset(&self, pane: Pane) -> usize {
        self.last_offset[pane.index()]
    }

    /// Report a scroll of `pane` to `offset`.
    pub fn on_scroll(&mut self, pane: Pane, offset: usize, now: Instant) {
        let i = pane.index();
        self.last_offset[i] = offset;

        // The pane is only reporting the position we just wrote into it.
        if self.mirrored[i].take() == Some(offset) {
            return;
        }

        self.pending[i] = Some(Pending {
            offset,
            due: now + self.delay,
        });
    }

    /// A pane finished applying a mirrored write and landed on `offset`.
    /// Records the position without scheduling a write back.
    pub fn settle(&mut self, pane: Pane, offset: usize) {
        let i = pane.index();
        self.last_offset[i] = offset;
        self.mirrored[i] = None;
    }

    /// Fire every slot that is due. At most one write per direction.
    pub fn poll(&mut self, now: Instant) -> Vec<ScrollWrite> {
        let mut writes = Vec::new();
        for pane in [Pane::Source, Pane::Diff] {
            let i = pane.index();
            let Some(p) = self.pending[i] else { continue };
            if p.due > now {
                continue;
            }
            self.pending[i] = None;
            let target = pane.other();
            self.mirrored[target.index()] = Some(p.offset);
            self.last_offset[target.index()] = p.offset;
            writes.push(ScrollWrite {
                target,
                offset: p.offset,
            });
        }
        writes
    }

    /// How long the event loop may sleep before the next slot is due.
    pub fn next_deadline(&self, now: Instant) -> Option<Duration> {
        self.pending
            .iter()
            .flatten()
            .map(|p| p.due.saturating_duration_since(now))
            .min()
    }
}

impl Default for ScrollSync {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

/// Animated approach to a mirrored offset: each frame covers half of the
/// remaining distance, at least one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollAnimation {
    current: usize,
    target: usize,
}

impl ScrollAnimation {
    pub fn new(from: usize, to: usize) -> Self {
        Self {
            current: from,
            target: to,
        }
    }

    pub fn retarget(&mut self, to: usize) {
        self.target = to;
    }

    pub fn is_done(&self) -> bool {
        self.current == self.target
    }

    pub fn target(&self) -> usize {
        self.target
    }

    /// Advance one frame and return the new offset.
    pub fn step(&mut self) -> usize {
        let distance = self.current.abs_diff(self.target);
        let step = (distance / 2).max(1).min(distance);
        if self.current < self.target {
            self.current += step;
        } else {
            self.current -= step;
        }
        self.current
    }
}
