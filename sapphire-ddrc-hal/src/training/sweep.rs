//! Parameter sweeps with rising edge detection and pass window tracking.
use sapphire_ddrc::MAX_SLICES;

use crate::config::SliceCount;

/// One step of an edge sweep.
pub trait SweepStep<T> {
    type Error;

    /// Program the candidate into every active slice, commit it and issue the validation
    /// command.
    fn apply(&mut self, candidate: T) -> Result<(), Self::Error>;

    /// Sample the pass/fail result of one slice for the last applied candidate.
    fn sample(&mut self, slice: usize) -> Result<bool, Self::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SliceEdge<T> {
    last_pass: bool,
    done: bool,
    rising_edge: Option<T>,
}

/// Per-slice rising edge state of a sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeDetector<T> {
    slices: [SliceEdge<T>; MAX_SLICES],
}

impl<T: Copy> EdgeDetector<T> {
    /// Inactive slices start out done so they never hold back the end of a sweep.
    pub fn new(active: SliceCount) -> Self {
        Self {
            slices: core::array::from_fn(|slice| SliceEdge {
                last_pass: false,
                done: !active.is_active(slice),
                rising_edge: None,
            }),
        }
    }

    #[inline]
    pub fn is_done(&self, slice: usize) -> bool {
        self.slices[slice].done
    }

    #[inline]
    pub fn all_done(&self) -> bool {
        self.slices.iter().all(|slice| slice.done)
    }

    /// Record a sample. The first fail to pass transition marks the slice done.
    pub fn record(&mut self, slice: usize, candidate: T, pass: bool) {
        let state = &mut self.slices[slice];
        if state.done {
            return;
        }
        if !state.last_pass && pass {
            state.rising_edge = Some(candidate);
            state.done = true;
        }
        state.last_pass = pass;
    }

    /// Candidate at which the slice passed for the first time after failing.
    #[inline]
    pub fn rising_edge(&self, slice: usize) -> Option<T> {
        self.slices[slice].rising_edge
    }
}

/// Sweep the candidates in order until every active slice has seen a rising edge.
pub fn edge_sweep<T: Copy, S: SweepStep<T>>(
    step: &mut S,
    active: SliceCount,
    candidates: impl IntoIterator<Item = T>,
) -> Result<EdgeDetector<T>, S::Error> {
    let mut detector = EdgeDetector::new(active);
    for candidate in candidates {
        step.apply(candidate)?;
        for slice in 0..MAX_SLICES {
            if !detector.is_done(slice) {
                let pass = step.sample(slice)?;
                detector.record(slice, candidate, pass);
            }
        }
        if detector.all_done() {
            break;
        }
    }
    Ok(detector)
}

/// First and last passing candidate of a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PassWindow {
    first: Option<u8>,
    last: Option<u8>,
}

impl PassWindow {
    #[inline]
    pub const fn new() -> Self {
        Self {
            first: None,
            last: None,
        }
    }

    /// Record a sample. Candidates are expected in ascending order.
    pub fn record(&mut self, candidate: u8, pass: bool) {
        if !pass {
            return;
        }
        if self.first.is_none() {
            self.first = Some(candidate);
        }
        self.last = Some(candidate);
    }

    /// Passing bounds, [None] if no candidate passed.
    pub fn bounds(&self) -> Option<(u8, u8)> {
        Some((self.first?, self.last?))
    }

    /// Distance between the first and the last passing candidate.
    pub fn width(&self) -> Option<u8> {
        self.bounds().map(|(first, last)| last - first)
    }

    /// Midpoint of the window, rounded down.
    pub fn midpoint(&self) -> Option<u8> {
        self.bounds()
            .map(|(first, last)| ((first as u16 + last as u16) / 2) as u8)
    }

    /// Midpoint of the window if it is at least `min_width` wide.
    pub fn centre_with_min_width(&self, min_width: u8) -> Option<u8> {
        match self.width() {
            Some(width) if width >= min_width => self.midpoint(),
            _ => None,
        }
    }

    /// Overlap of two windows. Empty if either window is empty or they do not overlap.
    pub fn intersect(&self, other: &PassWindow) -> PassWindow {
        match (self.bounds(), other.bounds()) {
            (Some((first_a, last_a)), Some((first_b, last_b))) => {
                let first = first_a.max(first_b);
                let last = last_a.min(last_b);
                if first <= last {
                    PassWindow {
                        first: Some(first),
                        last: Some(last),
                    }
                } else {
                    PassWindow::new()
                }
            }
            _ => PassWindow::new(),
        }
    }
}
