//! Progress reporting protocol shared by the executor and the codecs.
//!
//! A stage reports its own `[0, 100]` progress to a [`ProgressSink`]. The
//! executor wraps its sink in a [`ScaledSink`] per stage so a multi-stage
//! operation renders as one continuous arc.

use crate::error::StageError;

/// Event forwarded to the observer of a running operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub percent: u8,
    pub label: String,
}

/// Answer to a progress report: keep going, or unwind the stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Flow {
    Continue,
    Abort,
}

impl Flow {
    /// Turn an abort request into the cancellation error so codecs can write
    /// `sink.report(p, label).check()?`.
    pub fn check(self) -> Result<(), StageError> {
        match self {
            Flow::Continue => Ok(()),
            Flow::Abort => Err(StageError::Cancelled),
        }
    }
}

/// Receiver of progress from a codec call. `percent` is the caller's native
/// `[0, 100]` range.
///
/// Sinks live on the thread that runs the stage, so no `Send`/`Sync` bound
/// is required.
pub trait ProgressSink {
    fn report(&self, percent: f32, label: &str) -> Flow;
}

/// A sink that ignores progress and never aborts.
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn report(&self, _percent: f32, _label: &str) -> Flow {
        Flow::Continue
    }
}

/// Maps an inner `[0, 100]` range onto the outer sub-range `[lo, hi]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeScaler {
    lo: f32,
    hi: f32,
}

impl RangeScaler {
    /// Bounds are clamped to `[0, 100]` and swapped if given out of order.
    pub fn new(lo: f32, hi: f32) -> Self {
        let lo = clamp_percent(lo);
        let hi = clamp_percent(hi);
        if lo <= hi {
            Self { lo, hi }
        } else {
            Self { lo: hi, hi: lo }
        }
    }

    pub fn lo(&self) -> f32 {
        self.lo
    }

    pub fn hi(&self) -> f32 {
        self.hi
    }

    pub fn scale(&self, inner: f32) -> f32 {
        let inner = clamp_percent(inner);
        (self.lo + inner * (self.hi - self.lo) / 100.0).clamp(self.lo, self.hi)
    }
}

/// A sink that rescales every report through a [`RangeScaler`] before
/// handing it to the inner sink.
pub struct ScaledSink<'a> {
    inner: &'a dyn ProgressSink,
    range: RangeScaler,
}

impl<'a> ScaledSink<'a> {
    pub fn new(inner: &'a dyn ProgressSink, range: RangeScaler) -> Self {
        Self { inner, range }
    }
}

impl ProgressSink for ScaledSink<'_> {
    fn report(&self, percent: f32, label: &str) -> Flow {
        self.inner.report(self.range.scale(percent), label)
    }
}

/// Clamp to `[0, 100]`, mapping NaN to 0.
pub fn clamp_percent(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

/// Integer percent shown to observers; truncates toward zero.
pub fn to_event_percent(value: f32) -> u8 {
    clamp_percent(value) as u8
}
