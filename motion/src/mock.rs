//! Deterministic sample source for tests and hardware-free runs.

use std::collections::VecDeque;

use crate::{MotionError, RawSample, SampleSource};

/// A scripted [`SampleSource`].
///
/// Plays back a fixed sequence of ticks: each entry is either a sample or
/// a simulated read failure. Once the script is exhausted every further
/// read fails, mirroring a sensor that has gone quiet.
#[derive(Debug, Default)]
pub struct MockSource {
    script: VecDeque<Option<RawSample>>,
}

impl MockSource {
    pub fn new() -> Self {
        MockSource::default()
    }

    /// Builds a source that yields the given samples in order.
    pub fn from_samples<I>(samples: I) -> Self
    where
        I: IntoIterator<Item = RawSample>,
    {
        MockSource {
            script: samples.into_iter().map(Some).collect(),
        }
    }

    /// Appends one successful tick to the script.
    pub fn push_sample(&mut self, sample: RawSample) {
        self.script.push_back(Some(sample));
    }

    /// Appends one failed read to the script.
    pub fn push_failure(&mut self) {
        self.script.push_back(None);
    }

    /// Remaining scripted ticks.
    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl SampleSource for MockSource {
    fn read_sample(&mut self) -> Result<RawSample, MotionError> {
        match self.script.pop_front() {
            Some(Some(sample)) => Ok(sample),
            Some(None) => Err(MotionError::ReadError("scripted read failure".to_string())),
            None => Err(MotionError::ReadError("mock script exhausted".to_string())),
        }
    }
}
