use serde::Serialize;

use crate::FrameRange;

/// Anything stored at a particular frame.
pub trait FrameIndexed {
    fn frame_index(&self) -> u64;
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("series \"{name}\": frame {frame} does not follow frame {previous}")]
pub struct FrameOrderError {
    pub name: String,
    pub previous: u64,
    pub frame: u64,
}

/// Samples of one named joint or angle, ordered by strictly increasing frame
/// index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeries<S> {
    name: String,
    samples: Vec<S>,
}

impl<S: FrameIndexed> TimeSeries<S> {
    pub fn new(name: impl Into<String>, samples: Vec<S>) -> Result<Self, FrameOrderError> {
        let name = name.into();
        for w in samples.windows(2) {
            let (previous, frame) = (w[0].frame_index(), w[1].frame_index());
            if frame <= previous {
                return Err(FrameOrderError {
                    name,
                    previous,
                    frame,
                });
            }
        }
        Ok(Self { name, samples })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn samples(&self) -> &[S] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn get(&self, frame: u64) -> Option<&S> {
        self.samples
            .binary_search_by_key(&frame, |s| s.frame_index())
            .ok()
            .map(|idx| &self.samples[idx])
    }

    /// The contiguous run of samples whose frame lies in `range`.
    pub fn in_range(&self, range: &FrameRange) -> &[S] {
        let lo = match range.start {
            Some(start) => self.samples.partition_point(|s| s.frame_index() < start),
            None => 0,
        };
        let hi = match range.stop {
            Some(stop) => self.samples.partition_point(|s| s.frame_index() <= stop),
            None => self.samples.len(),
        };
        if lo >= hi { &[] } else { &self.samples[lo..hi] }
    }

    pub fn frames(&self) -> impl Iterator<Item = u64> + '_ {
        self.samples.iter().map(|s| s.frame_index())
    }

    /// First and last frame, or `None` for an empty series.
    pub fn frame_limits(&self) -> Option<[u64; 2]> {
        match (self.samples.first(), self.samples.last()) {
            (Some(first), Some(last)) => Some([first.frame_index(), last.frame_index()]),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AngleSample;

    fn angles(frames: &[u64]) -> Vec<AngleSample> {
        frames
            .iter()
            .map(|&frame_index| AngleSample {
                frame_index,
                degrees: frame_index as f64 * 10.0,
            })
            .collect()
    }

    #[test]
    fn rejects_duplicate_and_decreasing_frames() {
        let err = TimeSeries::new("right knee", angles(&[0, 1, 1])).unwrap_err();
        assert_eq!(err.previous, 1);
        assert_eq!(err.frame, 1);

        let err = TimeSeries::new("right knee", angles(&[0, 5, 3])).unwrap_err();
        assert_eq!(err.frame, 3);
        assert_eq!(err.name, "right knee");
    }

    #[test]
    fn lookup_and_range() {
        let series = TimeSeries::new("trunk", angles(&[0, 1, 2, 5, 6, 9])).unwrap();
        assert_eq!(series.get(5).unwrap().degrees, 50.0);
        assert!(series.get(3).is_none());

        let sub = series.in_range(&FrameRange::new(2, 6));
        let frames: Vec<u64> = sub.iter().map(|s| s.frame_index).collect();
        assert_eq!(frames, vec![2, 5, 6]);

        assert!(series.in_range(&FrameRange::new(3, 4)).is_empty());
        assert!(series.in_range(&FrameRange::new(7, 2)).is_empty());
        assert_eq!(series.in_range(&FrameRange::all()).len(), 6);
        assert_eq!(series.frame_limits(), Some([0, 9]));
    }
}
