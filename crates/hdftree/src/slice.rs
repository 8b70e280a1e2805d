//! Slice specifications and hyperslab extraction.
//!
//! A [`SliceSpec`] holds optional per-axis `start`, `stop` and `step`
//! vectors. Vectors shorter than the array rank leave the remaining axes
//! whole. Resolution against a concrete shape validates the bounds and
//! yields one [`ResolvedSlice`] per axis.

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SliceSpec {
    pub start: Option<Vec<usize>>,
    pub stop: Option<Vec<usize>>,
    pub step: Option<Vec<usize>>,
}

/// One axis of a resolved slice: `count` indices `start, start + step, ...`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedSlice {
    pub start: usize,
    pub step: usize,
    pub count: usize,
}

impl ResolvedSlice {
    /// The whole of an axis of length `len`.
    pub fn full(len: usize) -> Self {
        Self {
            start: 0,
            step: 1,
            count: len,
        }
    }

    /// Exclusive upper index touched by this selection.
    pub fn stop(&self) -> usize {
        if self.count == 0 {
            self.start
        } else {
            self.start + (self.count - 1) * self.step + 1
        }
    }

    /// Index on the underlying axis of the `i`-th selected element.
    pub fn index(&self, i: usize) -> usize {
        self.start + i * self.step
    }
}

impl SliceSpec {
    /// Select everything.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn start(mut self, start: &[usize]) -> Self {
        self.start = Some(start.to_vec());
        self
    }

    pub fn stop(mut self, stop: &[usize]) -> Self {
        self.stop = Some(stop.to_vec());
        self
    }

    pub fn step(mut self, step: &[usize]) -> Self {
        self.step = Some(step.to_vec());
        self
    }

    /// True when neither `start` nor `step` is given; such reads may load
    /// the whole object in one go.
    pub fn is_whole_prefix(&self) -> bool {
        self.start.is_none() && self.step.is_none()
    }

    /// True when this selects every element of `shape`.
    pub fn is_everything(&self, shape: &[usize]) -> bool {
        self.is_whole_prefix()
            && self
                .stop
                .as_ref()
                .map_or(true, |stop| stop.iter().zip(shape).all(|(s, d)| s == d))
    }

    /// Validate against `shape` and resolve every axis.
    pub fn resolve(&self, shape: &[usize]) -> Result<Vec<ResolvedSlice>> {
        let rank = shape.len();
        for (what, v) in [("start", &self.start), ("stop", &self.stop), ("step", &self.step)] {
            if let Some(v) = v {
                if v.len() > rank {
                    return Err(Error::InvalidSlice(format!(
                        "{what} has {} entries for rank {rank}",
                        v.len()
                    )));
                }
            }
        }

        let at = |v: &Option<Vec<usize>>, axis: usize| v.as_ref().and_then(|v| v.get(axis).copied());

        let mut out = Vec::with_capacity(rank);
        for (axis, &len) in shape.iter().enumerate() {
            let start_given = at(&self.start, axis);
            let stop_given = at(&self.stop, axis);
            let start = start_given.unwrap_or(0);
            let stop = stop_given.unwrap_or(len);
            let step = at(&self.step, axis).unwrap_or(1);

            if step == 0 {
                return Err(Error::InvalidSlice(format!("step is zero on axis {axis}")));
            }
            if start > len {
                return Err(Error::SliceOutOfBounds {
                    axis,
                    index: start,
                    len,
                });
            }
            if stop > len {
                return Err(Error::SliceOutOfBounds {
                    axis,
                    index: stop,
                    len,
                });
            }
            if start > stop {
                return Err(Error::InvalidSlice(format!(
                    "start {start} after stop {stop} on axis {axis}"
                )));
            }
            let count = (stop - start).div_ceil(step);
            // an empty axis read without a start is read whole
            let whole_empty_axis = len == 0 && start_given.is_none();
            let explicit_empty = start_given.is_some() && stop_given.is_some();
            if count == 0 && !explicit_empty && !whole_empty_axis {
                return Err(Error::SliceOutOfBounds {
                    axis,
                    index: start,
                    len,
                });
            }
            out.push(ResolvedSlice { start, step, count });
        }
        Ok(out)
    }

    /// Rebuild a spec selecting exactly `resolved`.
    pub fn from_resolved(resolved: &[ResolvedSlice]) -> Self {
        Self {
            start: Some(resolved.iter().map(|r| r.start).collect()),
            stop: Some(resolved.iter().map(|r| r.stop()).collect()),
            step: Some(resolved.iter().map(|r| r.step).collect()),
        }
    }
}

/// Output shape of a resolved selection.
pub fn output_shape(resolved: &[ResolvedSlice]) -> Vec<usize> {
    resolved.iter().map(|r| r.count).collect()
}

/// Map each axis of `nominal` onto an axis of `actual`.
///
/// Length-1 axes on either side may be added or dropped; the remaining axes
/// must agree positionally. Returns, per nominal axis, the matching actual
/// axis or `None` for an inserted length-1 axis.
pub fn reconcile(nominal: &[usize], actual: &[usize]) -> Result<Vec<Option<usize>>> {
    let mismatch = || Error::ShapeMismatch {
        expected: nominal.to_vec(),
        actual: actual.to_vec(),
    };
    if nominal == actual {
        return Ok((0..nominal.len()).map(Some).collect());
    }

    let significant: Vec<usize> = (0..actual.len()).filter(|&a| actual[a] != 1).collect();
    let mut next = significant.iter();
    let mut mapping = Vec::with_capacity(nominal.len());
    for &len in nominal {
        if len == 1 {
            mapping.push(None);
            continue;
        }
        match next.next() {
            Some(&a) if actual[a] == len => mapping.push(Some(a)),
            _ => return Err(mismatch()),
        }
    }
    if next.next().is_some() {
        return Err(mismatch());
    }
    Ok(mapping)
}

/// Copy the selected elements of a dense row-major array.
///
/// `raw` must hold `product(dims) * elem` bytes. Runs along the last axis
/// are copied in one piece when the step there is 1.
pub(crate) fn extract(raw: &[u8], dims: &[usize], elem: usize, sel: &[ResolvedSlice]) -> Vec<u8> {
    let total: usize = sel.iter().map(|s| s.count).product();
    let mut out = Vec::with_capacity(total * elem);
    if total == 0 {
        return out;
    }
    let rank = dims.len();
    if rank == 0 {
        out.extend_from_slice(&raw[..elem]);
        return out;
    }

    let mut strides = vec![elem; rank];
    for axis in (0..rank - 1).rev() {
        strides[axis] = strides[axis + 1] * dims[axis + 1];
    }

    let last = sel[rank - 1];
    let mut counters = vec![0usize; rank - 1];
    loop {
        let base: usize = counters
            .iter()
            .enumerate()
            .map(|(axis, &i)| sel[axis].index(i) * strides[axis])
            .sum::<usize>()
            + last.start * elem;
        if last.step == 1 {
            out.extend_from_slice(&raw[base..base + last.count * elem]);
        } else {
            for k in 0..last.count {
                let at = base + k * last.step * elem;
                out.extend_from_slice(&raw[at..at + elem]);
            }
        }

        let mut axis = rank - 1;
        loop {
            if axis == 0 {
                return out;
            }
            axis -= 1;
            counters[axis] += 1;
            if counters[axis] < sel[axis].count {
                break;
            }
            counters[axis] = 0;
        }
    }
}
