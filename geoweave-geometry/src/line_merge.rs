//! Chain line segments that share endpoints into continuous lines.
//!
//! Endpoints are compared exactly. A chain grows one segment at a time from
//! either end until no segment continues it. A point where more than two
//! segment ends meet is a junction; it is reported before any chaining
//! starts, so the outcome does not depend on the order of the input.

use std::collections::BTreeMap;

use geo::{Coord, Geometry, LineString, MultiLineString};
use thiserror::Error;

/// Failure raised when segments cannot be chained unambiguously.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MergeError {
    /// More than one segment continues a chain from the same endpoint.
    #[error("ambiguous topology at ({x}, {y}): {branches} segments continue the chain")]
    AmbiguousTopology {
        /// Longitude of the junction.
        x: f64,
        /// Latitude of the junction.
        y: f64,
        /// Number of segments that could continue the chain.
        branches: usize,
    },
}

/// Result of [`merge_lines`].
#[derive(Debug, Clone, PartialEq)]
pub enum MergedLines {
    /// Every segment joined into one chain.
    Single(LineString<f64>),
    /// Chains in the order they were completed.
    Multi(MultiLineString<f64>),
}

impl From<MergedLines> for Geometry<f64> {
    fn from(merged: MergedLines) -> Self {
        match merged {
            MergedLines::Single(line) => Self::LineString(line),
            MergedLines::Multi(lines) => Self::MultiLineString(lines),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Head,
    Tail,
}

/// How a candidate segment attaches to the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attach {
    /// Segment head meets chain tail.
    Append,
    /// Segment tail meets chain tail.
    AppendReversed,
    /// Segment tail meets chain head.
    Prepend,
    /// Segment head meets chain head: the chain is flipped, then extended.
    FlipAndAppend,
}

impl Side {
    fn attachment(self, segment: &[Coord<f64>], end: Coord<f64>) -> Option<Attach> {
        let (first, last) = (segment.first()?, segment.last()?);
        match self {
            Self::Tail if *first == end => Some(Attach::Append),
            Self::Tail if *last == end => Some(Attach::AppendReversed),
            Self::Head if *last == end => Some(Attach::Prepend),
            Self::Head if *first == end => Some(Attach::FlipAndAppend),
            Self::Head | Self::Tail => None,
        }
    }
}

type Pool = [Option<Vec<Coord<f64>>>];

fn is_ring(chain: &[Coord<f64>]) -> bool {
    chain.len() > 1 && chain.first() == chain.last()
}

/// Endpoint key that treats `0.0` and `-0.0` as the same value.
fn endpoint_key(coord: Coord<f64>) -> (u64, u64) {
    let bits = |value: f64| {
        if value == 0.0 {
            0.0_f64.to_bits()
        } else {
            value.to_bits()
        }
    };
    (bits(coord.x), bits(coord.y))
}

/// Report the first point, in key order, shared by more than two segment
/// ends. A closed segment contributes both of its ends.
fn find_junction(pool: &Pool) -> Result<(), MergeError> {
    let mut degrees: BTreeMap<(u64, u64), (Coord<f64>, usize)> = BTreeMap::new();
    for segment in pool.iter().flatten() {
        for end in [segment.first(), segment.last()].into_iter().flatten() {
            let entry = degrees.entry(endpoint_key(*end)).or_insert((*end, 0));
            entry.1 += 1;
        }
    }
    degrees
        .into_values()
        .find(|&(_, degree)| degree > 2)
        .map_or(Ok(()), |(at, degree)| {
            Err(MergeError::AmbiguousTopology {
                x: at.x,
                y: at.y,
                branches: degree - 1,
            })
        })
}

fn find_attachment(
    pool: &Pool,
    end: Coord<f64>,
    side: Side,
) -> Result<Option<(usize, Attach)>, MergeError> {
    let candidates: Vec<(usize, Attach)> = pool
        .iter()
        .enumerate()
        .filter_map(|(index, slot)| {
            let segment = slot.as_deref()?;
            side.attachment(segment, end).map(|attach| (index, attach))
        })
        .collect();
    match candidates.as_slice() {
        [] => Ok(None),
        [only] => Ok(Some(*only)),
        _ => Err(MergeError::AmbiguousTopology {
            x: end.x,
            y: end.y,
            branches: candidates.len(),
        }),
    }
}

fn splice(chain: &mut Vec<Coord<f64>>, segment: Vec<Coord<f64>>, attach: Attach) {
    match attach {
        Attach::Append => chain.extend(segment.into_iter().skip(1)),
        Attach::AppendReversed => chain.extend(segment.into_iter().rev().skip(1)),
        Attach::Prepend => {
            let mut joined = segment;
            joined.extend(chain.iter().skip(1).copied());
            *chain = joined;
        }
        Attach::FlipAndAppend => {
            chain.reverse();
            chain.extend(segment.into_iter().skip(1));
        }
    }
}

fn grow(chain: &mut Vec<Coord<f64>>, pool: &mut Pool) -> Result<(), MergeError> {
    while !is_ring(chain) {
        let (Some(&head), Some(&tail)) = (chain.first(), chain.last()) else {
            break;
        };
        let at_tail = find_attachment(pool, tail, Side::Tail)?;
        let at_head = find_attachment(pool, head, Side::Head)?;
        let Some((index, attach)) = at_tail.or(at_head) else {
            break;
        };
        let Some(segment) = pool.get_mut(index).and_then(Option::take) else {
            break;
        };
        splice(chain, segment, attach);
    }
    Ok(())
}

/// Join segments that share endpoints into as few chains as possible.
///
/// Segments are taken in input order as chain seeds. Empty segments are
/// ignored. A single resulting chain is returned as a line string, several
/// as a multi line string.
///
/// # Errors
///
/// Returns [`MergeError::AmbiguousTopology`] when more than two segment ends
/// meet at one point, whatever order the segments arrive in.
///
/// # Examples
///
/// ```
/// use geo::line_string;
/// use geoweave_geometry::{MergedLines, merge_lines};
///
/// let merged = merge_lines([
///     line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)],
///     line_string![(x: 2.0, y: 2.0), (x: 1.0, y: 1.0)],
/// ])?;
/// assert_eq!(
///     merged,
///     MergedLines::Single(line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0), (x: 2.0, y: 2.0)])
/// );
/// # Ok::<(), geoweave_geometry::MergeError>(())
/// ```
pub fn merge_lines<I>(segments: I) -> Result<MergedLines, MergeError>
where
    I: IntoIterator<Item = LineString<f64>>,
{
    let mut pool: Vec<Option<Vec<Coord<f64>>>> = segments
        .into_iter()
        .map(|line| line.0)
        .filter(|coords| !coords.is_empty())
        .map(Some)
        .collect();
    find_junction(&pool)?;
    let mut chains = Vec::new();
    for seed in 0..pool.len() {
        let Some(mut chain) = pool.get_mut(seed).and_then(Option::take) else {
            continue;
        };
        grow(&mut chain, &mut pool)?;
        chains.push(LineString::new(chain));
    }
    if chains.len() == 1 {
        if let Some(line) = chains.pop() {
            return Ok(MergedLines::Single(line));
        }
    }
    Ok(MergedLines::Multi(MultiLineString::new(chains)))
}
