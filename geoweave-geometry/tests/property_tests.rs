//! Property-based tests for line chain merging.
//!
//! # Invariants tested
//!
//! - **Idempotence:** merging a single merged chain again changes nothing.
//! - **Disjoint preservation:** segments sharing no endpoint come back
//!   unchanged, in input order.
//! - **Chain recovery:** a polyline cut into pieces and shuffled merges back
//!   into one line covering every vertex.
//! - **Order independence:** whether a junction is reported, and where,
//!   does not depend on the order segments arrive in.

use geo::{Coord, LineString, MultiLineString};
use geoweave_geometry::{MergedLines, merge_lines};
use proptest::prelude::*;

/// Strategy for a polyline with distinct integer-valued vertices.
fn polyline(min: usize, max: usize) -> impl Strategy<Value = Vec<Coord<f64>>> {
    prop::collection::btree_set((-1000_i32..1000, -1000_i32..1000), min..=max).prop_flat_map(
        |points| {
            let coords: Vec<Coord<f64>> = points
                .into_iter()
                .map(|(x, y)| Coord {
                    x: f64::from(x),
                    y: f64::from(y),
                })
                .collect();
            Just(coords).prop_shuffle()
        },
    )
}

fn cut(coords: &[Coord<f64>]) -> Vec<LineString<f64>> {
    coords
        .windows(2)
        .map(|pair| LineString::new(pair.to_vec()))
        .collect()
}

/// Strategy for short segments on a small grid, so endpoints collide often.
fn crowded_segments() -> impl Strategy<Value = (Vec<LineString<f64>>, Vec<LineString<f64>>)> {
    let point = (0_u8..4, 0_u8..4).prop_map(|(x, y)| Coord {
        x: f64::from(x),
        y: f64::from(y),
    });
    prop::collection::vec((point.clone(), point), 1..8).prop_flat_map(|pairs| {
        let segments: Vec<LineString<f64>> = pairs
            .into_iter()
            .map(|(start, end)| LineString::new(vec![start, end]))
            .collect();
        (Just(segments.clone()), Just(segments).prop_shuffle())
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Property: a single chain is returned exactly as given.
    #[test]
    fn merging_one_chain_is_identity(coords in polyline(2, 24)) {
        let line = LineString::new(coords);
        let merged = merge_lines([line.clone()]).expect("single chain never branches");
        prop_assert_eq!(merged, MergedLines::Single(line));
    }

    /// Property: segments in disjoint coordinate bands never join and keep
    /// their internal order.
    #[test]
    fn disjoint_segments_are_preserved(count in 2_usize..8, len in 2_usize..6) {
        let segments: Vec<LineString<f64>> = (0..count)
            .map(|band| {
                let base = f64::from(u32::try_from(band).expect("small band"));
                (0..len)
                    .map(|step| Coord {
                        x: base,
                        y: f64::from(u32::try_from(step).expect("small step")),
                    })
                    .collect()
            })
            .collect();
        let merged = merge_lines(segments.clone()).expect("disjoint segments never branch");
        prop_assert_eq!(merged, MergedLines::Multi(MultiLineString::new(segments)));
    }

    /// Property: shuffled pieces of one polyline merge back into one line
    /// that visits the same vertices in order or in reverse.
    #[test]
    fn shuffled_pieces_merge_back(
        coords in polyline(3, 16),
        seed in any::<u64>(),
    ) {
        let mut pieces = cut(&coords);
        let len = pieces.len();
        let rotation = usize::try_from(seed % u64::try_from(len).expect("small len"))
            .expect("fits usize");
        pieces.rotate_left(rotation);
        let merged = merge_lines(pieces).expect("a simple polyline has no junctions");
        let MergedLines::Single(line) = merged else {
            return Err(TestCaseError::fail("expected a single chain"));
        };
        let mut reversed = coords.clone();
        reversed.reverse();
        prop_assert!(line.0 == coords || line.0 == reversed);
    }

    /// Property: a shuffled copy of the same segments fails exactly when
    /// the original does, at the same junction.
    #[test]
    fn junctions_do_not_depend_on_order((segments, shuffled) in crowded_segments()) {
        let original = merge_lines(segments).err();
        let permuted = merge_lines(shuffled).err();
        prop_assert_eq!(original, permuted);
    }
}
