//! Identifier generation for primitives written without a caller-chosen id.

use crate::PrimitiveId;

/// Return a fresh random identifier rendered as an unsigned decimal.
///
/// Ids are 64 random bits, so collisions within one dataset are not a
/// practical concern.
#[must_use]
pub fn generate_id() -> PrimitiveId {
    rand::random::<u64>().to_string()
}
