//! Query interfaces of the points-to analysis
//!
//! Downstream passes depend on these traits instead of the concrete
//! analysis object, so alternative engines stay substitutable.

use crate::features::points_to::domain::PointeeSet;
use crate::shared::models::ValueId;

/// Read-only access to computed pointee sets
pub trait PointsToQuery {
    /// The pointee set of a pointer-typed value; `None` for unknown or
    /// non-pointer values
    fn points_to(&self, value: ValueId) -> Option<&PointeeSet>;

    /// Whether two values may reference the same object
    ///
    /// Sound over-approximation: true whenever the pointee sets intersect.
    fn may_alias(&self, a: ValueId, b: ValueId) -> bool {
        match (self.points_to(a), self.points_to(b)) {
            (Some(pa), Some(pb)) => pa.iter().any(|p| pb.contains(p)),
            _ => false,
        }
    }

    /// Whether two values provably reference the same single object
    fn must_alias(&self, a: ValueId, b: ValueId) -> bool {
        match (self.points_to(a), self.points_to(b)) {
            (Some(pa), Some(pb)) => pa.len() == 1 && pa == pb,
            _ => false,
        }
    }
}

/// Check aliasing through any query implementation
pub fn check_alias<Q: PointsToQuery>(query: &Q, a: ValueId, b: ValueId) -> bool {
    query.may_alias(a, b)
}
