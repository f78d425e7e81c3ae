use crate::Primitive;

/// Squared euclidean distance between two points of equal dimension.
///
/// Per-dimension differences are taken on the widened `i64` values and squared in `i128`.
/// Two `i32` extremes differ by almost 2^32, whose square no longer fits into an `i64`.
#[inline(always)]
pub fn squared_distance<T: Primitive>(a: &[T], b: &[T]) -> i128 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter())
        .map(|(av, bv)| (av.widen() - bv.widen()) as i128)   // <sample> - <centroid>
        .map(|diff| diff * diff)                              // <vec_components> ^2
        .sum()
}
