//! Memory budgeting
//!
//! Reels, controller definitions and controller instances are sized up front
//! (a counting pass computes every array length) and then filled into
//! exact-capacity storage. These helpers turn the sizing result into either a
//! reservation or an [`MarionetteError::OutOfMemory`].

use crate::errors::{MarionetteError, Result};

/// Fails with `OutOfMemory` when `requested` exceeds `limit`.
pub fn check_budget(context: &str, requested: usize, limit: usize) -> Result<()> {
    if requested > limit {
        log::warn!("{context}: {requested} bytes exceeds budget of {limit} bytes");
        return Err(MarionetteError::out_of_memory(context, requested));
    }
    Ok(())
}

/// Creates an empty vector with exactly `capacity` slots reserved.
pub fn try_vec_with_capacity<T>(capacity: usize, context: &str) -> Result<Vec<T>> {
    let mut vec = Vec::new();
    vec.try_reserve_exact(capacity).map_err(|_| {
        MarionetteError::out_of_memory(context, capacity.saturating_mul(size_of::<T>()))
    })?;
    Ok(vec)
}

/// Creates a vector of `len` copies of `value`, reserving exactly once.
pub fn try_vec_filled<T: Clone>(len: usize, value: T, context: &str) -> Result<Vec<T>> {
    let mut vec = try_vec_with_capacity(len, context)?;
    vec.resize(len, value);
    Ok(vec)
}

/// `a * b` in bytes, failing with `OutOfMemory` on overflow.
pub fn checked_bytes(context: &str, count: usize, item_size: usize) -> Result<usize> {
    count
        .checked_mul(item_size)
        .ok_or_else(|| MarionetteError::out_of_memory(context, usize::MAX))
}
