//! Utility macros shared by the codec and the part generator.

/// Returns early with an error if a condition is not met.
///
/// This is the non-panicking sibling of `assert!`, used for limit checks where
/// the caller has to see a typed error instead of a crash.
///
/// # Arguments
///
/// * `$predicate` - A boolean expression that should evaluate to true
/// * `$error` - The error value to return if the predicate is false
///
/// # Example
///
/// ```ignore
/// ensure!(part_count <= max_parts, MultipartError::too_many_parts(max_parts));
/// ```
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;
