//! P7: `Result`-laws hold for the `Result<Output, PerformError>` surface
//! `sdk-runtime`'s perform driver returns (spec.md §3, §8):
//! `ok(x).map(f) = ok(f(x))`, `err(e).map(f) = err(e)`,
//! `ok(x).andThen(f) = f(x)`, `err(e).andThen(f) = err(e)`.
//!
//! `std::result::Result::map`/`and_then` are the concrete encoding of
//! `ok`/`err`/`map`/`andThen`; this checks the laws hold for the same
//! `Output`/error shapes the driver actually returns.

use proptest::prelude::*;
use sdk_runtime::PerformError;

fn sample_error(seed: i32) -> PerformError {
    PerformError::Unexpected(format!("seed-{seed}"))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn ok_map_equals_ok_of_applied_function(x in any::<i32>()) {
        let lhs: Result<i32, PerformError> = Ok(x).map(|v| v.wrapping_add(1));
        let rhs: Result<i32, PerformError> = Ok(x.wrapping_add(1));
        prop_assert_eq!(lhs.ok(), rhs.ok());
    }

    #[test]
    fn err_map_is_identity_on_the_error(seed in any::<i32>()) {
        let lhs: Result<i32, PerformError> = Err(sample_error(seed)).map(|v: i32| v.wrapping_add(1));
        prop_assert!(lhs.is_err());
        prop_assert_eq!(lhs.unwrap_err().to_string(), sample_error(seed).to_string());
    }

    #[test]
    fn ok_and_then_equals_applying_the_function(x in any::<i32>()) {
        let f = |v: i32| -> Result<i32, PerformError> { Ok(v.wrapping_mul(2)) };
        let lhs = Ok::<i32, PerformError>(x).and_then(f);
        let rhs = f(x);
        prop_assert_eq!(lhs.ok(), rhs.ok());
    }

    #[test]
    fn err_and_then_is_identity_on_the_error(seed in any::<i32>()) {
        let f = |v: i32| -> Result<i32, PerformError> { Ok(v.wrapping_mul(2)) };
        let lhs: Result<i32, PerformError> = Err(sample_error(seed)).and_then(f);
        prop_assert!(lhs.is_err());
        prop_assert_eq!(lhs.unwrap_err().to_string(), sample_error(seed).to_string());
    }
}
