use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{PathDbResult, ValidationError};

/// Fails unless exactly `expected` arguments were passed.
pub fn expect_args(
    operation: &str,
    args: &[Value],
    expected: usize,
) -> Result<(), ValidationError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(ValidationError::ArgumentCount {
            operation: operation.to_string(),
            expected,
            actual: args.len(),
        })
    }
}

/// Fails if more than `max` arguments were passed.
pub fn expect_at_most(operation: &str, args: &[Value], max: usize) -> Result<(), ValidationError> {
    if args.len() <= max {
        Ok(())
    } else {
        Err(ValidationError::ArgumentCount {
            operation: operation.to_string(),
            expected: max,
            actual: args.len(),
        })
    }
}

/// Decodes argument `index` as `T`.
pub fn arg<T: DeserializeOwned>(operation: &str, args: &[Value], index: usize) -> PathDbResult<T> {
    let raw = args.get(index).ok_or_else(|| ValidationError::ArgumentCount {
        operation: operation.to_string(),
        expected: index + 1,
        actual: args.len(),
    })?;
    serde_json::from_value(raw.clone()).map_err(|e| {
        ValidationError::InvalidArgument {
            operation: operation.to_string(),
            reason: format!("argument {index}: {e}"),
        }
        .into()
    })
}
