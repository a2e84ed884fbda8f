//! Attribute assertions on realized records.
//!
//! Pure in-memory checks; values are compared in their normalized string
//! form, so callers normalize addresses and MACs first (see
//! [`crate::services::normalize`]).

use tracing::debug;

use crate::domain::errors::{HarnessError, HarnessResult};
use crate::domain::models::RealizedRecord;

/// Check that `record` carries `name` with value `expected`.
pub fn assert_attribute(
    record: &RealizedRecord,
    name: &str,
    expected: impl AsRef<str>,
) -> HarnessResult<()> {
    let expected = expected.as_ref();
    let Some(actual) = record.attribute(name) else {
        return Err(HarnessError::MissingAttribute {
            key: record.key.clone(),
            name: name.to_string(),
        });
    };

    if actual != expected {
        return Err(HarnessError::AttributeMismatch {
            key: record.key.clone(),
            name: name.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        });
    }

    debug!(key = %record.key, attribute = name, value = actual, "attribute matches");
    Ok(())
}

/// Check every `(name, expected)` pair, stopping at the first failure.
pub fn assert_attributes<'a, V>(
    record: &RealizedRecord,
    expected: impl IntoIterator<Item = (&'a str, V)>,
) -> HarnessResult<()>
where
    V: AsRef<str>,
{
    expected
        .into_iter()
        .try_for_each(|(name, value)| assert_attribute(record, name, value))
}
