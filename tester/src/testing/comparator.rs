//! Result Comparator
//!
//! Pure comparison of an expected record set against the records a job
//! actually emitted. The check is asymmetric: every sanitized actual record
//! must be expected, and the actual set must be at least as large as the
//! expected one.

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use super::sanitize::Sanitizer;
use crate::error::{HarnessError, HarnessResult};

/// Why a case did not conform
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// Fewer distinct records than expected, whatever their content
    SizeDeficient { expected: usize, actual: usize },
    /// Records that are not part of the expected set
    Unexpected { records: Vec<String> },
    /// The sink never went quiet within the hard bound
    SinkTimeout { waited: Duration },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::SizeDeficient { expected, actual } => {
                write!(f, "expected {expected} distinct records but got {actual}")
            }
            FailureReason::Unexpected { records } => write!(f, "{} unexpected records", records.len()),
            FailureReason::SinkTimeout { waited } => write!(f, "sink did not go quiet within {waited:?}"),
        }
    }
}

/// Outcome of comparing one test case
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Fail {
        reason: FailureReason,
        expected: BTreeSet<String>,
        actual: BTreeSet<String>,
    },
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }

    /// Expected records absent from the actual set
    pub fn missing(&self) -> Vec<&String> {
        match self {
            Verdict::Pass => Vec::new(),
            Verdict::Fail { expected, actual, .. } => expected.difference(actual).collect(),
        }
    }

    /// Actual records absent from the expected set
    pub fn unexpected(&self) -> Vec<&String> {
        match self {
            Verdict::Pass => Vec::new(),
            Verdict::Fail { expected, actual, .. } => actual.difference(expected).collect(),
        }
    }

    /// Convert a failed verdict into a [`HarnessError::ComparisonFailure`]
    pub fn into_result(self, case: &str) -> HarnessResult<()> {
        match self {
            Verdict::Pass => Ok(()),
            fail => Err(HarnessError::ComparisonFailure {
                case: case.to_string(),
                reason: fail.to_string(),
            }),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Verdict::Fail {
            reason,
            expected,
            actual,
        } = self
        else {
            return write!(f, "pass");
        };

        writeln!(f, "fail: {reason}")?;
        writeln!(f, "  expected ({}):", expected.len())?;
        for record in expected {
            writeln!(f, "    {record}")?;
        }
        writeln!(f, "  actual ({}):", actual.len())?;
        for record in actual {
            writeln!(f, "    {record}")?;
        }
        for record in self.missing() {
            writeln!(f, "  - missing: {record}")?;
        }
        for record in self.unexpected() {
            writeln!(f, "  + unexpected: {record}")?;
        }
        Ok(())
    }
}

/// Compare expected against actual records after sanitizing both sides
pub fn compare(expected: &[String], actual: &[String], sanitizer: &dyn Sanitizer) -> Verdict {
    let expected = sanitizer.sanitize(expected);
    let actual = sanitizer.sanitize(actual);

    if !expected.is_empty() && expected.len() > actual.len() {
        return Verdict::Fail {
            reason: FailureReason::SizeDeficient {
                expected: expected.len(),
                actual: actual.len(),
            },
            expected,
            actual,
        };
    }

    let unexpected: Vec<String> = actual.difference(&expected).cloned().collect();
    if !unexpected.is_empty() {
        return Verdict::Fail {
            reason: FailureReason::Unexpected { records: unexpected },
            expected,
            actual,
        };
    }

    Verdict::Pass
}

/// Verdict for a run whose sink never completed; `partial` is whatever was captured
pub fn timed_out(expected: &[String], partial: &[String], sanitizer: &dyn Sanitizer, waited: Duration) -> Verdict {
    Verdict::Fail {
        reason: FailureReason::SinkTimeout { waited },
        expected: sanitizer.sanitize(expected),
        actual: sanitizer.sanitize(partial),
    }
}
