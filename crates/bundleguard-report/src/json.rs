use anyhow::{Context, Result};
use serde::Serialize;

use bundleguard_core::result::CheckResult;
use bundleguard_core::types::Severity;

fn to_json<T: Serialize>(value: &T, compact: bool) -> Result<String> {
    let json = if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    };
    json.context("failed to serialize report")
}

/// Format a full check report as JSON.
pub fn format_report(result: &CheckResult, compact: bool) -> Result<String> {
    to_json(result, compact)
}

/// Wrapper for check output that adds pass/fail metadata.
#[derive(Debug, Serialize)]
pub struct CheckOutput<'a> {
    #[serde(flatten)]
    pub result: &'a CheckResult,
    pub check: CheckStatus,
}

#[derive(Debug, Serialize)]
pub struct CheckStatus {
    pub passed: bool,
    pub fail_on: Severity,
    pub failing_violation_count: usize,
}

/// Format a check result as JSON. Returns (json_string, passed).
pub fn format_check(
    result: &CheckResult,
    fail_on: Severity,
    compact: bool,
) -> Result<(String, bool)> {
    let passed = result.passed(fail_on);

    let output = CheckOutput {
        result,
        check: CheckStatus {
            passed,
            fail_on,
            failing_violation_count: result.failing_violation_count(fail_on),
        },
    };

    Ok((to_json(&output, compact)?, passed))
}
