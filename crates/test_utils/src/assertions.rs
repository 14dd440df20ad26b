//! Custom Test Assertions
//!
//! Assertion helpers for adjudication outcomes that report the offending
//! line instead of a bare `false`.

use core_kernel::Money;
use domain_adjudication::{AdjudicationResult, DeductionReason, InvoiceTotals, ItemOutcome};
use domain_insurance::Insurance;

/// Asserts `total = insurer + patient + discount` with no negative share
pub fn assert_line_balanced(line: &ItemOutcome) {
    assert!(
        line.is_balanced(),
        "line {} unbalanced: total={} insurer={} patient={} discount={}",
        line.line_no,
        line.total_price,
        line.insurance_share,
        line.patient_share,
        line.discount_amount
    );
}

/// Asserts every line balances and the totals are their sum
pub fn assert_result_balanced(result: &AdjudicationResult) {
    for line in &result.items {
        assert_line_balanced(line);
    }
    assert_eq!(
        result.totals,
        InvoiceTotals::from_items(&result.items),
        "invoice totals differ from the sum of the lines"
    );
}

/// Asserts `used + remaining = ceiling` and `remaining >= 0`
pub fn assert_ceiling_consistent(insurance: &Insurance) {
    assert_eq!(
        insurance.used_amount + insurance.remaining_amount,
        insurance.annual_ceiling,
        "ceiling drifted on {}: used={} remaining={} ceiling={}",
        insurance.id,
        insurance.used_amount,
        insurance.remaining_amount,
        insurance.annual_ceiling
    );
    assert!(
        !insurance.remaining_amount.is_negative(),
        "remaining ceiling negative on {}: {}",
        insurance.id,
        insurance.remaining_amount
    );
}

/// Asserts the line carries a deduction matching `predicate`
pub fn assert_has_deduction(line: &ItemOutcome, predicate: impl Fn(&DeductionReason) -> bool) {
    let deductions = &line.pricing_details.deductions;
    assert!(
        deductions.iter().any(|d| predicate(&d.reason)),
        "line {} has no matching deduction; got {:?}",
        line.line_no,
        deductions
    );
}

pub fn assert_money_eq(actual: Money, expected: impl Into<Money>) {
    let expected = expected.into();
    assert_eq!(actual, expected, "expected {}, got {}", expected, actual);
}

/// Asserts that a result is Ok and returns the value
#[macro_export]
macro_rules! assert_ok {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
    ($result:expr, $msg:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("{}: {:?}", $msg, e),
        }
    };
}

/// Asserts that a result is Err and returns the error
#[macro_export]
macro_rules! assert_err {
    ($result:expr) => {
        match $result {
            Ok(value) => panic!("Expected Err, got Ok: {:?}", value),
            Err(e) => e,
        }
    };
    ($result:expr, $msg:expr) => {
        match $result {
            Ok(value) => panic!("{}: got Ok({:?})", $msg, value),
            Err(e) => e,
        }
    };
}

/// Asserts that an error matches a specific variant
#[macro_export]
macro_rules! assert_err_variant {
    ($result:expr, $pattern:pat) => {
        match $result {
            Ok(value) => panic!("Expected Err matching {}, got Ok({:?})", stringify!($pattern), value),
            Err(ref e) => {
                assert!(
                    matches!(e, $pattern),
                    "Error {:?} does not match pattern {}",
                    e,
                    stringify!($pattern)
                );
            }
        }
    };
}
