//! [libs/core/ledger/src/validate.rs]
//! Balancing rule: a transaction rejects unless every clause holds. All
//! clause violations are collected so the operator can fix them in one edit.

use nyx_domain_models::ledger::{LedgerLine, Side};
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("balance validation failed: {0:?}")]
pub struct BalanceError(pub Vec<String>);

/// Validates a proposal's lines against the six balancing clauses, returning
/// every violation at once rather than short-circuiting on the first.
pub fn validate_lines(lines: &[LedgerLine], date_present: bool, description: &str) -> Result<(), BalanceError> {
    let mut errors = Vec::new();

    if lines.len() < 2 {
        errors.push(format!("at least 2 lines required, got {}", lines.len()));
    }

    let has_debit = lines.iter().any(|l| l.side == Side::Debit);
    let has_credit = lines.iter().any(|l| l.side == Side::Credit);
    if !has_debit {
        errors.push("no debit line present".to_string());
    }
    if !has_credit {
        errors.push("no credit line present".to_string());
    }

    // Raw, exact sums — amounts are expected to already be 2dp from the
    // store/API boundary (`to_money`); comparing exactly (no rounding the
    // aggregate) is what makes a 0.005 slip visible instead of masked.
    let sum_debit: Decimal = lines
        .iter()
        .filter(|l| l.side == Side::Debit)
        .map(|l| l.amount)
        .sum();
    let sum_credit: Decimal = lines
        .iter()
        .filter(|l| l.side == Side::Credit)
        .map(|l| l.amount)
        .sum();
    if sum_debit != sum_credit {
        let diff = (sum_debit - sum_credit).abs();
        errors.push(format!(
            "sum(debit)={sum_debit} != sum(credit)={sum_credit}, difference={diff}"
        ));
    }

    for (i, line) in lines.iter().enumerate() {
        if line.amount <= Decimal::ZERO {
            errors.push(format!("line {i}: amount must be > 0, got {}", line.amount));
        }
        if line.konto.trim().len() < 3 {
            errors.push(format!("line {i}: konto '{}' must be >= 3 characters", line.konto));
        }
    }

    if !date_present {
        errors.push("date is required".to_string());
    }
    if description.trim().is_empty() {
        errors.push("description is required".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(BalanceError(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn line(konto: &str, side: Side, amount: &str) -> LedgerLine {
        LedgerLine {
            konto: konto.to_string(),
            side,
            amount: Decimal::from_str(amount).unwrap(),
            description: "test".to_string(),
            counterparty_tax_id: None,
        }
    }

    #[test]
    fn balanced_two_line_proposal_passes() {
        let lines = vec![
            line("7200", Side::Debit, "100.00"),
            line("2200", Side::Credit, "100.00"),
        ];
        assert!(validate_lines(&lines, true, "invoice").is_ok());
    }

    #[test]
    fn half_cent_difference_rejects() {
        let lines = vec![
            line("7200", Side::Debit, "100.00"),
            line("2200", Side::Credit, "99.995"),
        ];
        let err = validate_lines(&lines, true, "invoice").unwrap_err();
        assert!(err.0.iter().any(|e| e.contains("difference")));
    }

    #[test]
    fn single_line_rejects_with_multiple_errors() {
        let lines = vec![line("7200", Side::Debit, "100.00")];
        let err = validate_lines(&lines, true, "x").unwrap_err();
        assert!(err.0.len() >= 2);
    }
}

#[cfg(test)]
mod balance_properties {
    use super::*;
    use proptest::prelude::*;

    fn cents_to_decimal(cents: u32) -> Decimal {
        Decimal::new(cents as i64, 2)
    }

    proptest! {
        /// Any split of the same total across a debit line and a credit line
        /// balances, regardless of the total chosen (P1, within one konto pair).
        #[test]
        fn equal_debit_credit_totals_always_balance(cents in 1u32..1_000_000) {
            let amount = cents_to_decimal(cents);
            let lines = vec![
                line("7200", Side::Debit, &amount.to_string()),
                line("2200", Side::Credit, &amount.to_string()),
            ];
            prop_assert!(validate_lines(&lines, true, "desc").is_ok());
        }

        /// Any nonzero cent-level mismatch between the two sides is rejected.
        #[test]
        fn any_nonzero_mismatch_is_rejected(cents in 1u32..1_000_000, delta_cents in 1u32..1_000) {
            let debit = cents_to_decimal(cents + delta_cents);
            let credit = cents_to_decimal(cents);
            let lines = vec![
                line("7200", Side::Debit, &debit.to_string()),
                line("2200", Side::Credit, &credit.to_string()),
            ];
            prop_assert!(validate_lines(&lines, true, "desc").is_err());
        }
    }
}
