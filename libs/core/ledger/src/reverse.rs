//! [libs/core/ledger/src/reverse.rs]
//! Reversal: a compensating transaction that flips every line's side and
//! references the one it reverses. The compensating lines are pure data;
//! the caller is responsible for committing them as a new transaction that
//! references `reverses`.

use nyx_domain_models::ledger::{LedgerLine, Side};

pub fn flip_lines(lines: &[LedgerLine]) -> Vec<LedgerLine> {
    lines
        .iter()
        .map(|l| LedgerLine {
            konto: l.konto.clone(),
            side: match l.side {
                Side::Debit => Side::Credit,
                Side::Credit => Side::Debit,
            },
            amount: l.amount,
            description: l.description.clone(),
            counterparty_tax_id: l.counterparty_tax_id.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    #[test]
    fn flipping_twice_returns_the_original_sides() {
        let original = vec![LedgerLine {
            konto: "7200".to_string(),
            side: Side::Debit,
            amount: Decimal::from_str("100.00").unwrap(),
            description: "x".to_string(),
            counterparty_tax_id: None,
        }];
        let once = flip_lines(&original);
        assert_eq!(once[0].side, Side::Credit);
        let twice = flip_lines(&once);
        assert_eq!(twice[0].side, Side::Debit);
    }
}
