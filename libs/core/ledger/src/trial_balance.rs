//! [libs/core/ledger/src/trial_balance.rs]
use std::collections::BTreeMap;

use nyx_domain_models::ledger::{Side, Transaction};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct KontoBalance {
    pub debit: Decimal,
    pub credit: Decimal,
    pub balance: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialBalance {
    pub per_konto: BTreeMap<String, KontoBalance>,
    pub total_debit: Decimal,
    pub total_credit: Decimal,
    pub balanced: bool,
}

/// `trial_balance(through_date)`: folds every transaction up to and
/// including `through_date` into per-konto and global totals. A reversed
/// transaction's original lines stay in the fold alongside its compensating
/// transaction's flipped lines — the two cancel out naturally, which is
/// what keeps a reversal cent-exact instead of double-subtracting it.
pub fn trial_balance(transactions: &[Transaction], through_date: chrono::DateTime<chrono::Utc>) -> TrialBalance {
    let mut per_konto: BTreeMap<String, KontoBalance> = BTreeMap::new();

    for tx in transactions.iter().filter(|t| t.date <= through_date) {
        for line in &tx.lines {
            let entry = per_konto.entry(line.konto.clone()).or_default();
            match line.side {
                Side::Debit => entry.debit += line.amount,
                Side::Credit => entry.credit += line.amount,
            }
        }
    }

    for balance in per_konto.values_mut() {
        balance.balance = balance.debit - balance.credit;
    }

    let total_debit: Decimal = per_konto.values().map(|b| b.debit).sum();
    let total_credit: Decimal = per_konto.values().map(|b| b.credit).sum();

    TrialBalance {
        balanced: total_debit == total_credit,
        per_konto,
        total_debit,
        total_credit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nyx_domain_models::ledger::LedgerLine;
    use std::str::FromStr;

    fn tx(date: chrono::DateTime<chrono::Utc>, reversed: bool, lines: Vec<(&str, Side, &str)>) -> Transaction {
        Transaction {
            id: "tx".to_string(),
            proposal_id: "bk".to_string(),
            client_id: "K001".to_string(),
            lines: lines
                .into_iter()
                .map(|(konto, side, amount)| LedgerLine {
                    konto: konto.to_string(),
                    side,
                    amount: Decimal::from_str(amount).unwrap(),
                    description: "x".to_string(),
                    counterparty_tax_id: None,
                })
                .collect(),
            description: "x".to_string(),
            doc_ref: "bk".to_string(),
            date,
            fingerprint: "fp".to_string(),
            chain_hash: "ch".to_string(),
            reversed,
            reverses: None,
        }
    }

    #[test]
    fn folds_per_konto_and_global_totals() {
        let now = chrono::Utc::now();
        let txs = vec![tx(
            now,
            false,
            vec![("7200", Side::Debit, "100.00"), ("2200", Side::Credit, "100.00")],
        )];

        let tb = trial_balance(&txs, now);
        assert!(tb.balanced);
        assert_eq!(tb.total_debit, Decimal::from_str("100.00").unwrap());
        assert_eq!(tb.per_konto["7200"].balance, Decimal::from_str("100.00").unwrap());
        assert_eq!(tb.per_konto["2200"].balance, Decimal::from_str("-100.00").unwrap());
    }

    #[test]
    fn excludes_future_dated_transactions() {
        let now = chrono::Utc::now();
        let future = now + chrono::Duration::days(1);
        let txs = vec![
            tx(future, false, vec![("7200", Side::Debit, "25.00"), ("2200", Side::Credit, "25.00")]),
            tx(now, false, vec![("7200", Side::Debit, "10.00"), ("2200", Side::Credit, "10.00")]),
        ];

        let tb = trial_balance(&txs, now);
        assert_eq!(tb.total_debit, Decimal::from_str("10.00").unwrap());
        assert_eq!(tb.total_credit, Decimal::from_str("10.00").unwrap());
    }

    /// A reversed original and its compensating transaction both stay in
    /// the fold; their flipped lines cancel to zero rather than the
    /// original being dropped and the reversal double-counted.
    #[test]
    fn a_reversed_transaction_and_its_compensation_cancel_to_zero() {
        let now = chrono::Utc::now();
        let mut original = tx(now, true, vec![("7200", Side::Debit, "100.00"), ("2200", Side::Credit, "100.00")]);
        original.id = "tx_original".to_string();
        let mut reversal = tx(now, false, vec![("7200", Side::Credit, "100.00"), ("2200", Side::Debit, "100.00")]);
        reversal.id = "tx_reversal".to_string();
        reversal.reverses = Some(original.id.clone());

        let tb = trial_balance(&[original, reversal], now);
        assert!(tb.balanced);
        assert_eq!(tb.per_konto["7200"].balance, Decimal::ZERO);
        assert_eq!(tb.per_konto["2200"].balance, Decimal::ZERO);
    }

    #[test]
    fn empty_ledger_is_trivially_balanced() {
        let tb = trial_balance(&[], chrono::Utc::now());
        assert!(tb.balanced);
        assert_eq!(tb.total_debit, Decimal::ZERO);
        assert!(tb.per_konto.is_empty());
    }
}
