//! [libs/core/ledger/src/chain.rs]
//! Chain-hash fingerprinting: a ledger-wide, globally serialized
//! append-only sequence linking every committed transaction to its
//! predecessor.

use nyx_domain_models::ledger::{LedgerLine, Side};
use sha2::{Digest, Sha256};

pub const GENESIS: &str = "GENESIS";

fn truncated_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)[..16].to_string()
}

/// `fingerprint = SHA256(tx_id|date|description|doc_ref|sorted (konto,side,amount))[:16]`
pub fn fingerprint(tx_id: &str, date: &str, description: &str, doc_ref: &str, lines: &[LedgerLine]) -> String {
    let mut tuples: Vec<String> = lines
        .iter()
        .map(|l| {
            let side = match l.side {
                Side::Debit => "debit",
                Side::Credit => "credit",
            };
            format!("{}|{}|{}", l.konto, side, l.amount)
        })
        .collect();
    tuples.sort();

    let mut hasher = Sha256::new();
    hasher.update(tx_id.as_bytes());
    hasher.update(b"|");
    hasher.update(date.as_bytes());
    hasher.update(b"|");
    hasher.update(description.as_bytes());
    hasher.update(b"|");
    hasher.update(doc_ref.as_bytes());
    hasher.update(b"|");
    hasher.update(tuples.join(",").as_bytes());

    truncated_hex(&hasher.finalize())
}

/// `chain_n = SHA256(chain_{n-1} | fingerprint_n)[:16]`
pub fn chain_hash(prev_chain: &str, fingerprint: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prev_chain.as_bytes());
    hasher.update(b"|");
    hasher.update(fingerprint.as_bytes());
    truncated_hex(&hasher.finalize())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainBreak {
    pub at_index: usize,
    pub expected: String,
    pub found: String,
}

/// Recomputes the chain over `(fingerprint, chain_hash)` pairs in commit
/// order and reports the first break, if any.
pub fn verify_chain(entries: &[(String, String)]) -> Result<(), ChainBreak> {
    let mut prev = GENESIS.to_string();
    for (i, (fp, recorded_chain)) in entries.iter().enumerate() {
        let expected = chain_hash(&prev, fp);
        if &expected != recorded_chain {
            return Err(ChainBreak {
                at_index: i,
                expected,
                found: recorded_chain.clone(),
            });
        }
        prev = expected;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nyx_domain_models::ledger::LedgerLine;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn line(konto: &str, side: Side, amount: &str) -> LedgerLine {
        LedgerLine {
            konto: konto.to_string(),
            side,
            amount: Decimal::from_str(amount).unwrap(),
            description: String::new(),
            counterparty_tax_id: None,
        }
    }

    #[test]
    fn fingerprint_is_stable_regardless_of_line_order() {
        let a = vec![
            line("7200", Side::Debit, "100.00"),
            line("2200", Side::Credit, "100.00"),
        ];
        let b = vec![
            line("2200", Side::Credit, "100.00"),
            line("7200", Side::Debit, "100.00"),
        ];
        assert_eq!(
            fingerprint("tx1", "2026-01-01", "desc", "", &a),
            fingerprint("tx1", "2026-01-01", "desc", "", &b)
        );
    }

    #[test]
    fn chain_verifies_a_clean_sequence() {
        let fp1 = fingerprint("tx1", "2026-01-01", "a", "", &[]);
        let c1 = chain_hash(GENESIS, &fp1);
        let fp2 = fingerprint("tx2", "2026-01-02", "b", "", &[]);
        let c2 = chain_hash(&c1, &fp2);

        let entries = vec![(fp1, c1), (fp2, c2)];
        assert!(verify_chain(&entries).is_ok());
    }

    #[test]
    fn chain_detects_a_tampered_link() {
        let fp1 = fingerprint("tx1", "2026-01-01", "a", "", &[]);
        let c1 = chain_hash(GENESIS, &fp1);
        let entries = vec![(fp1, "deadbeefdeadbeef".to_string())];
        let err = verify_chain(&entries).unwrap_err();
        assert_eq!(err.at_index, 0);
        let _ = c1;
    }
}
