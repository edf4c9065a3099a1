//! [libs/core/ledger/src/decimal.rs]
//! Fixed-decimal coercion at the ledger's boundary (9, Decimal arithmetic note).

use rust_decimal::{Decimal, RoundingStrategy};

/// Coerces an arbitrary decimal to two fractional digits, half-up rounding.
/// `Decimal` cannot itself represent NaN/Inf, so the only rejection a caller
/// needs to perform is on the `f64`/string source before it reaches here.
pub fn to_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Parses a decimal literal the way request bodies and store rows do,
/// rejecting non-finite or unparsable input up front.
pub fn parse_money(raw: &str) -> Result<Decimal, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("empty amount".to_string());
    }
    let parsed: Decimal = trimmed
        .parse()
        .map_err(|_| format!("'{raw}' is not a valid decimal amount"))?;
    Ok(to_money(parsed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn half_up_rounds_at_the_half_cent() {
        assert_eq!(
            to_money(Decimal::from_str("100.005").unwrap()),
            Decimal::from_str("100.01").unwrap()
        );
        assert_eq!(
            to_money(Decimal::from_str("100.004").unwrap()),
            Decimal::from_str("100.00").unwrap()
        );
    }

    #[test]
    fn rejects_garbage_input() {
        assert!(parse_money("not-a-number").is_err());
        assert!(parse_money("").is_err());
    }
}
