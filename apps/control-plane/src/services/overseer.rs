//! [apps/control-plane/src/services/overseer.rs]
//! The three hard safety boundaries. Pure text evaluation —
//! no state but two counters kept for `/api/monitor`. Keyword tables, the
//! payroll carve-out, and the booking-validation warnings all live here.

use std::sync::atomic::{AtomicU64, Ordering};

use nyx_domain_models::ledger::BookingProposal;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::instrument;

static KM_RATE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(\d+[.,]\d+)\s*(?:eur)?\s*/\s*km").unwrap());

/// Domains the overseer refuses outright, unless the payroll carve-out
/// applies (hard boundary 1, "legal_domain").
const FORBIDDEN_DOMAINS: &[&str] = &[
    "sastavljanje ugovora",
    "sastavi mi ugovor",
    "sastavi ugovor",
    "napravi ugovor",
    "napiši ugovor",
    "tužb",
    "sud ",
    "kazneno pravo",
    "prekršajno pravo",
    "ovrha ",
    "ovršni postupak",
    "brak",
    "razvod",
    "nasljedstvo",
    "ostavina",
    "odvjetnik",
    "advokat",
    "pravni savjet",
    "spajanje poduzeća",
    "preuzimanje poduzeća",
    "burza",
    "dionice",
    "utaja poreza",
    "investicijsko savjetovanje",
];

/// Labor-law terms that stay allowed when the request is plainly about a
/// payroll calculation.
const PAYROLL_CONTEXT_TERMS: &[&str] = &[
    "otpremnina",
    "bolovanje",
    "godišnji odmor",
    "ugovor o radu",
    "neodređeno",
    "određeno",
    "nepuno radno vrijeme",
    "trudnička prava",
    "rodiljni",
    "roditeljski",
    "otkaz",
    "prestanak radnog odnosa",
];

/// Never allowed, even inside a payroll context.
const LABOR_LAW_ALWAYS_FORBIDDEN: &[&str] = &["radni spor", "tužb", "inspekcija rada", "kolektivni ugovor savjetovanje"];

const PAYROLL_INDICATORS: &[&str] =
    &["obračun", "plaća", "neto", "bruto", "doprinos", "joppd", "isplata", "naknada", "kalkulacija"];

/// Phrases requesting un-approved booking (hard boundary 2,
/// "autonomous_posting").
const AUTONOMOUS_POSTING_KEYWORDS: &[&str] = &[
    "automatski proknjiži",
    "proknjiži bez odobrenja",
    "zaobiđi provjeru",
    "preskoči odobrenje",
    "post automatically",
    "skip approval",
    "push to erp without approval",
    "pošalji u cpp",
    "pošalji u synesis",
];

/// External LLM vendors (hard boundary 3, "cloud_api").
const CLOUD_API_KEYWORDS: &[&str] = &["openai", "anthropic", "chatgpt", "cloud api", "external api"];

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Evaluation {
    pub approved: bool,
    pub reason: String,
    pub hard_boundary: bool,
    pub boundary_type: Option<String>,
}

impl Evaluation {
    fn blocked(reason: impl Into<String>, boundary_type: &str) -> Self {
        Self { approved: false, reason: reason.into(), hard_boundary: true, boundary_type: Some(boundary_type.to_string()) }
    }

    fn approved() -> Self {
        Self {
            approved: true,
            reason: "Request falls within the accounting domain.".to_string(),
            hard_boundary: false,
            boundary_type: None,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct BookingWarning {
    pub message: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct BookingValidation {
    pub warnings: Vec<BookingWarning>,
    /// Always `true` — warnings never substitute for operator approval
    /// never turn into approval.
    pub requires_approval: bool,
}

#[derive(Default)]
pub struct Overseer {
    evaluations: AtomicU64,
    blocks: AtomicU64,
}

impl Overseer {
    pub fn new() -> Self {
        Self::default()
    }

    /// `evaluate(text, action_type)`. Called before every LLM
    /// dispatch and before every booking commit.
    #[instrument(skip(self, text))]
    pub fn evaluate(&self, text: &str, _action_type: &str) -> Evaluation {
        self.evaluations.fetch_add(1, Ordering::Relaxed);
        let lower = text.to_lowercase();

        for phrase in LABOR_LAW_ALWAYS_FORBIDDEN {
            if lower.contains(phrase) {
                self.blocks.fetch_add(1, Ordering::Relaxed);
                return Evaluation::blocked(
                    format!("Hard boundary: '{phrase}' requires a labor-law specialist, outside Nyx Light's accounting scope."),
                    "legal_domain",
                );
            }
        }

        let is_payroll_context = PAYROLL_CONTEXT_TERMS.iter().any(|kw| lower.contains(kw));
        let has_payroll_indicator = PAYROLL_INDICATORS.iter().any(|kw| lower.contains(kw));
        let payroll_carve_out_applies = is_payroll_context && has_payroll_indicator;

        for domain in FORBIDDEN_DOMAINS {
            if lower.contains(domain) {
                if payroll_carve_out_applies {
                    continue;
                }
                self.blocks.fetch_add(1, Ordering::Relaxed);
                return Evaluation::blocked(
                    format!("Hard boundary: '{domain}' is outside the accounting domain. Nyx Light does not give legal advice."),
                    "legal_domain",
                );
            }
        }

        for phrase in AUTONOMOUS_POSTING_KEYWORDS {
            if lower.contains(phrase) {
                self.blocks.fetch_add(1, Ordering::Relaxed);
                return Evaluation::blocked(
                    "Hard boundary: request for autonomous posting. Every booking must be approved by the accountant — human-in-the-loop is mandatory.",
                    "autonomous_posting",
                );
            }
        }

        for vendor in CLOUD_API_KEYWORDS {
            if lower.contains(vendor) {
                self.blocks.fetch_add(1, Ordering::Relaxed);
                return Evaluation::blocked(
                    "Hard boundary: cloud API access is forbidden. All data must stay 100% local.",
                    "cloud_api",
                );
            }
        }

        Evaluation::approved()
    }

    /// `validate_booking(proposal)`: soft warnings only —
    /// `requires_approval` is always `true`.
    #[instrument(skip(self, proposal))]
    pub fn validate_booking(&self, proposal: &BookingProposal) -> BookingValidation {
        let mut warnings = Vec::new();

        if proposal.doc_type == "petty_cash" {
            if let Some(amount) = proposal.lines.iter().map(|l| l.amount).reduce(|a, b| a.max(b)) {
                if amount > rust_decimal::Decimal::new(10_000, 0) {
                    warnings.push(BookingWarning { message: format!("Petty-cash amount ({amount} EUR) exceeds the 10,000 EUR limit.") });
                }
            }
        }

        if proposal.doc_type == "travel_claim" {
            if let Some(captures) = KM_RATE_PATTERN.captures(&proposal.description) {
                let raw = captures[1].replace(',', ".");
                if let Ok(rate) = raw.parse::<rust_decimal::Decimal>() {
                    if rate > rust_decimal::Decimal::new(30, 2) {
                        warnings.push(BookingWarning { message: format!("Per-km allowance ({rate} EUR) exceeds the 0.30 EUR/km maximum.") });
                    }
                }
            }
        }

        if proposal.description.to_lowercase().contains("reprezentacij") {
            warnings.push(BookingWarning {
                message: "Representation costs — only partially tax-deductible above the statutory limit; verify the deduction.".to_string(),
            });
        }

        BookingValidation { warnings, requires_approval: true }
    }

    pub fn stats(&self) -> (u64, u64) {
        (self.evaluations.load(Ordering::Relaxed), self.blocks.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drafting_a_contract_is_blocked() {
        let overseer = Overseer::new();
        let result = overseer.evaluate("sastavi mi ugovor o djelu", "query");
        assert!(!result.approved);
        assert_eq!(result.boundary_type.as_deref(), Some("legal_domain"));
    }

    #[test]
    fn payroll_context_around_a_labor_term_is_allowed() {
        let overseer = Overseer::new();
        let result = overseer.evaluate("obračunaj mi ugovor o djelu za naknadu", "query");
        assert!(result.approved);
    }

    #[test]
    fn a_request_to_skip_approval_is_always_blocked() {
        let overseer = Overseer::new();
        let result = overseer.evaluate("proknjiži bez odobrenja ovaj račun", "command");
        assert!(!result.approved);
        assert_eq!(result.boundary_type.as_deref(), Some("autonomous_posting"));
    }

    #[test]
    fn mentioning_a_cloud_vendor_is_blocked() {
        let overseer = Overseer::new();
        let result = overseer.evaluate("pošalji ovo na OpenAI za analizu", "query");
        assert!(!result.approved);
        assert_eq!(result.boundary_type.as_deref(), Some("cloud_api"));
    }

    #[test]
    fn an_ordinary_accounting_question_is_approved() {
        let overseer = Overseer::new();
        let result = overseer.evaluate("koja je stopa PDV-a za ovu fakturu?", "query");
        assert!(result.approved);
        assert!(!result.hard_boundary);
    }
}
