//! [apps/control-plane/src/services/chat_router.rs]
//! Pure text -> module dispatch ("dynamic dispatch from
//! text"): a static keyword table, no state, no I/O. Shares its scoring
//! shape with `document_pipeline::classify` — both pick the densest keyword
//! match and derive a confidence from the hit count.

use once_cell::sync::Lazy;
use regex::RegexSet;
use serde::Serialize;

const MODULE_PATTERNS: &[(&str, &[&str])] = &[
    ("bank_parser", &["izvod", "izvadak", "mt940", "camt", "transakcij", "uplata", "isplata s računa"]),
    ("invoice_ocr", &["račun", "faktura", "dobavljač", "ulazni račun"]),
    ("e_racun", &["e-račun", "ubl", "eracun", "fina"]),
    ("putni_nalozi", &["putni nalog", "dnevnic", "kilometraž", "službeni put", "km"]),
    ("ios", &["ios", "izjava o stanju", "usklađenje salda", "otvorene stavke"]),
    ("joppd", &["joppd", "plaća", "obračun plaće", "doprinos", "neto", "bruto"]),
    ("blagajna", &["blagajna", "gotovina", "blagajnički", "petty cash"]),
    ("kompenzacije", &["kompenzacij", "prijeboj", "multilateral"]),
];

struct ModuleMatcher {
    module: &'static str,
    set: RegexSet,
}

static MATCHERS: Lazy<Vec<ModuleMatcher>> = Lazy::new(|| {
    MODULE_PATTERNS
        .iter()
        .map(|(module, keywords)| {
            let patterns: Vec<String> = keywords.iter().map(|kw| regex::escape(kw)).collect();
            ModuleMatcher { module, set: RegexSet::new(patterns).expect("chat router patterns are static and valid") }
        })
        .collect()
});

#[derive(Debug, Clone, Serialize)]
pub struct ChatRoute {
    pub module: String,
    pub confidence: f64,
}

/// `route(text, has_file)` from 9. Design Notes — `has_file` is folded in by
/// callers boosting confidence on an accompanying document upload; this
/// function only scores the text.
pub fn route_chat(text: &str) -> ChatRoute {
    let lower = text.to_lowercase();
    let mut best: Option<(&'static str, usize)> = None;

    for matcher in MATCHERS.iter() {
        let hits = matcher.set.matches(&lower).iter().count();
        if hits == 0 {
            continue;
        }
        if best.map_or(true, |(_, best_hits)| hits > best_hits) {
            best = Some((matcher.module, hits));
        }
    }

    match best {
        Some((module, hits)) => ChatRoute { module: module.to_string(), confidence: (0.5 + hits as f64 * 0.15).min(0.95) },
        None => ChatRoute { module: "general".to_string(), confidence: 0.3 },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_bank_statement_question_routes_to_bank_parser() {
        let route = route_chat("Molim te, proknjiži ovaj bankovni izvod i uplate s njega.");
        assert_eq!(route.module, "bank_parser");
    }

    #[test]
    fn a_payroll_question_routes_to_joppd() {
        let route = route_chat("Koliko iznosi neto plaća nakon obračuna doprinosa?");
        assert_eq!(route.module, "joppd");
    }

    #[test]
    fn an_unrelated_question_falls_back_to_general_with_low_confidence() {
        let route = route_chat("Kakvo je vrijeme danas?");
        assert_eq!(route.module, "general");
        assert!(route.confidence < 0.5);
    }
}
