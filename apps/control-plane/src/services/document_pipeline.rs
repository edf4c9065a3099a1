//! [apps/control-plane/src/services/document_pipeline.rs]
//! Deterministic classification, client matching, and routing: a
//! regex-scored pattern table plus a priority chain of matching
//! strategies, each with its own fixed confidence.

use nyx_domain_models::document::{Document, DocumentStatus, DocumentType};
use nyx_domain_models::Client;
use once_cell::sync::Lazy;
use regex::RegexSet;
use tracing::instrument;
use uuid::Uuid;

/// `(document_type, patterns)`. Each pattern set is scored by how many of
/// its regexes match; the type with the highest score wins, ties broken
/// by declaration order.
const TYPE_PATTERNS: &[(DocumentType, &[&str])] = &[
    (
        DocumentType::BankStatement,
        &[r"(?i)izvod", r"(?i)stanje računa", r"(?i)bank statement", r"(?i)promet po računu"],
    ),
    (
        DocumentType::Invoice,
        &[r"(?i)račun\b", r"(?i)faktura", r"(?i)invoice", r"(?i)ukupno za platiti"],
    ),
    (
        DocumentType::EInvoice,
        &[r"(?i)e-račun", r"(?i)ubl", r"(?i)</Invoice>", r"(?i)eracun"],
    ),
    (
        DocumentType::TravelClaim,
        &[r"(?i)putni nalog", r"(?i)putni trošak", r"(?i)dnevnica", r"(?i)kilometraža"],
    ),
    (
        DocumentType::Reconciliation,
        &[r"(?i)ios obrazac", r"(?i)izjava o saldu", r"(?i)usklađenje salda"],
    ),
    (
        DocumentType::PayrollRun,
        &[r"(?i)joppd", r"(?i)obračun plać", r"(?i)neto plaća", r"(?i)doprinosi"],
    ),
    (
        DocumentType::PettyCash,
        &[r"(?i)blagajn", r"(?i)blagajnički", r"(?i)petty cash"],
    ),
    (
        DocumentType::Compensation,
        &[r"(?i)kompenzacij", r"(?i)prijeboj", r"(?i)offsetting"],
    ),
];

struct PatternMatcher {
    doc_type: DocumentType,
    set: RegexSet,
}

static CLASSIFIERS: Lazy<Vec<PatternMatcher>> = Lazy::new(|| {
    TYPE_PATTERNS
        .iter()
        .map(|(doc_type, patterns)| PatternMatcher {
            doc_type: *doc_type,
            set: RegexSet::new(patterns).expect("document pattern set is valid regex"),
        })
        .collect()
});

/// `classify(filename, text)`. File-extension short-circuits come
/// first; otherwise the regex scorer picks the highest-scoring type.
/// `confidence = min(0.95, 0.5 + score*0.15)`, 0.3 when nothing matches.
pub fn classify(filename: &str, text: &str) -> (DocumentType, f64) {
    let lower_name = filename.to_lowercase();
    if lower_name.ends_with(".xml") && (text.contains("<Invoice") || text.to_lowercase().contains("ubl")) {
        return (DocumentType::EInvoice, 0.95);
    }
    if lower_name.ends_with(".mt940") || lower_name.ends_with(".camt053") {
        return (DocumentType::BankStatement, 0.95);
    }

    let mut best: Option<(DocumentType, usize)> = None;
    for matcher in CLASSIFIERS.iter() {
        let score = matcher.set.matches(text).into_iter().count();
        if score == 0 {
            continue;
        }
        if best.map_or(true, |(_, best_score)| score > best_score) {
            best = Some((matcher.doc_type, score));
        }
    }

    match best {
        Some((doc_type, score)) => (doc_type, (0.5 + score as f64 * 0.15).min(0.95)),
        None => (DocumentType::Unknown, 0.3),
    }
}

/// Priority-ordered client-matching strategies, each with a fixed
/// confidence. The first hit wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    TaxId,
    Iban,
    SourceFolder,
    SenderDomain,
    FilenamePrefix,
    FuzzyName,
}

impl MatchStrategy {
    pub fn confidence(&self) -> f64 {
        match self {
            MatchStrategy::TaxId => 0.95,
            MatchStrategy::Iban => 0.90,
            MatchStrategy::SourceFolder => 0.85,
            MatchStrategy::SenderDomain => 0.80,
            MatchStrategy::FilenamePrefix => 0.75,
            MatchStrategy::FuzzyName => 0.60,
        }
    }
}

/// `match_client(..)`: tries each strategy in priority order against the
/// supplied client registry, returning the first hit.
#[instrument(skip(clients, text))]
pub fn match_client<'a>(
    clients: &'a [Client],
    text: &str,
    source_folder: Option<&str>,
    sender_domain: Option<&str>,
    filename: &str,
) -> Option<(&'a Client, f64)> {
    for client in clients {
        if !client.tax_id.is_empty() && text.contains(&client.tax_id) {
            return Some((client, MatchStrategy::TaxId.confidence()));
        }
    }
    for client in clients {
        if client.ibans.iter().any(|iban| text.contains(iban.as_str())) {
            return Some((client, MatchStrategy::Iban.confidence()));
        }
    }
    if let Some(folder) = source_folder {
        for client in clients {
            if client.aliases.iter().any(|alias| alias.eq_ignore_ascii_case(folder)) {
                return Some((client, MatchStrategy::SourceFolder.confidence()));
            }
        }
    }
    if let Some(domain) = sender_domain {
        for client in clients {
            if client.aliases.iter().any(|alias| alias.eq_ignore_ascii_case(domain)) {
                return Some((client, MatchStrategy::SenderDomain.confidence()));
            }
        }
    }
    let lower_filename = filename.to_lowercase();
    for client in clients {
        if client
            .aliases
            .iter()
            .any(|alias| !alias.is_empty() && lower_filename.starts_with(&alias.to_lowercase()))
        {
            return Some((client, MatchStrategy::FilenamePrefix.confidence()));
        }
    }
    let lower_text = text.to_lowercase();
    for client in clients {
        let name_tokens: Vec<&str> = client.legal_name.split_whitespace().take(2).collect();
        if !name_tokens.is_empty() && name_tokens.iter().all(|t| lower_text.contains(&t.to_lowercase())) {
            return Some((client, MatchStrategy::FuzzyName.confidence()));
        }
    }
    None
}

pub struct IngestRequest<'a> {
    pub filename: &'a str,
    pub source: &'a str,
    pub text: Option<&'a str>,
    pub size_bytes: u64,
    pub source_folder: Option<&'a str>,
    pub sender_domain: Option<&'a str>,
}

/// `ingest(file_descriptor, source, text?, client_hint?)`: classifies,
/// matches a client, and routes — never calls the target module itself.
#[instrument(skip(clients, request))]
pub fn ingest(request: IngestRequest<'_>, clients: &[Client]) -> Document {
    let text = request.text.unwrap_or_default();
    let (doc_type, type_confidence) = classify(request.filename, text);
    let matched = match_client(clients, text, request.source_folder, request.sender_domain, request.filename);

    let (detected_client_id, client_confidence) = match matched {
        Some((client, confidence)) => (Some(client.id.clone()), confidence),
        None => (None, 0.0),
    };

    let mut document = Document {
        id: Uuid::new_v4().to_string(),
        source: request.source.to_string(),
        filename: request.filename.to_string(),
        size_bytes: request.size_bytes,
        doc_type,
        type_confidence,
        detected_client_id,
        client_confidence,
        needs_review: false,
        assigned_module: doc_type.routed_module().to_string(),
        status: DocumentStatus::Routed,
        timestamp: chrono::Utc::now(),
    };
    document.flag_review();
    document
}

/// Entities a routed module would need; extraction itself is an external
/// concern — here only the pattern-derived shape is produced.
#[derive(Debug, Default, Clone)]
pub struct ExtractedEntities {
    pub tax_ids: Vec<String>,
    pub ibans: Vec<String>,
    pub amounts: Vec<String>,
    pub dates: Vec<String>,
}

static TAX_ID_PATTERN: Lazy<regex::Regex> = Lazy::new(|| regex::Regex::new(r"\b\d{11}\b").unwrap());
static IBAN_PATTERN: Lazy<regex::Regex> = Lazy::new(|| regex::Regex::new(r"\bHR\d{19}\b").unwrap());
static AMOUNT_PATTERN: Lazy<regex::Regex> = Lazy::new(|| regex::Regex::new(r"\b\d{1,3}(?:\.\d{3})*,\d{2}\b").unwrap());
static DATE_PATTERN: Lazy<regex::Regex> = Lazy::new(|| regex::Regex::new(r"\b\d{1,2}\.\d{1,2}\.\d{4}\.?\b").unwrap());

pub fn extract_entities(text: &str) -> ExtractedEntities {
    ExtractedEntities {
        tax_ids: TAX_ID_PATTERN.find_iter(text).map(|m| m.as_str().to_string()).collect(),
        ibans: IBAN_PATTERN.find_iter(text).map(|m| m.as_str().to_string()).collect(),
        amounts: AMOUNT_PATTERN.find_iter(text).map(|m| m.as_str().to_string()).collect(),
        dates: DATE_PATTERN.find_iter(text).map(|m| m.as_str().to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_an_invoice_by_keyword() {
        let (doc_type, confidence) = classify("racun_HEP_feb2026.pdf", "Ukupno za platiti: 1250,00 EUR");
        assert_eq!(doc_type, DocumentType::Invoice);
        assert!(confidence >= 0.5);
    }

    #[test]
    fn unknown_when_nothing_matches() {
        let (doc_type, confidence) = classify("misc.pdf", "lorem ipsum dolor sit amet");
        assert_eq!(doc_type, DocumentType::Unknown);
        assert_eq!(confidence, 0.3);
    }

    #[test]
    fn tax_id_match_wins_over_weaker_strategies() {
        let mut client = Client::new("K001", "HEP-Opskrba d.o.o.", "46830600751");
        client.ibans.push("HR1234567890123456789".to_string());
        let clients = vec![client];

        let result = match_client(&clients, "OIB: 46830600751", None, None, "doc.pdf");
        let (matched, confidence) = result.unwrap();
        assert_eq!(matched.id, "K001");
        assert_eq!(confidence, MatchStrategy::TaxId.confidence());
    }

    #[test]
    fn ingest_flags_low_confidence_documents_for_review() {
        let clients: Vec<Client> = Vec::new();
        let document = ingest(
            IngestRequest {
                filename: "unknown.pdf",
                source: "upload",
                text: Some("no useful signal here"),
                size_bytes: 1024,
                source_folder: None,
                sender_domain: None,
            },
            &clients,
        );
        assert!(document.needs_review);
    }
}
