//! Shared domain types for the booking & document control plane.
//!
//! Every other crate in the workspace depends on this one for the shapes
//! that cross a boundary: HTTP payloads, persisted rows, ledger entries.

pub mod client;
pub mod document;
pub mod error;
pub mod ledger;
pub mod audit;
pub mod notification;
pub mod session;

pub use client::Client;
pub use document::{Document, DocumentStatus, DocumentType};
pub use error::{ErrorKind, NyxError};
pub use ledger::{BookingProposal, Correction, LedgerLine, ProposalStatus, Side, Transaction};
pub use audit::{AuditEntry, AuditEvent, Severity};
pub use notification::{Notification, NotificationPriority, NotificationTarget};
pub use session::Session;
