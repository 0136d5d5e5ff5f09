// Client Registry - Core Library
// Masking, validation, response normalization and role gating for the
// client registry back office. Used by the CLI and by tests.

pub mod masking;     // Display masks for CPF, CEP, phones
pub mod validators;  // Per-field rules + FieldErrorMap
pub mod client;      // ClientRecord, wire payload, list rows
pub mod form;        // Aggregate validation + editable form state
pub mod normalizer;  // Backend payload shapes -> ClientRecord
pub mod session;     // Session store, user info, SessionContext
pub mod gate;        // Route tiers and capabilities
pub mod api;         // Backend REST client
pub mod cep;         // Postal-code lookup
pub mod config;
pub mod error;

// Re-export commonly used types
pub use masking::{
    mask, unmask, mask_phone, format_document_for_list, MaskKind,
};
pub use validators::{
    validate_field, validate_phone, FieldCheck, FieldErrorMap,
};
pub use client::{
    Address, AddressField, ClientPayload, ClientRecord, ClientSummary, PhoneEntry, PhoneType,
};
pub use form::{
    prepare_submission, validate_form, ClientForm, FormError, FormMode, FormValidation,
};
pub use normalizer::{
    normalize_many, normalize_one, normalize_summaries, summarize, Payload,
};
pub use session::{
    is_admin, MemoryStore, Session, SessionContext, SessionStore, SqliteStore, UserInfo,
};
pub use gate::{
    can, gate, navigate, post_login_target, Capability, Navigation, Route, Tier,
};
pub use api::{ApiClient, ClientAction};
pub use cep::{CepAddress, CepClient, CepLookupTicket, CepOutcome};
pub use config::Config;
pub use error::{ApiError, CepError, StoreError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
