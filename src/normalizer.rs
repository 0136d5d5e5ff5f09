// 🧭 Response Normalizer - backend payloads of any shape -> ClientRecord
//
// The backend may answer with a bare list, a paginated `{content: [...]}`
// envelope, a record wrapped under `client`, or a plain record. The shape is
// decided once in `Payload::classify`; every later step matches on it.
// Normalization never fails: missing or malformed fields become defaults.

use crate::client::{Address, ClientRecord, ClientSummary, PhoneEntry, PhoneType};
use crate::masking::{format_document_for_list, mask, mask_phone, unmask, MaskKind};
use serde_json::{Map, Value};

// ============================================================================
// PAYLOAD SHAPES
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// `[ {...}, ... ]`
    List(Vec<Value>),
    /// `{ "content": [ ... ], ... }`
    Paginated(Vec<Value>),
    /// `{ "client": { ... } }`
    WrappedRecord(Map<String, Value>),
    /// Any other object
    PlainRecord(Map<String, Value>),
    /// Scalars and null
    Unrecognized,
}

impl Payload {
    pub fn classify(value: Value) -> Payload {
        match value {
            Value::Array(items) => Payload::List(items),
            Value::Object(mut map) => {
                if matches!(map.get("content"), Some(Value::Array(_))) {
                    if let Some(Value::Array(items)) = map.remove("content") {
                        return Payload::Paginated(items);
                    }
                }
                if matches!(map.get("client"), Some(Value::Object(_))) {
                    return Payload::WrappedRecord(map);
                }
                Payload::PlainRecord(map)
            }
            other => {
                tracing::warn!(kind = value_kind(&other), "unrecognized payload shape");
                Payload::Unrecognized
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Payload::List(_) => "list",
            Payload::Paginated(_) => "paginated",
            Payload::WrappedRecord(_) => "wrapped_record",
            Payload::PlainRecord(_) => "plain_record",
            Payload::Unrecognized => "unrecognized",
        }
    }

    /// Raw records for a list view.
    fn into_records(self) -> Vec<Value> {
        match self {
            Payload::List(items) | Payload::Paginated(items) => items,
            // Some endpoints wrap the list under an arbitrary key; take the
            // first array property in document order.
            Payload::WrappedRecord(map) | Payload::PlainRecord(map) => map
                .into_iter()
                .find_map(|(_, value)| match value {
                    Value::Array(items) => Some(items),
                    _ => None,
                })
                .unwrap_or_default(),
            Payload::Unrecognized => Vec::new(),
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// ENTRY POINTS
// ============================================================================

/// Normalize a single-record response.
pub fn normalize_one(payload: Value) -> ClientRecord {
    let shape = Payload::classify(payload);
    tracing::debug!(shape = shape.name(), "normalizing client record");

    match shape {
        Payload::List(items) | Payload::Paginated(items) => items
            .into_iter()
            .next()
            .map(|item| project(&item))
            .unwrap_or_default(),
        Payload::WrappedRecord(map) | Payload::PlainRecord(map) => project_object(&unwrap_client(&map)),
        Payload::Unrecognized => ClientRecord::default(),
    }
}

/// Normalize a list response.
pub fn normalize_many(payload: Value) -> Vec<ClientRecord> {
    let shape = Payload::classify(payload);
    tracing::debug!(shape = shape.name(), "normalizing client list");

    shape.into_records().iter().map(project).collect()
}

/// Normalize a list response into list-view rows.
pub fn normalize_summaries(payload: Value) -> Vec<ClientSummary> {
    Payload::classify(payload)
        .into_records()
        .iter()
        .map(summarize_raw)
        .collect()
}

// ============================================================================
// PROJECTION
// ============================================================================

/// One level of `client` unwrapping.
fn unwrap_client(map: &Map<String, Value>) -> Map<String, Value> {
    match map.get("client") {
        Some(Value::Object(inner)) => inner.clone(),
        _ => map.clone(),
    }
}

fn project(raw: &Value) -> ClientRecord {
    match raw {
        Value::Object(map) => project_object(&unwrap_client(map)),
        other => {
            tracing::warn!(kind = value_kind(other), "list entry is not an object");
            ClientRecord::default()
        }
    }
}

fn project_object(data: &Map<String, Value>) -> ClientRecord {
    let document = text(data.get("cpf"));

    ClientRecord {
        id: identity(data.get("id")),
        name: text(data.get("name")),
        document_id: if document.is_empty() {
            String::new()
        } else {
            mask(MaskKind::Document, &document)
        },
        address: project_address(data.get("address")),
        phones: project_phones(data),
        emails: project_emails(data),
    }
}

fn project_address(raw: Option<&Value>) -> Address {
    let Some(Value::Object(address)) = raw else {
        return Address::default();
    };

    let postal_code = text(address.get("cep"));
    Address {
        postal_code: if postal_code.is_empty() {
            String::new()
        } else {
            mask(MaskKind::PostalCode, &postal_code)
        },
        street: text(address.get("logradouro")),
        neighborhood: text(address.get("bairro")),
        city: text(address.get("cidade")),
        state: text(address.get("uf")),
        complement: text(address.get("complemento")),
    }
}

fn project_phones(data: &Map<String, Value>) -> Vec<PhoneEntry> {
    let phones: Vec<PhoneEntry> = match data.get("phones") {
        Some(Value::Array(items)) => items.iter().filter_map(project_phone).collect(),
        _ => data.get("phone").and_then(project_phone).into_iter().collect(),
    };

    if phones.is_empty() {
        vec![PhoneEntry::blank()]
    } else {
        phones
    }
}

fn project_phone(raw: &Value) -> Option<PhoneEntry> {
    match raw {
        Value::Object(phone) => {
            let phone_type = match phone.get("type") {
                Some(Value::String(kind)) if !kind.is_empty() => PhoneType::from_wire(kind),
                _ => PhoneType::Mobile,
            };
            let number = text(phone.get("number"));
            Some(PhoneEntry::new(phone_type, mask_phone(phone_type, &number)))
        }
        // A bare number: infer the layout from its length
        Value::String(_) | Value::Number(_) => {
            let number = text(Some(raw));
            let phone_type = if unmask(&number).len() == 11 {
                PhoneType::Mobile
            } else {
                PhoneType::Residential
            };
            Some(PhoneEntry::new(phone_type, mask_phone(phone_type, &number)))
        }
        _ => None,
    }
}

fn project_emails(data: &Map<String, Value>) -> Vec<String> {
    let emails: Vec<String> = match data.get("emails") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(email) => Some(email.clone()),
                _ => None,
            })
            .collect(),
        _ => match data.get("email") {
            Some(Value::String(email)) => vec![email.clone()],
            _ => Vec::new(),
        },
    };

    if emails.is_empty() {
        vec![String::new()]
    } else {
        emails
    }
}

/// Text coercion: strings as-is, numbers and booleans printed, else empty.
fn text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn identity(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

// ============================================================================
// LIST ROWS
// ============================================================================

/// Project a normalized record into a list row.
pub fn summarize(record: &ClientRecord) -> ClientSummary {
    let non_blank = |s: &String| !s.trim().is_empty();

    ClientSummary {
        id: record.id.clone(),
        name: Some(record.name.clone())
            .filter(non_blank)
            .unwrap_or_else(|| "N/A".to_string()),
        email: record
            .emails
            .first()
            .cloned()
            .filter(non_blank)
            .unwrap_or_else(|| "N/A".to_string()),
        phone: record
            .phones
            .first()
            .map(|p| p.number.clone())
            .filter(non_blank)
            .unwrap_or_else(|| "N/A".to_string()),
        document_id: format_document_for_list(&record.document_id),
    }
}

fn summarize_raw(raw: &Value) -> ClientSummary {
    summarize(&project(raw))
}

// ============================================================================
// TESTS
// ============================================================================
