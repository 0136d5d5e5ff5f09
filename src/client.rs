// 👤 Client Entity - the record managed by the registry
//
// Field names follow the backend wire format (cpf, logradouro, bairro, ...)
// through serde renames; the Rust side uses plain English names.

use serde::{Deserialize, Serialize};

// ============================================================================
// PHONE TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PhoneType {
    #[default]
    #[serde(rename = "celular")]
    Mobile,

    #[serde(rename = "residencial")]
    Residential,

    #[serde(rename = "comercial")]
    Commercial,
}

impl PhoneType {
    pub fn as_wire(&self) -> &'static str {
        match self {
            PhoneType::Mobile => "celular",
            PhoneType::Residential => "residencial",
            PhoneType::Commercial => "comercial",
        }
    }

    /// Parse a wire value. Unknown types fall back to the landline layout.
    pub fn from_wire(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "celular" | "mobile" => PhoneType::Mobile,
            "residencial" | "residential" => PhoneType::Residential,
            "comercial" | "commercial" => PhoneType::Commercial,
            other => {
                tracing::debug!(phone_type = other, "unknown phone type, using residential");
                PhoneType::Residential
            }
        }
    }

    /// Raw digit count a complete number of this type has.
    pub fn required_digits(&self) -> usize {
        match self {
            PhoneType::Mobile => 11,
            PhoneType::Residential | PhoneType::Commercial => 10,
        }
    }
}

// ============================================================================
// CLIENT RECORD
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Address {
    #[serde(rename = "cep")]
    pub postal_code: String,

    #[serde(rename = "logradouro")]
    pub street: String,

    #[serde(rename = "bairro")]
    pub neighborhood: String,

    #[serde(rename = "cidade")]
    pub city: String,

    #[serde(rename = "uf")]
    pub state: String,

    #[serde(rename = "complemento", default)]
    pub complement: String,
}

/// Address sub-fields addressable from a form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressField {
    PostalCode,
    Street,
    Neighborhood,
    City,
    State,
    Complement,
}

impl AddressField {
    pub const ALL: [AddressField; 6] = [
        AddressField::PostalCode,
        AddressField::Street,
        AddressField::Neighborhood,
        AddressField::City,
        AddressField::State,
        AddressField::Complement,
    ];

    /// Error-map key, e.g. `address.cep`.
    pub fn key(&self) -> &'static str {
        match self {
            AddressField::PostalCode => "address.cep",
            AddressField::Street => "address.logradouro",
            AddressField::Neighborhood => "address.bairro",
            AddressField::City => "address.cidade",
            AddressField::State => "address.uf",
            AddressField::Complement => "address.complemento",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|field| field.key() == key)
    }
}

impl Address {
    pub fn get(&self, field: AddressField) -> &str {
        match field {
            AddressField::PostalCode => &self.postal_code,
            AddressField::Street => &self.street,
            AddressField::Neighborhood => &self.neighborhood,
            AddressField::City => &self.city,
            AddressField::State => &self.state,
            AddressField::Complement => &self.complement,
        }
    }

    pub fn set(&mut self, field: AddressField, value: String) {
        match field {
            AddressField::PostalCode => self.postal_code = value,
            AddressField::Street => self.street = value,
            AddressField::Neighborhood => self.neighborhood = value,
            AddressField::City => self.city = value,
            AddressField::State => self.state = value,
            AddressField::Complement => self.complement = value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PhoneEntry {
    #[serde(rename = "type")]
    pub phone_type: PhoneType,
    pub number: String,
}

impl PhoneEntry {
    pub fn new(phone_type: PhoneType, number: impl Into<String>) -> Self {
        PhoneEntry {
            phone_type,
            number: number.into(),
        }
    }

    pub fn blank() -> Self {
        Self::default()
    }
}

/// Client as held by a form or list: masked values, ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRecord {
    /// Backend identity, present only after creation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub name: String,

    #[serde(rename = "cpf")]
    pub document_id: String,

    pub address: Address,
    pub phones: Vec<PhoneEntry>,
    pub emails: Vec<String>,
}

impl Default for ClientRecord {
    /// Empty form: one blank mobile phone and one blank email slot.
    fn default() -> Self {
        ClientRecord {
            id: None,
            name: String::new(),
            document_id: String::new(),
            address: Address::default(),
            phones: vec![PhoneEntry::blank()],
            emails: vec![String::new()],
        }
    }
}

// ============================================================================
// WIRE PAYLOAD
// ============================================================================

/// Canonical submission body: unmasked, blank emails removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientPayload {
    pub name: String,

    #[serde(rename = "cpf")]
    pub document_id: String,

    pub address: Address,
    pub phones: Vec<PhoneEntry>,
    pub emails: Vec<String>,
}

// ============================================================================
// LIST ROW
// ============================================================================

/// One row of the client list view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSummary {
    pub id: Option<String>,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub document_id: String,
}
