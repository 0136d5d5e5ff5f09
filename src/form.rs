// 📝 Client Form - aggregate validation, submission payload, editable state
//
// Keystroke handlers touch one error key each. `validate` rebuilds the whole
// FieldErrorMap so a fixed field never keeps a stale error.

use crate::cep::{CepLookupTicket, CepOutcome};
use crate::client::{AddressField, ClientPayload, ClientRecord, PhoneEntry, PhoneType};
use crate::gate::{can, Capability};
use crate::masking::{mask, mask_phone, unmask, MaskKind};
use crate::session::SessionContext;
use crate::validators::{
    check_into, is_valid_document, is_valid_email, is_valid_name, is_valid_phone,
    is_valid_postal_code, is_valid_state, validate_phone, FieldCheck, FieldErrorMap, DOCUMENT_MESSAGE,
    EMAIL_MESSAGE, NAME_MESSAGE, PHONE_MESSAGE, POSTAL_CODE_MESSAGE, STATE_MESSAGE,
};
use thiserror::Error;

pub const PHONES_MESSAGE: &str = "At least one valid phone is required";
pub const EMAILS_MESSAGE: &str = "At least one valid email is required";
pub const CEP_NOT_FOUND_MESSAGE: &str = "Postal code not found";
pub const CEP_FAILED_MESSAGE: &str = "Failed to look up postal code";

// ============================================================================
// AGGREGATE VALIDATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormValidation {
    pub valid: bool,
    pub errors: FieldErrorMap,
}

fn required_message(field: AddressField) -> Option<&'static str> {
    match field {
        AddressField::Street => Some("Street is required"),
        AddressField::Neighborhood => Some("Neighborhood is required"),
        AddressField::City => Some("City is required"),
        AddressField::State => Some("State is required"),
        AddressField::PostalCode | AddressField::Complement => None,
    }
}

/// Validate a whole record in one pass.
pub fn validate_form(record: &ClientRecord) -> FormValidation {
    let mut errors = FieldErrorMap::new();

    if !is_valid_name(&record.name) {
        errors.set("name", NAME_MESSAGE);
    }

    if !is_valid_document(&record.document_id) {
        errors.set("cpf", DOCUMENT_MESSAGE);
    }

    // Address
    if !is_valid_postal_code(&record.address.postal_code) {
        errors.set(AddressField::PostalCode.key(), POSTAL_CODE_MESSAGE);
    }
    for field in AddressField::ALL {
        if let Some(message) = required_message(field) {
            if record.address.get(field).trim().is_empty() {
                errors.set(field.key(), message);
            }
        }
    }
    let state = record.address.state.trim();
    if !state.is_empty() && !is_valid_state(state) {
        errors.set(AddressField::State.key(), STATE_MESSAGE);
    }

    // Phones: blank entries are placeholders, typed ones must be complete
    for (index, phone) in record.phones.iter().enumerate() {
        if !unmask(&phone.number).is_empty() && !is_valid_phone(phone.phone_type, &phone.number) {
            errors.set(&format!("phones.{}", index), PHONE_MESSAGE);
        }
    }
    let has_valid_phone = record
        .phones
        .iter()
        .any(|phone| is_valid_phone(phone.phone_type, &phone.number));
    if !has_valid_phone {
        errors.set("phones", PHONES_MESSAGE);
    }

    // Emails
    for (index, email) in record.emails.iter().enumerate() {
        if !email.trim().is_empty() && !is_valid_email(email) {
            errors.set(&format!("emails.{}", index), EMAIL_MESSAGE);
        }
    }
    if !record.emails.iter().any(|email| is_valid_email(email)) {
        errors.set("emails", EMAILS_MESSAGE);
    }

    FormValidation {
        valid: errors.is_empty(),
        errors,
    }
}

/// Canonical wire payload: masks stripped, blank emails dropped.
pub fn prepare_submission(record: &ClientRecord) -> ClientPayload {
    let mut address = record.address.clone();
    address.postal_code = unmask(&address.postal_code);

    ClientPayload {
        name: record.name.clone(),
        document_id: unmask(&record.document_id),
        address,
        phones: record
            .phones
            .iter()
            .map(|phone| PhoneEntry::new(phone.phone_type, unmask(&phone.number)))
            .collect(),
        emails: record
            .emails
            .iter()
            .filter(|email| !email.trim().is_empty())
            .cloned()
            .collect(),
    }
}

// ============================================================================
// FORM STATE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Edit(String),
    View(String),
}

impl FormMode {
    pub fn client_id(&self) -> Option<&str> {
        match self {
            FormMode::Create => None,
            FormMode::Edit(id) | FormMode::View(id) => Some(id),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormError {
    #[error("this form is read-only")]
    ReadOnly,

    #[error("{0}")]
    PermissionDenied(String),

    #[error("form has {} invalid field(s)", .0.len())]
    Invalid(FieldErrorMap),
}

#[derive(Debug, Clone)]
pub struct ClientForm {
    mode: FormMode,
    record: ClientRecord,
    errors: FieldErrorMap,
    cep_sequence: u64,
}

impl ClientForm {
    pub fn new() -> Self {
        Self::load(FormMode::Create, ClientRecord::default())
    }

    /// Seed a form with an already-normalized record.
    pub fn load(mode: FormMode, record: ClientRecord) -> Self {
        ClientForm {
            mode,
            record,
            errors: FieldErrorMap::new(),
            cep_sequence: 0,
        }
    }

    pub fn mode(&self) -> &FormMode {
        &self.mode
    }

    pub fn record(&self) -> &ClientRecord {
        &self.record
    }

    pub fn errors(&self) -> &FieldErrorMap {
        &self.errors
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self.mode, FormMode::View(_))
    }

    fn editable(&self, what: &str) -> bool {
        if self.is_read_only() {
            tracing::debug!(field = what, "ignoring edit on read-only form");
            return false;
        }
        true
    }

    // ------------------------------------------------------------------------
    // Keystrokes
    // ------------------------------------------------------------------------

    pub fn set_name(&mut self, value: &str) {
        if !self.editable("name") {
            return;
        }
        self.record.name = value.to_string();
        check_into(&mut self.errors, "name", value);
    }

    pub fn set_document(&mut self, value: &str) {
        if !self.editable("cpf") {
            return;
        }
        self.record.document_id = mask(MaskKind::Document, value);
        check_into(&mut self.errors, "cpf", &self.record.document_id);
    }

    /// Address sub-fields. The postal code is routed through `set_cep` and
    /// may hand back a lookup ticket.
    pub fn set_address_field(&mut self, field: AddressField, value: &str) -> Option<CepLookupTicket> {
        if field == AddressField::PostalCode {
            return self.set_cep(value);
        }
        if self.editable(field.key()) {
            self.record.address.set(field, value.to_string());
            check_into(&mut self.errors, field.key(), value);
        }
        None
    }

    /// Mask the postal code; once it has 8 digits, hand back a lookup ticket.
    pub fn set_cep(&mut self, value: &str) -> Option<CepLookupTicket> {
        if !self.editable("address.cep") {
            return None;
        }
        let masked = mask(MaskKind::PostalCode, value);
        check_into(&mut self.errors, AddressField::PostalCode.key(), &masked);
        self.record.address.postal_code = masked;

        let digits = unmask(&self.record.address.postal_code);
        if digits.len() != 8 {
            return None;
        }

        self.cep_sequence += 1;
        Some(CepLookupTicket {
            sequence: self.cep_sequence,
            code: digits,
        })
    }

    /// Apply a lookup outcome. Returns false for stale tickets.
    pub fn apply_cep_lookup(&mut self, ticket: &CepLookupTicket, outcome: CepOutcome) -> bool {
        if ticket.sequence != self.cep_sequence
            || unmask(&self.record.address.postal_code) != ticket.code
        {
            tracing::debug!(
                sequence = ticket.sequence,
                latest = self.cep_sequence,
                "dropping stale postal lookup"
            );
            return false;
        }

        let key = AddressField::PostalCode.key();
        match outcome {
            CepOutcome::Found(found) => {
                let address = &mut self.record.address;
                address.street = found.street;
                address.neighborhood = found.neighborhood;
                address.city = found.city;
                address.state = found.state;
                if !found.complement.is_empty() {
                    address.complement = found.complement;
                }
                self.errors.clear(key);
            }
            CepOutcome::NotFound => self.errors.set(key, CEP_NOT_FOUND_MESSAGE),
            CepOutcome::Failed(reason) => {
                tracing::warn!(%reason, "postal lookup failed");
                self.errors.set(key, CEP_FAILED_MESSAGE);
            }
        }
        true
    }

    pub fn set_phone_number(&mut self, index: usize, value: &str) {
        if !self.editable("phones") {
            return;
        }
        let Some(phone) = self.record.phones.get_mut(index) else {
            return;
        };
        phone.number = mask_phone(phone.phone_type, value);
        self.check_phone(index);
    }

    /// Switch layout, keeping the digits typed so far.
    pub fn set_phone_type(&mut self, index: usize, phone_type: PhoneType) {
        if !self.editable("phones") {
            return;
        }
        let Some(phone) = self.record.phones.get_mut(index) else {
            return;
        };
        let digits = unmask(&phone.number);
        *phone = PhoneEntry::new(phone_type, mask_phone(phone_type, &digits));
        self.check_phone(index);
    }

    fn check_phone(&mut self, index: usize) {
        let Some(phone) = self.record.phones.get(index) else {
            return;
        };
        let check = if unmask(&phone.number).is_empty() {
            FieldCheck::pass()
        } else {
            validate_phone(phone.phone_type, &phone.number)
        };
        self.errors.record(&format!("phones.{}", index), &check);
    }

    pub fn add_phone(&mut self) {
        if self.editable("phones") {
            self.record.phones.push(PhoneEntry::blank());
        }
    }

    /// Remove a phone; the last remaining entry is kept.
    pub fn remove_phone(&mut self, index: usize) {
        if !self.editable("phones") || self.record.phones.len() <= 1 || index >= self.record.phones.len() {
            return;
        }
        let before = self.record.phones.len();
        self.record.phones.remove(index);
        self.reindex_errors("phones", index, before);
    }

    pub fn set_email(&mut self, index: usize, value: &str) {
        if !self.editable("emails") {
            return;
        }
        let Some(email) = self.record.emails.get_mut(index) else {
            return;
        };
        *email = value.to_string();
        check_into(&mut self.errors, &format!("emails.{}", index), value);
    }

    pub fn add_email(&mut self) {
        if self.editable("emails") {
            self.record.emails.push(String::new());
        }
    }

    /// Remove an email; the last remaining entry is kept.
    pub fn remove_email(&mut self, index: usize) {
        if !self.editable("emails") || self.record.emails.len() <= 1 || index >= self.record.emails.len() {
            return;
        }
        let before = self.record.emails.len();
        self.record.emails.remove(index);
        self.reindex_errors("emails", index, before);
    }

    /// Shift `list.N` errors down after removing entry `removed`.
    fn reindex_errors(&mut self, list: &str, removed: usize, before: usize) {
        let mut shifted = Vec::new();
        for index in removed..before {
            let key = format!("{}.{}", list, index);
            if let Some(message) = self.errors.get(&key).map(str::to_string) {
                if index > removed {
                    shifted.push((format!("{}.{}", list, index - 1), message));
                }
            }
            self.errors.clear(&key);
        }
        for (key, message) in shifted {
            self.errors.set(&key, message);
        }
    }

    // ------------------------------------------------------------------------
    // Submit
    // ------------------------------------------------------------------------

    /// Rebuild the error map from scratch.
    pub fn validate(&mut self) -> bool {
        let validation = validate_form(&self.record);
        self.errors = validation.errors;
        validation.valid
    }

    /// Check permissions, validate, and produce the wire payload.
    pub fn submit(&mut self, ctx: &SessionContext) -> Result<ClientPayload, FormError> {
        let capability = match self.mode {
            FormMode::View(_) => return Err(FormError::ReadOnly),
            FormMode::Create => Capability::Create,
            FormMode::Edit(_) => Capability::Edit,
        };
        if !can(ctx, capability) {
            return Err(FormError::PermissionDenied(capability.denied_message()));
        }

        if !self.validate() {
            tracing::debug!(errors = self.errors.len(), "client form rejected");
            return Err(FormError::Invalid(self.errors.clone()));
        }

        Ok(prepare_submission(&self.record))
    }
}

impl Default for ClientForm {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cep::CepAddress;
    use crate::client::Address;
    use crate::session::UserInfo;

    fn valid_record() -> ClientRecord {
        ClientRecord {
            id: None,
            name: "Maria Silva".to_string(),
            document_id: "123.456.789-01".to_string(),
            address: Address {
                postal_code: "01310-930".to_string(),
                street: "Avenida Paulista".to_string(),
                neighborhood: "Bela Vista".to_string(),
                city: "São Paulo".to_string(),
                state: "SP".to_string(),
                complement: String::new(),
            },
            phones: vec![PhoneEntry::new(PhoneType::Mobile, "(11) 98765-4321")],
            emails: vec!["maria@example.com".to_string(), "  ".to_string()],
        }
    }

    fn admin_ctx() -> SessionContext {
        SessionContext::authenticated("tok", UserInfo::with_roles("ana", &["ROLE_ADMIN"]))
    }

    fn user_ctx() -> SessionContext {
        SessionContext::authenticated("tok", UserInfo::with_roles("bob", &["ROLE_USER"]))
    }

    #[test]
    fn test_valid_record_passes() {
        let validation = validate_form(&valid_record());
        assert!(validation.valid, "{:?}", validation.errors);
        assert!(validation.errors.is_empty());
    }

    #[test]
    fn test_no_phones_no_emails_gives_two_keys() {
        let mut record = valid_record();
        record.phones.clear();
        record.emails.clear();

        let validation = validate_form(&record);
        assert!(!validation.valid);
        let keys: Vec<&str> = validation.errors.keys().collect();
        assert_eq!(keys, vec!["emails", "phones"]);
    }

    #[test]
    fn test_phone_length_depends_on_type() {
        let mut record = valid_record();
        record.phones = vec![PhoneEntry::new(PhoneType::Residential, "(11) 98765-4321")];
        let validation = validate_form(&record);
        assert!(validation.errors.contains("phones"));
        assert!(validation.errors.contains("phones.0"));

        record.phones = vec![
            PhoneEntry::new(PhoneType::Commercial, "(11) 3333-4444"),
            PhoneEntry::blank(),
        ];
        assert!(validate_form(&record).valid);
    }

    #[test]
    fn test_address_required_fields() {
        let mut record = valid_record();
        record.address.street.clear();
        record.address.state = "S".to_string();

        let errors = validate_form(&record).errors;
        assert!(errors.contains("address.logradouro"));
        assert_eq!(errors.get("address.uf"), Some(STATE_MESSAGE));
        assert!(!errors.contains("address.complemento"));
    }

    #[test]
    fn test_fixing_single_field_clears_map() {
        let mut form = ClientForm::load(FormMode::Create, valid_record());
        form.set_document("123.456");
        assert!(!form.validate());
        assert_eq!(form.errors().len(), 1);

        form.set_document("12345678901");
        assert!(form.validate());
        assert!(form.errors().is_empty());
    }

    #[test]
    fn test_validate_replaces_stale_keystroke_errors() {
        let mut form = ClientForm::load(FormMode::Create, valid_record());
        form.set_email(0, "broken");
        assert!(form.errors().contains("emails.0"));

        form.set_email(0, "maria@example.com");
        assert!(form.validate());
        assert!(!form.errors().contains("emails.0"));
    }

    #[test]
    fn test_prepare_submission_strips_masks() {
        let payload = prepare_submission(&valid_record());

        assert_eq!(payload.document_id, "12345678901");
        assert_eq!(payload.address.postal_code, "01310930");
        assert_eq!(payload.address.street, "Avenida Paulista");
        assert_eq!(payload.phones, vec![PhoneEntry::new(PhoneType::Mobile, "11987654321")]);
        assert_eq!(payload.emails, vec!["maria@example.com"]);
    }

    #[test]
    fn test_document_scenario() {
        let mut form = ClientForm::load(FormMode::Create, valid_record());
        form.set_document("12345678901");
        assert_eq!(form.record().document_id, "123.456.789-01");

        let payload = form.submit(&admin_ctx()).unwrap();
        assert_eq!(payload.document_id, "12345678901");
    }

    #[test]
    fn test_set_cep_issues_ticket_at_eight_digits() {
        let mut form = ClientForm::new();
        assert!(form.set_cep("0131093").is_none());
        assert!(form.errors().contains("address.cep"));

        let ticket = form.set_cep("01310930").unwrap();
        assert_eq!(ticket.code, "01310930");
        assert_eq!(form.record().address.postal_code, "01310-930");
        assert!(!form.errors().contains("address.cep"));
    }

    #[test]
    fn test_cep_not_found_leaves_address_untouched() {
        let mut form = ClientForm::load(FormMode::Create, valid_record());
        let ticket = form.set_cep("01310930").unwrap();

        assert!(form.apply_cep_lookup(&ticket, CepOutcome::NotFound));
        assert_eq!(form.errors().get("address.cep"), Some(CEP_NOT_FOUND_MESSAGE));
        assert_eq!(form.record().address.street, "Avenida Paulista");
        assert_eq!(form.record().address.city, "São Paulo");
    }

    #[test]
    fn test_cep_found_fills_address_and_keeps_complement() {
        let mut form = ClientForm::new();
        form.set_address_field(AddressField::Complement, "Apto 12");
        let ticket = form.set_cep("01310-930").unwrap();

        let found = CepAddress {
            street: "Avenida Paulista".to_string(),
            neighborhood: "Bela Vista".to_string(),
            city: "São Paulo".to_string(),
            state: "SP".to_string(),
            complement: String::new(),
        };
        assert!(form.apply_cep_lookup(&ticket, CepOutcome::Found(found)));

        let address = &form.record().address;
        assert_eq!(address.street, "Avenida Paulista");
        assert_eq!(address.state, "SP");
        assert_eq!(address.complement, "Apto 12");
        assert!(!form.errors().contains("address.cep"));
    }

    #[test]
    fn test_stale_cep_outcome_is_ignored() {
        let mut form = ClientForm::new();
        let first = form.set_cep("01310930").unwrap();
        let second = form.set_cep("04538133").unwrap();

        assert!(!form.apply_cep_lookup(&first, CepOutcome::NotFound));
        assert!(!form.errors().contains("address.cep"));
        assert!(form.apply_cep_lookup(&second, CepOutcome::NotFound));
        assert!(form.errors().contains("address.cep"));
    }

    #[test]
    fn test_phone_type_switch_remasks() {
        let mut form = ClientForm::new();
        form.set_phone_number(0, "11987654321");
        assert_eq!(form.record().phones[0].number, "(11) 98765-4321");

        form.set_phone_type(0, PhoneType::Residential);
        assert_eq!(form.record().phones[0].number, "(11) 9876-5432");
        assert_eq!(form.record().phones[0].phone_type, PhoneType::Residential);
    }

    #[test]
    fn test_phone_type_switch_rechecks_entry() {
        let mut form = ClientForm::new();
        form.set_phone_type(0, PhoneType::Residential);
        form.set_phone_number(0, "1133334444");
        assert!(!form.errors().contains("phones.0"));

        form.set_phone_type(0, PhoneType::Mobile);
        assert_eq!(form.errors().get("phones.0"), Some(PHONE_MESSAGE));

        form.set_phone_type(0, PhoneType::Commercial);
        assert!(!form.errors().contains("phones.0"));
    }

    #[test]
    fn test_remove_keeps_last_entry_and_reindexes() {
        let mut form = ClientForm::new();
        form.remove_email(0);
        assert_eq!(form.record().emails.len(), 1);

        form.add_email();
        form.add_email();
        form.set_email(2, "bad");
        form.remove_email(1);

        assert_eq!(form.record().emails, vec!["", "bad"]);
        assert_eq!(form.errors().get("emails.1"), Some(EMAIL_MESSAGE));
        assert!(!form.errors().contains("emails.2"));
    }

    #[test]
    fn test_view_mode_is_read_only() {
        let mut form = ClientForm::load(FormMode::View("5".to_string()), valid_record());
        form.set_name("Changed");
        assert_eq!(form.record().name, "Maria Silva");
        assert!(form.set_cep("04538133").is_none());
        assert_eq!(form.submit(&admin_ctx()), Err(FormError::ReadOnly));
    }

    #[test]
    fn test_edit_requires_admin() {
        let mut form = ClientForm::load(FormMode::Edit("5".to_string()), valid_record());
        assert_eq!(
            form.submit(&user_ctx()),
            Err(FormError::PermissionDenied("no permission to edit clients".to_string()))
        );
        assert!(form.submit(&admin_ctx()).is_ok());
    }

    #[test]
    fn test_submit_invalid_returns_errors() {
        let mut form = ClientForm::new();
        match form.submit(&admin_ctx()) {
            Err(FormError::Invalid(errors)) => {
                assert!(errors.contains("name"));
                assert!(errors.contains("phones"));
                assert!(errors.contains("emails"));
                assert_eq!(&errors, form.errors());
            }
            other => panic!("expected invalid form, got {:?}", other),
        }
    }
}
