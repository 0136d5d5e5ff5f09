// 🎭 Masking Engine - display masks for CPF, CEP and phone numbers
// Raw digits are canonical for submission, masked text is canonical for display

use crate::client::PhoneType;
use serde::{Deserialize, Serialize};

// ============================================================================
// MASK KINDS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaskKind {
    /// CPF: ###.###.###-##
    Document,
    /// CEP: #####-###
    PostalCode,
    /// Mobile phone: (##) #####-####
    PhoneMobile,
    /// Landline phone: (##) ####-####
    PhoneLandline,
}

impl MaskKind {
    /// Digit groups and the separator written before each group.
    fn layout(&self) -> &'static [(usize, &'static str)] {
        match self {
            MaskKind::Document => &[(3, ""), (3, "."), (3, "."), (2, "-")],
            MaskKind::PostalCode => &[(5, ""), (3, "-")],
            MaskKind::PhoneMobile => &[(2, "("), (5, ") "), (4, "-")],
            MaskKind::PhoneLandline => &[(2, "("), (4, ") "), (4, "-")],
        }
    }

    /// Total digits the full mask holds; extra digits are truncated.
    pub fn max_digits(&self) -> usize {
        self.layout().iter().map(|(len, _)| len).sum()
    }

    pub fn name(&self) -> &'static str {
        match self {
            MaskKind::Document => "document",
            MaskKind::PostalCode => "postal_code",
            MaskKind::PhoneMobile => "phone_mobile",
            MaskKind::PhoneLandline => "phone_landline",
        }
    }

    fn is_phone(&self) -> bool {
        matches!(self, MaskKind::PhoneMobile | MaskKind::PhoneLandline)
    }
}

impl From<PhoneType> for MaskKind {
    fn from(phone_type: PhoneType) -> Self {
        match phone_type {
            PhoneType::Mobile => MaskKind::PhoneMobile,
            PhoneType::Residential | PhoneType::Commercial => MaskKind::PhoneLandline,
        }
    }
}

// ============================================================================
// MASK / UNMASK
// ============================================================================

/// Reformat raw or partially typed input into the display mask for `kind`.
///
/// Non-digits are dropped first, so the function is idempotent on its own
/// output. Separators only appear once the group they introduce has at least
/// one digit, which keeps partial keystrokes readable ("123.4", "(11) 9").
pub fn mask(kind: MaskKind, input: &str) -> String {
    let digits: Vec<char> = input
        .chars()
        .filter(|c| c.is_ascii_digit())
        .take(kind.max_digits())
        .collect();

    let mut out = String::with_capacity(kind.max_digits() + 5);
    let mut pos = 0;

    for (index, (len, separator)) in kind.layout().iter().enumerate() {
        if pos >= digits.len() {
            break;
        }

        // A phone area code is only wrapped in parentheses once the
        // subscriber number has started.
        let opens_area_code = index == 0 && kind.is_phone();
        if opens_area_code {
            if digits.len() > *len {
                out.push_str(separator);
            }
        } else {
            out.push_str(separator);
        }

        let end = (pos + len).min(digits.len());
        out.extend(&digits[pos..end]);
        pos = end;
    }

    out
}

/// Strip every non-digit character.
pub fn unmask(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Mask a phone number with the layout matching its type.
pub fn mask_phone(phone_type: PhoneType, value: &str) -> String {
    mask(phone_type.into(), value)
}

/// Document id as shown in the client list: masked when complete, the
/// original text when it isn't 11 digits, "N/A" when blank.
pub fn format_document_for_list(value: &str) -> String {
    if value.trim().is_empty() {
        return "N/A".to_string();
    }

    let digits = unmask(value);
    if digits.len() != 11 {
        return value.to_string();
    }

    mask(MaskKind::Document, &digits)
}

// ============================================================================
// TESTS
// ============================================================================
