// 📮 Postal lookup - ViaCEP address auto-fill
//
// GET {base}/ws/{8 digits}/json/ answers with an address object or with
// `{"erro": true}` when the code does not exist.

use crate::error::CepError;
use crate::masking::unmask;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_CEP_URL: &str = "https://viacep.com.br";

/// Address fields a lookup can fill.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CepAddress {
    pub street: String,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
    pub complement: String,
}

#[derive(Debug, Deserialize)]
struct ViaCepResponse {
    #[serde(default)]
    erro: Option<serde_json::Value>,
    #[serde(default)]
    logradouro: Option<String>,
    #[serde(default)]
    bairro: Option<String>,
    #[serde(default)]
    localidade: Option<String>,
    #[serde(default)]
    uf: Option<String>,
    #[serde(default)]
    complemento: Option<String>,
}

impl ViaCepResponse {
    /// ViaCEP has sent both `true` and `"true"` for missing codes.
    fn is_error(&self) -> bool {
        match &self.erro {
            Some(serde_json::Value::Bool(flag)) => *flag,
            Some(serde_json::Value::String(flag)) => flag == "true",
            _ => false,
        }
    }

    fn into_address(self) -> CepAddress {
        CepAddress {
            street: self.logradouro.unwrap_or_default(),
            neighborhood: self.bairro.unwrap_or_default(),
            city: self.localidade.unwrap_or_default(),
            state: self.uf.unwrap_or_default(),
            complement: self.complemento.unwrap_or_default(),
        }
    }
}

// ============================================================================
// LOOKUP TICKETS
// ============================================================================

/// Issued when a postal code becomes complete. Only the latest ticket's
/// outcome is applied to a form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CepLookupTicket {
    pub sequence: u64,
    pub code: String,
}

/// Result of a lookup as the form consumes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CepOutcome {
    Found(CepAddress),
    NotFound,
    Failed(String),
}

impl From<Result<CepAddress, CepError>> for CepOutcome {
    fn from(result: Result<CepAddress, CepError>) -> Self {
        match result {
            Ok(address) => CepOutcome::Found(address),
            Err(CepError::NotFound) => CepOutcome::NotFound,
            Err(e) => CepOutcome::Failed(e.to_string()),
        }
    }
}

// ============================================================================
// CLIENT
// ============================================================================

pub struct CepClient {
    client: Client,
    base_url: String,
}

impl CepClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(CepClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn lookup(&self, code: &str) -> Result<CepAddress, CepError> {
        let digits = unmask(code);
        if digits.len() != 8 {
            return Err(CepError::InvalidCode);
        }

        let url = format!("{}/ws/{}/json/", self.base_url, digits);
        tracing::debug!(%url, "looking up postal code");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            // ViaCEP answers 400 for malformed codes
            return Err(CepError::Status(status.as_u16()));
        }

        let body: ViaCepResponse = response.json().await?;
        if body.is_error() {
            tracing::info!(code = %digits, "postal code not found");
            return Err(CepError::NotFound);
        }

        Ok(body.into_address())
    }

    /// Run the lookup for a form ticket.
    pub async fn resolve(&self, ticket: &CepLookupTicket) -> CepOutcome {
        self.lookup(&ticket.code).await.into()
    }
}

// ============================================================================
// TESTS
// ============================================================================
