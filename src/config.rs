// ⚙️ Runtime configuration
//
// The binary fills this from flags and CLIENT_REGISTRY_* environment
// variables; library users can start from `Config::default()`.

use crate::cep::DEFAULT_CEP_URL;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:8081";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_SESSION_DB: &str = "client-registry-session.db";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Backend base URL, without the /api/v1 prefix
    pub api_url: String,

    /// Postal lookup base URL
    pub cep_url: String,

    /// Per-request timeout for both collaborators
    pub timeout: Duration,

    /// SQLite file holding the persisted session
    pub session_db: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_url: DEFAULT_API_URL.to_string(),
            cep_url: DEFAULT_CEP_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            session_db: PathBuf::from(DEFAULT_SESSION_DB),
        }
    }
}

impl Config {
    pub fn with_api_url(mut self, api_url: &str) -> Self {
        self.api_url = api_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_cep_url(mut self, cep_url: &str) -> Self {
        self.cep_url = cep_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_session_db(mut self, path: PathBuf) -> Self {
        self.session_db = path;
        self
    }
}
