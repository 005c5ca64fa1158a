pub mod oauth;
pub mod probe;
pub mod revoke;
pub mod token;

pub use oauth::{build_consent_url, AuthorizationFlow, AuthorizationState};
pub use probe::{ConnectionProbe, ConnectionState, ProbeStrategy};
pub use revoke::RevocationService;
pub use token::{MemoryTokenStore, SettingsTokenStore, TokenManager, TokenRecord, TokenStore, TokenWriter};
