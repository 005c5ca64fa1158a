pub mod settings;

pub use settings::{ProbeSettings, ServerSettings, Settings, ZohoSettings};
