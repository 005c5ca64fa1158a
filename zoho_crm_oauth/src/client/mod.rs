pub mod api;

pub use api::{RecordOutcome, TokenResponse, ZohoClient};
