// Public API for the front-ends, the dev oracle and integration tests

pub mod capture;
pub mod client;
pub mod error;
pub mod oracle;
pub mod present;
pub mod protocol;
pub mod session;
pub mod timer;
pub mod types;
