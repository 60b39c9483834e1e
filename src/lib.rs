pub mod api;
pub mod app;
pub mod config;
pub mod logging;
pub mod poller;
pub mod redact;
pub mod session;
pub mod store;
#[cfg(test)]
mod test_support;
pub mod transport;
pub mod types;
