pub mod calculator;
pub mod challenge;
pub mod error;
pub mod geofence;
pub mod report;
pub mod schedule;
pub mod session;
pub mod store;
pub mod webauthn;

#[cfg(test)]
pub mod memory;
