pub mod appointment;
pub mod attendance;
pub mod challenge;
pub mod client;
pub mod clinic;
pub mod credential;
pub mod device;
pub mod device_result;
pub mod employee;
pub mod invoice;
pub mod patient;
pub mod role;
pub mod schedule;
pub mod tenant;
pub mod user;
