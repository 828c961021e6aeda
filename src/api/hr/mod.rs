pub mod attendance;
pub mod employees;
pub mod location;
pub mod me;
pub mod reports;
pub mod webauthn;

use chrono::NaiveDateTime;

/// Attendance runs on the server's wall clock; work dates are local dates.
pub fn local_now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}
