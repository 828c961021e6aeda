use crate::api::hr::{
    attendance::{AttendanceListing, PunchRequest},
    employees::{CreateHrEmployee, ResetPassword, UpdateHrEmployee},
    location::{ClinicPin, LocationUpdate},
    me::MeResponse,
};
use crate::auth::handlers::LoginResponse;
use crate::hr::{
    report::{MonthlyReport, MonthlySummary},
    schedule::ScheduleInput,
};
use crate::model::{
    attendance::{AttendanceDay, AttendanceStatus},
    employee::EmployeeView,
    schedule::ScheduleView,
};
use crate::models::{HrLoginReqDto, LoginReqDto};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "MedLoop API",
        version = "1.0.0",
        description = r#"
## MedLoop clinic backend

Multi-tenant backend for clinics: patients, appointments, invoices, lab
devices and an **HR attendance** module.

### 🔹 HR attendance
- **Clinic location**: pin each clinic and set the allowed radius
- **Employees & schedules**: effective-dated work schedules with grace and overtime
- **Check-in / check-out**: geo-fenced punches, gated by a registered passkey
- **Biometrics**: WebAuthn registration and assertion ceremonies
- **Reports**: monthly per-day rows with a summary

### 🔐 Security
Endpoints under `/api` require a **JWT Bearer** access token. Tokens carry
the tenant; every query is scoped to it.

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::hr_login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,

        crate::api::hr::location::update_location,
        crate::api::hr::location::list_locations,

        crate::api::hr::employees::list_employees,
        crate::api::hr::employees::create_employee,
        crate::api::hr::employees::update_employee,
        crate::api::hr::employees::deactivate_employee,
        crate::api::hr::employees::reset_password,
        crate::api::hr::employees::username_available,

        crate::api::hr::me::get_me,

        crate::api::hr::webauthn::register_options,
        crate::api::hr::webauthn::register_verify,
        crate::api::hr::webauthn::authenticate_options,
        crate::api::hr::webauthn::authenticate_verify,

        crate::api::hr::attendance::check_in,
        crate::api::hr::attendance::check_out,
        crate::api::hr::attendance::list_attendance,

        crate::api::hr::reports::monthly,
        crate::api::hr::reports::my_monthly
    ),
    components(
        schemas(
            LoginReqDto,
            HrLoginReqDto,
            LoginResponse,
            LocationUpdate,
            ClinicPin,
            CreateHrEmployee,
            UpdateHrEmployee,
            ResetPassword,
            ScheduleInput,
            ScheduleView,
            EmployeeView,
            MeResponse,
            PunchRequest,
            AttendanceListing,
            AttendanceDay,
            AttendanceStatus,
            MonthlyReport,
            MonthlySummary
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login, token refresh and logout"),
        (name = "HR", description = "Clinic locations, employees and profile"),
        (name = "HR WebAuthn", description = "Passkey registration and assertion"),
        (name = "HR Attendance", description = "Geo-fenced check-in and check-out"),
        (name = "HR Reports", description = "Monthly attendance reports"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
