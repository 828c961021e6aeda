use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    SuperAdmin = 1,
    Admin = 2,
    Doctor = 3,
    Receptionist = 4,
    HrEmployee = 5,
}

impl Role {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Role::SuperAdmin),
            2 => Some(Role::Admin),
            3 => Some(Role::Doctor),
            4 => Some(Role::Receptionist),
            5 => Some(Role::HrEmployee),
            _ => None,
        }
    }

    pub fn id(self) -> u8 {
        self as u8
    }

    /// Looks the role up in [`CAPABILITIES`].
    pub fn permits(self, action: Action) -> bool {
        CAPABILITIES
            .iter()
            .find(|(role, _)| *role == self)
            .map(|(_, actions)| actions.contains(&action))
            .unwrap_or(false)
    }
}

/// Everything a route can ask permission for.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Display)]
pub enum Action {
    ManageClients,
    ViewClinics,
    ManageClinics,
    ManageUsers,
    ViewPatients,
    CreatePatient,
    ViewAppointments,
    CreateAppointment,
    UpdateAppointmentStatus,
    ViewInvoices,
    EditInvoices,
    DeleteInvoices,
    ViewDevices,
    ManageDevices,
    ViewDeviceResults,
    SubmitDeviceResults,
    ReviewDeviceResults,
    ViewReports,
    ManageHr,
    ViewClinicLocations,
    HrSelfService,
    ViewMonthlyReport,
}

use Action::*;

/// Role -> permitted actions. The only place role strings turn into access.
pub const CAPABILITIES: &[(Role, &[Action])] = &[
    (
        Role::SuperAdmin,
        &[
            ManageClients,
            ViewClinics,
            ManageClinics,
            ManageUsers,
            ViewInvoices,
            EditInvoices,
            DeleteInvoices,
            ViewDevices,
            ManageDevices,
            ViewDeviceResults,
            SubmitDeviceResults,
            ReviewDeviceResults,
        ],
    ),
    (
        Role::Admin,
        &[
            ViewClinics,
            ManageClinics,
            ManageUsers,
            ViewPatients,
            CreatePatient,
            ViewAppointments,
            CreateAppointment,
            UpdateAppointmentStatus,
            ViewInvoices,
            EditInvoices,
            DeleteInvoices,
            ViewDevices,
            ManageDevices,
            ViewDeviceResults,
            SubmitDeviceResults,
            ReviewDeviceResults,
            ViewReports,
            ManageHr,
            ViewClinicLocations,
            ViewMonthlyReport,
        ],
    ),
    (
        Role::Doctor,
        &[
            ViewClinics,
            ViewPatients,
            ViewAppointments,
            UpdateAppointmentStatus,
            ViewInvoices,
            EditInvoices,
            ViewDevices,
            ViewDeviceResults,
            SubmitDeviceResults,
            ReviewDeviceResults,
            ViewReports,
        ],
    ),
    (
        Role::Receptionist,
        &[
            ViewClinics,
            ViewPatients,
            CreatePatient,
            ViewAppointments,
            CreateAppointment,
            ViewInvoices,
            EditInvoices,
            ViewDevices,
            ViewDeviceResults,
            SubmitDeviceResults,
            ReviewDeviceResults,
            ViewReports,
        ],
    ),
    (
        Role::HrEmployee,
        &[ViewClinicLocations, HrSelfService, ViewMonthlyReport],
    ),
];
