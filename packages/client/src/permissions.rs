//! Role-derived permission model.
//!
//! [`Capabilities::evaluate`] is a pure function of the signed-in identity:
//! no state, no I/O, recomputed on every read. Front ends use it to decide
//! which actions to offer, and [`scope_incidents`] uses the same flags to
//! decide which incidents a caller sees, so gating and filtering cannot
//! disagree.
//!
//! **This is not a security boundary.** Everything here runs on the client
//! and can be bypassed; the server must enforce access on its own. The model
//! exists to keep the interface honest about what a user is allowed to do.

use safetrack_api::{Identity, Incident, Role};

/// Every named permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    ViewDashboard,
    CreateIncident,
    ViewOwnIncidents,
    ViewProfile,
    ViewAllIncidents,
    UpdateIncidentStatus,
    DeleteIncidents,
    ManageWorkplaces,
    ViewUserProfiles,
    CreateUsers,
    ManageSystem,
}

impl Capability {
    pub const ALL: [Capability; 11] = [
        Capability::ViewDashboard,
        Capability::CreateIncident,
        Capability::ViewOwnIncidents,
        Capability::ViewProfile,
        Capability::ViewAllIncidents,
        Capability::UpdateIncidentStatus,
        Capability::DeleteIncidents,
        Capability::ManageWorkplaces,
        Capability::ViewUserProfiles,
        Capability::CreateUsers,
        Capability::ManageSystem,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Capability::ViewDashboard => "view-dashboard",
            Capability::CreateIncident => "create-incident",
            Capability::ViewOwnIncidents => "view-own-incidents",
            Capability::ViewProfile => "view-profile",
            Capability::ViewAllIncidents => "view-all-incidents",
            Capability::UpdateIncidentStatus => "update-incident-status",
            Capability::DeleteIncidents => "delete-incidents",
            Capability::ManageWorkplaces => "manage-workplaces",
            Capability::ViewUserProfiles => "view-user-profiles",
            Capability::CreateUsers => "create-users",
            Capability::ManageSystem => "manage-system",
        }
    }
}

/// The capability set for one identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    // Anyone signed in.
    pub can_view_dashboard: bool,
    pub can_create_incident: bool,
    pub can_view_own_incidents: bool,
    pub can_view_profile: bool,

    // Foremen only.
    pub can_view_all_incidents: bool,
    pub can_update_incident_status: bool,
    pub can_delete_incidents: bool,
    pub can_manage_workplaces: bool,
    pub can_view_user_profiles: bool,

    // Reserved; always false.
    pub can_create_users: bool,
    pub can_manage_system: bool,

    pub is_foreman: bool,
    pub is_user: bool,
}

impl Capabilities {
    /// Derive the capability set from `identity` (`None` = signed out).
    pub fn evaluate(identity: Option<&Identity>) -> Self {
        let signed_in = identity.is_some();
        let role = identity.map(|i| i.role);
        let foreman = role == Some(Role::Foreman);

        Self {
            can_view_dashboard: signed_in,
            can_create_incident: signed_in,
            can_view_own_incidents: signed_in,
            can_view_profile: signed_in,

            can_view_all_incidents: foreman,
            can_update_incident_status: foreman,
            can_delete_incidents: foreman,
            can_manage_workplaces: foreman,
            can_view_user_profiles: foreman,

            can_create_users: false,
            can_manage_system: false,

            is_foreman: foreman,
            is_user: role == Some(Role::User),
        }
    }

    pub fn allows(&self, capability: Capability) -> bool {
        match capability {
            Capability::ViewDashboard => self.can_view_dashboard,
            Capability::CreateIncident => self.can_create_incident,
            Capability::ViewOwnIncidents => self.can_view_own_incidents,
            Capability::ViewProfile => self.can_view_profile,
            Capability::ViewAllIncidents => self.can_view_all_incidents,
            Capability::UpdateIncidentStatus => self.can_update_incident_status,
            Capability::DeleteIncidents => self.can_delete_incidents,
            Capability::ManageWorkplaces => self.can_manage_workplaces,
            Capability::ViewUserProfiles => self.can_view_user_profiles,
            Capability::CreateUsers => self.can_create_users,
            Capability::ManageSystem => self.can_manage_system,
        }
    }

    /// Capabilities this identity holds, in declaration order.
    pub fn granted(&self) -> Vec<Capability> {
        Capability::ALL
            .into_iter()
            .filter(|c| self.allows(*c))
            .collect()
    }

    /// Role requirement check used for guarding individual actions.
    ///
    /// Foremen satisfy a `user` requirement as well as their own; users only
    /// satisfy `user`.
    pub fn satisfies_role(&self, required: Role) -> bool {
        match required {
            Role::Foreman => self.is_foreman,
            Role::User => self.is_user || self.is_foreman,
        }
    }
}

/// Outcome of guarding a whole screen or command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Granted,
    /// Nobody is signed in.
    LoginRequired,
    /// Signed in with a role other than the one required.
    Denied,
}

/// Decide whether `identity` may open something that needs a sign-in and,
/// optionally, an exact role.
pub fn route_access(identity: Option<&Identity>, required: Option<Role>) -> Access {
    match (identity, required) {
        (None, _) => Access::LoginRequired,
        (Some(i), Some(role)) if i.role != role => Access::Denied,
        _ => Access::Granted,
    }
}

/// Restrict a fetched incident list to what `identity` may see.
///
/// Everything when the identity can view all incidents, the identity's own
/// reports when it can only view those, nothing when signed out. Apply after
/// [`ResourceService::get_all`](crate::ResourceService::get_all) returns.
pub fn scope_incidents(identity: Option<&Identity>, incidents: Vec<Incident>) -> Vec<Incident> {
    let caps = Capabilities::evaluate(identity);
    match identity {
        _ if caps.can_view_all_incidents => incidents,
        Some(me) if caps.can_view_own_incidents => incidents
            .into_iter()
            .filter(|i| i.is_reported_by(&me.id))
            .collect(),
        _ => Vec::new(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
