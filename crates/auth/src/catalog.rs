//! Build-time catalog of the dashboard's permission keys and roles.
//!
//! The backend remains the authority on what a user holds; this catalog only
//! names the keys the client references (route rules, gates) so typos can be
//! caught and so the CLI can describe them.

use serde::Serialize;

/// Permission definition (for audit/display).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PermissionDefinition {
    pub key: &'static str,
    pub category: &'static str,
    pub description: &'static str,
}

/// Role definition (for audit/display).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoleDefinition {
    pub name: &'static str,
    pub description: &'static str,
}

pub mod keys {
    pub const VIEW_USER: &str = "can_view_user";
    pub const CREATE_USER: &str = "can_create_user";
    pub const EDIT_USER: &str = "can_edit_user";
    pub const DELETE_USER: &str = "can_delete_user";

    pub const VIEW_ROLE: &str = "can_view_role";
    pub const CREATE_ROLE: &str = "can_create_role";
    pub const EDIT_ROLE: &str = "can_edit_role";
    pub const DELETE_ROLE: &str = "can_delete_role";

    pub const VIEW_PERMISSION: &str = "can_view_permission";
    pub const ASSIGN_PERMISSION: &str = "can_assign_permission";

    pub const VIEW_TRAINING: &str = "can_view_training";
    pub const CREATE_TRAINING: &str = "can_create_training";
    pub const EDIT_TRAINING: &str = "can_edit_training";
    pub const DELETE_TRAINING: &str = "can_delete_training";

    pub const VIEW_JOB_OFFER: &str = "can_view_job_offer";
    pub const CREATE_JOB_OFFER: &str = "can_create_job_offer";
    pub const EDIT_JOB_OFFER: &str = "can_edit_job_offer";
    pub const DELETE_JOB_OFFER: &str = "can_delete_job_offer";

    pub const VIEW_CABINET_APPLICATION: &str = "can_view_cabinet_application";
    pub const REVIEW_CABINET_APPLICATION: &str = "can_review_cabinet_application";

    pub const VIEW_PAYMENT: &str = "can_view_payment";
    pub const REFUND_PAYMENT: &str = "can_refund_payment";
}

pub const PERMISSIONS: &[PermissionDefinition] = &[
    def(keys::VIEW_USER, "users", "List and view user accounts"),
    def(keys::CREATE_USER, "users", "Create user accounts"),
    def(keys::EDIT_USER, "users", "Update user accounts"),
    def(keys::DELETE_USER, "users", "Delete user accounts"),
    def(keys::VIEW_ROLE, "roles", "List and view roles"),
    def(keys::CREATE_ROLE, "roles", "Create roles"),
    def(keys::EDIT_ROLE, "roles", "Update roles"),
    def(keys::DELETE_ROLE, "roles", "Delete roles"),
    def(keys::VIEW_PERMISSION, "permissions", "List permissions"),
    def(keys::ASSIGN_PERMISSION, "permissions", "Grant or revoke permissions on roles and users"),
    def(keys::VIEW_TRAINING, "trainings", "Browse the training catalog"),
    def(keys::CREATE_TRAINING, "trainings", "Add trainings to the catalog"),
    def(keys::EDIT_TRAINING, "trainings", "Update trainings"),
    def(keys::DELETE_TRAINING, "trainings", "Remove trainings from the catalog"),
    def(keys::VIEW_JOB_OFFER, "job_offers", "List and view job offers"),
    def(keys::CREATE_JOB_OFFER, "job_offers", "Publish job offers"),
    def(keys::EDIT_JOB_OFFER, "job_offers", "Update job offers"),
    def(keys::DELETE_JOB_OFFER, "job_offers", "Withdraw job offers"),
    def(keys::VIEW_CABINET_APPLICATION, "cabinet_applications", "List cabinet applications"),
    def(
        keys::REVIEW_CABINET_APPLICATION,
        "cabinet_applications",
        "Approve or reject cabinet applications",
    ),
    def(keys::VIEW_PAYMENT, "payments", "List payments"),
    def(keys::REFUND_PAYMENT, "payments", "Issue refunds"),
];

pub const ROLES: &[RoleDefinition] = &[
    RoleDefinition {
        name: crate::Role::ADMIN,
        description: "Full back-office administrator",
    },
    RoleDefinition {
        name: crate::Role::MANAGER,
        description: "Manages catalog content, offers and applications",
    },
    RoleDefinition {
        name: crate::Role::VISITOR,
        description: "Read-only access",
    },
];

const fn def(
    key: &'static str,
    category: &'static str,
    description: &'static str,
) -> PermissionDefinition {
    PermissionDefinition {
        key,
        category,
        description,
    }
}

pub fn lookup(key: &str) -> Option<&'static PermissionDefinition> {
    PERMISSIONS.iter().find(|d| d.key == key)
}

pub fn is_known(key: &str) -> bool {
    lookup(key).is_some()
}

pub fn role(name: &str) -> Option<&'static RoleDefinition> {
    ROLES.iter().find(|r| r.name == name)
}

/// All catalogued keys of one category, in declaration order.
pub fn category(name: &str) -> impl Iterator<Item = &'static PermissionDefinition> + '_ {
    PERMISSIONS.iter().filter(move |d| d.category == name)
}
