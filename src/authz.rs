//! Ownership and department scoping for order reads.

use crate::store::{Order, Principal, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    NotOwner,
    OutOfDepartment,
    UnknownRole,
}

impl DenyReason {
    pub fn code(&self) -> &'static str {
        match self {
            DenyReason::NotOwner => "NotOwner",
            DenyReason::OutOfDepartment => "OutOfDepartment",
            DenyReason::UnknownRole => "UnknownRole",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied(DenyReason),
}

/// Decide whether `principal` may read `order`.
///
/// Customers see their own orders, support staff see orders in their
/// department's region. Every other role is denied.
pub fn authorize(principal: &Principal, order: &Order) -> Decision {
    match &principal.role {
        Role::Customer if order.owner_id != principal.id => Decision::Denied(DenyReason::NotOwner),
        Role::Support if principal.department.as_deref() != Some(order.region.as_str()) => {
            Decision::Denied(DenyReason::OutOfDepartment)
        }
        Role::Customer | Role::Support => Decision::Allowed,
        Role::Other(_) => Decision::Denied(DenyReason::UnknownRole),
    }
}
