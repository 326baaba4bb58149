//! Administrator privilege checks.
//!
//! Operations restricted to administrators take an [`AdminCapability`] by reference. The
//! only way to obtain one is [`AccessGuard::require_admin`], so the privilege check runs
//! once per operation at the boundary instead of inside every handler.

use super::domain::{Identity, IdentityId};
use super::views::{FlashLevel, Landing};

/// Proof that the caller is an administrator for a specific action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminCapability {
    identity: IdentityId,
    action: AdminAction,
}

impl AdminCapability {
    pub fn identity(&self) -> IdentityId {
        self.identity
    }

    pub fn action(&self) -> AdminAction {
        self.action
    }
}

/// Administrator-only operations, each carrying the message shown on refusal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction {
    CreateAnnouncement,
    MarkAttendance,
    MarkBulkAttendance,
    CreateUser,
    ViewUsers,
    ViewRooms,
    EditRooms,
    ViewAttendance,
    ManageAnnouncements,
    ViewOccupancy,
}

impl AdminAction {
    pub fn denial_message(self) -> &'static str {
        match self {
            AdminAction::CreateAnnouncement => "Only administrators can create announcements.",
            AdminAction::MarkAttendance => "Only administrators can mark attendance.",
            AdminAction::MarkBulkAttendance => "Only administrators can mark bulk attendance.",
            AdminAction::CreateUser => "Only administrators can create new users.",
            AdminAction::ViewUsers => "Only administrators can view user list.",
            AdminAction::ViewRooms => "Only administrators can view room list.",
            AdminAction::EditRooms => "Only administrators can create/edit rooms.",
            AdminAction::ViewAttendance => "Only administrators can view attendance records.",
            AdminAction::ManageAnnouncements => "Only administrators can manage announcements.",
            AdminAction::ViewOccupancy => "Only administrators can review room occupancy.",
        }
    }

    pub fn fallback(self) -> Landing {
        match self {
            AdminAction::CreateAnnouncement => Landing::AnnouncementList,
            _ => Landing::Dashboard,
        }
    }
}

/// Refusal surfaced to the caller as a flash message plus redirect, never a hard failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct AccessDenied {
    pub level: FlashLevel,
    pub message: &'static str,
    pub redirect: Landing,
}

impl AccessDenied {
    /// Administrators are steered away from student self-service flows.
    pub(crate) fn staff_on_student_flow(message: &'static str) -> Self {
        Self {
            level: FlashLevel::Info,
            message,
            redirect: Landing::AdminPanel,
        }
    }
}

pub struct AccessGuard;

impl AccessGuard {
    pub fn require_admin(
        identity: &Identity,
        action: AdminAction,
    ) -> Result<AdminCapability, AccessDenied> {
        if identity.is_staff {
            Ok(AdminCapability {
                identity: identity.id,
                action,
            })
        } else {
            Err(AccessDenied {
                level: FlashLevel::Error,
                message: action.denial_message(),
                redirect: action.fallback(),
            })
        }
    }
}
