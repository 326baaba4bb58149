//! Student residence management: room registry, student directory, occupancy coordination,
//! attendance ledger and announcement board.
//!
//! Every operation runs through [`HostelService`], which opens one store transaction per call
//! so multi-record mutations (room reassignment, administrator student creation) either land
//! completely or not at all.

pub mod access;
pub(crate) mod announcements;
pub(crate) mod attendance;
pub mod credentials;
pub mod domain;
pub mod forms;
pub(crate) mod occupancy;
pub mod repository;
pub mod roster;
pub(crate) mod rooms;
pub mod router;
pub mod service;
pub(crate) mod students;
pub mod views;

#[cfg(test)]
mod tests;

pub use access::{AccessDenied, AccessGuard, AdminAction, AdminCapability};
pub use attendance::BulkAttendanceSummary;
pub use credentials::{CredentialPolicy, DEFAULT_HASH_COST};
pub use domain::{
    Announcement, AnnouncementId, Attendance, Gender, Identity, IdentityId, Room, RoomId,
    RoomType, Student, StudentId,
};
pub use forms::{
    AdminCreateUserForm, AnnouncementForm, AttendanceForm, BulkAttendanceForm, RegistrationForm,
    RoomAssignmentForm, RoomForm, StudentProfileForm, ValidationError,
};
pub use repository::{HostelStore, Ledger, MemoryStore, RepositoryError};
pub use roster::{RoomImportError, RoomImportSummary};
pub use router::{hostel_router, CallerId, Submitted, IDENTITY_HEADER, NON_FIELD_ERRORS};
pub use service::{HostelService, HostelServiceError, ProfileSaved};
pub use views::{
    AnnouncementFilter, AnnouncementView, AssignmentChoices, AttendanceFilter, AttendanceRow,
    Dashboard, Flash, FlashLevel, Landing, OccupancyDrift, OccupancyEntry, OccupancyReport,
    RoomDetail, RoomFilter, StudentFilter, StudentRow,
};
