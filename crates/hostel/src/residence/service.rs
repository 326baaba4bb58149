use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use chrono::{Local, Utc};
use tracing::{info, warn};

use super::access::{AccessDenied, AccessGuard, AdminAction, AdminCapability};
use super::announcements;
use super::attendance::{self, BulkAttendanceSummary};
use super::credentials::CredentialPolicy;
use super::domain::{
    Announcement, Attendance, Identity, IdentityId, Room, RoomId, Student,
};
use super::forms::{
    AdminCreateUserForm, AnnouncementForm, AttendanceForm, BulkAttendanceForm, IdentityDraft,
    RegistrationForm, RoomAssignmentForm, RoomForm, StudentProfileForm, ValidationError,
};
use super::occupancy;
use super::repository::{HostelStore, RepositoryError};
use super::roster::{self, RoomImportError, RoomImportSummary};
use super::rooms;
use super::students;
use super::views::{
    AdminDashboard, AnnouncementFilter, AnnouncementView, AssignmentChoices, AttendanceFilter,
    AttendanceRow, Dashboard, OccupancyReport, RoomDetail, RoomFilter, StudentDashboard,
    StudentFilter, StudentRow,
};

const DASHBOARD_ANNOUNCEMENTS: usize = 5;
const DASHBOARD_ATTENDANCE: usize = 5;
const ADMIN_RECENT_ATTENDANCE: usize = 10;

pub(crate) const STAFF_USERNAME_TAKEN: &str =
    "A non-administrator user with that username already exists.";

/// Error raised by the hostel service.
#[derive(Debug, thiserror::Error)]
pub enum HostelServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Access(#[from] AccessDenied),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: u64 },
    #[error("identity {0} is not known")]
    UnknownIdentity(IdentityId),
    #[error("identity {0} has no student profile")]
    MissingProfile(IdentityId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("password hashing failed: {0}")]
    Credentials(#[from] bcrypt::BcryptError),
}

/// Result of a profile submission; a caller without a profile gets one created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileSaved {
    Created(Student),
    Updated(Student),
}

/// Service composing the room registry, student directory, occupancy coordinator,
/// attendance ledger and announcement board over a transactional store.
pub struct HostelService<S> {
    store: Arc<S>,
    credentials: CredentialPolicy,
}

impl<S> HostelService<S>
where
    S: HostelStore + 'static,
{
    pub fn new(store: Arc<S>, credentials: CredentialPolicy) -> Self {
        Self { store, credentials }
    }

    /// Resolve the authenticated caller.
    pub fn identity(&self, id: IdentityId) -> Result<Identity, HostelServiceError> {
        self.store
            .read(|ledger| ledger.identity(id))?
            .ok_or(HostelServiceError::UnknownIdentity(id))
    }

    pub fn authorize(
        &self,
        identity: &Identity,
        action: AdminAction,
    ) -> Result<AdminCapability, AccessDenied> {
        AccessGuard::require_admin(identity, action).inspect_err(|_| {
            warn!(identity_id = %identity.id, ?action, "administrator action refused");
        })
    }

    /// Create an administrator identity, or return the existing one with that username.
    /// A username already held by a non-administrator is a validation error.
    pub fn ensure_staff(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Identity, HostelServiceError> {
        if let Some(existing) = self
            .store
            .read(|ledger| ledger.identity_by_username(username))?
        {
            if !existing.is_staff {
                warn!(
                    identity_id = %existing.id,
                    username,
                    "administrator username held by a non-administrator"
                );
                return Err(ValidationError::single("username", STAFF_USERNAME_TAKEN).into());
            }
            return Ok(existing);
        }

        let sealed = self.credentials.seal(
            IdentityDraft {
                username: username.to_string(),
                first_name: String::new(),
                last_name: String::new(),
                email: email.to_string(),
                password: password.to_string(),
            },
            true,
        )?;
        let identity = self
            .store
            .transaction(|ledger| ledger.insert_identity(sealed))?;
        info!(identity_id = %identity.id, username, "administrator identity created");
        Ok(identity)
    }

    /// Self-registration of an identity and student profile.
    pub fn register(&self, form: &RegistrationForm) -> Result<Student, HostelServiceError> {
        // Hash before the transaction so the store lock is not held across bcrypt.
        let sealed = match form.clean() {
            Ok(draft) => Ok((self.credentials.seal(draft.identity, false)?, draft.profile)),
            Err(errors) => Err(errors),
        };

        let student = self
            .store
            .transaction(|ledger| students::register(ledger, form, sealed))?;
        info!(student_id = %student.id, identity_id = %student.identity_id, "student registered");
        Ok(student)
    }

    pub fn dashboard(&self, identity: &Identity) -> Result<Dashboard, HostelServiceError> {
        self.store.read(|ledger| {
            let latest = announcements::views(
                ledger,
                &AnnouncementFilter::default(),
                Some(DASHBOARD_ANNOUNCEMENTS),
            )?;

            if identity.is_staff {
                let rooms = ledger.rooms()?;
                let mut recent_attendance = attendance::rows(ledger, &AttendanceFilter::default())?;
                recent_attendance.truncate(ADMIN_RECENT_ATTENDANCE);
                return Ok(Dashboard::Admin(AdminDashboard {
                    student_count: ledger.students()?.len(),
                    room_count: rooms.len(),
                    available_rooms: rooms.iter().filter(|room| room.is_available).count(),
                    announcement_count: ledger.announcements()?.len(),
                    announcements: latest,
                    recent_attendance,
                }));
            }

            let student = students::require_profile(ledger, identity)?;
            let room = match student.room {
                Some(room) => ledger.room(room)?,
                None => None,
            };
            let attendance = attendance::recent_for(ledger, student.id, DASHBOARD_ATTENDANCE)?;
            Ok(Dashboard::Student(StudentDashboard {
                student,
                room,
                attendance,
                announcements: latest,
            }))
        })
    }

    /// The caller's profile; `None` means the caller still has to create one.
    pub fn profile(&self, identity: &Identity) -> Result<Option<Student>, HostelServiceError> {
        if identity.is_staff {
            return Err(AccessDenied::staff_on_student_flow(
                "Admin users can manage their profile in the admin panel.",
            )
            .into());
        }
        Ok(self
            .store
            .read(|ledger| ledger.student_for_identity(identity.id))?)
    }

    pub fn save_profile(
        &self,
        identity: &Identity,
        form: &StudentProfileForm,
    ) -> Result<ProfileSaved, HostelServiceError> {
        if identity.is_staff {
            return Err(AccessDenied::staff_on_student_flow(
                "Admin users can manage their profile in the admin panel.",
            )
            .into());
        }

        let saved = self.store.transaction(|ledger| {
            match ledger.student_for_identity(identity.id)? {
                Some(student) => {
                    students::update_profile(ledger, student, form).map(ProfileSaved::Updated)
                }
                None => {
                    students::create_profile(ledger, identity, form).map(ProfileSaved::Created)
                }
            }
        })?;
        info!(identity_id = %identity.id, "student profile saved");
        Ok(saved)
    }

    pub fn rooms(&self) -> Result<Vec<Room>, HostelServiceError> {
        Ok(self
            .store
            .read(|ledger| rooms::list(ledger, &RoomFilter::default()))?)
    }

    pub fn room_detail(&self, id: RoomId) -> Result<RoomDetail, HostelServiceError> {
        self.store.read(|ledger| rooms::detail(ledger, id))
    }

    /// Current room and the rooms open for self-service assignment.
    pub fn assignment_choices(
        &self,
        identity: &Identity,
    ) -> Result<AssignmentChoices, HostelServiceError> {
        ensure_student_flow(identity)?;
        self.store.read(|ledger| {
            let student = students::require_profile(ledger, identity)?;
            let current_room = match student.room {
                Some(room) => ledger.room(room)?,
                None => None,
            };
            Ok(AssignmentChoices {
                current_room,
                available_rooms: rooms::available(ledger)?,
            })
        })
    }

    /// Self-service room assignment.
    pub fn assign_room(
        &self,
        identity: &Identity,
        form: &RoomAssignmentForm,
    ) -> Result<Student, HostelServiceError> {
        ensure_student_flow(identity)?;
        let student = self.store.transaction(|ledger| {
            let student = students::require_profile(ledger, identity)?;
            occupancy::reassign(ledger, student, form)
        })?;
        info!(
            student_id = %student.id,
            room_id = ?student.room.map(|room| room.0),
            "room assignment updated"
        );
        Ok(student)
    }

    pub fn announcements(&self) -> Result<Vec<AnnouncementView>, HostelServiceError> {
        self.store.read(|ledger| {
            announcements::views(ledger, &AnnouncementFilter::default(), None)
        })
    }

    pub fn post_announcement(
        &self,
        capability: &AdminCapability,
        form: &AnnouncementForm,
    ) -> Result<Announcement, HostelServiceError> {
        let draft = form.clean()?;
        let announcement = self.store.transaction(|ledger| {
            announcements::post(ledger, capability.identity(), draft, Utc::now())
        })?;
        info!(
            announcement_id = announcement.id.0,
            admin = %capability.identity(),
            "announcement posted"
        );
        Ok(announcement)
    }

    pub fn mark_attendance(
        &self,
        capability: &AdminCapability,
        form: &AttendanceForm,
    ) -> Result<Attendance, HostelServiceError> {
        let draft = form.clean(Local::now().date_naive())?;
        let record = self
            .store
            .transaction(|ledger| attendance::mark(ledger, draft))?;
        info!(
            student_id = %record.student_id,
            date = %record.date,
            is_present = record.is_present,
            admin = %capability.identity(),
            "attendance marked"
        );
        Ok(record)
    }

    /// Students listed on the attendance forms.
    pub fn attendance_roster(
        &self,
        _capability: &AdminCapability,
    ) -> Result<Vec<StudentRow>, HostelServiceError> {
        self.store
            .read(|ledger| students::rows(ledger, &StudentFilter::default()))
    }

    pub fn mark_bulk_attendance(
        &self,
        capability: &AdminCapability,
        form: &BulkAttendanceForm,
    ) -> Result<BulkAttendanceSummary, HostelServiceError> {
        let date = form.clean()?;
        let summary = self
            .store
            .transaction(|ledger| attendance::mark_bulk(ledger, date, form))?;
        info!(
            date = %summary.date,
            present = summary.present,
            absent = summary.absent,
            admin = %capability.identity(),
            "bulk attendance marked"
        );
        Ok(summary)
    }

    /// Rooms an administrator may pre-select while creating a student.
    pub fn enrollment_rooms(
        &self,
        _capability: &AdminCapability,
    ) -> Result<Vec<Room>, HostelServiceError> {
        Ok(self.store.read(|ledger| rooms::available(ledger))?)
    }

    /// Administrator bulk creation of identity, profile and optional room.
    pub fn create_student_account(
        &self,
        capability: &AdminCapability,
        form: &AdminCreateUserForm,
    ) -> Result<StudentRow, HostelServiceError> {
        let sealed = match form.clean() {
            Ok(draft) => Ok((self.credentials.seal(draft.identity, false)?, draft.profile)),
            Err(errors) => Err(errors),
        };

        let row = self.store.transaction(|ledger| {
            let student = occupancy::enroll(ledger, form, sealed)?;
            students::row(ledger, &student)
        })?;
        info!(
            student_id = %row.student_id,
            username = %row.username,
            room_id = ?row.room_id.map(|room| room.0),
            admin = %capability.identity(),
            "student account created"
        );
        Ok(row)
    }

    pub fn student_rows(
        &self,
        _capability: &AdminCapability,
        filter: &StudentFilter,
    ) -> Result<Vec<StudentRow>, HostelServiceError> {
        self.store
            .read(|ledger| students::rows(ledger, filter))
    }

    pub fn admin_rooms(
        &self,
        _capability: &AdminCapability,
        filter: &RoomFilter,
    ) -> Result<Vec<Room>, HostelServiceError> {
        Ok(self.store.read(|ledger| rooms::list(ledger, filter))?)
    }

    pub fn room_for_edit(
        &self,
        _capability: &AdminCapability,
        id: RoomId,
    ) -> Result<Room, HostelServiceError> {
        self.store.read(|ledger| rooms::get(ledger, id))
    }

    /// Administrator room create (`id == None`) or edit. Student records are not consulted.
    pub fn save_room(
        &self,
        capability: &AdminCapability,
        id: Option<RoomId>,
        form: &RoomForm,
    ) -> Result<Room, HostelServiceError> {
        let room = self
            .store
            .transaction(|ledger| occupancy::save_room(ledger, id, form))?;
        info!(
            room_id = %room.id,
            room_number = %room.room_number,
            is_available = room.is_available,
            created = id.is_none(),
            admin = %capability.identity(),
            "room saved"
        );
        Ok(room)
    }

    pub fn attendance_records(
        &self,
        _capability: &AdminCapability,
        filter: &AttendanceFilter,
    ) -> Result<Vec<AttendanceRow>, HostelServiceError> {
        self.store
            .read(|ledger| attendance::rows(ledger, filter))
    }

    pub fn announcement_board(
        &self,
        _capability: &AdminCapability,
        filter: &AnnouncementFilter,
    ) -> Result<Vec<AnnouncementView>, HostelServiceError> {
        self.store
            .read(|ledger| announcements::views(ledger, filter, None))
    }

    pub fn occupancy_report(
        &self,
        _capability: &AdminCapability,
    ) -> Result<OccupancyReport, HostelServiceError> {
        let report = self.store.read(|ledger| occupancy::audit(ledger))?;
        let drifted = report.drifted().count();
        if drifted > 0 {
            warn!(drifted, "room availability flags disagree with residents");
        }
        Ok(report)
    }

    /// Create rooms from a CSV roster through the administrator room-create path.
    /// A bad row is reported and skipped; only read or store failures abort the import.
    pub fn import_rooms<R: Read>(
        &self,
        capability: &AdminCapability,
        reader: R,
    ) -> Result<RoomImportSummary, RoomImportError> {
        let mut summary = RoomImportSummary::default();

        for (line, entry) in roster::parse_roster(reader)? {
            let saved = entry
                .map_err(HostelServiceError::from)
                .and_then(|form| self.save_room(capability, None, &form));
            match saved {
                Ok(room) => summary.created.push(room.room_number),
                Err(HostelServiceError::Validation(errors)) => {
                    warn!(line, %errors, "roster row rejected");
                    summary.rejected.push((line, errors));
                }
                Err(other) => return Err(other.into()),
            }
        }

        info!(
            created = summary.created.len(),
            rejected = summary.rejected.len(),
            admin = %capability.identity(),
            "room roster imported"
        );
        Ok(summary)
    }

    pub fn import_rooms_from_path<P: AsRef<Path>>(
        &self,
        capability: &AdminCapability,
        path: P,
    ) -> Result<RoomImportSummary, RoomImportError> {
        let file = std::fs::File::open(path)?;
        self.import_rooms(capability, file)
    }
}

fn ensure_student_flow(identity: &Identity) -> Result<(), AccessDenied> {
    if identity.is_staff {
        return Err(AccessDenied::staff_on_student_flow(
            "Admin users should manage room assignments through the admin panel.",
        ));
    }
    Ok(())
}
