//! Keeps `Room::is_available` in step with student room assignments.
//!
//! Three paths mutate occupancy and all of them run inside one store transaction:
//!
//! * [`reassign`]: student self-service. Frees the old room, then claims the new one, and
//!   writes both rooms before the student's new reference.
//! * [`enroll`]: administrator bulk creation. Creates identity and profile, then claims the
//!   pre-selected room.
//! * [`save_room`]: administrator room create/edit. Writes room fields only, including
//!   `is_available`, and never reads or writes a student's room reference.
//!
//! The flag is never recomputed from residents. [`audit`] reports rooms whose flag
//! disagrees with their residents without repairing them.

use std::collections::BTreeMap;

use tracing::debug;

use super::domain::{NewIdentity, NewStudent, Room, RoomId, Student};
use super::forms::{
    AdminCreateUserForm, ProfileDraft, RoomAssignmentForm, RoomForm, ValidationError,
};
use super::repository::Ledger;
use super::rooms;
use super::service::HostelServiceError;
use super::students;
use super::views::{OccupancyDrift, OccupancyEntry, OccupancyReport};

pub(crate) const INVALID_ROOM_CHOICE: &str =
    "Select a valid choice. That choice is not one of the available choices.";
pub(crate) const USERNAME_EXISTS: &str = "Username already exists";
pub(crate) const ROLL_NUMBER_EXISTS: &str = "Roll number already exists";

/// A room may be chosen only while it is flagged available.
fn is_offered(ledger: &dyn Ledger, room: RoomId) -> Result<bool, HostelServiceError> {
    Ok(ledger.room(room)?.is_some_and(|room| room.is_available))
}

fn set_available(
    ledger: &mut dyn Ledger,
    room: RoomId,
    is_available: bool,
) -> Result<Room, HostelServiceError> {
    let mut stored = rooms::get(ledger, room)?;
    stored.is_available = is_available;
    ledger.save_room(&stored)?;
    debug!(room_id = %room, is_available, "room availability updated");
    Ok(stored)
}

/// Self-service reassignment for `student`.
///
/// The choice must come from the rooms currently flagged available, so the student's own
/// room (flagged unavailable) is rejected rather than treated as a no-op.
pub(crate) fn reassign(
    ledger: &mut dyn Ledger,
    mut student: Student,
    form: &RoomAssignmentForm,
) -> Result<Student, HostelServiceError> {
    if let Some(room) = form.room {
        if !is_offered(ledger, room)? {
            return Err(ValidationError::single("room", INVALID_ROOM_CHOICE).into());
        }
    }

    if let Some(previous) = student.room {
        set_available(ledger, previous, true)?;
    }
    if let Some(next) = form.room {
        set_available(ledger, next, false)?;
    }

    student.room = form.room;
    ledger.save_student(&student)?;
    Ok(student)
}

/// Administrator bulk creation of identity and profile with an optional room.
///
/// `sealed` is the pure form outcome with the password already hashed.
pub(crate) fn enroll(
    ledger: &mut dyn Ledger,
    form: &AdminCreateUserForm,
    sealed: Result<(NewIdentity, ProfileDraft), ValidationError>,
) -> Result<Student, HostelServiceError> {
    let mut extra = ValidationError::default();
    if students::username_taken(ledger, &form.username)? {
        extra.add("username", USERNAME_EXISTS);
    }
    if students::roll_number_taken(ledger, &form.roll_number, None)? {
        extra.add("roll_number", ROLL_NUMBER_EXISTS);
    }
    if let Some(room) = form.room {
        if !is_offered(ledger, room)? {
            extra.add("room", INVALID_ROOM_CHOICE);
        }
    }

    let (new_identity, profile) = ValidationError::combine(sealed, extra)?;
    let identity = ledger.insert_identity(new_identity)?;
    let student = ledger.insert_student(NewStudent {
        identity_id: identity.id,
        roll_number: profile.roll_number,
        phone_number: profile.phone_number,
        gender: profile.gender,
        room: form.room,
    })?;

    if let Some(room) = student.room {
        set_available(ledger, room, false)?;
    }
    Ok(student)
}

/// Administrator room create (`room == None`) or edit.
pub(crate) fn save_room(
    ledger: &mut dyn Ledger,
    room: Option<RoomId>,
    form: &RoomForm,
) -> Result<Room, HostelServiceError> {
    match room {
        Some(id) => rooms::update(ledger, id, form),
        None => rooms::create(ledger, form),
    }
}

pub(crate) fn audit(ledger: &dyn Ledger) -> Result<OccupancyReport, HostelServiceError> {
    let mut residents: BTreeMap<RoomId, usize> = BTreeMap::new();
    for student in ledger.students()? {
        if let Some(room) = student.room {
            *residents.entry(room).or_default() += 1;
        }
    }

    let rooms = ledger
        .rooms()?
        .into_iter()
        .map(|room| {
            let count = residents.get(&room.id).copied().unwrap_or(0);
            let drift = match (room.is_available, count) {
                (true, count) if count > 0 => Some(OccupancyDrift::AvailableWithResidents),
                (false, 0) => Some(OccupancyDrift::UnavailableWithoutResidents),
                _ => None,
            };
            OccupancyEntry {
                room_id: room.id,
                room_number: room.room_number,
                is_available: room.is_available,
                residents: count,
                capacity: room.capacity,
                drift,
            }
        })
        .collect();

    Ok(OccupancyReport { rooms })
}
