use super::domain::{NewRoom, Room, RoomId};
use super::forms::{RoomForm, ValidationError};
use super::repository::{Ledger, RepositoryError};
use super::service::HostelServiceError;
use super::students;
use super::views::{matches_search, RoomDetail, RoomFilter};

pub(crate) const DUPLICATE_ROOM_NUMBER: &str = "Room with this number already exists.";

pub(crate) fn get(ledger: &dyn Ledger, id: RoomId) -> Result<Room, HostelServiceError> {
    ledger.room(id)?.ok_or(HostelServiceError::NotFound {
        entity: "room",
        id: id.0,
    })
}

pub(crate) fn create(ledger: &mut dyn Ledger, form: &RoomForm) -> Result<Room, HostelServiceError> {
    let mut extra = ValidationError::default();
    let room_number = form.room_number.trim();
    if !room_number.is_empty() && ledger.room_by_number(room_number)?.is_some() {
        extra.add("room_number", DUPLICATE_ROOM_NUMBER);
    }

    let draft = ValidationError::combine(form.clean(), extra)?;
    let room = ledger.insert_room(NewRoom {
        room_number: draft.room_number,
        room_type: draft.room_type,
        capacity: draft.capacity,
        is_available: draft.is_available,
    })?;
    Ok(room)
}

/// Overwrite every room field, including `is_available`, from the form.
pub(crate) fn update(
    ledger: &mut dyn Ledger,
    id: RoomId,
    form: &RoomForm,
) -> Result<Room, HostelServiceError> {
    let mut room = get(ledger, id)?;
    let draft = form.clean()?;

    room.room_number = draft.room_number;
    room.room_type = draft.room_type;
    room.capacity = draft.capacity;
    room.is_available = draft.is_available;

    match ledger.save_room(&room) {
        Ok(()) => Ok(room),
        // The edited number belongs to another room: the store's unique constraint.
        Err(RepositoryError::Conflict(_)) => {
            Err(ValidationError::single("room_number", DUPLICATE_ROOM_NUMBER).into())
        }
        Err(other) => Err(other.into()),
    }
}

pub(crate) fn list(ledger: &dyn Ledger, filter: &RoomFilter) -> Result<Vec<Room>, RepositoryError> {
    Ok(ledger
        .rooms()?
        .into_iter()
        .filter(|room| filter.room_type.map_or(true, |kind| room.room_type == kind))
        .filter(|room| {
            filter
                .is_available
                .map_or(true, |flag| room.is_available == flag)
        })
        .filter(|room| matches_search(filter.search.as_deref(), &[room.room_number.as_str()]))
        .collect())
}

/// Rooms a new assignment may choose from.
pub(crate) fn available(ledger: &dyn Ledger) -> Result<Vec<Room>, RepositoryError> {
    list(
        ledger,
        &RoomFilter {
            is_available: Some(true),
            ..RoomFilter::default()
        },
    )
}

pub(crate) fn detail(ledger: &dyn Ledger, id: RoomId) -> Result<RoomDetail, HostelServiceError> {
    let room = get(ledger, id)?;
    let residents = ledger
        .students()?
        .iter()
        .filter(|student| student.room == Some(id))
        .map(|student| students::row(ledger, student))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RoomDetail {
        label: room.label(),
        room,
        residents,
    })
}
