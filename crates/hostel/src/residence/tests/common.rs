use std::sync::Arc;

use axum::response::Response;
use serde_json::Value;

use crate::residence::access::{AdminAction, AdminCapability};
use crate::residence::credentials::CredentialPolicy;
use crate::residence::domain::{Identity, NewIdentity, Room, RoomId, Student};
use crate::residence::forms::{
    AdminCreateUserForm, RegistrationForm, RoomAssignmentForm, RoomForm, StudentProfileForm,
};
use crate::residence::repository::{HostelStore, Ledger, MemoryStore, RepositoryError};
use crate::residence::service::HostelService;

pub(super) const ADMIN_PASSWORD: &str = "warden-keys-2025";
pub(super) const STUDENT_PASSWORD: &str = "dorm-life-2025";

pub(super) fn build_service() -> (HostelService<MemoryStore>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let service = HostelService::new(store.clone(), CredentialPolicy::new(4));
    (service, store)
}

pub(super) fn seed_admin(service: &HostelService<MemoryStore>) -> Identity {
    service
        .ensure_staff("warden", "warden@example.edu", ADMIN_PASSWORD)
        .expect("administrator seeded")
}

pub(super) fn capability(
    service: &HostelService<MemoryStore>,
    admin: &Identity,
    action: AdminAction,
) -> AdminCapability {
    service
        .authorize(admin, action)
        .expect("administrator authorized")
}

pub(super) fn room_form(number: &str, room_type: &str, capacity: i64, available: bool) -> RoomForm {
    RoomForm {
        room_number: number.to_string(),
        room_type: room_type.to_string(),
        capacity: Some(capacity),
        is_available: Some(available),
    }
}

pub(super) fn seed_room(
    service: &HostelService<MemoryStore>,
    admin: &Identity,
    number: &str,
) -> Room {
    let capability = capability(service, admin, AdminAction::EditRooms);
    service
        .save_room(&capability, None, &room_form(number, "S", 1, true))
        .expect("room created")
}

pub(super) fn registration(username: &str, roll_number: &str) -> RegistrationForm {
    RegistrationForm {
        username: username.to_string(),
        first_name: "Asha".to_string(),
        last_name: "Rao".to_string(),
        email: format!("{username}@example.edu"),
        password1: STUDENT_PASSWORD.to_string(),
        password2: STUDENT_PASSWORD.to_string(),
        profile: StudentProfileForm {
            roll_number: roll_number.to_string(),
            phone_number: "5550101".to_string(),
            gender: "F".to_string(),
        },
    }
}

pub(super) fn register_student(
    service: &HostelService<MemoryStore>,
    username: &str,
    roll_number: &str,
) -> (Identity, Student) {
    let student = service
        .register(&registration(username, roll_number))
        .expect("registration succeeds");
    let identity = service
        .identity(student.identity_id)
        .expect("identity stored");
    (identity, student)
}

/// Non-administrator identity that never completed a student profile.
pub(super) fn bare_identity(store: &MemoryStore, username: &str) -> Identity {
    store
        .transaction(|ledger| {
            ledger.insert_identity(NewIdentity {
                username: username.to_string(),
                first_name: String::new(),
                last_name: String::new(),
                email: format!("{username}@example.edu"),
                password_hash: String::new(),
                is_staff: false,
            })
        })
        .expect("identity inserted")
}

pub(super) fn admin_user_form(
    username: &str,
    roll_number: &str,
    room: Option<RoomId>,
) -> AdminCreateUserForm {
    AdminCreateUserForm {
        first_name: "Kiran".to_string(),
        last_name: "Das".to_string(),
        username: username.to_string(),
        email: format!("{username}@example.edu"),
        password: STUDENT_PASSWORD.to_string(),
        confirm_password: STUDENT_PASSWORD.to_string(),
        roll_number: roll_number.to_string(),
        phone_number: "5550199".to_string(),
        gender: "M".to_string(),
        room,
    }
}

pub(super) fn choose(room: Option<RoomId>) -> RoomAssignmentForm {
    RoomAssignmentForm { room }
}

pub(super) fn stored_room(store: &MemoryStore, id: RoomId) -> Room {
    store
        .transaction(|ledger| ledger.room(id))
        .expect("room readable")
        .expect("room exists")
}

pub(super) fn stored_student(store: &MemoryStore, student: &Student) -> Student {
    store
        .transaction(|ledger| ledger.student(student.id))
        .expect("student readable")
        .expect("student exists")
}

pub(super) fn identity_count(store: &MemoryStore) -> usize {
    store
        .transaction(|ledger| ledger.identities())
        .expect("identities readable")
        .len()
}

/// Store whose every transaction fails before touching data.
pub(super) struct UnavailableStore;

impl HostelStore for UnavailableStore {
    fn transaction<T, E, F>(&self, _work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn Ledger) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        Err(E::from(RepositoryError::Unavailable(
            "database offline".to_string(),
        )))
    }

    fn read<T, E, F>(&self, _work: F) -> Result<T, E>
    where
        F: FnOnce(&dyn Ledger) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        Err(E::from(RepositoryError::Unavailable(
            "database offline".to_string(),
        )))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
