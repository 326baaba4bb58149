use std::io::Cursor;
use std::sync::Arc;

use super::common::*;
use crate::residence::access::AdminAction;
use crate::residence::credentials::CredentialPolicy;
use crate::residence::domain::RoomId;
use crate::residence::service::{HostelService, HostelServiceError};
use crate::residence::views::{FlashLevel, Landing, OccupancyDrift};

#[test]
fn self_service_reassignment_moves_the_occupied_flag() {
    let (service, store) = build_service();
    let admin = seed_admin(&service);
    let first = seed_room(&service, &admin, "101");
    let second = seed_room(&service, &admin, "102");
    let (identity, student) = register_student(&service, "asha", "CS-1");

    let student_after = service
        .assign_room(&identity, &choose(Some(first.id)))
        .expect("first claim");
    assert_eq!(student_after.room, Some(first.id));
    assert!(!stored_room(&store, first.id).is_available);

    service
        .assign_room(&identity, &choose(Some(second.id)))
        .expect("move to second");
    assert!(stored_room(&store, first.id).is_available);
    assert!(!stored_room(&store, second.id).is_available);
    assert_eq!(stored_student(&store, &student).room, Some(second.id));
}

#[test]
fn current_room_is_not_offered_back_to_its_resident() {
    let (service, store) = build_service();
    let admin = seed_admin(&service);
    let room = seed_room(&service, &admin, "101");
    let (identity, student) = register_student(&service, "asha", "CS-1");
    service
        .assign_room(&identity, &choose(Some(room.id)))
        .expect("claim");

    match service.assign_room(&identity, &choose(Some(room.id))) {
        Err(HostelServiceError::Validation(errors)) => {
            assert_eq!(errors.field("room").len(), 1);
        }
        other => panic!("expected validation error, got {other:?}"),
    }

    assert!(!stored_room(&store, room.id).is_available);
    assert_eq!(stored_student(&store, &student).room, Some(room.id));
}

#[test]
fn unknown_room_choice_is_rejected_without_side_effects() {
    let (service, store) = build_service();
    let admin = seed_admin(&service);
    let room = seed_room(&service, &admin, "101");
    let (identity, student) = register_student(&service, "asha", "CS-1");
    service
        .assign_room(&identity, &choose(Some(room.id)))
        .expect("claim");

    let result = service.assign_room(&identity, &choose(Some(RoomId(999))));
    assert!(matches!(result, Err(HostelServiceError::Validation(_))));
    assert!(!stored_room(&store, room.id).is_available);
    assert_eq!(stored_student(&store, &student).room, Some(room.id));
}

#[test]
fn administrator_enrollment_claims_the_selected_room() {
    let (service, store) = build_service();
    let admin = seed_admin(&service);
    let room = seed_room(&service, &admin, "201");
    let create = capability(&service, &admin, AdminAction::CreateUser);

    let row = service
        .create_student_account(&create, &admin_user_form("kiran", "EE-7", Some(room.id)))
        .expect("student created");

    assert_eq!(row.username, "kiran");
    assert_eq!(row.room_id, Some(room.id));
    assert_eq!(row.room_number.as_deref(), Some("201"));
    assert!(!stored_room(&store, room.id).is_available);

    let identity = service.identity(row.identity_id).expect("identity stored");
    assert!(!identity.is_staff);
    assert!(CredentialPolicy::verify(STUDENT_PASSWORD, &identity.password_hash));
}

#[test]
fn enrollment_into_a_taken_room_creates_nothing() {
    let (service, store) = build_service();
    let admin = seed_admin(&service);
    let room = seed_room(&service, &admin, "201");
    let create = capability(&service, &admin, AdminAction::CreateUser);
    service
        .create_student_account(&create, &admin_user_form("kiran", "EE-7", Some(room.id)))
        .expect("first student");
    let identities_before = identity_count(&store);

    match service.create_student_account(&create, &admin_user_form("ravi", "EE-8", Some(room.id))) {
        Err(HostelServiceError::Validation(errors)) => {
            assert_eq!(
                errors.field("room"),
                ["Select a valid choice. That choice is not one of the available choices."
                    .to_string()]
            );
        }
        other => panic!("expected validation error, got {other:?}"),
    }
    assert_eq!(identity_count(&store), identities_before);
}

#[test]
fn enrollment_reports_every_problem_at_once() {
    let (service, _store) = build_service();
    let admin = seed_admin(&service);
    let create = capability(&service, &admin, AdminAction::CreateUser);
    service
        .create_student_account(&create, &admin_user_form("kiran", "EE-7", None))
        .expect("first student");

    let mut form = admin_user_form("kiran", "EE-7", None);
    form.confirm_password = "something-else".to_string();

    match service.create_student_account(&create, &form) {
        Err(HostelServiceError::Validation(errors)) => {
            assert_eq!(errors.field("username"), ["Username already exists".to_string()]);
            assert_eq!(
                errors.field("roll_number"),
                ["Roll number already exists".to_string()]
            );
            assert_eq!(
                errors.field("confirm_password"),
                ["Passwords don't match".to_string()]
            );
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn administrator_toggle_desynchronizes_without_touching_residents() {
    let (service, store) = build_service();
    let admin = seed_admin(&service);
    let room = seed_room(&service, &admin, "101");
    let (identity, student) = register_student(&service, "asha", "CS-1");
    service
        .assign_room(&identity, &choose(Some(room.id)))
        .expect("claim");

    let edit = capability(&service, &admin, AdminAction::EditRooms);
    service
        .save_room(&edit, Some(room.id), &room_form("101", "S", 1, true))
        .expect("toggle available");

    assert!(stored_room(&store, room.id).is_available);
    assert_eq!(stored_student(&store, &student).room, Some(room.id));

    let report = service
        .occupancy_report(&capability(&service, &admin, AdminAction::ViewOccupancy))
        .expect("report");
    let entry = report
        .rooms
        .iter()
        .find(|entry| entry.room_id == room.id)
        .expect("room listed");
    assert_eq!(entry.residents, 1);
    assert_eq!(entry.drift, Some(OccupancyDrift::AvailableWithResidents));

    // The flag now offers the room to a second student.
    let (other, _) = register_student(&service, "bela", "CS-2");
    service
        .assign_room(&other, &choose(Some(room.id)))
        .expect("room offered again");
    let report = service
        .occupancy_report(&capability(&service, &admin, AdminAction::ViewOccupancy))
        .expect("report");
    assert_eq!(report.rooms[0].residents, 2);
    assert!(report.is_consistent());
}

#[test]
fn room_edit_keeps_its_own_number_but_not_another() {
    let (service, store) = build_service();
    let admin = seed_admin(&service);
    let first = seed_room(&service, &admin, "101");
    seed_room(&service, &admin, "102");
    let edit = capability(&service, &admin, AdminAction::EditRooms);

    let updated = service
        .save_room(&edit, Some(first.id), &room_form("101", "D", 2, true))
        .expect("same number accepted");
    assert_eq!(updated.capacity, 2);

    match service.save_room(&edit, Some(first.id), &room_form("102", "D", 2, true)) {
        Err(HostelServiceError::Validation(errors)) => {
            assert_eq!(
                errors.field("room_number"),
                ["Room with this number already exists.".to_string()]
            );
        }
        other => panic!("expected validation error, got {other:?}"),
    }
    assert_eq!(stored_room(&store, first.id).room_number, "101");

    let duplicate = service.save_room(&edit, None, &room_form("102", "S", 1, true));
    assert!(matches!(duplicate, Err(HostelServiceError::Validation(_))));
}

#[test]
fn editing_a_missing_room_is_not_found() {
    let (service, _store) = build_service();
    let admin = seed_admin(&service);
    let edit = capability(&service, &admin, AdminAction::EditRooms);

    let result = service.save_room(&edit, Some(RoomId(42)), &room_form("999", "S", 1, true));
    assert!(matches!(
        result,
        Err(HostelServiceError::NotFound { entity: "room", id: 42 })
    ));
}

#[test]
fn administrators_are_steered_away_from_self_service() {
    let (service, _store) = build_service();
    let admin = seed_admin(&service);
    let room = seed_room(&service, &admin, "101");

    match service.assign_room(&admin, &choose(Some(room.id))) {
        Err(HostelServiceError::Access(denied)) => {
            assert_eq!(denied.level, FlashLevel::Info);
            assert_eq!(denied.redirect, Landing::AdminPanel);
        }
        other => panic!("expected access denial, got {other:?}"),
    }
}

#[test]
fn reassignment_without_profile_asks_for_one() {
    let (service, store) = build_service();
    let admin = seed_admin(&service);
    let room = seed_room(&service, &admin, "101");
    let bare = bare_identity(&store, "porter");

    let result = service.assign_room(&bare, &choose(Some(room.id)));
    assert!(matches!(result, Err(HostelServiceError::MissingProfile(_))));
}

#[test]
fn unavailable_store_surfaces_repository_errors() {
    let service = HostelService::new(Arc::new(UnavailableStore), CredentialPolicy::new(4));
    let result = service.rooms();
    assert!(matches!(result, Err(HostelServiceError::Repository(_))));
}

#[test]
fn roster_import_creates_valid_rows_and_reports_the_rest() {
    let (service, store) = build_service();
    let admin = seed_admin(&service);
    seed_room(&service, &admin, "101");
    let edit = capability(&service, &admin, AdminAction::EditRooms);

    let csv = "room_number,room_type,capacity,is_available\n\
               201,D,2,true\n\
               101,S,1,\n\
               202,Quad,4,\n\
               203,T,,no\n";
    let summary = service
        .import_rooms(&edit, Cursor::new(csv))
        .expect("import runs");

    assert_eq!(summary.created, vec!["201".to_string(), "203".to_string()]);
    let rejected_lines: Vec<usize> = summary.rejected.iter().map(|(line, _)| *line).collect();
    assert_eq!(rejected_lines, vec![3, 4]);
    assert_eq!(
        summary.rejected[0].1.field("room_number"),
        ["Room with this number already exists.".to_string()]
    );

    let rooms = service.rooms().expect("rooms listed");
    let imported = rooms
        .iter()
        .find(|room| room.room_number == "203")
        .expect("203 imported");
    assert_eq!(imported.capacity, 1);
    assert!(!stored_room(&store, imported.id).is_available);
}
