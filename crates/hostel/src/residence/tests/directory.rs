use super::common::*;
use crate::residence::access::AdminAction;
use crate::residence::credentials::CredentialPolicy;
use crate::residence::domain::Gender;
use crate::residence::forms::StudentProfileForm;
use crate::residence::service::{HostelServiceError, ProfileSaved};
use crate::residence::views::{Dashboard, FlashLevel, Landing, StudentFilter};

#[test]
fn registration_creates_identity_and_profile_without_room() {
    let (service, _store) = build_service();
    let (identity, student) = register_student(&service, "asha", "CS-1");

    assert!(!identity.is_staff);
    assert_eq!(identity.email, "asha@example.edu");
    assert!(CredentialPolicy::verify(STUDENT_PASSWORD, &identity.password_hash));
    assert_eq!(student.roll_number, "CS-1");
    assert_eq!(student.gender, Gender::Female);
    assert_eq!(student.room, None);
}

#[test]
fn registration_rejects_taken_username_and_roll_number() {
    let (service, store) = build_service();
    register_student(&service, "asha", "CS-1");
    let before = identity_count(&store);

    match service.register(&registration("asha", "CS-1")) {
        Err(HostelServiceError::Validation(errors)) => {
            assert_eq!(
                errors.field("username"),
                ["A user with that username already exists.".to_string()]
            );
            assert_eq!(
                errors.field("roll_number"),
                ["Student with this Roll number already exists.".to_string()]
            );
        }
        other => panic!("expected validation error, got {other:?}"),
    }
    assert_eq!(identity_count(&store), before);
}

#[test]
fn profile_is_created_then_updated_for_bare_identities() {
    let (service, store) = build_service();
    let identity = bare_identity(&store, "bela");
    assert_eq!(service.profile(&identity).expect("profile lookup"), None);

    let form = StudentProfileForm {
        roll_number: "ME-4".to_string(),
        phone_number: "5550144".to_string(),
        gender: "F".to_string(),
    };
    let created = match service.save_profile(&identity, &form).expect("profile saved") {
        ProfileSaved::Created(student) => student,
        other => panic!("expected creation, got {other:?}"),
    };
    assert_eq!(created.room, None);

    let form = StudentProfileForm {
        phone_number: "5550999".to_string(),
        ..form
    };
    match service.save_profile(&identity, &form).expect("profile saved") {
        ProfileSaved::Updated(student) => {
            assert_eq!(student.id, created.id);
            assert_eq!(student.phone_number, "5550999");
        }
        other => panic!("expected update, got {other:?}"),
    }
}

#[test]
fn profile_update_keeps_the_room_reference() {
    let (service, store) = build_service();
    let admin = seed_admin(&service);
    let room = seed_room(&service, &admin, "101");
    let (identity, student) = register_student(&service, "asha", "CS-1");
    service
        .assign_room(&identity, &choose(Some(room.id)))
        .expect("claim");

    let form = StudentProfileForm {
        roll_number: "CS-1".to_string(),
        phone_number: "5550000".to_string(),
        gender: "F".to_string(),
    };
    service
        .save_profile(&identity, &form)
        .expect("own roll number accepted");
    assert_eq!(stored_student(&store, &student).room, Some(room.id));
}

#[test]
fn administrators_manage_profiles_elsewhere() {
    let (service, _store) = build_service();
    let admin = seed_admin(&service);

    match service.profile(&admin) {
        Err(HostelServiceError::Access(denied)) => {
            assert_eq!(denied.level, FlashLevel::Info);
            assert_eq!(denied.redirect, Landing::AdminPanel);
            assert_eq!(
                denied.message,
                "Admin users can manage their profile in the admin panel."
            );
        }
        other => panic!("expected access denial, got {other:?}"),
    }
}

#[test]
fn student_rows_filter_by_gender_room_and_search() {
    let (service, _store) = build_service();
    let admin = seed_admin(&service);
    let room = seed_room(&service, &admin, "101");
    let create = capability(&service, &admin, AdminAction::CreateUser);
    service
        .create_student_account(&create, &admin_user_form("kiran", "EE-7", Some(room.id)))
        .expect("kiran");
    register_student(&service, "asha", "CS-1");

    let view = capability(&service, &admin, AdminAction::ViewUsers);
    let all = service
        .student_rows(&view, &StudentFilter::default())
        .expect("rows");
    assert_eq!(all.len(), 2);

    let women = service
        .student_rows(
            &view,
            &StudentFilter {
                gender: Some(Gender::Female),
                ..StudentFilter::default()
            },
        )
        .expect("rows");
    assert_eq!(women.len(), 1);
    assert_eq!(women[0].username, "asha");

    let housed = service
        .student_rows(
            &view,
            &StudentFilter {
                room: Some(room.id),
                ..StudentFilter::default()
            },
        )
        .expect("rows");
    assert_eq!(housed.len(), 1);
    assert_eq!(housed[0].room_number.as_deref(), Some("101"));

    let searched = service
        .student_rows(
            &view,
            &StudentFilter {
                search: Some("ee-".to_string()),
                ..StudentFilter::default()
            },
        )
        .expect("rows");
    assert_eq!(searched.len(), 1);
    assert_eq!(searched[0].username, "kiran");
}

#[test]
fn dashboards_differ_by_role() {
    let (service, store) = build_service();
    let admin = seed_admin(&service);
    let room = seed_room(&service, &admin, "101");
    seed_room(&service, &admin, "102");
    let (identity, _) = register_student(&service, "asha", "CS-1");
    service
        .assign_room(&identity, &choose(Some(room.id)))
        .expect("claim");

    match service.dashboard(&admin).expect("admin dashboard") {
        Dashboard::Admin(summary) => {
            assert_eq!(summary.student_count, 1);
            assert_eq!(summary.room_count, 2);
            assert_eq!(summary.available_rooms, 1);
        }
        other => panic!("expected admin dashboard, got {other:?}"),
    }

    match service.dashboard(&identity).expect("student dashboard") {
        Dashboard::Student(summary) => {
            assert_eq!(summary.room.map(|room| room.room_number), Some("101".to_string()));
        }
        other => panic!("expected student dashboard, got {other:?}"),
    }

    let bare = bare_identity(&store, "bela");
    assert!(matches!(
        service.dashboard(&bare),
        Err(HostelServiceError::MissingProfile(_))
    ));
}

#[test]
fn room_detail_lists_residents() {
    let (service, _store) = build_service();
    let admin = seed_admin(&service);
    let room = seed_room(&service, &admin, "101");
    let (identity, _) = register_student(&service, "asha", "CS-1");
    service
        .assign_room(&identity, &choose(Some(room.id)))
        .expect("claim");

    let detail = service.room_detail(room.id).expect("detail");
    assert_eq!(detail.label, "Room 101 (Single)");
    assert_eq!(detail.residents.len(), 1);
    assert_eq!(detail.residents[0].username, "asha");

    let choices = service.assignment_choices(&identity).expect("choices");
    assert_eq!(
        choices.current_room.map(|room| room.id),
        Some(room.id)
    );
    assert!(choices.available_rooms.is_empty());
}

#[test]
fn administrator_seed_refuses_a_student_username() {
    let (service, store) = build_service();
    let (student, _) = register_student(&service, "warden", "CS-9");
    let before = identity_count(&store);

    match service.ensure_staff("warden", "warden@example.edu", ADMIN_PASSWORD) {
        Err(HostelServiceError::Validation(errors)) => {
            assert_eq!(
                errors.field("username"),
                ["A non-administrator user with that username already exists.".to_string()]
            );
        }
        other => panic!("expected validation error, got {other:?}"),
    }

    assert_eq!(identity_count(&store), before);
    let stored = service.identity(student.id).expect("student kept");
    assert!(!stored.is_staff);
    assert!(service.authorize(&stored, AdminAction::ViewUsers).is_err());
}
