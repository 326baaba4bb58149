use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::common::*;
use crate::residence::access::AdminAction;
use crate::residence::forms::{AttendanceForm, BulkAttendanceForm};
use crate::residence::service::HostelServiceError;
use crate::residence::views::AttendanceFilter;

#[test]
fn marking_twice_for_one_day_updates_the_record() {
    let (service, _store) = build_service();
    let admin = seed_admin(&service);
    let (_, student) = register_student(&service, "asha", "CS-1");
    let mark = capability(&service, &admin, AdminAction::MarkAttendance);

    let form = AttendanceForm {
        student: Some(student.id),
        date: "2025-03-03".to_string(),
        is_present: true,
    };
    service.mark_attendance(&mark, &form).expect("first mark");
    let record = service
        .mark_attendance(
            &mark,
            &AttendanceForm {
                is_present: false,
                ..form
            },
        )
        .expect("second mark");
    assert!(!record.is_present);

    let view = capability(&service, &admin, AdminAction::ViewAttendance);
    let rows = service
        .attendance_records(&view, &AttendanceFilter::default())
        .expect("rows");
    assert_eq!(rows.len(), 1);
    assert!(!rows[0].is_present);
}

#[test]
fn blank_date_defaults_to_today_and_unknown_student_is_rejected() {
    let (service, _store) = build_service();
    let admin = seed_admin(&service);
    let (_, student) = register_student(&service, "asha", "CS-1");
    let mark = capability(&service, &admin, AdminAction::MarkAttendance);

    let record = service
        .mark_attendance(
            &mark,
            &AttendanceForm {
                student: Some(student.id),
                date: String::new(),
                is_present: true,
            },
        )
        .expect("mark for today");
    assert_eq!(record.date, chrono::Local::now().date_naive());

    let unknown = service.mark_attendance(
        &mark,
        &AttendanceForm {
            student: Some(crate::residence::domain::StudentId(404)),
            date: "2025-03-03".to_string(),
            is_present: true,
        },
    );
    match unknown {
        Err(HostelServiceError::Validation(errors)) => assert_eq!(errors.field("student").len(), 1),
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn bulk_marking_records_unlisted_students_absent() {
    let (service, _store) = build_service();
    let admin = seed_admin(&service);
    let (_, present) = register_student(&service, "asha", "CS-1");
    let (_, absent) = register_student(&service, "bela", "CS-2");
    let bulk = capability(&service, &admin, AdminAction::MarkBulkAttendance);

    let mut marks = BTreeMap::new();
    marks.insert(present.id, true);
    let form = BulkAttendanceForm {
        date: "2025-03-04".to_string(),
        marks,
    };
    let summary = service
        .mark_bulk_attendance(&bulk, &form)
        .expect("bulk mark");
    assert_eq!(summary.present, 1);
    assert_eq!(summary.absent, 1);
    assert_eq!(summary.created, 2);

    let again = service
        .mark_bulk_attendance(&bulk, &form)
        .expect("bulk mark repeated");
    assert_eq!(again.created, 0);

    let view = capability(&service, &admin, AdminAction::ViewAttendance);
    let absentees = service
        .attendance_records(
            &view,
            &AttendanceFilter {
                is_present: Some(false),
                ..AttendanceFilter::default()
            },
        )
        .expect("rows");
    assert_eq!(absentees.len(), 1);
    assert_eq!(absentees[0].student_id, absent.id);
}

#[test]
fn attendance_rows_are_newest_first_and_filter_by_date() {
    let (service, _store) = build_service();
    let admin = seed_admin(&service);
    let (_, student) = register_student(&service, "asha", "CS-1");
    let mark = capability(&service, &admin, AdminAction::MarkAttendance);

    for day in ["2025-03-01", "2025-03-03", "2025-03-02"] {
        service
            .mark_attendance(
                &mark,
                &AttendanceForm {
                    student: Some(student.id),
                    date: day.to_string(),
                    is_present: true,
                },
            )
            .expect("mark");
    }

    let view = capability(&service, &admin, AdminAction::ViewAttendance);
    let rows = service
        .attendance_records(&view, &AttendanceFilter::default())
        .expect("rows");
    let dates: Vec<String> = rows.iter().map(|row| row.date.to_string()).collect();
    assert_eq!(dates, vec!["2025-03-03", "2025-03-02", "2025-03-01"]);

    let one_day = service
        .attendance_records(
            &view,
            &AttendanceFilter {
                date: NaiveDate::from_ymd_opt(2025, 3, 2),
                ..AttendanceFilter::default()
            },
        )
        .expect("rows");
    assert_eq!(one_day.len(), 1);
}

#[test]
fn malformed_bulk_date_is_a_field_error() {
    let (service, _store) = build_service();
    let admin = seed_admin(&service);
    let bulk = capability(&service, &admin, AdminAction::MarkBulkAttendance);

    let result = service.mark_bulk_attendance(
        &bulk,
        &BulkAttendanceForm {
            date: "03/04/2025".to_string(),
            marks: BTreeMap::new(),
        },
    );
    match result {
        Err(HostelServiceError::Validation(errors)) => {
            assert_eq!(errors.field("date"), ["Enter a valid date.".to_string()]);
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}
