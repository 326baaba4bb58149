use std::cmp::Reverse;

use chrono::NaiveDate;
use serde::Serialize;

use super::domain::{Attendance, StudentId};
use super::forms::{AttendanceDraft, BulkAttendanceForm, ValidationError};
use super::repository::Ledger;
use super::service::HostelServiceError;
use super::students;
use super::views::{matches_search, AttendanceFilter, AttendanceRow};

pub(crate) const INVALID_STUDENT_CHOICE: &str =
    "Select a valid choice. That choice is not one of the available choices.";

/// Outcome of a bulk marking pass for one date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BulkAttendanceSummary {
    pub date: NaiveDate,
    pub present: usize,
    pub absent: usize,
    pub created: usize,
}

pub(crate) fn mark(
    ledger: &mut dyn Ledger,
    draft: AttendanceDraft,
) -> Result<Attendance, HostelServiceError> {
    if ledger.student(draft.student)?.is_none() {
        return Err(ValidationError::single("student", INVALID_STUDENT_CHOICE).into());
    }

    let record = Attendance {
        student_id: draft.student,
        date: draft.date,
        is_present: draft.is_present,
    };
    ledger.upsert_attendance(record)?;
    Ok(record)
}

/// Upsert one record per student in the directory; students absent from the form are absent.
pub(crate) fn mark_bulk(
    ledger: &mut dyn Ledger,
    date: NaiveDate,
    form: &BulkAttendanceForm,
) -> Result<BulkAttendanceSummary, HostelServiceError> {
    let mut summary = BulkAttendanceSummary {
        date,
        present: 0,
        absent: 0,
        created: 0,
    };

    for student in ledger.students()? {
        let is_present = form.is_present(student.id);
        let created = ledger.upsert_attendance(Attendance {
            student_id: student.id,
            date,
            is_present,
        })?;

        if is_present {
            summary.present += 1;
        } else {
            summary.absent += 1;
        }
        if created {
            summary.created += 1;
        }
    }

    Ok(summary)
}

/// Newest date first; ties keep student order.
pub(crate) fn rows(
    ledger: &dyn Ledger,
    filter: &AttendanceFilter,
) -> Result<Vec<AttendanceRow>, HostelServiceError> {
    let mut records = ledger.attendance()?;
    records.sort_by_key(|record| (Reverse(record.date), record.student_id));

    let mut rows = Vec::new();
    for record in records {
        if filter.date.is_some_and(|date| record.date != date) {
            continue;
        }
        if filter
            .is_present
            .is_some_and(|flag| record.is_present != flag)
        {
            continue;
        }

        let student = students::get(ledger, record.student_id)?;
        let student_row = students::row(ledger, &student)?;
        if !matches_search(
            filter.search.as_deref(),
            &[student_row.roll_number.as_str(), student_row.username.as_str()],
        ) {
            continue;
        }

        rows.push(AttendanceRow {
            student_id: record.student_id,
            roll_number: student_row.roll_number,
            username: student_row.username,
            full_name: student_row.full_name,
            room_number: student_row.room_number,
            date: record.date,
            is_present: record.is_present,
        });
    }
    Ok(rows)
}

pub(crate) fn recent_for(
    ledger: &dyn Ledger,
    student: StudentId,
    limit: usize,
) -> Result<Vec<Attendance>, HostelServiceError> {
    let mut records: Vec<Attendance> = ledger
        .attendance()?
        .into_iter()
        .filter(|record| record.student_id == student)
        .collect();
    records.sort_by_key(|record| Reverse(record.date));
    records.truncate(limit);
    Ok(records)
}
