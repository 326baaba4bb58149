use super::domain::{Identity, IdentityId, NewIdentity, NewStudent, Student, StudentId};
use super::forms::{ProfileDraft, RegistrationForm, StudentProfileForm, ValidationError};
use super::repository::Ledger;
use super::service::HostelServiceError;
use super::views::{matches_search, StudentFilter, StudentRow};

pub(crate) const DUPLICATE_USERNAME: &str = "A user with that username already exists.";
pub(crate) const DUPLICATE_ROLL_NUMBER: &str = "Student with this Roll number already exists.";

pub(crate) fn identity(
    ledger: &dyn Ledger,
    id: IdentityId,
) -> Result<Identity, HostelServiceError> {
    ledger.identity(id)?.ok_or(HostelServiceError::NotFound {
        entity: "identity",
        id: id.0,
    })
}

pub(crate) fn get(ledger: &dyn Ledger, id: StudentId) -> Result<Student, HostelServiceError> {
    ledger.student(id)?.ok_or(HostelServiceError::NotFound {
        entity: "student",
        id: id.0,
    })
}

/// The caller's profile, or the missing-profile signal that redirects to profile creation.
pub(crate) fn require_profile(
    ledger: &dyn Ledger,
    identity: &Identity,
) -> Result<Student, HostelServiceError> {
    ledger
        .student_for_identity(identity.id)?
        .ok_or(HostelServiceError::MissingProfile(identity.id))
}

pub(crate) fn username_taken(
    ledger: &dyn Ledger,
    username: &str,
) -> Result<bool, HostelServiceError> {
    let username = username.trim();
    Ok(!username.is_empty() && ledger.identity_by_username(username)?.is_some())
}

pub(crate) fn roll_number_taken(
    ledger: &dyn Ledger,
    roll_number: &str,
    except: Option<StudentId>,
) -> Result<bool, HostelServiceError> {
    let roll_number = roll_number.trim();
    if roll_number.is_empty() {
        return Ok(false);
    }
    Ok(ledger
        .student_by_roll_number(roll_number)?
        .is_some_and(|student| Some(student.id) != except))
}

pub(crate) fn row(
    ledger: &dyn Ledger,
    student: &Student,
) -> Result<StudentRow, HostelServiceError> {
    let identity = identity(ledger, student.identity_id)?;
    let room_number = match student.room {
        Some(room_id) => ledger.room(room_id)?.map(|room| room.room_number),
        None => None,
    };

    Ok(StudentRow {
        student_id: student.id,
        identity_id: identity.id,
        full_name: identity.full_name(),
        username: identity.username,
        email: identity.email,
        roll_number: student.roll_number.clone(),
        phone_number: student.phone_number.clone(),
        gender: student.gender,
        room_id: student.room,
        room_number,
    })
}

pub(crate) fn rows(
    ledger: &dyn Ledger,
    filter: &StudentFilter,
) -> Result<Vec<StudentRow>, HostelServiceError> {
    let mut rows = Vec::new();
    for student in ledger.students()? {
        if filter.gender.is_some_and(|gender| student.gender != gender) {
            continue;
        }
        if filter.room.is_some_and(|room| student.room != Some(room)) {
            continue;
        }

        let row = row(ledger, &student)?;
        let searchable = [
            row.roll_number.as_str(),
            row.username.as_str(),
            row.full_name.as_str(),
        ];
        if matches_search(filter.search.as_deref(), &searchable) {
            rows.push(row);
        }
    }
    Ok(rows)
}

/// Create an identity and its profile from a self-registration.
///
/// `sealed` is the outcome of the pure form validation with the password already hashed.
pub(crate) fn register(
    ledger: &mut dyn Ledger,
    form: &RegistrationForm,
    sealed: Result<(NewIdentity, ProfileDraft), ValidationError>,
) -> Result<Student, HostelServiceError> {
    let mut extra = ValidationError::default();
    if username_taken(ledger, &form.username)? {
        extra.add("username", DUPLICATE_USERNAME);
    }
    if roll_number_taken(ledger, &form.profile.roll_number, None)? {
        extra.add("roll_number", DUPLICATE_ROLL_NUMBER);
    }

    let (new_identity, profile) = ValidationError::combine(sealed, extra)?;
    let identity = ledger.insert_identity(new_identity)?;
    let student = ledger.insert_student(NewStudent {
        identity_id: identity.id,
        roll_number: profile.roll_number,
        phone_number: profile.phone_number,
        gender: profile.gender,
        room: None,
    })?;
    Ok(student)
}

pub(crate) fn create_profile(
    ledger: &mut dyn Ledger,
    identity: &Identity,
    form: &StudentProfileForm,
) -> Result<Student, HostelServiceError> {
    let mut extra = ValidationError::default();
    if roll_number_taken(ledger, &form.roll_number, None)? {
        extra.add("roll_number", DUPLICATE_ROLL_NUMBER);
    }

    let profile = ValidationError::combine(form.clean(), extra)?;
    let student = ledger.insert_student(NewStudent {
        identity_id: identity.id,
        roll_number: profile.roll_number,
        phone_number: profile.phone_number,
        gender: profile.gender,
        room: None,
    })?;
    Ok(student)
}

/// Update profile fields; the room reference is never touched here.
pub(crate) fn update_profile(
    ledger: &mut dyn Ledger,
    mut student: Student,
    form: &StudentProfileForm,
) -> Result<Student, HostelServiceError> {
    let mut extra = ValidationError::default();
    if roll_number_taken(ledger, &form.roll_number, Some(student.id))? {
        extra.add("roll_number", DUPLICATE_ROLL_NUMBER);
    }

    let profile = ValidationError::combine(form.clean(), extra)?;
    student.roll_number = profile.roll_number;
    student.phone_number = profile.phone_number;
    student.gender = profile.gender;
    ledger.save_student(&student)?;
    Ok(student)
}
