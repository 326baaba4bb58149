//! Submitted form payloads and their pure validation.
//!
//! Every form exposes `clean`, which checks field shape only and never touches the store.
//! Checks that need stored rows (uniqueness, the available-room choice set) run inside the
//! owning component's transaction and are merged with the field errors through
//! [`ValidationError::combine`], so a caller always sees every problem at once.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{Gender, Room, RoomId, RoomType, StudentId};

pub const REQUIRED: &str = "This field is required.";

/// Field-scoped validation messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    errors: BTreeMap<String, Vec<String>>,
}

impl ValidationError {
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn field(&self, field: &str) -> &[String] {
        self.errors.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn fields(&self) -> &BTreeMap<String, Vec<String>> {
        &self.errors
    }

    pub fn merge(&mut self, other: ValidationError) {
        for (field, messages) in other.errors {
            self.errors.entry(field).or_default().extend(messages);
        }
    }

    /// `Ok(value)` when no errors were collected.
    pub fn into_result<T>(self, value: T) -> Result<T, ValidationError> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }

    /// Merge store-backed errors into the outcome of a field-level `clean`.
    pub fn combine<T>(
        cleaned: Result<T, ValidationError>,
        extra: ValidationError,
    ) -> Result<T, ValidationError> {
        match cleaned {
            Ok(value) => extra.into_result(value),
            Err(mut errors) => {
                errors.merge(extra);
                Err(errors)
            }
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let summary = self
            .errors
            .iter()
            .map(|(field, messages)| format!("{field}: {}", messages.join(" ")))
            .collect::<Vec<_>>()
            .join("; ");
        write!(f, "invalid submission: {summary}")
    }
}

impl std::error::Error for ValidationError {}

fn required(errors: &mut ValidationError, field: &str, value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        errors.add(field, REQUIRED);
    }
    trimmed.to_string()
}

fn bounded(errors: &mut ValidationError, field: &str, value: &str, max: usize) -> String {
    let cleaned = required(errors, field, value);
    let length = cleaned.chars().count();
    if length > max {
        errors.add(
            field,
            format!("Ensure this value has at most {max} characters (it has {length})."),
        );
    }
    cleaned
}

fn email(errors: &mut ValidationError, field: &str, value: &str) -> String {
    let cleaned = required(errors, field, value);
    if cleaned.is_empty() {
        return cleaned;
    }

    let valid = match cleaned.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !cleaned.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        errors.add(field, "Enter a valid email address.");
    }
    cleaned
}

fn username(errors: &mut ValidationError, field: &str, value: &str) -> String {
    let cleaned = bounded(errors, field, value, 150);
    let allowed = |c: char| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_');
    if !cleaned.is_empty() && !cleaned.chars().all(allowed) {
        errors.add(
            field,
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        );
    }
    cleaned
}

fn gender(errors: &mut ValidationError, field: &str, value: &str) -> Option<Gender> {
    let cleaned = required(errors, field, value);
    if cleaned.is_empty() {
        return None;
    }
    let parsed = Gender::parse(&cleaned);
    if parsed.is_none() {
        errors.add(
            field,
            format!("Select a valid choice. {cleaned} is not one of the available choices."),
        );
    }
    parsed
}

/// Parse `YYYY-MM-DD` input.
pub fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

fn date(errors: &mut ValidationError, field: &str, value: &str) -> Option<NaiveDate> {
    let cleaned = required(errors, field, value);
    if cleaned.is_empty() {
        return None;
    }
    match parse_date(&cleaned) {
        Ok(date) => Some(date),
        Err(_) => {
            errors.add(field, "Enter a valid date.");
            None
        }
    }
}

/// Administrator room create/edit form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomForm {
    pub room_number: String,
    pub room_type: String,
    pub capacity: Option<i64>,
    pub is_available: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomDraft {
    pub room_number: String,
    pub room_type: RoomType,
    pub capacity: u32,
    pub is_available: bool,
}

impl RoomForm {
    pub fn clean(&self) -> Result<RoomDraft, ValidationError> {
        let mut errors = ValidationError::default();
        let room_number = bounded(&mut errors, "room_number", &self.room_number, 10);

        let room_type = match required(&mut errors, "room_type", &self.room_type).as_str() {
            "" => None,
            raw => {
                let parsed = RoomType::parse(raw);
                if parsed.is_none() {
                    errors.add(
                        "room_type",
                        format!("Select a valid choice. {raw} is not one of the available choices."),
                    );
                }
                parsed
            }
        };

        let capacity = match self.capacity {
            None => Some(1),
            Some(value) if value < 1 => {
                errors.add(
                    "capacity",
                    "Ensure this value is greater than or equal to 1.",
                );
                None
            }
            Some(value) => match u32::try_from(value) {
                Ok(value) => Some(value),
                Err(_) => {
                    errors.add("capacity", "Ensure this value is less than or equal to 4294967295.");
                    None
                }
            },
        };

        match (room_type, capacity) {
            (Some(room_type), Some(capacity)) => errors.into_result(RoomDraft {
                room_number,
                room_type,
                capacity,
                is_available: self.is_available.unwrap_or(true),
            }),
            _ => Err(errors),
        }
    }
}

impl From<&Room> for RoomForm {
    fn from(room: &Room) -> Self {
        Self {
            room_number: room.room_number.clone(),
            room_type: room.room_type.code().to_string(),
            capacity: Some(i64::from(room.capacity)),
            is_available: Some(room.is_available),
        }
    }
}

/// Student-editable profile fields. The room reference is not editable here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudentProfileForm {
    pub roll_number: String,
    pub phone_number: String,
    pub gender: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileDraft {
    pub roll_number: String,
    pub phone_number: String,
    pub gender: Gender,
}

impl StudentProfileForm {
    pub fn clean(&self) -> Result<ProfileDraft, ValidationError> {
        let mut errors = ValidationError::default();
        let roll_number = bounded(&mut errors, "roll_number", &self.roll_number, 20);
        let phone_number = bounded(&mut errors, "phone_number", &self.phone_number, 15);
        let gender = gender(&mut errors, "gender", &self.gender);

        match gender {
            Some(gender) => errors.into_result(ProfileDraft {
                roll_number,
                phone_number,
                gender,
            }),
            None => Err(errors),
        }
    }
}

/// Identity fields shared by registration and administrator creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityDraft {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

/// Self-registration: identity plus profile in one submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationForm {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password1: String,
    #[serde(skip_serializing)]
    pub password2: String,
    #[serde(flatten)]
    pub profile: StudentProfileForm,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationDraft {
    pub identity: IdentityDraft,
    pub profile: ProfileDraft,
}

const MIN_PASSWORD_LENGTH: usize = 8;

impl RegistrationForm {
    pub fn clean(&self) -> Result<RegistrationDraft, ValidationError> {
        let mut errors = ValidationError::default();
        let username = username(&mut errors, "username", &self.username);
        let first_name = bounded(&mut errors, "first_name", &self.first_name, 30);
        let last_name = bounded(&mut errors, "last_name", &self.last_name, 30);
        let email = email(&mut errors, "email", &self.email);

        if self.password1.is_empty() {
            errors.add("password1", REQUIRED);
        }
        if self.password2.is_empty() {
            errors.add("password2", REQUIRED);
        }
        if !self.password1.is_empty() && !self.password2.is_empty() {
            if self.password1 != self.password2 {
                errors.add("password2", "The two password fields didn't match.");
            } else {
                if self.password1.chars().count() < MIN_PASSWORD_LENGTH {
                    errors.add(
                        "password2",
                        format!(
                            "This password is too short. It must contain at least {MIN_PASSWORD_LENGTH} characters."
                        ),
                    );
                }
                if self.password1.chars().all(|c| c.is_ascii_digit()) {
                    errors.add("password2", "This password is entirely numeric.");
                }
            }
        }

        let profile = self.profile.clean();
        let identity = IdentityDraft {
            username,
            first_name,
            last_name,
            email,
            password: self.password1.clone(),
        };

        match profile {
            Ok(profile) => errors.into_result(RegistrationDraft { identity, profile }),
            Err(profile_errors) => {
                errors.merge(profile_errors);
                Err(errors)
            }
        }
    }
}

/// Administrator bulk creation of an identity plus student profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminCreateUserForm {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    #[serde(skip_serializing)]
    pub confirm_password: String,
    pub roll_number: String,
    pub phone_number: String,
    pub gender: String,
    pub room: Option<RoomId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminUserDraft {
    pub identity: IdentityDraft,
    pub profile: ProfileDraft,
    pub room: Option<RoomId>,
}

impl AdminCreateUserForm {
    pub fn clean(&self) -> Result<AdminUserDraft, ValidationError> {
        let mut errors = ValidationError::default();
        let first_name = bounded(&mut errors, "first_name", &self.first_name, 30);
        let last_name = bounded(&mut errors, "last_name", &self.last_name, 30);
        let username = bounded(&mut errors, "username", &self.username, 150);
        let email = email(&mut errors, "email", &self.email);
        if self.password.is_empty() {
            errors.add("password", REQUIRED);
        }
        if self.confirm_password.is_empty() {
            errors.add("confirm_password", REQUIRED);
        }
        if !self.password.is_empty()
            && !self.confirm_password.is_empty()
            && self.password != self.confirm_password
        {
            errors.add("confirm_password", "Passwords don't match");
        }

        let profile = StudentProfileForm {
            roll_number: self.roll_number.clone(),
            phone_number: self.phone_number.clone(),
            gender: self.gender.clone(),
        }
        .clean();

        let identity = IdentityDraft {
            username,
            first_name,
            last_name,
            email,
            password: self.password.clone(),
        };

        match profile {
            Ok(profile) => errors.into_result(AdminUserDraft {
                identity,
                profile,
                room: self.room,
            }),
            Err(profile_errors) => {
                errors.merge(profile_errors);
                Err(errors)
            }
        }
    }
}

/// Self-service room choice. `None` vacates the current room.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomAssignmentForm {
    pub room: Option<RoomId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnouncementForm {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnouncementDraft {
    pub title: String,
    pub content: String,
}

impl AnnouncementForm {
    pub fn clean(&self) -> Result<AnnouncementDraft, ValidationError> {
        let mut errors = ValidationError::default();
        let title = bounded(&mut errors, "title", &self.title, 200);
        let content = required(&mut errors, "content", &self.content);
        errors.into_result(AnnouncementDraft { title, content })
    }
}

/// Single attendance entry. A blank date means today.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttendanceForm {
    pub student: Option<StudentId>,
    pub date: String,
    pub is_present: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttendanceDraft {
    pub student: StudentId,
    pub date: NaiveDate,
    pub is_present: bool,
}

impl AttendanceForm {
    pub fn clean(&self, today: NaiveDate) -> Result<AttendanceDraft, ValidationError> {
        let mut errors = ValidationError::default();
        if self.student.is_none() {
            errors.add("student", REQUIRED);
        }
        let date = if self.date.trim().is_empty() {
            Some(today)
        } else {
            date(&mut errors, "date", &self.date)
        };

        match (self.student, date) {
            (Some(student), Some(date)) => errors.into_result(AttendanceDraft {
                student,
                date,
                is_present: self.is_present,
            }),
            _ => Err(errors),
        }
    }
}

/// Bulk attendance for one date. Students missing from `marks` are recorded absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkAttendanceForm {
    pub date: String,
    pub marks: BTreeMap<StudentId, bool>,
}

impl BulkAttendanceForm {
    pub fn clean(&self) -> Result<NaiveDate, ValidationError> {
        let mut errors = ValidationError::default();
        match date(&mut errors, "date", &self.date) {
            Some(date) => errors.into_result(date),
            None => Err(errors),
        }
    }

    pub fn is_present(&self, student: StudentId) -> bool {
        self.marks.get(&student).copied().unwrap_or(false)
    }
}
