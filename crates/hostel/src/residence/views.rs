use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    AnnouncementId, Attendance, Gender, IdentityId, Room, RoomId, RoomType, Student, StudentId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashLevel {
    Success,
    Info,
    Warning,
    Error,
}

/// One-shot user-visible message attached to a redirect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

impl Flash {
    pub fn new(level: FlashLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(FlashLevel::Success, message)
    }
}

/// Redirect targets used after a mutation or a refusal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Landing {
    Dashboard,
    Profile,
    AnnouncementList,
    AdminPanel,
    AdminUserList,
    AdminRoomList,
}

impl Landing {
    pub fn path(self) -> &'static str {
        match self {
            Landing::Dashboard => "/dashboard/",
            Landing::Profile => "/profile/",
            Landing::AnnouncementList => "/announcements/",
            Landing::AdminPanel | Landing::AdminUserList => "/manage/users/",
            Landing::AdminRoomList => "/manage/rooms/",
        }
    }
}

/// Student joined with identity and room for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentRow {
    pub student_id: StudentId,
    pub identity_id: IdentityId,
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub roll_number: String,
    pub phone_number: String,
    pub gender: Gender,
    pub room_id: Option<RoomId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomDetail {
    pub room: Room,
    pub label: String,
    pub residents: Vec<StudentRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttendanceRow {
    pub student_id: StudentId,
    pub roll_number: String,
    pub username: String,
    pub full_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_number: Option<String>,
    pub date: NaiveDate,
    pub is_present: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnouncementView {
    pub id: AnnouncementId,
    pub title: String,
    pub content: String,
    pub date_posted: DateTime<Utc>,
    pub posted_by: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminDashboard {
    pub student_count: usize,
    pub room_count: usize,
    pub available_rooms: usize,
    pub announcement_count: usize,
    pub announcements: Vec<AnnouncementView>,
    pub recent_attendance: Vec<AttendanceRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentDashboard {
    pub student: Student,
    pub room: Option<Room>,
    pub attendance: Vec<Attendance>,
    pub announcements: Vec<AnnouncementView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum Dashboard {
    Admin(AdminDashboard),
    Student(StudentDashboard),
}

/// Choices offered by the self-service assignment form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssignmentChoices {
    pub current_room: Option<Room>,
    pub available_rooms: Vec<Room>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OccupancyDrift {
    /// Flagged available while at least one student points at the room.
    AvailableWithResidents,
    /// Flagged unavailable while no student points at the room.
    UnavailableWithoutResidents,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OccupancyEntry {
    pub room_id: RoomId,
    pub room_number: String,
    pub is_available: bool,
    pub residents: usize,
    pub capacity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drift: Option<OccupancyDrift>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OccupancyReport {
    pub rooms: Vec<OccupancyEntry>,
}

impl OccupancyReport {
    pub fn drifted(&self) -> impl Iterator<Item = &OccupancyEntry> {
        self.rooms.iter().filter(|entry| entry.drift.is_some())
    }

    pub fn is_consistent(&self) -> bool {
        self.drifted().next().is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RoomFilter {
    pub room_type: Option<RoomType>,
    pub is_available: Option<bool>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StudentFilter {
    pub gender: Option<Gender>,
    pub room: Option<RoomId>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AttendanceFilter {
    pub date: Option<NaiveDate>,
    pub is_present: Option<bool>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AnnouncementFilter {
    pub search: Option<String>,
}

/// Case-insensitive substring match; an empty or missing needle matches everything.
pub(crate) fn matches_search(needle: Option<&str>, haystacks: &[&str]) -> bool {
    let needle = match needle.map(str::trim) {
        Some(needle) if !needle.is_empty() => needle.to_lowercase(),
        _ => return true,
    };
    haystacks
        .iter()
        .any(|value| value.to_lowercase().contains(&needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_landing_resolves_to_a_routed_path() {
        let paths: Vec<&str> = [
            Landing::Dashboard,
            Landing::Profile,
            Landing::AnnouncementList,
            Landing::AdminPanel,
            Landing::AdminUserList,
            Landing::AdminRoomList,
        ]
        .into_iter()
        .map(Landing::path)
        .collect();
        assert_eq!(
            paths,
            vec![
                "/dashboard/",
                "/profile/",
                "/announcements/",
                "/manage/users/",
                "/manage/users/",
                "/manage/rooms/",
            ]
        );
    }
}
