use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDate;

use super::domain::{
    Announcement, AnnouncementId, Attendance, Identity, IdentityId, NewAnnouncement, NewIdentity,
    NewRoom, NewStudent, Room, RoomId, Student, StudentId,
};

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists: {0}")]
    Conflict(String),
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Reads and writes available inside a single store transaction.
///
/// Listing methods return rows ordered by identifier unless stated otherwise.
pub trait Ledger {
    fn identity(&self, id: IdentityId) -> Result<Option<Identity>, RepositoryError>;
    fn identity_by_username(&self, username: &str) -> Result<Option<Identity>, RepositoryError>;
    fn identities(&self) -> Result<Vec<Identity>, RepositoryError>;
    fn insert_identity(&mut self, identity: NewIdentity) -> Result<Identity, RepositoryError>;

    fn room(&self, id: RoomId) -> Result<Option<Room>, RepositoryError>;
    fn room_by_number(&self, room_number: &str) -> Result<Option<Room>, RepositoryError>;
    fn rooms(&self) -> Result<Vec<Room>, RepositoryError>;
    fn insert_room(&mut self, room: NewRoom) -> Result<Room, RepositoryError>;
    fn save_room(&mut self, room: &Room) -> Result<(), RepositoryError>;

    fn student(&self, id: StudentId) -> Result<Option<Student>, RepositoryError>;
    fn student_for_identity(&self, id: IdentityId) -> Result<Option<Student>, RepositoryError>;
    fn student_by_roll_number(&self, roll_number: &str)
        -> Result<Option<Student>, RepositoryError>;
    fn students(&self) -> Result<Vec<Student>, RepositoryError>;
    fn insert_student(&mut self, student: NewStudent) -> Result<Student, RepositoryError>;
    fn save_student(&mut self, student: &Student) -> Result<(), RepositoryError>;

    /// Insert or replace the record keyed by (student, date). Returns `true` when created.
    fn upsert_attendance(&mut self, record: Attendance) -> Result<bool, RepositoryError>;
    fn attendance(&self) -> Result<Vec<Attendance>, RepositoryError>;

    fn insert_announcement(
        &mut self,
        announcement: NewAnnouncement,
    ) -> Result<Announcement, RepositoryError>;
    fn announcements(&self) -> Result<Vec<Announcement>, RepositoryError>;
}

/// Storage abstraction so the service can run against any transactional backend.
///
/// `transaction` must apply every write made by `work` or none of them, and must
/// serialize transactions that touch the same rows. `read` sees only committed rows.
pub trait HostelStore: Send + Sync {
    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn Ledger) -> Result<T, E>,
        E: From<RepositoryError>;

    fn read<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&dyn Ledger) -> Result<T, E>,
        E: From<RepositoryError>;
}

#[derive(Debug, Clone, Default)]
struct Sequences {
    identity: u64,
    room: u64,
    student: u64,
    announcement: u64,
}

fn next(counter: &mut u64) -> u64 {
    *counter += 1;
    *counter
}

/// Table set backing [`MemoryStore`].
#[derive(Debug, Clone, Default)]
pub struct MemoryTables {
    identities: BTreeMap<IdentityId, Identity>,
    rooms: BTreeMap<RoomId, Room>,
    students: BTreeMap<StudentId, Student>,
    attendance: BTreeMap<(StudentId, NaiveDate), Attendance>,
    announcements: BTreeMap<AnnouncementId, Announcement>,
    sequences: Sequences,
}

impl Ledger for MemoryTables {
    fn identity(&self, id: IdentityId) -> Result<Option<Identity>, RepositoryError> {
        Ok(self.identities.get(&id).cloned())
    }

    fn identity_by_username(&self, username: &str) -> Result<Option<Identity>, RepositoryError> {
        Ok(self
            .identities
            .values()
            .find(|identity| identity.username == username)
            .cloned())
    }

    fn identities(&self) -> Result<Vec<Identity>, RepositoryError> {
        Ok(self.identities.values().cloned().collect())
    }

    fn insert_identity(&mut self, identity: NewIdentity) -> Result<Identity, RepositoryError> {
        if self.identity_by_username(&identity.username)?.is_some() {
            return Err(RepositoryError::Conflict(format!(
                "username {}",
                identity.username
            )));
        }

        let id = IdentityId(next(&mut self.sequences.identity));
        let record = Identity {
            id,
            username: identity.username,
            first_name: identity.first_name,
            last_name: identity.last_name,
            email: identity.email,
            password_hash: identity.password_hash,
            is_staff: identity.is_staff,
        };
        self.identities.insert(id, record.clone());
        Ok(record)
    }

    fn room(&self, id: RoomId) -> Result<Option<Room>, RepositoryError> {
        Ok(self.rooms.get(&id).cloned())
    }

    fn room_by_number(&self, room_number: &str) -> Result<Option<Room>, RepositoryError> {
        Ok(self
            .rooms
            .values()
            .find(|room| room.room_number == room_number)
            .cloned())
    }

    fn rooms(&self) -> Result<Vec<Room>, RepositoryError> {
        Ok(self.rooms.values().cloned().collect())
    }

    fn insert_room(&mut self, room: NewRoom) -> Result<Room, RepositoryError> {
        if self.room_by_number(&room.room_number)?.is_some() {
            return Err(RepositoryError::Conflict(format!(
                "room_number {}",
                room.room_number
            )));
        }

        let id = RoomId(next(&mut self.sequences.room));
        let record = Room {
            id,
            room_number: room.room_number,
            room_type: room.room_type,
            capacity: room.capacity,
            is_available: room.is_available,
        };
        self.rooms.insert(id, record.clone());
        Ok(record)
    }

    fn save_room(&mut self, room: &Room) -> Result<(), RepositoryError> {
        let clash = self
            .rooms
            .values()
            .any(|other| other.id != room.id && other.room_number == room.room_number);
        if clash {
            return Err(RepositoryError::Conflict(format!(
                "room_number {}",
                room.room_number
            )));
        }

        match self.rooms.get_mut(&room.id) {
            Some(stored) => {
                *stored = room.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn student(&self, id: StudentId) -> Result<Option<Student>, RepositoryError> {
        Ok(self.students.get(&id).cloned())
    }

    fn student_for_identity(&self, id: IdentityId) -> Result<Option<Student>, RepositoryError> {
        Ok(self
            .students
            .values()
            .find(|student| student.identity_id == id)
            .cloned())
    }

    fn student_by_roll_number(
        &self,
        roll_number: &str,
    ) -> Result<Option<Student>, RepositoryError> {
        Ok(self
            .students
            .values()
            .find(|student| student.roll_number == roll_number)
            .cloned())
    }

    fn students(&self) -> Result<Vec<Student>, RepositoryError> {
        Ok(self.students.values().cloned().collect())
    }

    fn insert_student(&mut self, student: NewStudent) -> Result<Student, RepositoryError> {
        if !self.identities.contains_key(&student.identity_id) {
            return Err(RepositoryError::NotFound);
        }
        if self.student_for_identity(student.identity_id)?.is_some() {
            return Err(RepositoryError::Conflict(format!(
                "profile for identity {}",
                student.identity_id
            )));
        }
        if self.student_by_roll_number(&student.roll_number)?.is_some() {
            return Err(RepositoryError::Conflict(format!(
                "roll_number {}",
                student.roll_number
            )));
        }

        let id = StudentId(next(&mut self.sequences.student));
        let record = Student {
            id,
            identity_id: student.identity_id,
            roll_number: student.roll_number,
            phone_number: student.phone_number,
            gender: student.gender,
            room: student.room,
        };
        self.students.insert(id, record.clone());
        Ok(record)
    }

    fn save_student(&mut self, student: &Student) -> Result<(), RepositoryError> {
        let clash = self
            .students
            .values()
            .any(|other| other.id != student.id && other.roll_number == student.roll_number);
        if clash {
            return Err(RepositoryError::Conflict(format!(
                "roll_number {}",
                student.roll_number
            )));
        }

        match self.students.get_mut(&student.id) {
            Some(stored) => {
                *stored = student.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn upsert_attendance(&mut self, record: Attendance) -> Result<bool, RepositoryError> {
        if !self.students.contains_key(&record.student_id) {
            return Err(RepositoryError::NotFound);
        }
        let previous = self
            .attendance
            .insert((record.student_id, record.date), record);
        Ok(previous.is_none())
    }

    fn attendance(&self) -> Result<Vec<Attendance>, RepositoryError> {
        Ok(self.attendance.values().copied().collect())
    }

    fn insert_announcement(
        &mut self,
        announcement: NewAnnouncement,
    ) -> Result<Announcement, RepositoryError> {
        let id = AnnouncementId(next(&mut self.sequences.announcement));
        let record = Announcement {
            id,
            title: announcement.title,
            content: announcement.content,
            date_posted: announcement.date_posted,
            posted_by: announcement.posted_by,
        };
        self.announcements.insert(id, record.clone());
        Ok(record)
    }

    fn announcements(&self) -> Result<Vec<Announcement>, RepositoryError> {
        Ok(self.announcements.values().cloned().collect())
    }
}

/// In-process reference store.
///
/// Each transaction runs against a staged copy of every table and is committed only when
/// the work returns `Ok`, so a failed step never leaves partial writes behind. The single
/// mutex serializes transactions. Reads borrow the committed tables under the same mutex.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<MemoryTables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock<E>(&self) -> Result<MutexGuard<'_, MemoryTables>, E>
    where
        E: From<RepositoryError>,
    {
        self.tables.lock().map_err(|_| {
            E::from(RepositoryError::Unavailable(
                "store mutex poisoned".to_string(),
            ))
        })
    }
}

impl HostelStore for MemoryStore {
    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn Ledger) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        let mut guard = self.lock::<E>()?;
        let mut staged = guard.clone();
        let value = work(&mut staged)?;
        *guard = staged;
        Ok(value)
    }

    fn read<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&dyn Ledger) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        let guard = self.lock::<E>()?;
        work(&*guard)
    }
}
