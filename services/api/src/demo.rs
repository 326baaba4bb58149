use clap::Args;
use hostel::error::AppError;
use hostel::residence::{
    AdminAction, CredentialPolicy, HostelService, HostelServiceError, MemoryStore,
    OccupancyReport, RegistrationForm, RoomAssignmentForm, RoomForm, RoomImportSummary,
    StudentProfileForm,
};
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;

const DEFAULT_ROSTER: &str = "room_number,room_type,capacity,is_available\n\
101,S,1,yes\n\
102,D,2,yes\n\
201,T,3,yes\n\
202,D,2,no\n";

const DEMO_PASSWORD: &str = "demo-password-123";

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Room roster CSV (room_number,room_type,capacity,is_available). Defaults to a small sample.
    #[arg(long)]
    pub(crate) rooms_csv: Option<PathBuf>,
    /// Number of students to register and house.
    #[arg(long, default_value_t = 3)]
    pub(crate) students: usize,
    /// bcrypt cost for demo passwords.
    #[arg(long, default_value_t = 4)]
    pub(crate) password_cost: u32,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        rooms_csv,
        students,
        password_cost,
    } = args;

    let service = HostelService::new(
        Arc::new(MemoryStore::new()),
        CredentialPolicy::new(password_cost),
    );

    println!("Hostel occupancy demo");
    let warden = service.ensure_staff("warden", "warden@hostel.local", DEMO_PASSWORD)?;
    let edit_rooms = service
        .authorize(&warden, AdminAction::EditRooms)
        .map_err(HostelServiceError::from)?;

    let summary = match rooms_csv {
        Some(path) => service.import_rooms_from_path(&edit_rooms, path)?,
        None => service.import_rooms(&edit_rooms, Cursor::new(DEFAULT_ROSTER))?,
    };
    render_import(&summary);

    println!("\nSelf-service assignments");
    let mut housed = Vec::new();
    for index in 0..students {
        let username = format!("student{}", index + 1);
        let student = service.register(&RegistrationForm {
            username: username.clone(),
            first_name: "Demo".to_string(),
            last_name: format!("Resident {}", index + 1),
            email: format!("{username}@hostel.local"),
            password1: DEMO_PASSWORD.to_string(),
            password2: DEMO_PASSWORD.to_string(),
            profile: StudentProfileForm {
                roll_number: format!("DEMO-{:03}", index + 1),
                phone_number: format!("555{:04}", index + 1),
                gender: if index % 2 == 0 { "F" } else { "M" }.to_string(),
            },
        })?;
        let identity = service.identity(student.identity_id)?;

        let choices = service.assignment_choices(&identity)?;
        let Some(room) = choices.available_rooms.first() else {
            println!("- {username}: no available rooms left");
            continue;
        };
        service.assign_room(&identity, &RoomAssignmentForm { room: Some(room.id) })?;
        println!("- {username} -> {}", room.label());
        housed.push(identity);
    }

    if let Some(first) = housed.first() {
        let choices = service.assignment_choices(first)?;
        if let Some(room) = choices.available_rooms.first() {
            service.assign_room(first, &RoomAssignmentForm { room: Some(room.id) })?;
            println!(
                "- {} moved to {} (previous room released)",
                first.username,
                room.label()
            );
        }
    }

    // Reopen an occupied room without moving its resident.
    let occupied = service.rooms()?.into_iter().find(|room| !room.is_available);
    if let Some(room) = occupied {
        service.save_room(
            &edit_rooms,
            Some(room.id),
            &RoomForm {
                room_number: room.room_number.clone(),
                room_type: room.room_type.code().to_string(),
                capacity: Some(i64::from(room.capacity)),
                is_available: Some(true),
            },
        )?;
        println!("\nWarden reopened {} while it is still occupied", room.label());
    }

    let view = service
        .authorize(&warden, AdminAction::ViewOccupancy)
        .map_err(HostelServiceError::from)?;
    render_occupancy(&service.occupancy_report(&view)?);
    Ok(())
}

fn render_import(summary: &RoomImportSummary) {
    println!(
        "- {} rooms imported: {}",
        summary.created.len(),
        summary.created.join(", ")
    );
    for (line, errors) in &summary.rejected {
        println!("  line {line} rejected: {errors}");
    }
}

fn render_occupancy(report: &OccupancyReport) {
    println!("\nOccupancy audit");
    for entry in &report.rooms {
        let drift = match entry.drift {
            Some(drift) => format!(" | drift: {drift:?}"),
            None => String::new(),
        };
        println!(
            "- Room {}: {}/{} residents | {}{}",
            entry.room_number,
            entry.residents,
            entry.capacity,
            if entry.is_available { "available" } else { "occupied" },
            drift
        );
    }
    if report.is_consistent() {
        println!("All availability flags agree with residents.");
    } else {
        println!("{} room(s) need attention.", report.drifted().count());
    }
}
