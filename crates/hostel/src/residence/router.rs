use std::sync::Arc;

use axum::{
    async_trait,
    extract::{
        rejection::JsonRejection, FromRequest, FromRequestParts, Path, Query, Request, State,
    },
    http::{header, request::Parts, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Local;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, warn};

use super::access::{AccessDenied, AdminAction, AdminCapability};
use super::domain::{Identity, IdentityId, RoomId};
use super::forms::{
    AdminCreateUserForm, AnnouncementForm, AttendanceForm, BulkAttendanceForm, RegistrationForm,
    RoomAssignmentForm, RoomForm, StudentProfileForm, ValidationError,
};
use super::repository::HostelStore;
use super::service::{HostelService, HostelServiceError, ProfileSaved};
use super::views::{
    AnnouncementFilter, AttendanceFilter, Flash, FlashLevel, Landing, RoomFilter, StudentFilter,
};

/// Header carrying the authenticated caller, set by the upstream authentication layer.
pub const IDENTITY_HEADER: &str = "x-identity-id";

const MISSING_PROFILE: &str = "Please complete your student profile first.";

/// Error key for problems with the submission as a whole rather than one field.
pub const NON_FIELD_ERRORS: &str = "__all__";

type Shared<S> = State<Arc<HostelService<S>>>;
type Reply = Result<Response, Response>;

/// Router exposing the student and administrator endpoints.
pub fn hostel_router<S>(service: Arc<HostelService<S>>) -> Router
where
    S: HostelStore + 'static,
{
    Router::new()
        .route("/", get(home))
        .route("/register/", axum::routing::post(register::<S>))
        .route("/dashboard/", get(dashboard::<S>))
        .route("/profile/", get(profile::<S>).post(save_profile::<S>))
        .route("/rooms/", get(room_list::<S>))
        .route(
            "/rooms/assign/",
            get(assignment_choices::<S>).post(assign_room::<S>),
        )
        .route("/rooms/:room_id/", get(room_detail::<S>))
        .route("/announcements/", get(announcement_list::<S>))
        .route(
            "/announcements/create/",
            get(announcement_form::<S>).post(announcement_create::<S>),
        )
        .route(
            "/attendance/mark/",
            get(attendance_form::<S>).post(attendance_mark::<S>),
        )
        .route(
            "/attendance/bulk/",
            get(bulk_attendance_form::<S>).post(bulk_attendance_mark::<S>),
        )
        .route("/manage/users/", get(admin_user_list::<S>))
        .route(
            "/manage/users/create/",
            get(admin_user_form::<S>).post(admin_user_create::<S>),
        )
        .route("/manage/rooms/", get(admin_room_list::<S>))
        .route(
            "/manage/rooms/create/",
            get(admin_room_form::<S>).post(admin_room_create::<S>),
        )
        .route(
            "/manage/rooms/edit/:room_id/",
            get(admin_room_edit_form::<S>).post(admin_room_edit::<S>),
        )
        .route("/manage/attendance/", get(admin_attendance_list::<S>))
        .route("/manage/announcements/", get(admin_announcement_list::<S>))
        .route("/manage/occupancy/", get(admin_occupancy::<S>))
        .with_state(service)
}

/// Caller named by the [`IDENTITY_HEADER`]; a missing or malformed header is a 401.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerId(pub IdentityId);

#[async_trait]
impl<St> FromRequestParts<St> for CallerId
where
    St: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &St) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(IDENTITY_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(|id| CallerId(IdentityId(id)))
            .ok_or_else(unauthorized)
    }
}

/// JSON form body. An unreadable body answers like any other invalid submission.
#[derive(Debug, Clone)]
pub struct Submitted<T>(pub T);

#[async_trait]
impl<T, St> FromRequest<St> for Submitted<T>
where
    Json<T>: FromRequest<St, Rejection = JsonRejection>,
    T: Send,
    St: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &St) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Submitted(value)),
            Err(rejection) => {
                warn!(status = %rejection.status(), "form body rejected");
                let errors = ValidationError::single(NON_FIELD_ERRORS, rejection.body_text());
                Err(invalid(&errors, Value::Null))
            }
        }
    }
}

fn unauthorized() -> Response {
    let payload = json!({ "error": "authentication required" });
    (StatusCode::UNAUTHORIZED, Json(payload)).into_response()
}

fn redirect(landing: Landing, flash: Flash) -> Response {
    (
        StatusCode::SEE_OTHER,
        [(header::LOCATION, landing.path())],
        Json(flash),
    )
        .into_response()
}

fn refused(denied: AccessDenied) -> Response {
    redirect(denied.redirect, Flash::new(denied.level, denied.message))
}

fn invalid(errors: &ValidationError, input: Value) -> Response {
    let payload = json!({ "errors": errors.fields(), "input": input });
    (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response()
}

/// Submitted input echoed back on a validation failure. Password fields never serialize.
fn echo<T: Serialize>(input: &T) -> Value {
    serde_json::to_value(input).unwrap_or(Value::Null)
}

fn failure(err: HostelServiceError, input: Value) -> Response {
    match err {
        HostelServiceError::Validation(errors) => invalid(&errors, input),
        HostelServiceError::Access(denied) => refused(denied),
        HostelServiceError::NotFound { .. } => {
            let payload = json!({ "error": "not found" });
            (StatusCode::NOT_FOUND, Json(payload)).into_response()
        }
        HostelServiceError::UnknownIdentity(_) => unauthorized(),
        HostelServiceError::MissingProfile(_) => {
            redirect(Landing::Profile, Flash::new(FlashLevel::Warning, MISSING_PROFILE))
        }
        other => {
            error!(error = %other, "request failed");
            let payload = json!({ "error": other.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}

fn authenticate<S>(service: &HostelService<S>, caller: CallerId) -> Result<Identity, Response>
where
    S: HostelStore + 'static,
{
    service
        .identity(caller.0)
        .map_err(|err| failure(err, Value::Null))
}

fn admin<S>(
    service: &HostelService<S>,
    caller: CallerId,
    action: AdminAction,
) -> Result<AdminCapability, Response>
where
    S: HostelStore + 'static,
{
    let identity = authenticate(service, caller)?;
    service.authorize(&identity, action).map_err(refused)
}

fn ok<T: Serialize>(body: T) -> Reply {
    Ok((StatusCode::OK, Json(body)).into_response())
}

pub(crate) async fn home() -> Json<Value> {
    Json(json!({
        "service": "hostel",
        "message": "Student residence management: rooms, attendance and announcements.",
    }))
}

pub(crate) async fn register<S>(
    State(service): Shared<S>,
    Submitted(form): Submitted<RegistrationForm>,
) -> Reply
where
    S: HostelStore + 'static,
{
    let student = service
        .register(&form)
        .map_err(|err| failure(err, echo(&form)))?;

    let mut response = redirect(Landing::Dashboard, Flash::success("Registration successful!"));
    response.headers_mut().insert(
        IDENTITY_HEADER,
        HeaderValue::from(student.identity_id.0),
    );
    Ok(response)
}

pub(crate) async fn dashboard<S>(State(service): Shared<S>, caller: CallerId) -> Reply
where
    S: HostelStore + 'static,
{
    let identity = authenticate(&service, caller)?;
    match service.dashboard(&identity) {
        Ok(dashboard) => ok(dashboard),
        Err(HostelServiceError::MissingProfile(_)) => Err(redirect(
            Landing::Profile,
            Flash::new(FlashLevel::Warning, "Please complete your student profile."),
        )),
        Err(err) => Err(failure(err, Value::Null)),
    }
}

pub(crate) async fn profile<S>(State(service): Shared<S>, caller: CallerId) -> Reply
where
    S: HostelStore + 'static,
{
    let identity = authenticate(&service, caller)?;
    let profile = service
        .profile(&identity)
        .map_err(|err| failure(err, Value::Null))?;
    let form = profile
        .as_ref()
        .map(|student| StudentProfileForm {
            roll_number: student.roll_number.clone(),
            phone_number: student.phone_number.clone(),
            gender: student.gender.code().to_string(),
        })
        .unwrap_or_default();

    ok(json!({
        "new_profile": profile.is_none(),
        "profile": profile,
        "form": form,
    }))
}

pub(crate) async fn save_profile<S>(
    State(service): Shared<S>,
    caller: CallerId,
    Submitted(form): Submitted<StudentProfileForm>,
) -> Reply
where
    S: HostelStore + 'static,
{
    let identity = authenticate(&service, caller)?;
    let message = match service
        .save_profile(&identity, &form)
        .map_err(|err| failure(err, echo(&form)))?
    {
        ProfileSaved::Created(_) => "Profile created successfully!",
        ProfileSaved::Updated(_) => "Profile updated successfully!",
    };
    Ok(redirect(Landing::Dashboard, Flash::success(message)))
}

pub(crate) async fn room_list<S>(State(service): Shared<S>, caller: CallerId) -> Reply
where
    S: HostelStore + 'static,
{
    authenticate(&service, caller)?;
    service
        .rooms()
        .map_err(|err| failure(err, Value::Null))
        .and_then(ok)
}

pub(crate) async fn room_detail<S>(
    State(service): Shared<S>,
    caller: CallerId,
    Path(room_id): Path<u64>,
) -> Reply
where
    S: HostelStore + 'static,
{
    authenticate(&service, caller)?;
    service
        .room_detail(RoomId(room_id))
        .map_err(|err| failure(err, Value::Null))
        .and_then(ok)
}

pub(crate) async fn assignment_choices<S>(State(service): Shared<S>, caller: CallerId) -> Reply
where
    S: HostelStore + 'static,
{
    let identity = authenticate(&service, caller)?;
    service
        .assignment_choices(&identity)
        .map_err(|err| failure(err, Value::Null))
        .and_then(ok)
}

pub(crate) async fn assign_room<S>(
    State(service): Shared<S>,
    caller: CallerId,
    Submitted(form): Submitted<RoomAssignmentForm>,
) -> Reply
where
    S: HostelStore + 'static,
{
    let identity = authenticate(&service, caller)?;
    service
        .assign_room(&identity, &form)
        .map_err(|err| failure(err, echo(&form)))?;
    Ok(redirect(
        Landing::Dashboard,
        Flash::success("Room assigned successfully!"),
    ))
}

pub(crate) async fn announcement_list<S>(State(service): Shared<S>, caller: CallerId) -> Reply
where
    S: HostelStore + 'static,
{
    authenticate(&service, caller)?;
    service
        .announcements()
        .map_err(|err| failure(err, Value::Null))
        .and_then(ok)
}

pub(crate) async fn announcement_form<S>(State(service): Shared<S>, caller: CallerId) -> Reply
where
    S: HostelStore + 'static,
{
    admin(&service, caller, AdminAction::CreateAnnouncement)?;
    ok(json!({ "form": AnnouncementForm::default() }))
}

pub(crate) async fn announcement_create<S>(
    State(service): Shared<S>,
    caller: CallerId,
    Submitted(form): Submitted<AnnouncementForm>,
) -> Reply
where
    S: HostelStore + 'static,
{
    let capability = admin(&service, caller, AdminAction::CreateAnnouncement)?;
    service
        .post_announcement(&capability, &form)
        .map_err(|err| failure(err, echo(&form)))?;
    Ok(redirect(
        Landing::AnnouncementList,
        Flash::success("Announcement created successfully!"),
    ))
}

pub(crate) async fn attendance_form<S>(State(service): Shared<S>, caller: CallerId) -> Reply
where
    S: HostelStore + 'static,
{
    let capability = admin(&service, caller, AdminAction::MarkAttendance)?;
    let students = service
        .attendance_roster(&capability)
        .map_err(|err| failure(err, Value::Null))?;
    ok(json!({ "students": students, "date": Local::now().date_naive() }))
}

pub(crate) async fn attendance_mark<S>(
    State(service): Shared<S>,
    caller: CallerId,
    Submitted(form): Submitted<AttendanceForm>,
) -> Reply
where
    S: HostelStore + 'static,
{
    let capability = admin(&service, caller, AdminAction::MarkAttendance)?;
    service
        .mark_attendance(&capability, &form)
        .map_err(|err| failure(err, echo(&form)))?;
    Ok(redirect(
        Landing::Dashboard,
        Flash::success("Attendance marked successfully!"),
    ))
}

pub(crate) async fn bulk_attendance_form<S>(State(service): Shared<S>, caller: CallerId) -> Reply
where
    S: HostelStore + 'static,
{
    let capability = admin(&service, caller, AdminAction::MarkBulkAttendance)?;
    let students = service
        .attendance_roster(&capability)
        .map_err(|err| failure(err, Value::Null))?;
    ok(json!({ "students": students, "date": Local::now().date_naive() }))
}

pub(crate) async fn bulk_attendance_mark<S>(
    State(service): Shared<S>,
    caller: CallerId,
    Submitted(form): Submitted<BulkAttendanceForm>,
) -> Reply
where
    S: HostelStore + 'static,
{
    let capability = admin(&service, caller, AdminAction::MarkBulkAttendance)?;
    service
        .mark_bulk_attendance(&capability, &form)
        .map_err(|err| failure(err, echo(&form)))?;
    Ok(redirect(
        Landing::Dashboard,
        Flash::success("Bulk attendance marked successfully!"),
    ))
}

pub(crate) async fn admin_user_list<S>(
    State(service): Shared<S>,
    caller: CallerId,
    Query(filter): Query<StudentFilter>,
) -> Reply
where
    S: HostelStore + 'static,
{
    let capability = admin(&service, caller, AdminAction::ViewUsers)?;
    service
        .student_rows(&capability, &filter)
        .map_err(|err| failure(err, Value::Null))
        .and_then(ok)
}

pub(crate) async fn admin_user_form<S>(State(service): Shared<S>, caller: CallerId) -> Reply
where
    S: HostelStore + 'static,
{
    let capability = admin(&service, caller, AdminAction::CreateUser)?;
    let rooms = service
        .enrollment_rooms(&capability)
        .map_err(|err| failure(err, Value::Null))?;
    ok(json!({ "form": AdminCreateUserForm::default(), "available_rooms": rooms }))
}

pub(crate) async fn admin_user_create<S>(
    State(service): Shared<S>,
    caller: CallerId,
    Submitted(form): Submitted<AdminCreateUserForm>,
) -> Reply
where
    S: HostelStore + 'static,
{
    let capability = admin(&service, caller, AdminAction::CreateUser)?;
    let row = service
        .create_student_account(&capability, &form)
        .map_err(|err| failure(err, echo(&form)))?;
    Ok(redirect(
        Landing::AdminUserList,
        Flash::success(format!("Student {} created successfully!", row.username)),
    ))
}

pub(crate) async fn admin_room_list<S>(
    State(service): Shared<S>,
    caller: CallerId,
    Query(filter): Query<RoomFilter>,
) -> Reply
where
    S: HostelStore + 'static,
{
    let capability = admin(&service, caller, AdminAction::ViewRooms)?;
    service
        .admin_rooms(&capability, &filter)
        .map_err(|err| failure(err, Value::Null))
        .and_then(ok)
}

pub(crate) async fn admin_room_form<S>(State(service): Shared<S>, caller: CallerId) -> Reply
where
    S: HostelStore + 'static,
{
    admin(&service, caller, AdminAction::EditRooms)?;
    ok(json!({
        "title": "Create New Room",
        "is_edit": false,
        "form": RoomForm::default(),
    }))
}

pub(crate) async fn admin_room_create<S>(
    State(service): Shared<S>,
    caller: CallerId,
    Submitted(form): Submitted<RoomForm>,
) -> Reply
where
    S: HostelStore + 'static,
{
    let capability = admin(&service, caller, AdminAction::EditRooms)?;
    service
        .save_room(&capability, None, &form)
        .map_err(|err| failure(err, echo(&form)))?;
    Ok(redirect(
        Landing::AdminRoomList,
        Flash::success("Room created successfully!"),
    ))
}

pub(crate) async fn admin_room_edit_form<S>(
    State(service): Shared<S>,
    caller: CallerId,
    Path(room_id): Path<u64>,
) -> Reply
where
    S: HostelStore + 'static,
{
    let capability = admin(&service, caller, AdminAction::EditRooms)?;
    let room = service
        .room_for_edit(&capability, RoomId(room_id))
        .map_err(|err| failure(err, Value::Null))?;
    ok(json!({
        "title": "Edit Room",
        "is_edit": true,
        "form": RoomForm::from(&room),
    }))
}

pub(crate) async fn admin_room_edit<S>(
    State(service): Shared<S>,
    caller: CallerId,
    Path(room_id): Path<u64>,
    Submitted(form): Submitted<RoomForm>,
) -> Reply
where
    S: HostelStore + 'static,
{
    let capability = admin(&service, caller, AdminAction::EditRooms)?;
    service
        .save_room(&capability, Some(RoomId(room_id)), &form)
        .map_err(|err| failure(err, echo(&form)))?;
    Ok(redirect(
        Landing::AdminRoomList,
        Flash::success("Room updated successfully!"),
    ))
}

pub(crate) async fn admin_attendance_list<S>(
    State(service): Shared<S>,
    caller: CallerId,
    Query(filter): Query<AttendanceFilter>,
) -> Reply
where
    S: HostelStore + 'static,
{
    let capability = admin(&service, caller, AdminAction::ViewAttendance)?;
    service
        .attendance_records(&capability, &filter)
        .map_err(|err| failure(err, Value::Null))
        .and_then(ok)
}

pub(crate) async fn admin_announcement_list<S>(
    State(service): Shared<S>,
    caller: CallerId,
    Query(filter): Query<AnnouncementFilter>,
) -> Reply
where
    S: HostelStore + 'static,
{
    let capability = admin(&service, caller, AdminAction::ManageAnnouncements)?;
    service
        .announcement_board(&capability, &filter)
        .map_err(|err| failure(err, Value::Null))
        .and_then(ok)
}

pub(crate) async fn admin_occupancy<S>(State(service): Shared<S>, caller: CallerId) -> Reply
where
    S: HostelStore + 'static,
{
    let capability = admin(&service, caller, AdminAction::ViewOccupancy)?;
    service
        .occupancy_report(&capability)
        .map_err(|err| failure(err, Value::Null))
        .and_then(ok)
}
