//! REST surface. Reads of public content need no token; writes need a staff
//! token, and a few admin operations need the admin role.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
};
use serde_json::{Map, Value};

use chapel_db::commands::Confirmation;
use chapel_db::{Document, Setting};
use chapel_types::api::{
    ActivityEntry, DonationStatusRequest, DonationSummary, HealthReport, InterestStatusRequest,
    LoginRequest, LoginResponse, MarkAllReadResponse, MarkReadRequest, OtpRequest,
    OtpVerifyRequest, QuizSubmission, RegisterRequest, ResetPasswordRequest, RoleUpdateRequest,
    VerifyResponse,
};
use chapel_types::models::{
    AboutConfig, Announcement, BibleQuiz, ContactMessage, DailyVerse, Department,
    DepartmentInterest, Donation, DonationProject, HomeConfig, Leader, Member, NewsItem,
    QuizResult, Role, VerseReflection,
};

use crate::error::JsonBody;
use crate::middleware::{AuthUser, StaffUser};
use crate::{Api, ApiError, ApiResult};

type Patch = Map<String, Value>;

pub fn router(api: Api) -> Router {
    let routes = Router::new()
        // Plain content: public reads, staff writes
        .merge(crud::<NewsItem>("/news"))
        .merge(crud::<Leader>("/leaders"))
        .merge(crud::<Department>("/departments"))
        .merge(crud::<DonationProject>("/donation-projects"))
        .merge(crud::<DailyVerse>("/verses"))
        .merge(crud::<BibleQuiz>("/quizzes"))
        .route("/announcements/active", get(active_announcements))
        .merge(crud::<Announcement>("/announcements"))
        .route("/verses/today", get(verse_of_the_day))
        .route("/quizzes/{id}/submit", post(submit_quiz))
        // Members
        .route("/members", get(list_staff::<Member>).post(create_member))
        .route(
            "/members/{id}",
            get(fetch_staff::<Member>).put(update_member).delete(delete_member),
        )
        .route("/members/{id}/role", patch(update_member_role))
        // Auth
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
        .route("/auth/otp", post(request_otp))
        .route("/auth/otp/verify", post(verify_otp))
        .route("/auth/reset", post(reset_password))
        // Department interests
        .route(
            "/departments/{id}/interests",
            get(department_interests).post(submit_interest),
        )
        .route("/interests", get(list_staff::<DepartmentInterest>))
        .route(
            "/interests/{id}",
            get(fetch_staff::<DepartmentInterest>).delete(remove::<DepartmentInterest>),
        )
        .route("/interests/{id}/status", patch(update_interest_status))
        // Donations
        .route("/donations", get(recent_donations).post(submit_donation))
        .route("/donations/summary", get(donation_summary))
        .route(
            "/donations/{id}",
            get(fetch_staff::<Donation>).delete(remove::<Donation>),
        )
        .route("/donations/{id}/status", patch(update_donation_status))
        .route("/donations/{id}/confirm", post(confirm_donation))
        // Contact messages
        .route("/contacts", get(list_staff::<ContactMessage>).post(submit_contact))
        .route("/contacts/read-all", post(mark_all_read))
        .route(
            "/contacts/{id}",
            get(fetch_staff::<ContactMessage>)
                .put(update::<ContactMessage>)
                .delete(remove::<ContactMessage>),
        )
        .route("/contacts/{id}/read", patch(mark_read))
        // Reflections and quiz results
        .route("/reflections", get(list::<VerseReflection>).post(submit_reflection))
        .route(
            "/reflections/{id}",
            get(fetch::<VerseReflection>).delete(remove::<VerseReflection>),
        )
        .route("/quiz-results", get(list_staff::<QuizResult>))
        .route(
            "/quiz-results/{id}",
            get(fetch_staff::<QuizResult>).delete(remove::<QuizResult>),
        )
        // Site settings
        .route("/home-config", get(get_setting::<HomeConfig>).put(merge_setting::<HomeConfig>))
        .route("/about-config", get(get_setting::<AboutConfig>).put(merge_setting::<AboutConfig>))
        // System
        .route("/health", get(health))
        .route("/system/logs", get(activity_log))
        .route("/system/reset", post(reset));

    Router::new().nest("/api", routes).with_state(api)
}

/// List and create on `path`, read, replace-merge and delete on `path/{id}`.
fn crud<T: Document>(path: &str) -> Router<Api> {
    Router::new()
        .route(path, get(list::<T>).post(create::<T>))
        .route(
            &format!("{}/{{id}}", path),
            get(fetch::<T>).put(update::<T>).delete(remove::<T>),
        )
}

fn not_found<T: Document>(id: &str) -> ApiError {
    ApiError::NotFound(format!("{} record '{}'", T::COLLECTION, id))
}

fn require_admin(user: &StaffUser) -> ApiResult<()> {
    if user.0.role != Role::Admin {
        return Err(ApiError::Forbidden("admin role required".to_string()));
    }
    Ok(())
}

// -- Generic collection handlers --

async fn list<T: Document>(State(api): State<Api>) -> ApiResult<Json<Vec<T>>> {
    Ok(Json(api.collection::<T>().list().await?))
}

async fn list_staff<T: Document>(_: StaffUser, State(api): State<Api>) -> ApiResult<Json<Vec<T>>> {
    Ok(Json(api.collection::<T>().list().await?))
}

async fn fetch<T: Document>(State(api): State<Api>, Path(id): Path<String>) -> ApiResult<Json<T>> {
    api.collection::<T>()
        .get(&id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found::<T>(&id))
}

async fn fetch_staff<T: Document>(
    _: StaffUser,
    State(api): State<Api>,
    Path(id): Path<String>,
) -> ApiResult<Json<T>> {
    fetch::<T>(State(api), Path(id)).await
}

async fn create<T: Document>(
    _: StaffUser,
    State(api): State<Api>,
    JsonBody(item): JsonBody<T>,
) -> ApiResult<(StatusCode, Json<T>)> {
    let created = api.collection::<T>().create(item).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update<T: Document>(
    _: StaffUser,
    State(api): State<Api>,
    Path(id): Path<String>,
    JsonBody(patch): JsonBody<Patch>,
) -> ApiResult<Json<T>> {
    api.collection::<T>()
        .update(&id, patch)
        .await?
        .map(Json)
        .ok_or_else(|| not_found::<T>(&id))
}

async fn remove<T: Document>(
    _: StaffUser,
    State(api): State<Api>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if api.collection::<T>().delete(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found::<T>(&id))
    }
}

// -- Settings --

async fn get_setting<S: Setting>(State(api): State<Api>) -> ApiResult<Json<S>> {
    Ok(Json(api.settings::<S>().get().await?))
}

async fn merge_setting<S: Setting>(
    _: StaffUser,
    State(api): State<Api>,
    JsonBody(patch): JsonBody<Patch>,
) -> ApiResult<Json<S>> {
    Ok(Json(api.settings::<S>().merge(patch).await?))
}

// -- Content extras --

async fn active_announcements(State(api): State<Api>) -> ApiResult<Json<Vec<Announcement>>> {
    Ok(Json(api.announcements().list_active().await?))
}

async fn verse_of_the_day(State(api): State<Api>) -> ApiResult<Json<DailyVerse>> {
    api.verses()
        .today()
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("verse".to_string()))
}

async fn submit_quiz(
    State(api): State<Api>,
    Path(id): Path<String>,
    JsonBody(submission): JsonBody<QuizSubmission>,
) -> ApiResult<(StatusCode, Json<QuizResult>)> {
    let result = api
        .quizzes()
        .submit(&id, submission)
        .await?
        .ok_or_else(|| not_found::<BibleQuiz>(&id))?;
    Ok((StatusCode::CREATED, Json(result)))
}

async fn submit_reflection(
    State(api): State<Api>,
    JsonBody(reflection): JsonBody<VerseReflection>,
) -> ApiResult<(StatusCode, Json<VerseReflection>)> {
    let stored = api.reflections().submit(reflection).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

// -- Members --

async fn create_member(
    _: StaffUser,
    State(api): State<Api>,
    JsonBody(member): JsonBody<Member>,
) -> ApiResult<(StatusCode, Json<Member>)> {
    let created = api.members().create(member).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_member(
    user: StaffUser,
    State(api): State<Api>,
    Path(id): Path<String>,
    JsonBody(patch): JsonBody<Patch>,
) -> ApiResult<Json<Member>> {
    if patch.contains_key("role") {
        require_admin(&user)?;
    }
    api.members()
        .update(&id, patch)
        .await?
        .map(Json)
        .ok_or_else(|| not_found::<Member>(&id))
}

async fn update_member_role(
    user: StaffUser,
    State(api): State<Api>,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<RoleUpdateRequest>,
) -> ApiResult<Json<Member>> {
    require_admin(&user)?;
    api.members()
        .update_role(&id, req.role)
        .await?
        .map(Json)
        .ok_or_else(|| not_found::<Member>(&id))
}

async fn delete_member(
    _: StaffUser,
    State(api): State<Api>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if api.members().delete(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found::<Member>(&id))
    }
}

// -- Auth --

async fn register(
    State(api): State<Api>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<Member>)> {
    let member = api.auth().register(req).await?;
    Ok((StatusCode::CREATED, Json(member)))
}

async fn login(
    State(api): State<Api>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    Ok(Json(api.auth().login(&req.email, &req.password).await?))
}

async fn logout(AuthUser(claims): AuthUser, State(api): State<Api>) -> ApiResult<StatusCode> {
    api.auth().logout(&claims.sub).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn me(AuthUser(claims): AuthUser, State(api): State<Api>) -> ApiResult<Json<Member>> {
    api.members()
        .get(&claims.sub)
        .await?
        .map(Json)
        .ok_or_else(|| not_found::<Member>(&claims.sub))
}

async fn request_otp(
    State(api): State<Api>,
    JsonBody(req): JsonBody<OtpRequest>,
) -> ApiResult<StatusCode> {
    api.auth().request_otp(&req.email).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn verify_otp(
    State(api): State<Api>,
    JsonBody(req): JsonBody<OtpVerifyRequest>,
) -> ApiResult<Json<VerifyResponse>> {
    let valid = api.auth().verify_otp(&req.email, &req.otp).await?;
    Ok(Json(VerifyResponse { valid }))
}

async fn reset_password(
    State(api): State<Api>,
    JsonBody(req): JsonBody<ResetPasswordRequest>,
) -> ApiResult<StatusCode> {
    api.auth()
        .reset_password(&req.email, &req.otp, &req.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// -- Department interests --

async fn department_interests(
    _: StaffUser,
    State(api): State<Api>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<DepartmentInterest>>> {
    Ok(Json(api.interests().list_for_department(&id).await?))
}

async fn submit_interest(
    State(api): State<Api>,
    Path(id): Path<String>,
    JsonBody(mut interest): JsonBody<DepartmentInterest>,
) -> ApiResult<(StatusCode, Json<DepartmentInterest>)> {
    interest.department_id = id;
    let stored = api.interests().submit(interest).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

async fn update_interest_status(
    _: StaffUser,
    State(api): State<Api>,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<InterestStatusRequest>,
) -> ApiResult<Json<DepartmentInterest>> {
    api.interests()
        .update_status(&id, req.status)
        .await?
        .map(Json)
        .ok_or_else(|| not_found::<DepartmentInterest>(&id))
}

// -- Donations --

async fn recent_donations(_: StaffUser, State(api): State<Api>) -> ApiResult<Json<Vec<Donation>>> {
    Ok(Json(api.donations().list_recent().await?))
}

async fn submit_donation(
    State(api): State<Api>,
    JsonBody(donation): JsonBody<Donation>,
) -> ApiResult<(StatusCode, Json<Donation>)> {
    let stored = api.donations().submit(donation).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

async fn donation_summary(State(api): State<Api>) -> ApiResult<Json<DonationSummary>> {
    Ok(Json(api.donations().summary().await?))
}

async fn update_donation_status(
    _: StaffUser,
    State(api): State<Api>,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<DonationStatusRequest>,
) -> ApiResult<Json<Donation>> {
    api.donations()
        .update_status(&id, req.status)
        .await?
        .map(Json)
        .ok_or_else(|| not_found::<Donation>(&id))
}

async fn confirm_donation(
    _: StaffUser,
    State(api): State<Api>,
    Path(id): Path<String>,
) -> ApiResult<Json<Donation>> {
    api.donations()
        .confirm(&id)
        .await?
        .map(|Confirmation { donation, .. }| Json(donation))
        .ok_or_else(|| not_found::<Donation>(&id))
}

// -- Contacts --

async fn submit_contact(
    State(api): State<Api>,
    JsonBody(message): JsonBody<ContactMessage>,
) -> ApiResult<(StatusCode, Json<ContactMessage>)> {
    let stored = api.contacts().submit(message).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

async fn mark_read(
    _: StaffUser,
    State(api): State<Api>,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<MarkReadRequest>,
) -> ApiResult<Json<ContactMessage>> {
    api.contacts()
        .mark_read(&id, req.is_read)
        .await?
        .map(Json)
        .ok_or_else(|| not_found::<ContactMessage>(&id))
}

async fn mark_all_read(_: StaffUser, State(api): State<Api>) -> ApiResult<Json<MarkAllReadResponse>> {
    let updated = api.contacts().mark_all_read().await?;
    Ok(Json(MarkAllReadResponse { updated }))
}

// -- System --

async fn health(State(api): State<Api>) -> ApiResult<Json<HealthReport>> {
    Ok(Json(api.system().health().await?))
}

async fn activity_log(_: StaffUser, State(api): State<Api>) -> ApiResult<Json<Vec<ActivityEntry>>> {
    Ok(Json(api.system().logs().await?))
}

async fn reset(user: StaffUser, State(api): State<Api>) -> ApiResult<StatusCode> {
    require_admin(&user)?;
    api.system().reset().await?;
    Ok(StatusCode::NO_CONTENT)
}
