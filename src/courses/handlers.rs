use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{
        policy::can_mutate,
        token::AuthUser,
    },
    error::ApiError,
    state::AppState,
};

use super::dto::{CourseResponse, CreateCourseRequest, DownloadResponse};
use super::repo::NewCourse;

// --- routers ---

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/courses", get(list_courses))
        .route("/courses/download/:id", put(download_course))
}

pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .route("/courses", post(create_course))
        .route("/courses/:id", delete(delete_course))
}

// --- handlers ---

#[instrument(skip(state))]
pub async fn list_courses(
    State(state): State<AppState>,
) -> Result<Json<Vec<CourseResponse>>, ApiError> {
    let courses = state.courses.list_newest_first().await?;
    Ok(Json(courses.into_iter().map(CourseResponse::from).collect()))
}

#[instrument(skip(state, payload))]
pub async fn create_course(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(mut payload): Json<CreateCourseRequest>,
) -> Result<(StatusCode, Json<CourseResponse>), ApiError> {
    payload.title = payload.title.trim().to_string();
    payload.link = payload.link.trim().to_string();
    payload.category = payload.category.trim().to_string();
    payload.validate()?;

    // The list endpoint serves courses without a join, so the author's
    // display name is denormalized onto the course at submission time.
    let author = state.users.find_by_id(identity.id).await?.ok_or_else(|| {
        warn!(user_id = %identity.id, "token subject no longer exists");
        ApiError::Unauthenticated
    })?;

    let description = payload
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());

    let course = state
        .courses
        .insert(NewCourse {
            title: payload.title,
            description,
            link: payload.link,
            category: payload.category,
            author_id: identity.id,
            author_name: author.name,
        })
        .await?;

    info!(course_id = %course.id, author_id = %course.author_id, "course created");
    Ok((StatusCode::CREATED, Json(course.into())))
}

#[instrument(skip(state))]
pub async fn delete_course(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let course = state
        .courses
        .find_by_id(id)
        .await?
        .ok_or(ApiError::NotFound("course"))?;

    if !can_mutate(identity, course.author_id) {
        warn!(user_id = %identity.id, course_id = %id, "course delete forbidden");
        return Err(ApiError::Forbidden);
    }

    if !state.courses.delete(id).await? {
        // Lost a race with another delete.
        return Err(ApiError::NotFound("course"));
    }

    info!(course_id = %id, user_id = %identity.id, "course deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn download_course(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DownloadResponse>, ApiError> {
    let downloads = state
        .courses
        .increment_downloads(id)
        .await?
        .ok_or(ApiError::NotFound("course"))?;
    Ok(Json(DownloadResponse { downloads }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::policy::{Identity, Role};
    use crate::auth::repo::NewUser;

    async fn seed_user(state: &AppState, name: &str, email: &str, role: Role) -> Identity {
        let user = state
            .users
            .insert(NewUser {
                name: name.into(),
                email: email.into(),
                password_hash: "$argon2id$fake".into(),
                role,
            })
            .await
            .expect("seed user");
        Identity {
            id: user.id,
            role: user.role,
        }
    }

    fn course_payload(title: &str, link: &str) -> CreateCourseRequest {
        CreateCourseRequest {
            title: title.into(),
            description: Some("A short description".into()),
            link: link.into(),
            category: "programming".into(),
        }
    }

    async fn seed_course(state: &AppState, identity: Identity, title: &str) -> CourseResponse {
        let (_, Json(course)) = create_course(
            State(state.clone()),
            AuthUser(identity),
            Json(course_payload(title, "https://example.com/go")),
        )
        .await
        .expect("create course");
        course
    }

    #[tokio::test]
    async fn create_assigns_author_and_zero_downloads() {
        let state = AppState::fake();
        let alice = seed_user(&state, "Alice", "alice@example.com", Role::User).await;

        let (status, Json(course)) = create_course(
            State(state.clone()),
            AuthUser(alice),
            Json(course_payload("Go Basics", "https://example.com/go")),
        )
        .await
        .expect("create course");

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(course.author_id, alice.id);
        assert_eq!(course.author_name, "Alice");
        assert_eq!(course.downloads, 0);
    }

    #[tokio::test]
    async fn create_reports_every_invalid_field_at_once() {
        let state = AppState::fake();
        let alice = seed_user(&state, "Alice", "alice@example.com", Role::User).await;

        let err = create_course(
            State(state.clone()),
            AuthUser(alice),
            Json(CreateCourseRequest {
                title: "   ".into(),
                description: None,
                link: "not-a-url".into(),
                category: "tooling".into(),
            }),
        )
        .await
        .expect_err("invalid payload");
        match err {
            ApiError::Validation(errors) => {
                let fields = errors.field_errors();
                assert!(fields.contains_key("title"));
                assert!(fields.contains_key("link"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn create_normalizes_blank_description_to_none() {
        let state = AppState::fake();
        let alice = seed_user(&state, "Alice", "alice@example.com", Role::User).await;

        let (_, Json(course)) = create_course(
            State(state.clone()),
            AuthUser(alice),
            Json(CreateCourseRequest {
                title: "Go Basics".into(),
                description: Some("   ".into()),
                link: "https://example.com/go".into(),
                category: "programming".into(),
            }),
        )
        .await
        .expect("create course");
        assert_eq!(course.description, None);
    }

    #[tokio::test]
    async fn delete_is_forbidden_for_non_author_users() {
        let state = AppState::fake();
        let alice = seed_user(&state, "Alice", "alice@example.com", Role::User).await;
        let bob = seed_user(&state, "Bob", "bob@example.com", Role::User).await;
        let course = seed_course(&state, alice, "Go Basics").await;

        let err = delete_course(State(state.clone()), AuthUser(bob), Path(course.id))
            .await
            .expect_err("non-author delete");
        assert!(matches!(err, ApiError::Forbidden));

        // Still listed.
        let courses = state.courses.list_newest_first().await.expect("list");
        assert!(courses.iter().any(|c| c.id == course.id));
    }

    #[tokio::test]
    async fn author_and_admin_may_delete() {
        let state = AppState::fake();
        let alice = seed_user(&state, "Alice", "alice@example.com", Role::User).await;
        let admin = seed_user(&state, "Root", "admin@example.com", Role::Admin).await;

        let own = seed_course(&state, alice, "Course One").await;
        let status = delete_course(State(state.clone()), AuthUser(alice), Path(own.id))
            .await
            .expect("author delete");
        assert_eq!(status, StatusCode::NO_CONTENT);

        let other = seed_course(&state, alice, "Course Two").await;
        let status = delete_course(State(state.clone()), AuthUser(admin), Path(other.id))
            .await
            .expect("admin delete");
        assert_eq!(status, StatusCode::NO_CONTENT);

        let courses = state.courses.list_newest_first().await.expect("list");
        assert!(courses.is_empty());
    }

    #[tokio::test]
    async fn delete_unknown_id_is_not_found_for_any_identity() {
        let state = AppState::fake();
        let alice = seed_user(&state, "Alice", "alice@example.com", Role::User).await;
        let admin = seed_user(&state, "Root", "admin@example.com", Role::Admin).await;

        for identity in [alice, admin] {
            let err = delete_course(State(state.clone()), AuthUser(identity), Path(Uuid::new_v4()))
                .await
                .expect_err("unknown id");
            assert!(matches!(err, ApiError::NotFound(_)));
        }
    }

    #[tokio::test]
    async fn download_increments_and_returns_the_count() {
        let state = AppState::fake();
        let alice = seed_user(&state, "Alice", "alice@example.com", Role::User).await;
        let course = seed_course(&state, alice, "Go Basics").await;

        let Json(first) = download_course(State(state.clone()), Path(course.id))
            .await
            .expect("first download");
        let Json(second) = download_course(State(state.clone()), Path(course.id))
            .await
            .expect("second download");
        assert_eq!(first.downloads, 1);
        assert_eq!(second.downloads, 2);
    }

    #[tokio::test]
    async fn download_unknown_id_is_not_found() {
        let state = AppState::fake();
        let err = download_course(State(state), Path(Uuid::new_v4()))
            .await
            .expect_err("unknown id");
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
