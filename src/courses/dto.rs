use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;
use validator::Validate;

use crate::courses::repo::Course;

/// Request body for course submission.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCourseRequest {
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub title: String,
    pub description: Option<String>,
    #[validate(url(message = "link must be a valid URL"))]
    pub link: String,
    #[validate(length(min = 1, message = "category must not be empty"))]
    pub category: String,
}

/// Course as served to clients.
#[derive(Debug, Serialize)]
pub struct CourseResponse {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub link: String,
    pub category: String,
    pub author_id: Uuid,
    pub author_name: String,
    pub downloads: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<Course> for CourseResponse {
    fn from(course: Course) -> Self {
        Self {
            id: course.id,
            title: course.title,
            description: course.description,
            link: course.link,
            category: course.category,
            author_id: course.author_id,
            author_name: course.author_name,
            downloads: course.downloads,
            created_at: course.created_at,
        }
    }
}

/// Response for the public download-counter endpoint.
#[derive(Debug, Serialize)]
pub struct DownloadResponse {
    pub downloads: i64,
}
