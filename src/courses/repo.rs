use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::StoreError;

#[derive(Debug, Clone, FromRow)]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub link: String,
    pub category: String,
    pub author_id: Uuid,
    pub author_name: String,
    pub downloads: i64,
    pub created_at: OffsetDateTime,
}

/// Insert payload; id, downloads and created_at are store-assigned.
#[derive(Debug, Clone)]
pub struct NewCourse {
    pub title: String,
    pub description: Option<String>,
    pub link: String,
    pub category: String,
    pub author_id: Uuid,
    pub author_name: String,
}

#[async_trait]
pub trait CourseStore: Send + Sync {
    async fn insert(&self, course: NewCourse) -> Result<Course, StoreError>;
    async fn list_newest_first(&self) -> Result<Vec<Course>, StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Course>, StoreError>;
    /// Returns false when the id was already gone.
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;
    /// Atomic increment; returns the new count, or None for an unknown id.
    async fn increment_downloads(&self, id: Uuid) -> Result<Option<i64>, StoreError>;
}

pub struct PgCourseStore {
    db: PgPool,
}

impl PgCourseStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CourseStore for PgCourseStore {
    async fn insert(&self, course: NewCourse) -> Result<Course, StoreError> {
        let row = sqlx::query_as::<_, Course>(
            r#"
            INSERT INTO courses (title, description, link, category, author_id, author_name)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, title, description, link, category,
                      author_id, author_name, downloads, created_at
            "#,
        )
        .bind(&course.title)
        .bind(&course.description)
        .bind(&course.link)
        .bind(&course.category)
        .bind(course.author_id)
        .bind(&course.author_name)
        .fetch_one(&self.db)
        .await?;
        Ok(row)
    }

    async fn list_newest_first(&self) -> Result<Vec<Course>, StoreError> {
        let rows = sqlx::query_as::<_, Course>(
            r#"
            SELECT id, title, description, link, category,
                   author_id, author_name, downloads, created_at
            FROM courses
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Course>, StoreError> {
        let course = sqlx::query_as::<_, Course>(
            r#"
            SELECT id, title, description, link, category,
                   author_id, author_name, downloads, created_at
            FROM courses
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(course)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn increment_downloads(&self, id: Uuid) -> Result<Option<i64>, StoreError> {
        // One conditional UPDATE, so concurrent downloads never lose counts.
        let downloads = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE courses
            SET downloads = downloads + 1
            WHERE id = $1
            RETURNING downloads
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(downloads)
    }
}

/// In-memory store mirroring the Postgres contracts for tests.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryCourseStore {
    courses: tokio::sync::RwLock<Vec<Course>>,
}

#[cfg(test)]
#[async_trait]
impl CourseStore for MemoryCourseStore {
    async fn insert(&self, course: NewCourse) -> Result<Course, StoreError> {
        let row = Course {
            id: Uuid::new_v4(),
            title: course.title,
            description: course.description,
            link: course.link,
            category: course.category,
            author_id: course.author_id,
            author_name: course.author_name,
            downloads: 0,
            created_at: OffsetDateTime::now_utc(),
        };
        self.courses.write().await.push(row.clone());
        Ok(row)
    }

    async fn list_newest_first(&self) -> Result<Vec<Course>, StoreError> {
        let mut rows = self.courses.read().await.clone();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Course>, StoreError> {
        let courses = self.courses.read().await;
        Ok(courses.iter().find(|c| c.id == id).cloned())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut courses = self.courses.write().await;
        let before = courses.len();
        courses.retain(|c| c.id != id);
        Ok(courses.len() < before)
    }

    async fn increment_downloads(&self, id: Uuid) -> Result<Option<i64>, StoreError> {
        let mut courses = self.courses.write().await;
        match courses.iter_mut().find(|c| c.id == id) {
            Some(course) => {
                course.downloads += 1;
                Ok(Some(course.downloads))
            }
            None => Ok(None),
        }
    }
}
