//! Course and module reads. Courses are authored externally; the pipeline
//! only ever reads them (plus the insert helpers used by seeding and tests).

use super::Store;
use crate::types::{Course, Module};
use siembra_core::error::SiembraError;
use uuid::Uuid;

type CourseRow = (String, String, String, String, i64, i64, i64);
type ModuleRow = (String, String, i64, String, String, Option<String>, i64);

fn course_from_row(r: CourseRow) -> Course {
    Course {
        id: r.0,
        title: r.1,
        emoji: r.2,
        description: r.3,
        duration_weeks: r.4,
        ordering_key: r.5,
        active: r.6 != 0,
    }
}

fn module_from_row(r: ModuleRow) -> Module {
    Module {
        id: r.0,
        course_id: r.1,
        number: r.2,
        title: r.3,
        body: r.4,
        media_ref: r.5,
        duration_days: r.6,
    }
}

const COURSE_COLS: &str = "id, title, emoji, description, duration_weeks, ordering_key, active";
const MODULE_COLS: &str = "id, course_id, number, title, body, media_ref, duration_days";

impl Store {
    /// Active courses ordered by their authoring key.
    pub async fn list_active_courses(&self) -> Result<Vec<Course>, SiembraError> {
        let rows: Vec<CourseRow> = sqlx::query_as(&format!(
            "SELECT {COURSE_COLS} FROM courses WHERE active = 1 ORDER BY ordering_key, title"
        ))
        .fetch_all(self.pool())
        .await
        .map_err(|e| SiembraError::Storage(format!("course list failed: {e}")))?;

        Ok(rows.into_iter().map(course_from_row).collect())
    }

    /// 1-based position into the active course list.
    pub async fn course_by_position(&self, position: usize) -> Result<Option<Course>, SiembraError> {
        if position == 0 {
            return Ok(None);
        }
        let courses = self.list_active_courses().await?;
        Ok(courses.into_iter().nth(position - 1))
    }

    /// Case- and accent-insensitive substring match on active course titles.
    pub async fn course_by_alias(&self, alias: &str) -> Result<Option<Course>, SiembraError> {
        let needle = fold(alias.trim());
        if needle.is_empty() {
            return Ok(None);
        }
        let courses = self.list_active_courses().await?;
        Ok(courses.into_iter().find(|c| fold(&c.title).contains(&needle)))
    }

    pub async fn course_by_id(&self, course_id: &str) -> Result<Option<Course>, SiembraError> {
        let row: Option<CourseRow> = sqlx::query_as(&format!(
            "SELECT {COURSE_COLS} FROM courses WHERE id = ?"
        ))
        .bind(course_id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| SiembraError::Storage(format!("course lookup failed: {e}")))?;

        Ok(row.map(course_from_row))
    }

    pub async fn module_by_id(&self, module_id: &str) -> Result<Option<Module>, SiembraError> {
        let row: Option<ModuleRow> = sqlx::query_as(&format!(
            "SELECT {MODULE_COLS} FROM modules WHERE id = ?"
        ))
        .bind(module_id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| SiembraError::Storage(format!("module lookup failed: {e}")))?;

        Ok(row.map(module_from_row))
    }

    /// Module 1 of a course.
    pub async fn first_module(&self, course_id: &str) -> Result<Option<Module>, SiembraError> {
        let row: Option<ModuleRow> = sqlx::query_as(&format!(
            "SELECT {MODULE_COLS} FROM modules WHERE course_id = ? ORDER BY number LIMIT 1"
        ))
        .bind(course_id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| SiembraError::Storage(format!("first module lookup failed: {e}")))?;

        Ok(row.map(module_from_row))
    }

    /// Next module after the given number, if any.
    pub async fn next_module(
        &self,
        course_id: &str,
        after_number: i64,
    ) -> Result<Option<Module>, SiembraError> {
        let row: Option<ModuleRow> = sqlx::query_as(&format!(
            "SELECT {MODULE_COLS} FROM modules \
             WHERE course_id = ? AND number > ? ORDER BY number LIMIT 1"
        ))
        .bind(course_id)
        .bind(after_number)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| SiembraError::Storage(format!("next module lookup failed: {e}")))?;

        Ok(row.map(module_from_row))
    }

    pub async fn count_modules(&self, course_id: &str) -> Result<i64, SiembraError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM modules WHERE course_id = ?")
                .bind(course_id)
                .fetch_one(self.pool())
                .await
                .map_err(|e| SiembraError::Storage(format!("module count failed: {e}")))?;
        Ok(count)
    }

    /// Insert a course (seeding/tests; authoring lives outside the pipeline).
    pub async fn insert_course(&self, course: &Course) -> Result<(), SiembraError> {
        sqlx::query(
            "INSERT INTO courses \
             (id, title, emoji, description, duration_weeks, ordering_key, active) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&course.id)
        .bind(&course.title)
        .bind(&course.emoji)
        .bind(&course.description)
        .bind(course.duration_weeks)
        .bind(course.ordering_key)
        .bind(course.active as i64)
        .execute(self.pool())
        .await
        .map_err(|e| SiembraError::Storage(format!("course insert failed: {e}")))?;
        Ok(())
    }

    /// Insert a module (seeding/tests).
    pub async fn insert_module(&self, module: &Module) -> Result<(), SiembraError> {
        sqlx::query(
            "INSERT INTO modules \
             (id, course_id, number, title, body, media_ref, duration_days) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&module.id)
        .bind(&module.course_id)
        .bind(module.number)
        .bind(&module.title)
        .bind(&module.body)
        .bind(&module.media_ref)
        .bind(module.duration_days)
        .execute(self.pool())
        .await
        .map_err(|e| SiembraError::Storage(format!("module insert failed: {e}")))?;
        Ok(())
    }
}

/// Lowercase and strip Spanish accents for alias matching.
fn fold(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .map(|c| match c {
            'á' => 'a',
            'é' => 'e',
            'í' => 'i',
            'ó' => 'o',
            'ú' => 'u',
            _ => c,
        })
        .collect()
}

/// Convenience constructor for seeding and tests.
pub fn new_course(title: &str, emoji: &str, ordering_key: i64) -> Course {
    Course {
        id: Uuid::new_v4().to_string(),
        title: title.to_string(),
        emoji: emoji.to_string(),
        description: String::new(),
        duration_weeks: 4,
        ordering_key,
        active: true,
    }
}

/// Convenience constructor for seeding and tests.
pub fn new_module(course_id: &str, number: i64, title: &str, body: &str) -> Module {
    Module {
        id: Uuid::new_v4().to_string(),
        course_id: course_id.to_string(),
        number,
        title: title.to_string(),
        body: body.to_string(),
        media_ref: None,
        duration_days: 7,
    }
}
