//! Enrollment lifecycle and the atomic `advance` transition.

use super::{now_rfc3339, Store};
use crate::types::{Enrollment, Module};
use siembra_core::error::SiembraError;
use tracing::info;
use uuid::Uuid;

type EnrollmentRow = (
    String,
    String,
    String,
    Option<String>,
    String,
    Option<String>,
    i64,
);

fn enrollment_from_row(r: EnrollmentRow) -> Enrollment {
    Enrollment {
        id: r.0,
        student_id: r.1,
        course_id: r.2,
        current_module_id: r.3,
        started_at: r.4,
        finished_at: r.5,
        completed: r.6 != 0,
    }
}

const ENROLLMENT_COLS: &str =
    "id, student_id, course_id, current_module_id, started_at, finished_at, completed";

/// What `advance` did.
#[derive(Debug, Clone)]
pub enum AdvanceOutcome {
    /// The current module was completed and the pointer moved on.
    Advanced { completed: Module, next: Module },
    /// The final module was completed; the enrollment is now done.
    CourseCompleted { completed: Module, total_modules: i64 },
    /// The enrollment was already completed; nothing changed.
    AlreadyCompleted,
}

impl Store {
    pub async fn enrollment_for_course(
        &self,
        student_id: &str,
        course_id: &str,
    ) -> Result<Option<Enrollment>, SiembraError> {
        let row: Option<EnrollmentRow> = sqlx::query_as(&format!(
            "SELECT {ENROLLMENT_COLS} FROM enrollments \
             WHERE student_id = ? AND course_id = ?"
        ))
        .bind(student_id)
        .bind(course_id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| SiembraError::Storage(format!("enrollment lookup failed: {e}")))?;

        Ok(row.map(enrollment_from_row))
    }

    /// All enrollments for a student, most recent first (progress report).
    pub async fn enrollments_for_student(
        &self,
        student_id: &str,
    ) -> Result<Vec<Enrollment>, SiembraError> {
        let rows: Vec<EnrollmentRow> = sqlx::query_as(&format!(
            "SELECT {ENROLLMENT_COLS} FROM enrollments \
             WHERE student_id = ? ORDER BY started_at DESC"
        ))
        .bind(student_id)
        .fetch_all(self.pool())
        .await
        .map_err(|e| SiembraError::Storage(format!("enrollment list failed: {e}")))?;

        Ok(rows.into_iter().map(enrollment_from_row).collect())
    }

    /// The most-recently-started non-completed enrollment, if any.
    pub async fn current_enrollment(
        &self,
        student_id: &str,
    ) -> Result<Option<Enrollment>, SiembraError> {
        let row: Option<EnrollmentRow> = sqlx::query_as(&format!(
            "SELECT {ENROLLMENT_COLS} FROM enrollments \
             WHERE student_id = ? AND completed = 0 \
             ORDER BY started_at DESC LIMIT 1"
        ))
        .bind(student_id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| SiembraError::Storage(format!("current enrollment lookup failed: {e}")))?;

        Ok(row.map(enrollment_from_row))
    }

    /// Create a fresh enrollment pointing at the course's first module.
    pub async fn create_enrollment(
        &self,
        student_id: &str,
        course_id: &str,
        first_module_id: &str,
    ) -> Result<Enrollment, SiembraError> {
        let id = Uuid::new_v4().to_string();
        let started_at = now_rfc3339();

        sqlx::query(
            "INSERT INTO enrollments \
             (id, student_id, course_id, current_module_id, started_at, completed) \
             VALUES (?, ?, ?, ?, ?, 0)",
        )
        .bind(&id)
        .bind(student_id)
        .bind(course_id)
        .bind(first_module_id)
        .bind(&started_at)
        .execute(self.pool())
        .await
        .map_err(|e| SiembraError::Storage(format!("enrollment insert failed: {e}")))?;

        info!("enrollment created: student={student_id} course={course_id}");

        Ok(Enrollment {
            id,
            student_id: student_id.to_string(),
            course_id: course_id.to_string(),
            current_module_id: Some(first_module_id.to_string()),
            started_at,
            finished_at: None,
            completed: false,
        })
    }

    /// Refresh `started_at` so this enrollment becomes the current one.
    pub async fn touch_enrollment(&self, enrollment_id: &str) -> Result<(), SiembraError> {
        sqlx::query("UPDATE enrollments SET started_at = ? WHERE id = ?")
            .bind(now_rfc3339())
            .bind(enrollment_id)
            .execute(self.pool())
            .await
            .map_err(|e| SiembraError::Storage(format!("enrollment touch failed: {e}")))?;
        Ok(())
    }

    /// Repair a null module pointer (data anomaly) to the given module.
    pub async fn heal_current_module(
        &self,
        enrollment_id: &str,
        module_id: &str,
    ) -> Result<(), SiembraError> {
        sqlx::query(
            "UPDATE enrollments SET current_module_id = ? \
             WHERE id = ? AND current_module_id IS NULL",
        )
        .bind(module_id)
        .bind(enrollment_id)
        .execute(self.pool())
        .await
        .map_err(|e| SiembraError::Storage(format!("enrollment heal failed: {e}")))?;
        Ok(())
    }

    pub async fn completions_count(&self, enrollment_id: &str) -> Result<i64, SiembraError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM module_completions WHERE enrollment_id = ?")
                .bind(enrollment_id)
                .fetch_one(self.pool())
                .await
                .map_err(|e| SiembraError::Storage(format!("completion count failed: {e}")))?;
        Ok(count)
    }

    /// Complete the current module and move the pointer, atomically.
    ///
    /// Completion is idempotent through the `(enrollment, module)` unique
    /// index; completing the final module marks the enrollment finished and
    /// leaves the pointer on the last module.
    pub async fn advance(&self, enrollment: &Enrollment) -> Result<AdvanceOutcome, SiembraError> {
        if enrollment.completed {
            return Ok(AdvanceOutcome::AlreadyCompleted);
        }

        let current_id = enrollment.current_module_id.as_deref().ok_or_else(|| {
            SiembraError::Storage(format!(
                "enrollment {} has no current module to advance",
                enrollment.id
            ))
        })?;

        let current = self.module_by_id(current_id).await?.ok_or_else(|| {
            SiembraError::Storage(format!("module {current_id} not found"))
        })?;
        let next = self
            .next_module(&enrollment.course_id, current.number)
            .await?;

        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| SiembraError::Storage(format!("advance tx begin failed: {e}")))?;

        sqlx::query(
            "INSERT OR IGNORE INTO module_completions \
             (id, enrollment_id, module_id, completed_at) VALUES (?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&enrollment.id)
        .bind(&current.id)
        .bind(now_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(|e| SiembraError::Storage(format!("completion insert failed: {e}")))?;

        let outcome = match next {
            Some(next) => {
                sqlx::query("UPDATE enrollments SET current_module_id = ? WHERE id = ?")
                    .bind(&next.id)
                    .bind(&enrollment.id)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| {
                        SiembraError::Storage(format!("pointer update failed: {e}"))
                    })?;
                AdvanceOutcome::Advanced {
                    completed: current,
                    next,
                }
            }
            None => {
                sqlx::query(
                    "UPDATE enrollments SET completed = 1, finished_at = ? WHERE id = ?",
                )
                .bind(now_rfc3339())
                .bind(&enrollment.id)
                .execute(&mut *tx)
                .await
                .map_err(|e| SiembraError::Storage(format!("completion update failed: {e}")))?;

                let total_modules = self.count_modules(&enrollment.course_id).await?;
                AdvanceOutcome::CourseCompleted {
                    completed: current,
                    total_modules,
                }
            }
        };

        tx.commit()
            .await
            .map_err(|e| SiembraError::Storage(format!("advance tx commit failed: {e}")))?;

        Ok(outcome)
    }
}
