//! Identity resolution: canonical phone to persistent student record.

use super::{now_rfc3339, Store};
use crate::types::Student;
use siembra_core::{error::SiembraError, phone};
use tracing::info;
use uuid::Uuid;

impl Store {
    /// Look up a student by canonical phone, creating one on first contact.
    ///
    /// New students get `display_name = "User <last-4>"` and `active = true`.
    /// A concurrent-create race loses the unique index and retries the
    /// lookup once.
    pub async fn resolve_or_create(&self, canonical_phone: &str) -> Result<Student, SiembraError> {
        if let Some(student) = self.student_by_phone(canonical_phone).await? {
            return Ok(student);
        }

        let id = Uuid::new_v4().to_string();
        let display_name = format!("User {}", phone::last_four(canonical_phone));
        let registered_at = now_rfc3339();

        let inserted = sqlx::query(
            "INSERT INTO students (id, display_name, phone, active, registered_at) \
             VALUES (?, ?, ?, 1, ?)",
        )
        .bind(&id)
        .bind(&display_name)
        .bind(canonical_phone)
        .bind(&registered_at)
        .execute(self.pool())
        .await;

        match inserted {
            Ok(_) => {
                info!("new student registered: {display_name}");
                Ok(Student {
                    id,
                    display_name,
                    phone: canonical_phone.to_string(),
                    active: true,
                    registered_at,
                })
            }
            Err(e) if is_unique_violation(&e) => {
                // Two workers raced on first contact; the other one won.
                self.student_by_phone(canonical_phone).await?.ok_or_else(|| {
                    SiembraError::Storage(format!(
                        "student create race for {canonical_phone} left no row"
                    ))
                })
            }
            Err(e) => Err(SiembraError::Storage(format!("student insert failed: {e}"))),
        }
    }

    /// Lookup only, no creation.
    pub async fn student_by_phone(&self, phone: &str) -> Result<Option<Student>, SiembraError> {
        let row: Option<(String, String, String, i64, String)> = sqlx::query_as(
            "SELECT id, display_name, phone, active, registered_at \
             FROM students WHERE phone = ?",
        )
        .bind(phone)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| SiembraError::Storage(format!("student lookup failed: {e}")))?;

        Ok(row.map(|(id, display_name, phone, active, registered_at)| Student {
            id,
            display_name,
            phone,
            active: active != 0,
            registered_at,
        }))
    }

    /// Update the display name. Idempotent; driven by the name-change intent.
    pub async fn update_display_name(
        &self,
        student_id: &str,
        display_name: &str,
    ) -> Result<(), SiembraError> {
        sqlx::query("UPDATE students SET display_name = ? WHERE id = ?")
            .bind(display_name)
            .bind(student_id)
            .execute(self.pool())
            .await
            .map_err(|e| SiembraError::Storage(format!("name update failed: {e}")))?;
        Ok(())
    }
}

/// Whether a sqlx error is a UNIQUE constraint violation.
pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.message().contains("UNIQUE"))
}
