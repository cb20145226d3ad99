use pathway_core::model::{
    Certificate, CertificateCode, CertificateId, NewCertificate, PathId, UserId,
};

use super::SqliteRepository;
use super::mapping::{id_i64, map_certificate_row, write_err};
use crate::repository::{CertificateRepository, StorageError};

#[async_trait::async_trait]
impl CertificateRepository for SqliteRepository {
    async fn insert_certificate_if_absent(
        &self,
        certificate: NewCertificate,
    ) -> Result<Option<Certificate>, StorageError> {
        // Only the (user_id, path_id) key is absorbed; a duplicate code still
        // raises a unique violation, surfaced as Conflict.
        let res = sqlx::query(
            r"
            INSERT INTO certificates (user_id, path_id, code, issued_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(user_id, path_id) DO NOTHING
            ",
        )
        .bind(id_i64("user_id", certificate.user_id.value())?)
        .bind(id_i64("path_id", certificate.path_id.value())?)
        .bind(certificate.code.as_str())
        .bind(certificate.issued_at)
        .execute(&self.pool)
        .await
        .map_err(write_err)?;

        if res.rows_affected() == 0 {
            return Ok(None);
        }

        let id = u64::try_from(res.last_insert_rowid())
            .map_err(|_| StorageError::Serialization("certificate id sign overflow".into()))?;
        Ok(Some(certificate.assign_id(CertificateId::new(id))))
    }

    async fn find_certificate(
        &self,
        user_id: UserId,
        path_id: PathId,
    ) -> Result<Option<Certificate>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, user_id, path_id, code, issued_at
            FROM certificates
            WHERE user_id = ?1 AND path_id = ?2
            ",
        )
        .bind(id_i64("user_id", user_id.value())?)
        .bind(id_i64("path_id", path_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(map_certificate_row).transpose()
    }

    async fn get_certificate_by_code(
        &self,
        code: &CertificateCode,
    ) -> Result<Option<Certificate>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, user_id, path_id, code, issued_at
            FROM certificates
            WHERE code = ?1
            ",
        )
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(map_certificate_row).transpose()
    }

    async fn list_user_certificates(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Certificate>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, user_id, path_id, code, issued_at
            FROM certificates
            WHERE user_id = ?1
            ORDER BY id ASC
            ",
        )
        .bind(id_i64("user_id", user_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        rows.iter().map(map_certificate_row).collect()
    }

    async fn list_certificates(&self, limit: u32) -> Result<Vec<Certificate>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, user_id, path_id, code, issued_at
            FROM certificates
            ORDER BY id ASC
            LIMIT ?1
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        rows.iter().map(map_certificate_row).collect()
    }

    async fn delete_certificate(&self, id: CertificateId) -> Result<bool, StorageError> {
        let res = sqlx::query("DELETE FROM certificates WHERE id = ?1")
            .bind(id_i64("certificate_id", id.value())?)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(res.rows_affected() > 0)
    }
}
