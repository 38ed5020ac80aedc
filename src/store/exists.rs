use super::Store;

impl Store {
    pub async fn ban_exists(&self, room_id: &str, fingerprint: &str) -> anyhow::Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT 1 FROM banned_fingerprints WHERE room_id = ? AND fingerprint = ?",
        )
        .bind(room_id)
        .bind(fingerprint)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    pub async fn room_code_exists(&self, code: &str) -> anyhow::Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM rooms WHERE code = ?")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }
}
