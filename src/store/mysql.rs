use async_trait::async_trait;
use futures::StreamExt;
use moka::future::Cache;
use sqlx::MySqlPool;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use super::SnapshotSink;
use crate::error::StoreError;
use crate::model::{BulkField, PayrollSnapshot, SalaryResult, SnapshotUpdate};

const CREATE_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS payroll_snapshots (
        id          VARCHAR(36) NOT NULL PRIMARY KEY,
        employee_no VARCHAR(64) NOT NULL UNIQUE,
        data        LONGTEXT    NOT NULL,
        updated_at  TIMESTAMP   NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP
    )
"#;

/// Snapshots stored as JSON documents, one row per employee.
pub struct MySqlSnapshotStore {
    pool: MySqlPool,
    /// employee_no => id
    ids: Cache<String, String>,
}

impl MySqlSnapshotStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self {
            pool,
            ids: Cache::builder()
                .max_capacity(50_000)
                .time_to_live(Duration::from_secs(3600))
                .build(),
        }
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(CREATE_TABLE_SQL).execute(&self.pool).await?;
        info!("payroll_snapshots table ready");
        Ok(())
    }

    async fn id_for_employee(&self, employee_no: &str) -> Result<Option<String>, StoreError> {
        if let Some(id) = self.ids.get(employee_no).await {
            return Ok(Some(id));
        }

        let id = sqlx::query_scalar::<_, String>(
            "SELECT id FROM payroll_snapshots WHERE employee_no = ?",
        )
        .bind(employee_no)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(id) = &id {
            self.ids.insert(employee_no.to_string(), id.clone()).await;
        }
        Ok(id)
    }

    async fn write_row(&self, snapshot: &PayrollSnapshot) -> Result<(), StoreError> {
        let data = serde_json::to_string(&snapshot.result)?;
        sqlx::query("UPDATE payroll_snapshots SET employee_no = ?, data = ? WHERE id = ?")
            .bind(snapshot.employee_no())
            .bind(data)
            .bind(&snapshot.id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn decode(id: String, data: &str) -> Result<PayrollSnapshot, StoreError> {
    Ok(PayrollSnapshot {
        id,
        result: serde_json::from_str(data)?,
    })
}

#[async_trait]
impl SnapshotSink for MySqlSnapshotStore {
    async fn create(&self, result: SalaryResult) -> Result<PayrollSnapshot, StoreError> {
        let candidate = match self.id_for_employee(&result.employee_no).await? {
            Some(id) => id,
            None => Uuid::new_v4().to_string(),
        };
        let data = serde_json::to_string(&result)?;

        sqlx::query(
            r#"
            INSERT INTO payroll_snapshots (id, employee_no, data)
            VALUES (?, ?, ?)
            ON DUPLICATE KEY UPDATE data = VALUES(data)
            "#,
        )
        .bind(&candidate)
        .bind(&result.employee_no)
        .bind(data)
        .execute(&self.pool)
        .await?;

        // a concurrent insert for the same employee may have won the id
        self.ids.invalidate(&result.employee_no).await;
        let id = self
            .id_for_employee(&result.employee_no)
            .await?
            .ok_or_else(|| StoreError::Other(format!("snapshot for {} vanished", result.employee_no)))?;

        debug!(id = %id, employee_no = %result.employee_no, "Stored snapshot");
        Ok(PayrollSnapshot { id, result })
    }

    async fn get(&self, id: &str) -> Result<Option<PayrollSnapshot>, StoreError> {
        let row = sqlx::query_as::<_, (String, String)>(
            "SELECT id, data FROM payroll_snapshots WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(id, data)| decode(id, &data)).transpose()
    }

    async fn update(
        &self,
        id: &str,
        update: SnapshotUpdate,
    ) -> Result<Option<PayrollSnapshot>, StoreError> {
        let Some(mut snapshot) = self.get(id).await? else {
            return Ok(None);
        };
        let previous_no = snapshot.employee_no().to_string();

        snapshot.apply(update)?;
        self.write_row(&snapshot).await?;

        if previous_no != snapshot.employee_no() {
            self.ids.invalidate(&previous_no).await;
        }
        Ok(Some(snapshot))
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let Some(snapshot) = self.get(id).await? else {
            return Ok(false);
        };

        let result = sqlx::query("DELETE FROM payroll_snapshots WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        self.ids.invalidate(snapshot.employee_no()).await;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self) -> Result<Vec<PayrollSnapshot>, StoreError> {
        let mut stream = sqlx::query_as::<_, (String, String)>(
            "SELECT id, data FROM payroll_snapshots ORDER BY employee_no",
        )
        .fetch(&self.pool);

        let mut snapshots = Vec::new();
        while let Some(row) = stream.next().await {
            let (id, data) = row?;
            snapshots.push(decode(id, &data)?);
        }
        Ok(snapshots)
    }

    async fn bulk_update_field(&self, field: BulkField, value: f64) -> Result<u64, StoreError> {
        let path = format!("$.{}", field);
        let result = sqlx::query("UPDATE payroll_snapshots SET data = JSON_SET(data, ?, ?)")
            .bind(path)
            .bind(value)
            .execute(&self.pool)
            .await?;

        info!(field = %field, value, affected = result.rows_affected(), "Bulk field update");
        Ok(result.rows_affected())
    }

    async fn find_by_employee_no(
        &self,
        employee_no: &str,
    ) -> Result<Option<PayrollSnapshot>, StoreError> {
        let Some(id) = self.id_for_employee(employee_no).await? else {
            return Ok(None);
        };

        match self.get(&id).await? {
            Some(snapshot) => Ok(Some(snapshot)),
            None => {
                // stale cache entry
                self.ids.invalidate(employee_no).await;
                Ok(None)
            }
        }
    }
}
