//! Mapping table: bulk preload and insert-only writes

use sqlx::{QueryBuilder, Sqlite};

use super::{rows_per_insert, Store};
use crate::error::Result;
use crate::model::CompanyMapping;

impl Store {
    /// Every stored mapping, highest confidence first
    pub async fn mappings(&self) -> Result<Vec<CompanyMapping>> {
        let rows = sqlx::query_as::<_, CompanyMapping>(
            r#"
            SELECT crm_name, equipment_name, confidence
            FROM company_mappings
            ORDER BY confidence DESC NULLS LAST, crm_name, equipment_name
            "#,
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    /// Insert mappings, ignoring pairs already present. Returns rows written.
    pub async fn insert_mappings(&self, mappings: &[CompanyMapping]) -> Result<u64> {
        if mappings.is_empty() {
            return Ok(0);
        }
        self.ensure_writable("insert_mappings")?;

        let mut written = 0;
        for chunk in mappings.chunks(rows_per_insert(3)) {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT OR IGNORE INTO company_mappings (crm_name, equipment_name, confidence) ",
            );
            builder.push_values(chunk, |mut row, m| {
                row.push_bind(&m.crm_name)
                    .push_bind(&m.equipment_name)
                    .push_bind(m.confidence);
            });
            written += builder.build().execute(self.pool()).await?.rows_affected();
        }
        Ok(written)
    }
}
