//! Source tables: wholesale replacement and reads

use sqlx::{QueryBuilder, Sqlite};

use super::schema::{
    recreate, CREATE_CRM, CREATE_EQUIPMENT, CRM_TABLE, EQUIPMENT_TABLE, INDEX_CRM,
    INDEX_EQUIPMENT,
};
use super::{rows_per_insert, Store};
use crate::error::Result;
use crate::model::{CrmRecord, EquipmentRecord};

impl Store {
    /// Replace the CRM table with `records`
    pub async fn replace_crm(&self, records: &[CrmRecord]) -> Result<()> {
        self.ensure_writable("replace_crm")?;
        recreate(self.pool(), CRM_TABLE, CREATE_CRM, INDEX_CRM).await?;

        for chunk in records.chunks(rows_per_insert(11)) {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO crm_records (name, industry, country, region, rating, status, fte, revenue, ceo, latitude, longitude) ",
            );
            builder.push_values(chunk, |mut row, r| {
                row.push_bind(&r.name)
                    .push_bind(&r.industry)
                    .push_bind(&r.country)
                    .push_bind(&r.region)
                    .push_bind(&r.rating)
                    .push_bind(&r.status)
                    .push_bind(r.fte)
                    .push_bind(r.revenue)
                    .push_bind(&r.ceo)
                    .push_bind(r.latitude)
                    .push_bind(r.longitude);
            });
            builder.build().execute(self.pool()).await?;
        }

        self.bump_load_generation().await?;
        tracing::debug!(rows = records.len(), "Replaced crm_records");
        Ok(())
    }

    /// Replace the equipment table with `records`
    pub async fn replace_equipment(&self, records: &[EquipmentRecord]) -> Result<()> {
        self.ensure_writable("replace_equipment")?;
        recreate(self.pool(), EQUIPMENT_TABLE, CREATE_EQUIPMENT, INDEX_EQUIPMENT).await?;

        for chunk in records.chunks(rows_per_insert(9)) {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO equipment_records (company, plant, country, region, equipment_type, capacity, start_year, latitude, longitude) ",
            );
            builder.push_values(chunk, |mut row, r| {
                row.push_bind(&r.company)
                    .push_bind(&r.plant)
                    .push_bind(&r.country)
                    .push_bind(&r.region)
                    .push_bind(&r.equipment_type)
                    .push_bind(r.capacity)
                    .push_bind(r.start_year)
                    .push_bind(r.latitude)
                    .push_bind(r.longitude);
            });
            builder.build().execute(self.pool()).await?;
        }

        self.bump_load_generation().await?;
        tracing::debug!(rows = records.len(), "Replaced equipment_records");
        Ok(())
    }

    /// All CRM rows in load order; empty when never loaded
    pub async fn crm_records(&self) -> Result<Vec<CrmRecord>> {
        if !self.table_exists(CRM_TABLE).await? {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, CrmRecord>(
            r#"
            SELECT name, industry, country, region, rating, status, fte, revenue, ceo, latitude, longitude
            FROM crm_records
            ORDER BY rowid
            "#,
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    /// All equipment rows in load order; empty when never loaded
    pub async fn equipment_records(&self) -> Result<Vec<EquipmentRecord>> {
        if !self.table_exists(EQUIPMENT_TABLE).await? {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, EquipmentRecord>(
            r#"
            SELECT company, plant, country, region, equipment_type, capacity, start_year, latitude, longitude
            FROM equipment_records
            ORDER BY rowid
            "#,
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    /// Equipment owned by `name` directly or through any stored mapping
    pub async fn equipment_for_company(
        &self,
        name: &str,
        equipment_type: Option<&str>,
    ) -> Result<Vec<EquipmentRecord>> {
        if !self.table_exists(EQUIPMENT_TABLE).await? {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT company, plant, country, region, equipment_type, capacity, start_year, latitude, longitude \
             FROM equipment_records WHERE (company = ",
        );
        builder.push_bind(name);
        builder.push(" OR company IN (SELECT equipment_name FROM company_mappings WHERE crm_name = ");
        builder.push_bind(name);
        builder.push("))");

        if let Some(equipment_type) = equipment_type {
            builder.push(" AND equipment_type = ");
            builder.push_bind(equipment_type);
        }
        builder.push(" ORDER BY equipment_type, plant, rowid");

        let rows = builder
            .build_query_as::<EquipmentRecord>()
            .fetch_all(self.pool())
            .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{CompanyMapping, CrmRecord, EquipmentRecord};
    use crate::store::Store;

    fn unit(company: &str, equipment_type: &str) -> EquipmentRecord {
        EquipmentRecord {
            country: Some("Germany".to_string()),
            capacity: Some(100.0),
            start_year: Some(1990),
            ..EquipmentRecord::new(company, equipment_type)
        }
    }

    #[tokio::test]
    async fn test_replace_is_wholesale() {
        let store = Store::in_memory().await.unwrap();
        store
            .replace_crm(&[CrmRecord::new("A"), CrmRecord::new("B")])
            .await
            .unwrap();
        store.replace_crm(&[CrmRecord::new("C")]).await.unwrap();

        let rows = store.crm_records().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "C");
    }

    #[tokio::test]
    async fn test_absent_tables_read_empty() {
        let store = Store::in_memory().await.unwrap();
        assert!(store.crm_records().await.unwrap().is_empty());
        assert!(store.equipment_records().await.unwrap().is_empty());
        assert!(store
            .equipment_for_company("X", None)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_large_load_is_chunked() {
        let store = Store::in_memory().await.unwrap();
        let units: Vec<EquipmentRecord> = (0..1000)
            .map(|i| unit(&format!("Company {}", i % 37), "Blast Furnace"))
            .collect();
        store.replace_equipment(&units).await.unwrap();

        let rows = store.equipment_records().await.unwrap();
        assert_eq!(rows.len(), 1000);
        assert_eq!(rows[0], units[0]);
    }

    #[tokio::test]
    async fn test_equipment_for_company_follows_mappings() {
        let store = Store::in_memory().await.unwrap();
        store
            .replace_equipment(&[
                unit("OUTOKUMPU", "Blast Furnace"),
                unit("OUTOKUMPU", "Cold Rolling Mill"),
                unit("Outokumpu Oyj", "Pickling Line"),
                unit("APERAM", "Blast Furnace"),
            ])
            .await
            .unwrap();
        store
            .insert_mappings(&[CompanyMapping {
                crm_name: "Outokumpu Oyj".to_string(),
                equipment_name: "OUTOKUMPU".to_string(),
                confidence: Some(100.0),
            }])
            .await
            .unwrap();

        let all = store
            .equipment_for_company("Outokumpu Oyj", None)
            .await
            .unwrap();
        assert_eq!(all.len(), 3);

        let furnaces = store
            .equipment_for_company("Outokumpu Oyj", Some("Blast Furnace"))
            .await
            .unwrap();
        assert_eq!(furnaces.len(), 1);
        assert_eq!(furnaces[0].company, "OUTOKUMPU");
    }
}
