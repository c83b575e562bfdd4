//! DDL for the tables the store owns

use sqlx::SqlitePool;

pub(crate) const CRM_TABLE: &str = "crm_records";
pub(crate) const EQUIPMENT_TABLE: &str = "equipment_records";
pub(crate) const MAPPINGS_TABLE: &str = "company_mappings";
pub(crate) const UNIFIED_TABLE: &str = "unified_companies";

/// Create the mapping and meta tables, migrating a legacy mapping table
pub(crate) async fn ensure_owned_tables(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS company_mappings (
            crm_name TEXT NOT NULL,
            equipment_name TEXT NOT NULL,
            confidence REAL,
            UNIQUE (crm_name, equipment_name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    ensure_confidence_column(pool).await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS _meta (
            key TEXT PRIMARY KEY,
            value TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Mapping tables written before confidence scores existed lack the column
pub(crate) async fn ensure_confidence_column(pool: &SqlitePool) -> Result<bool, sqlx::Error> {
    let columns: Vec<(String,)> =
        sqlx::query_as("SELECT name FROM pragma_table_info('company_mappings')")
            .fetch_all(pool)
            .await?;

    if columns.iter().any(|(name,)| name == "confidence") {
        return Ok(false);
    }

    tracing::info!("Adding confidence column to company_mappings");
    sqlx::query("ALTER TABLE company_mappings ADD COLUMN confidence REAL")
        .execute(pool)
        .await?;
    Ok(true)
}

pub(crate) const CREATE_CRM: &str = r#"
    CREATE TABLE crm_records (
        name TEXT NOT NULL,
        industry TEXT,
        country TEXT,
        region TEXT,
        rating TEXT,
        status TEXT,
        fte REAL,
        revenue REAL,
        ceo TEXT,
        latitude REAL,
        longitude REAL
    )
"#;

pub(crate) const CREATE_EQUIPMENT: &str = r#"
    CREATE TABLE equipment_records (
        company TEXT NOT NULL,
        plant TEXT,
        country TEXT,
        region TEXT,
        equipment_type TEXT NOT NULL,
        capacity REAL,
        start_year INTEGER,
        latitude REAL,
        longitude REAL
    )
"#;

pub(crate) const CREATE_UNIFIED: &str = r#"
    CREATE TABLE unified_companies (
        name TEXT NOT NULL,
        crm_name TEXT,
        equipment_names TEXT NOT NULL DEFAULT '[]',
        industry TEXT,
        country TEXT,
        region TEXT,
        rating TEXT,
        status TEXT,
        fte REAL,
        revenue REAL,
        ceo TEXT,
        match_quality REAL,
        total_capacity REAL,
        equipment_count INTEGER,
        equipment_type_count INTEGER,
        equipment_types TEXT NOT NULL DEFAULT '[]',
        equipment_countries TEXT NOT NULL DEFAULT '[]',
        oldest_equipment_age INTEGER,
        newest_equipment_age INTEGER,
        latitude REAL,
        longitude REAL
    )
"#;

pub(crate) const INDEX_CRM: &[&str] = &[
    "CREATE INDEX idx_crm_name ON crm_records (name)",
    "CREATE INDEX idx_crm_country ON crm_records (country)",
];

pub(crate) const INDEX_EQUIPMENT: &[&str] = &[
    "CREATE INDEX idx_equipment_company ON equipment_records (company)",
    "CREATE INDEX idx_equipment_type ON equipment_records (equipment_type)",
    "CREATE INDEX idx_equipment_country ON equipment_records (country)",
];

pub(crate) const INDEX_UNIFIED: &[&str] = &[
    "CREATE INDEX idx_unified_name ON unified_companies (name)",
    "CREATE INDEX idx_unified_country ON unified_companies (country)",
    "CREATE INDEX idx_unified_region ON unified_companies (region)",
];

/// Drop `table`, recreate it from `ddl` and build its indexes
pub(crate) async fn recreate(
    pool: &SqlitePool,
    table: &str,
    ddl: &str,
    indexes: &[&str],
) -> Result<(), sqlx::Error> {
    sqlx::query(&format!("DROP TABLE IF EXISTS {}", table))
        .execute(pool)
        .await?;
    sqlx::query(ddl).execute(pool).await?;
    for index in indexes {
        sqlx::query(index).execute(pool).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    #[tokio::test]
    async fn test_legacy_mapping_table_gains_confidence() {
        let store = Store::in_memory().await.unwrap();
        let pool = store.pool();

        sqlx::query("DROP TABLE company_mappings").execute(pool).await.unwrap();
        sqlx::query(
            "CREATE TABLE company_mappings (crm_name TEXT, equipment_name TEXT, UNIQUE (crm_name, equipment_name))",
        )
        .execute(pool)
        .await
        .unwrap();
        sqlx::query("INSERT INTO company_mappings VALUES ('Aperam', 'APERAM')")
            .execute(pool)
            .await
            .unwrap();

        assert!(ensure_confidence_column(pool).await.unwrap());
        // second run is a no-op
        assert!(!ensure_confidence_column(pool).await.unwrap());

        let (confidence,): (Option<f64>,) =
            sqlx::query_as("SELECT confidence FROM company_mappings")
                .fetch_one(pool)
                .await
                .unwrap();
        assert_eq!(confidence, None);
    }

    #[tokio::test]
    async fn test_recreate_replaces_table() {
        let store = Store::in_memory().await.unwrap();
        let pool = store.pool();
        recreate(pool, UNIFIED_TABLE, CREATE_UNIFIED, INDEX_UNIFIED)
            .await
            .unwrap();
        sqlx::query("INSERT INTO unified_companies (name) VALUES ('x')")
            .execute(pool)
            .await
            .unwrap();
        recreate(pool, UNIFIED_TABLE, CREATE_UNIFIED, INDEX_UNIFIED)
            .await
            .unwrap();
        assert_eq!(store.row_count(UNIFIED_TABLE).await.unwrap(), 0);
    }
}
