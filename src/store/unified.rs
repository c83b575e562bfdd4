//! `unified_companies`: replacement, filtered reads and enrichment updates

use sqlx::types::Json;
use sqlx::{FromRow, QueryBuilder, Sqlite};

use super::schema::{recreate, CREATE_UNIFIED, CRM_TABLE, INDEX_UNIFIED, UNIFIED_TABLE};
use super::{rows_per_insert, Store};
use crate::error::Result;
use crate::model::{CompanyFilter, UnifiedCompany};
use crate::query::filter::push_predicates;

/// Which table a filtered read is served from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionSource {
    /// The rebuilt unified view
    Unified,
    /// CRM rows projected into the unified shape (before the first rebuild)
    CrmOnly,
}

const UNIFIED_COLUMNS: &str = "name, crm_name, equipment_names, industry, country, region, rating, status, \
     fte, revenue, ceo, match_quality, total_capacity, equipment_count, equipment_type_count, \
     equipment_types, equipment_countries, oldest_equipment_age, newest_equipment_age, latitude, longitude";

const CRM_PROJECTION: &str = "SELECT name, name AS crm_name, '[]' AS equipment_names, industry, country, region, \
     rating, status, fte, revenue, ceo, NULL AS match_quality, NULL AS total_capacity, \
     NULL AS equipment_count, NULL AS equipment_type_count, '[]' AS equipment_types, \
     '[]' AS equipment_countries, NULL AS oldest_equipment_age, NULL AS newest_equipment_age, \
     latitude, longitude FROM crm_records";

#[derive(FromRow)]
struct UnifiedRow {
    name: String,
    crm_name: Option<String>,
    equipment_names: Json<Vec<String>>,
    industry: Option<String>,
    country: Option<String>,
    region: Option<String>,
    rating: Option<String>,
    status: Option<String>,
    fte: Option<f64>,
    revenue: Option<f64>,
    ceo: Option<String>,
    match_quality: Option<f64>,
    total_capacity: Option<f64>,
    equipment_count: Option<i64>,
    equipment_type_count: Option<i64>,
    equipment_types: Json<Vec<String>>,
    equipment_countries: Json<Vec<String>>,
    oldest_equipment_age: Option<i64>,
    newest_equipment_age: Option<i64>,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

impl From<UnifiedRow> for UnifiedCompany {
    fn from(row: UnifiedRow) -> Self {
        Self {
            name: row.name,
            crm_name: row.crm_name,
            equipment_names: row.equipment_names.0,
            industry: row.industry,
            country: row.country,
            region: row.region,
            rating: row.rating,
            status: row.status,
            fte: row.fte,
            revenue: row.revenue,
            ceo: row.ceo,
            match_quality: row.match_quality,
            total_capacity: row.total_capacity,
            equipment_count: row.equipment_count,
            equipment_type_count: row.equipment_type_count,
            equipment_types: row.equipment_types.0,
            equipment_countries: row.equipment_countries.0,
            oldest_equipment_age: row.oldest_equipment_age,
            newest_equipment_age: row.newest_equipment_age,
            latitude: row.latitude,
            longitude: row.longitude,
        }
    }
}

impl Store {
    /// Drop, recreate and fill the unified table
    pub async fn replace_unified(&self, rows: &[UnifiedCompany]) -> Result<()> {
        self.ensure_writable("replace_unified")?;
        recreate(self.pool(), UNIFIED_TABLE, CREATE_UNIFIED, INDEX_UNIFIED).await?;

        for chunk in rows.chunks(rows_per_insert(21)) {
            let mut builder: QueryBuilder<Sqlite> =
                QueryBuilder::new(format!("INSERT INTO unified_companies ({}) ", UNIFIED_COLUMNS));
            builder.push_values(chunk, |mut b, c| {
                b.push_bind(&c.name)
                    .push_bind(&c.crm_name)
                    .push_bind(Json(&c.equipment_names))
                    .push_bind(&c.industry)
                    .push_bind(&c.country)
                    .push_bind(&c.region)
                    .push_bind(&c.rating)
                    .push_bind(&c.status)
                    .push_bind(c.fte)
                    .push_bind(c.revenue)
                    .push_bind(&c.ceo)
                    .push_bind(c.match_quality)
                    .push_bind(c.total_capacity)
                    .push_bind(c.equipment_count)
                    .push_bind(c.equipment_type_count)
                    .push_bind(Json(&c.equipment_types))
                    .push_bind(Json(&c.equipment_countries))
                    .push_bind(c.oldest_equipment_age)
                    .push_bind(c.newest_equipment_age)
                    .push_bind(c.latitude)
                    .push_bind(c.longitude);
            });
            builder.build().execute(self.pool()).await?;
        }

        tracing::debug!(rows = rows.len(), "Replaced unified_companies");
        Ok(())
    }

    /// Which projection can serve reads right now, if any
    pub async fn projection_source(&self) -> Result<Option<ProjectionSource>> {
        if self.table_exists(UNIFIED_TABLE).await? {
            Ok(Some(ProjectionSource::Unified))
        } else if self.table_exists(CRM_TABLE).await? {
            Ok(Some(ProjectionSource::CrmOnly))
        } else {
            Ok(None)
        }
    }

    /// Filtered read, most equipment first
    pub async fn query_companies(
        &self,
        source: ProjectionSource,
        filter: &CompanyFilter,
    ) -> Result<Vec<UnifiedCompany>> {
        let from = match source {
            ProjectionSource::Unified => UNIFIED_TABLE.to_string(),
            ProjectionSource::CrmOnly => format!("({}) AS crm_projection", CRM_PROJECTION),
        };
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM {} WHERE 1=1", UNIFIED_COLUMNS, from));
        push_predicates(&mut builder, filter);
        builder.push(" ORDER BY equipment_count DESC NULLS LAST, name");

        let rows = builder
            .build_query_as::<UnifiedRow>()
            .fetch_all(self.pool())
            .await?;
        Ok(rows.into_iter().map(UnifiedCompany::from).collect())
    }

    pub async fn unified_by_name(&self, name: &str) -> Result<Option<UnifiedCompany>> {
        let Some(source) = self.projection_source().await? else {
            return Ok(None);
        };
        let filter = CompanyFilter::all().with_company_name(name);
        Ok(self.query_companies(source, &filter).await?.into_iter().next())
    }

    /// Distinct equipment countries across the unified view, sorted
    pub async fn equipment_countries(&self) -> Result<Vec<String>> {
        if !self.table_exists(UNIFIED_TABLE).await? {
            return Ok(Vec::new());
        }
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT DISTINCT j.value
            FROM unified_companies u, json_each(u.equipment_countries) j
            WHERE j.value IS NOT NULL AND TRIM(j.value) <> ''
            ORDER BY j.value
            "#,
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(|(country,)| country).collect())
    }

    /// Names lacking a coordinate, most equipment first
    pub async fn names_missing_coordinates(&self, limit: usize) -> Result<Vec<String>> {
        self.names_where("latitude IS NULL OR longitude IS NULL", limit)
            .await
    }

    /// Names lacking a CEO or a headcount, most equipment first
    pub async fn names_missing_profiles(&self, limit: usize) -> Result<Vec<String>> {
        self.names_where(
            "ceo IS NULL OR TRIM(ceo) = '' OR ceo = 'N/A' OR fte IS NULL OR fte = 0",
            limit,
        )
        .await
    }

    async fn names_where(&self, condition: &str, limit: usize) -> Result<Vec<String>> {
        if !self.table_exists(UNIFIED_TABLE).await? {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT name FROM unified_companies WHERE {} \
             GROUP BY name ORDER BY MAX(equipment_count) DESC NULLS LAST, name LIMIT ?",
            condition
        );
        let rows: Vec<(String,)> = sqlx::query_as(&sql)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(self.pool())
            .await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    /// Set coordinates; country is only filled when absent. Returns rows touched.
    pub async fn update_location(
        &self,
        name: &str,
        latitude: f64,
        longitude: f64,
        country: Option<&str>,
    ) -> Result<u64> {
        self.ensure_writable("update_location")?;
        let result = sqlx::query(
            r#"
            UPDATE unified_companies
            SET latitude = ?, longitude = ?, country = COALESCE(country, ?)
            WHERE name = ?
            "#,
        )
        .bind(latitude)
        .bind(longitude)
        .bind(country)
        .bind(name)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected())
    }

    /// Fill CEO and headcount where missing; present values are kept
    pub async fn update_profile(
        &self,
        name: &str,
        ceo: Option<&str>,
        fte: Option<f64>,
    ) -> Result<u64> {
        self.ensure_writable("update_profile")?;
        let result = sqlx::query(
            r#"
            UPDATE unified_companies
            SET ceo = CASE WHEN ceo IS NULL OR TRIM(ceo) = '' OR ceo = 'N/A' THEN COALESCE(?, ceo) ELSE ceo END,
                fte = CASE WHEN fte IS NULL OR fte = 0 THEN COALESCE(?, fte) ELSE fte END
            WHERE name = ?
            "#,
        )
        .bind(ceo)
        .bind(fte)
        .bind(name)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CrmRecord;

    fn company(name: &str, count: Option<i64>) -> UnifiedCompany {
        UnifiedCompany {
            name: name.to_string(),
            country: Some("Finland".to_string()),
            region: Some("Europe".to_string()),
            equipment_count: count,
            equipment_types: vec!["Blast Furnace".to_string()],
            equipment_countries: vec!["Germany".to_string(), "Finland".to_string()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_round_trip_and_order() {
        let store = Store::in_memory().await.unwrap();
        let rows = vec![
            company("Small", Some(1)),
            company("CrmOnly", None),
            company("Big", Some(9)),
        ];
        store.replace_unified(&rows).await.unwrap();

        let read = store
            .query_companies(ProjectionSource::Unified, &CompanyFilter::all())
            .await
            .unwrap();
        let names: Vec<&str> = read.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Big", "Small", "CrmOnly"]);
        assert_eq!(read[0], rows[2]);
    }

    #[tokio::test]
    async fn test_country_filter_uses_equipment_countries() {
        let store = Store::in_memory().await.unwrap();
        store
            .replace_unified(&[company("Outokumpu Oyj", Some(3))])
            .await
            .unwrap();

        let filter = CompanyFilter::all().with_country("germany");
        let hits = store
            .query_companies(ProjectionSource::Unified, &filter)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);

        let filter = CompanyFilter::all().with_country("Brazil");
        assert!(store
            .query_companies(ProjectionSource::Unified, &filter)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_acronym_country_matches_in_any_casing() {
        let store = Store::in_memory().await.unwrap();
        let mut nucor = company("Nucor Corporation", Some(1));
        nucor.country = None;
        nucor.equipment_countries = vec!["USA".to_string()];
        let mut legacy = company("Legacy Steel", Some(1));
        legacy.country = None;
        legacy.equipment_countries = vec!["Usa".to_string()];
        store.replace_unified(&[nucor, legacy]).await.unwrap();

        for wanted in ["USA", "usa", "Usa"] {
            let filter = CompanyFilter::all().with_country(wanted);
            let hits = store
                .query_companies(ProjectionSource::Unified, &filter)
                .await
                .unwrap();
            assert_eq!(hits.len(), 2, "country filter {:?}", wanted);
        }
    }

    #[tokio::test]
    async fn test_crm_projection() {
        let store = Store::in_memory().await.unwrap();
        assert_eq!(store.projection_source().await.unwrap(), None);

        let mut crm = CrmRecord::new("Aperam");
        crm.country = Some("Luxembourg".to_string());
        store.replace_crm(&[crm]).await.unwrap();
        assert_eq!(
            store.projection_source().await.unwrap(),
            Some(ProjectionSource::CrmOnly)
        );

        let rows = store
            .query_companies(ProjectionSource::CrmOnly, &CompanyFilter::all())
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].crm_name.as_deref(), Some("Aperam"));
        assert!(rows[0].equipment_types.is_empty());
        assert_eq!(rows[0].equipment_count, None);
    }

    #[tokio::test]
    async fn test_location_update_keeps_country() {
        let store = Store::in_memory().await.unwrap();
        let mut no_country = company("B", Some(1));
        no_country.country = None;
        store
            .replace_unified(&[company("A", Some(2)), no_country])
            .await
            .unwrap();

        let missing = store.names_missing_coordinates(10).await.unwrap();
        assert_eq!(missing, vec!["A", "B"]);

        store
            .update_location("A", 60.1, 24.9, Some("Sweden"))
            .await
            .unwrap();
        store
            .update_location("B", 51.2, 6.8, Some("Germany"))
            .await
            .unwrap();

        let a = store.unified_by_name("A").await.unwrap().unwrap();
        assert_eq!(a.country.as_deref(), Some("Finland"));
        assert_eq!(a.latitude, Some(60.1));
        let b = store.unified_by_name("B").await.unwrap().unwrap();
        assert_eq!(b.country.as_deref(), Some("Germany"));
        assert!(store.names_missing_coordinates(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_profile_update_keeps_existing() {
        let store = Store::in_memory().await.unwrap();
        let mut with_ceo = company("A", Some(1));
        with_ceo.ceo = Some("Jane Doe".to_string());
        store.replace_unified(&[with_ceo]).await.unwrap();

        assert_eq!(store.names_missing_profiles(5).await.unwrap(), vec!["A"]);
        store
            .update_profile("A", Some("John Roe"), Some(8500.0))
            .await
            .unwrap();

        let a = store.unified_by_name("A").await.unwrap().unwrap();
        assert_eq!(a.ceo.as_deref(), Some("Jane Doe"));
        assert_eq!(a.fte, Some(8500.0));
    }

    #[tokio::test]
    async fn test_equipment_countries_distinct_sorted() {
        let store = Store::in_memory().await.unwrap();
        store
            .replace_unified(&[company("A", Some(1)), company("B", Some(2))])
            .await
            .unwrap();
        assert_eq!(
            store.equipment_countries().await.unwrap(),
            vec!["Finland", "Germany"]
        );
    }
}
