//! Unified view rebuild
//!
//! ```text
//! fingerprint unchanged and view non-empty ──► skip
//!            │ otherwise
//!            ▼
//! preload mappings ─► resolve unmapped equipment names ─► persist new mappings
//!            ▼
//! aggregate equipment per resolved name ─► join CRM ─► replace unified table
//!            ▼
//! persist fingerprint
//! ```
//!
//! Every step is re-runnable: mappings are insert-or-ignore and the unified
//! table is dropped and recreated, so an interrupted rebuild is repaired by
//! the next one.

use chrono::Datelike;
use std::collections::HashSet;
use std::sync::Arc;

use crate::config::ReconcileConfig;
use crate::error::Result;
use crate::matching::resolver::{EntityResolver, TargetPool};
use crate::matching::verifier::MatchVerifier;
use crate::oplog::OperationalLog;
use crate::store::{Store, UNIFIED_TABLE};
use crate::view::aggregate::build_unified;
use crate::view::fingerprint::DataFingerprint;

/// What a rebuild did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildOutcome {
    /// Fingerprint matched; nothing was recomputed
    pub skipped: bool,
    pub new_mappings: usize,
    /// Rows in the unified view afterwards
    pub companies: usize,
}

pub struct UnifiedViewBuilder<'a> {
    store: &'a Store,
    config: &'a ReconcileConfig,
    log: &'a OperationalLog,
    verifier: Option<Arc<dyn MatchVerifier>>,
    reference_year: i32,
}

impl<'a> UnifiedViewBuilder<'a> {
    pub fn new(store: &'a Store, config: &'a ReconcileConfig, log: &'a OperationalLog) -> Self {
        Self {
            store,
            config,
            log,
            verifier: None,
            reference_year: chrono::Utc::now().year(),
        }
    }

    pub fn with_verifier(mut self, verifier: Option<Arc<dyn MatchVerifier>>) -> Self {
        self.verifier = verifier;
        self
    }

    /// Year equipment ages are measured against
    pub fn with_reference_year(mut self, year: i32) -> Self {
        self.reference_year = year;
        self
    }

    /// Rebuild unless the data is unchanged; `force` skips the check
    pub async fn rebuild(&self, force: bool) -> Result<RebuildOutcome> {
        let fingerprint = DataFingerprint::current(self.store, &self.config.sources).await?;

        if !force {
            let stored = self.store.stored_fingerprint().await?;
            let existing = self.store.row_count(UNIFIED_TABLE).await?;
            if stored.as_deref() == Some(fingerprint.as_str()) && existing > 0 {
                self.log.info("Data unchanged, using cached unified view");
                return Ok(RebuildOutcome {
                    skipped: true,
                    new_mappings: 0,
                    companies: usize::try_from(existing).unwrap_or(usize::MAX),
                });
            }
        }

        self.store.ensure_writable("rebuild_unified_view")?;
        self.log.info("Creating unified company view...");

        let crm = self.store.crm_records().await?;
        let equipment = self.store.equipment_records().await?;

        let new_mappings = self.resolve_new_identities(&crm, &equipment).await?;

        let mappings = self.store.mappings().await?;
        let rows = build_unified(&crm, &equipment, &mappings, self.reference_year);
        self.store.replace_unified(&rows).await?;
        self.store.set_fingerprint(fingerprint.as_str()).await?;

        let crm_matched = rows
            .iter()
            .filter(|r| r.crm_name.is_some() && r.equipment_count.is_some())
            .count();
        tracing::info!(
            companies = rows.len(),
            crm_matched,
            new_mappings,
            "Unified view rebuilt"
        );
        self.log.info(format!(
            "Unified view created: {} companies ({} with CRM and equipment data)",
            rows.len(),
            crm_matched
        ));

        Ok(RebuildOutcome {
            skipped: false,
            new_mappings,
            companies: rows.len(),
        })
    }

    async fn resolve_new_identities(
        &self,
        crm: &[crate::model::CrmRecord],
        equipment: &[crate::model::EquipmentRecord],
    ) -> Result<usize> {
        let known = self.store.mappings().await?;
        let resolver = EntityResolver::new(self.config.matching.clone(), self.log.clone())
            .with_verifier(self.verifier.clone())
            .with_known_mappings(&known);

        let mut seen = HashSet::new();
        let candidates: Vec<String> = equipment
            .iter()
            .map(|unit| unit.company.clone())
            .filter(|name| !resolver.is_known(name) && seen.insert(name.clone()))
            .collect();

        if candidates.is_empty() {
            return Ok(0);
        }

        let pool = TargetPool::new(crm.iter().map(|r| r.name.as_str()));
        if pool.is_empty() {
            self.log.info(format!(
                "No CRM names to match against; {} equipment names stay unmapped",
                candidates.len()
            ));
            return Ok(0);
        }

        self.log.info(format!(
            "Resolving {} unmapped equipment names against {} CRM names",
            candidates.len(),
            pool.len()
        ));
        let new = resolver.resolve_new(&candidates, &pool).await;
        let written = self.store.insert_mappings(&new).await?;
        self.log
            .info(format!("Stored {} new company mappings", written));
        Ok(new.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CrmRecord, EquipmentRecord};

    async fn seeded() -> Store {
        let store = Store::in_memory().await.unwrap();
        store
            .replace_crm(&[CrmRecord::new("Outokumpu Oyj"), CrmRecord::new("Aperam")])
            .await
            .unwrap();
        store
            .replace_equipment(&[
                EquipmentRecord::new("OUTOKUMPU", "Blast Furnace"),
                EquipmentRecord::new("Tata Steel", "Hot Strip Mill"),
            ])
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_second_rebuild_is_skipped() {
        let store = seeded().await;
        let config = ReconcileConfig::default();
        let log = OperationalLog::new();
        let builder = UnifiedViewBuilder::new(&store, &config, &log);

        let first = builder.rebuild(false).await.unwrap();
        assert!(!first.skipped);
        assert_eq!(first.new_mappings, 1);
        assert_eq!(first.companies, 3);

        let second = builder.rebuild(false).await.unwrap();
        assert!(second.skipped);
        assert_eq!(second.companies, 3);

        let forced = builder.rebuild(true).await.unwrap();
        assert!(!forced.skipped);
        assert_eq!(forced.new_mappings, 0);
        assert_eq!(store.mappings().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reload_triggers_rebuild() {
        let store = seeded().await;
        let config = ReconcileConfig::default();
        let log = OperationalLog::new();
        let builder = UnifiedViewBuilder::new(&store, &config, &log);
        builder.rebuild(false).await.unwrap();

        store
            .replace_crm(&[CrmRecord::new("Outokumpu Oyj")])
            .await
            .unwrap();
        let outcome = builder.rebuild(false).await.unwrap();
        assert!(!outcome.skipped);
        assert_eq!(outcome.companies, 2);
    }

    #[tokio::test]
    async fn test_lost_view_is_rebuilt_despite_matching_fingerprint() {
        let store = seeded().await;
        let config = ReconcileConfig::default();
        let log = OperationalLog::new();
        let builder = UnifiedViewBuilder::new(&store, &config, &log);
        let first = builder.rebuild(false).await.unwrap();

        sqlx::query("DROP TABLE unified_companies")
            .execute(store.pool())
            .await
            .unwrap();
        let repaired = builder.rebuild(false).await.unwrap();
        assert!(!repaired.skipped);
        assert_eq!(repaired.companies, first.companies);
        assert_eq!(store.row_count(UNIFIED_TABLE).await.unwrap(), 3);

        sqlx::query("DELETE FROM unified_companies")
            .execute(store.pool())
            .await
            .unwrap();
        let refilled = builder.rebuild(false).await.unwrap();
        assert!(!refilled.skipped);
        assert_eq!(store.row_count(UNIFIED_TABLE).await.unwrap(), 3);
        assert_eq!(store.mappings().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_sources_build_empty_view() {
        let store = Store::in_memory().await.unwrap();
        let config = ReconcileConfig::default();
        let log = OperationalLog::new();
        let outcome = UnifiedViewBuilder::new(&store, &config, &log)
            .rebuild(false)
            .await
            .unwrap();
        assert_eq!(outcome.companies, 0);
        assert!(store.table_exists(UNIFIED_TABLE).await.unwrap());
    }
}
