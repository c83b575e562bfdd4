//! Reconciliation service
//!
//! Owns the store, the operational log and the query caches, and exposes the
//! public operations. Read operations never fail: store and data-shape
//! errors are logged and an empty result is returned. Writes report errors.
//!
//! Reads may run concurrently with each other; loads and rebuilds take an
//! exclusive lock.

use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::config::ReconcileConfig;
use crate::enrich::{LlmLocationLookup, LlmProfileLookup, LocationLookup, ProfileLookup};
use crate::error::Result;
use crate::ingest::{prepare_crm, prepare_equipment};
use crate::llm::LlmClient;
use crate::matching::fuzzy::similarity;
use crate::matching::normalize::title_case_country;
use crate::matching::verifier::{LlmMatchVerifier, MatchVerifier};
use crate::model::{
    CompanyDetail, CompanyFilter, CrmRecord, EquipmentRecord, MatchQualityStats, UnifiedCompany,
};
use crate::oplog::OperationalLog;
use crate::query::cache::{Clock, QueryCache, SystemClock};
use crate::query::filter::{equipment_category, EQUIPMENT_TYPES, REGION_OPTIONS};
use crate::store::Store;
use crate::view::builder::{RebuildOutcome, UnifiedViewBuilder};

type CompanyList = Arc<Vec<UnifiedCompany>>;

pub struct ReconciliationService {
    store: Store,
    config: ReconcileConfig,
    log: OperationalLog,
    verifier: Option<Arc<dyn MatchVerifier>>,
    locator: Option<Arc<dyn LocationLookup>>,
    profiles: Option<Arc<dyn ProfileLookup>>,
    companies: QueryCache<CompanyFilter, CompanyList>,
    countries: QueryCache<(), Arc<Vec<String>>>,
    reference_year: Option<i32>,
    rebuild_lock: RwLock<()>,
}

impl ReconciliationService {
    pub fn new(store: Store, config: ReconcileConfig) -> Self {
        Self::with_log(store, config, OperationalLog::new())
    }

    /// Open the configured store (read-only fallback included) and wrap it
    pub async fn open(config: ReconcileConfig) -> Result<Self> {
        let log = OperationalLog::new();
        let store = Store::open(&config.database.path, &log).await?;
        Ok(Self::with_log(store, config, log))
    }

    fn with_log(store: Store, config: ReconcileConfig, log: OperationalLog) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let ttl = config.cache.ttl();
        Self {
            store,
            log,
            verifier: None,
            locator: None,
            profiles: None,
            companies: QueryCache::new(ttl, clock.clone()),
            countries: QueryCache::new(ttl, clock),
            reference_year: None,
            rebuild_lock: RwLock::new(()),
            config,
        }
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn MatchVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn with_locator(mut self, locator: Arc<dyn LocationLookup>) -> Self {
        self.locator = Some(locator);
        self
    }

    pub fn with_profiles(mut self, profiles: Arc<dyn ProfileLookup>) -> Self {
        self.profiles = Some(profiles);
        self
    }

    /// Use one LLM client for verification and both lookups
    pub fn with_llm(self, client: Arc<dyn LlmClient>) -> Self {
        self.with_verifier(Arc::new(LlmMatchVerifier::new(client.clone())))
            .with_locator(Arc::new(LlmLocationLookup::new(client.clone())))
            .with_profiles(Arc::new(LlmProfileLookup::new(client)))
    }

    /// Replace the cache clock (caches start empty)
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        let ttl = self.config.cache.ttl();
        self.companies = QueryCache::new(ttl, clock.clone());
        self.countries = QueryCache::new(ttl, clock);
        self
    }

    /// Year equipment ages are measured against (defaults to the current year)
    pub fn with_reference_year(mut self, year: i32) -> Self {
        self.reference_year = Some(year);
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    // ==========================================
    // LOAD AND REBUILD
    // ==========================================

    /// Replace both source tables with freshly extracted rows
    pub async fn load_sources(
        &self,
        crm: Vec<CrmRecord>,
        equipment: Vec<EquipmentRecord>,
    ) -> Result<()> {
        self.store.ensure_writable("load_sources")?;
        let scope = &self.config.ingest.region_scope;
        let (crm_in, equipment_in) = (crm.len(), equipment.len());
        let crm = prepare_crm(crm, scope);
        let equipment = prepare_equipment(equipment, scope);

        let _guard = self.rebuild_lock.write().await;
        self.store.replace_crm(&crm).await?;
        self.store.replace_equipment(&equipment).await?;
        self.clear_caches();

        if scope.is_empty() {
            self.log.info(format!(
                "Sources loaded: {} CRM records, {} equipment records",
                crm.len(),
                equipment.len()
            ));
        } else {
            self.log.info(format!(
                "Sources loaded (scope {}): {}/{} CRM records, {}/{} equipment records",
                scope.join(", "),
                crm.len(),
                crm_in,
                equipment.len(),
                equipment_in
            ));
        }
        Ok(())
    }

    /// Rebuild the unified view unless the data is unchanged
    pub async fn rebuild_unified_view(&self) -> Result<RebuildOutcome> {
        self.rebuild(false).await
    }

    /// Rebuild the unified view even if the fingerprint matches
    pub async fn force_rebuild(&self) -> Result<RebuildOutcome> {
        self.rebuild(true).await
    }

    async fn rebuild(&self, force: bool) -> Result<RebuildOutcome> {
        let _guard = self.rebuild_lock.write().await;
        let mut builder = UnifiedViewBuilder::new(&self.store, &self.config, &self.log)
            .with_verifier(self.verifier.clone());
        if let Some(year) = self.reference_year {
            builder = builder.with_reference_year(year);
        }
        let outcome = builder.rebuild(force).await;
        self.clear_caches();
        outcome
    }

    fn clear_caches(&self) {
        self.companies.clear();
        self.countries.clear();
    }

    // ==========================================
    // READS
    // ==========================================

    /// Filtered unified rows, most equipment first.
    ///
    /// Before the first rebuild CRM rows are served in the unified shape.
    /// Identical filters within the cache TTL return the same allocation.
    pub async fn get_unified_companies(&self, filter: CompanyFilter) -> CompanyList {
        let filter = filter.normalized();
        if let Some(hit) = self.companies.get(&filter) {
            return hit;
        }

        let _guard = self.rebuild_lock.read().await;
        let source = match self.store.projection_source().await {
            Ok(Some(source)) => source,
            Ok(None) => return Arc::new(Vec::new()),
            Err(e) => {
                self.log
                    .warn(format!("Error fetching customer list: {}", e));
                return Arc::new(Vec::new());
            }
        };

        match self.store.query_companies(source, &filter).await {
            Ok(rows) => {
                let rows = Arc::new(rows);
                if !rows.is_empty() {
                    self.companies.insert(filter, rows.clone());
                }
                rows
            }
            Err(e) => {
                self.log
                    .warn(format!("Error fetching customer list: {}", e));
                Arc::new(Vec::new())
            }
        }
    }

    /// Unified row for `name` plus the equipment behind it
    pub async fn get_company_detail(
        &self,
        name: &str,
        equipment_type: Option<&str>,
    ) -> CompanyDetail {
        let _guard = self.rebuild_lock.read().await;
        let equipment_type = equipment_type
            .map(str::trim)
            .filter(|t| !t.is_empty() && !t.eq_ignore_ascii_case("all"))
            .map(equipment_category);

        let company = match self.store.unified_by_name(name).await {
            Ok(company) => company,
            Err(e) => {
                self.log
                    .warn(format!("Error fetching details for '{}': {}", name, e));
                None
            }
        };
        let equipment = match self.store.equipment_for_company(name, equipment_type).await {
            Ok(equipment) => equipment,
            Err(e) => {
                self.log
                    .warn(format!("Error fetching equipment for '{}': {}", name, e));
                Vec::new()
            }
        };

        CompanyDetail { company, equipment }
    }

    /// Distinct countries with equipment, sorted
    pub async fn equipment_countries(&self) -> Arc<Vec<String>> {
        if let Some(hit) = self.countries.get(&()) {
            return hit;
        }
        let _guard = self.rebuild_lock.read().await;
        match self.store.equipment_countries().await {
            Ok(countries) => {
                let countries = Arc::new(countries);
                if !countries.is_empty() {
                    self.countries.insert((), countries.clone());
                }
                countries
            }
            Err(e) => {
                self.log
                    .warn(format!("Error fetching equipment countries: {}", e));
                Arc::new(Vec::new())
            }
        }
    }

    /// Public equipment-type catalogue
    pub fn equipment_types(&self) -> &'static [&'static str] {
        EQUIPMENT_TYPES
    }

    /// Region filter options
    pub fn region_options(&self) -> &'static [&'static str] {
        REGION_OPTIONS
    }

    /// Distribution of stored mappings over name-similarity buckets, in percent
    pub async fn match_quality_stats(&self) -> MatchQualityStats {
        let mappings = match self.store.mappings().await {
            Ok(mappings) => mappings,
            Err(e) => {
                self.log
                    .warn(format!("Error computing match quality: {}", e));
                return MatchQualityStats::default();
            }
        };
        if mappings.is_empty() {
            return MatchQualityStats::default();
        }

        let mut counts = [0usize; 4];
        for mapping in &mappings {
            let score = similarity(&mapping.crm_name, &mapping.equipment_name);
            let bucket = if score >= 100.0 {
                0
            } else if score >= 80.0 {
                1
            } else if score >= 50.0 {
                2
            } else {
                3
            };
            counts[bucket] += 1;
        }

        let total = mappings.len() as f64;
        let pct = |n: usize| (n as f64 / total * 1000.0).round() / 10.0;
        MatchQualityStats {
            excellent: pct(counts[0]),
            good: pct(counts[1]),
            okay: pct(counts[2]),
            poor: pct(counts[3]),
        }
    }

    // ==========================================
    // ENRICHMENT
    // ==========================================

    /// Look up coordinates for up to `limit` companies lacking them.
    ///
    /// Country is only filled where absent. Returns the number of companies
    /// updated; lookup failures are logged per batch.
    pub async fn enrich_missing_coordinates(&self, limit: usize) -> usize {
        let Some(locator) = self.locator.clone() else {
            self.log
                .info("Location lookup not configured; skipping geo-enrichment");
            return 0;
        };
        if self.store.is_read_only() {
            self.log
                .warn("Store is read-only; skipping geo-enrichment");
            return 0;
        }

        self.log.info(format!(
            "Searching for missing geographical coordinates (limit: {})...",
            limit
        ));
        let names = match self.store.names_missing_coordinates(limit).await {
            Ok(names) => names,
            Err(e) => {
                self.log.warn(format!("Error during geo-enrichment: {}", e));
                return 0;
            }
        };
        if names.is_empty() {
            self.log.info("All companies have coordinates.");
            return 0;
        }

        let mut updated = 0;
        for batch in names.chunks(self.config.enrichment.batch_size.max(1)) {
            let found = match locator.locate(batch).await {
                Ok(found) => found,
                Err(e) => {
                    self.log.warn(format!(
                        "Error enriching locations for batch [{}]: {:#}",
                        batch.join(", "),
                        e
                    ));
                    continue;
                }
            };

            let _guard = self.rebuild_lock.write().await;
            for name in batch {
                let Some(info) = found.get(name) else { continue };
                let Some((lat, lon)) = info.coordinates() else { continue };
                let country = info
                    .country
                    .as_deref()
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(title_case_country);
                match self
                    .store
                    .update_location(name, lat, lon, country.as_deref())
                    .await
                {
                    Ok(rows) if rows > 0 => updated += 1,
                    Ok(_) => {}
                    Err(e) => self
                        .log
                        .warn(format!("Error storing coordinates for '{}': {}", name, e)),
                }
            }
        }

        if updated > 0 {
            self.clear_caches();
        }
        self.log.info(format!(
            "Successfully enriched {} companies with geo-coordinates.",
            updated
        ));
        updated
    }

    /// Run coordinate enrichment as a detached background job
    pub fn spawn_coordinate_enrichment(self: &Arc<Self>, limit: usize) -> JoinHandle<usize> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let updated = service.enrich_missing_coordinates(limit).await;
            tracing::info!(updated, "Background geo-enrichment finished");
            updated
        })
    }

    /// Look up CEO and headcount for up to `limit` companies lacking either.
    ///
    /// Existing values are kept. Returns the number of companies updated.
    pub async fn enrich_missing_profiles(&self, limit: usize) -> usize {
        let Some(profiles) = self.profiles.clone() else {
            self.log
                .info("Profile lookup not configured; skipping profile enrichment");
            return 0;
        };
        if self.store.is_read_only() {
            self.log
                .warn("Store is read-only; skipping profile enrichment");
            return 0;
        }

        self.log.info(format!(
            "Searching for missing CEO and FTE data (limit: {} companies)...",
            limit
        ));
        let names = match self.store.names_missing_profiles(limit).await {
            Ok(names) => names,
            Err(e) => {
                self.log.warn(format!("Error during enrichment: {}", e));
                return 0;
            }
        };
        if names.is_empty() {
            self.log.info("No companies found requiring enrichment.");
            return 0;
        }

        let mut updated = 0;
        for batch in names.chunks(self.config.enrichment.batch_size.max(1)) {
            let found = match profiles.profiles(batch).await {
                Ok(found) => found,
                Err(e) => {
                    self.log.warn(format!(
                        "Error enriching batch [{}]: {:#}",
                        batch.join(", "),
                        e
                    ));
                    continue;
                }
            };

            let _guard = self.rebuild_lock.write().await;
            for name in batch {
                let Some(info) = found.get(name) else { continue };
                let (ceo, fte) = (info.ceo(), info.fte());
                if ceo.is_none() && fte.is_none() {
                    continue;
                }
                match self.store.update_profile(name, ceo, fte).await {
                    Ok(rows) if rows > 0 => updated += 1,
                    Ok(_) => {}
                    Err(e) => self
                        .log
                        .warn(format!("Error storing profile for '{}': {}", name, e)),
                }
            }
        }

        if updated > 0 {
            self.clear_caches();
        }
        self.log.info(format!(
            "Successfully enriched {} companies with profile data.",
            updated
        ));
        updated
    }

    // ==========================================
    // OPERATIONAL LOG
    // ==========================================

    pub fn logs(&self) -> Vec<String> {
        self.log.lines()
    }

    pub fn clear_logs(&self) {
        self.log.clear();
    }

    /// Shared handle to the operational log
    pub fn operational_log(&self) -> &OperationalLog {
        &self.log
    }
}
