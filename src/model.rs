//! Typed records for both sources and for the unified projection
//!
//! Source loaders convert their tabular input into these records at the
//! boundary; everything downstream works on this closed schema.

use serde::{Deserialize, Serialize};

/// One company row from the relationship-management extract
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(default)]
pub struct CrmRecord {
    pub name: String,
    pub industry: Option<String>,
    pub country: Option<String>,
    pub region: Option<String>,
    pub rating: Option<String>,
    pub status: Option<String>,
    pub fte: Option<f64>,
    pub revenue: Option<f64>,
    pub ceo: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl CrmRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// One equipment unit from the installed-base extract
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(default)]
pub struct EquipmentRecord {
    /// Owning company as written in the extract
    pub company: String,
    pub plant: Option<String>,
    pub country: Option<String>,
    pub region: Option<String>,
    /// Internal category label (one sheet per category in the extract)
    pub equipment_type: String,
    pub capacity: Option<f64>,
    pub start_year: Option<i64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl EquipmentRecord {
    pub fn new(company: impl Into<String>, equipment_type: impl Into<String>) -> Self {
        Self {
            company: company.into(),
            equipment_type: equipment_type.into(),
            ..Default::default()
        }
    }
}

/// A persisted link between a CRM identity and an equipment identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CompanyMapping {
    pub crm_name: String,
    pub equipment_name: String,
    /// 0..=100; absent on rows written before the column existed
    pub confidence: Option<f64>,
}

/// One row of the reconciled view
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnifiedCompany {
    /// Canonical name: the CRM name when matched, else the equipment identity
    pub name: String,
    pub crm_name: Option<String>,
    pub equipment_names: Vec<String>,
    pub industry: Option<String>,
    pub country: Option<String>,
    pub region: Option<String>,
    pub rating: Option<String>,
    pub status: Option<String>,
    pub fte: Option<f64>,
    pub revenue: Option<f64>,
    pub ceo: Option<String>,
    /// Mean confidence of the mappings behind the equipment units
    pub match_quality: Option<f64>,
    pub total_capacity: Option<f64>,
    pub equipment_count: Option<i64>,
    pub equipment_type_count: Option<i64>,
    pub equipment_types: Vec<String>,
    pub equipment_countries: Vec<String>,
    pub oldest_equipment_age: Option<i64>,
    pub newest_equipment_age: Option<i64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Unified row plus the equipment units behind it
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompanyDetail {
    pub company: Option<UnifiedCompany>,
    pub equipment: Vec<EquipmentRecord>,
}

/// Filter parameters for reads over the unified view
///
/// `None` means "All". The field order is the cache key order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanyFilter {
    pub equipment_type: Option<String>,
    pub country: Option<String>,
    pub region: Option<String>,
    pub company_name: Option<String>,
}

impl CompanyFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_equipment_type(mut self, value: impl Into<String>) -> Self {
        self.equipment_type = Some(value.into());
        self
    }

    pub fn with_country(mut self, value: impl Into<String>) -> Self {
        self.country = Some(value.into());
        self
    }

    pub fn with_region(mut self, value: impl Into<String>) -> Self {
        self.region = Some(value.into());
        self
    }

    pub fn with_company_name(mut self, value: impl Into<String>) -> Self {
        self.company_name = Some(value.into());
        self
    }

    /// Collapse blank and "All" values to `None` so equivalent filters share a cache slot
    pub fn normalized(self) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("all"))
        }
        Self {
            equipment_type: clean(self.equipment_type),
            country: clean(self.country),
            region: clean(self.region),
            company_name: clean(self.company_name),
        }
    }
}

/// Share of stored mappings per fuzzy-score bucket, in percent
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MatchQualityStats {
    pub excellent: f64,
    pub good: f64,
    pub okay: f64,
    pub poor: f64,
}
