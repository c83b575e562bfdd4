//! Shaping of source rows before they are stored
//!
//! Equipment owner names are normalized, countries are title-cased on both
//! sides, blank regions are filled from the country table, and rows outside
//! the configured region scope are dropped.

use crate::matching::normalize::{normalize_company_name, title_case_country};
use crate::model::{CrmRecord, EquipmentRecord};
use crate::query::filter::{region_for_country, region_matches, NOT_ASSIGNED};

/// Whether a row with `region`/`country` belongs to any region in `scope`.
///
/// An empty scope keeps everything.
pub fn in_scope(scope: &[String], region: Option<&str>, country: Option<&str>) -> bool {
    if scope.is_empty() {
        return true;
    }
    scope.iter().any(|wanted| {
        if region_matches(wanted, region, country) {
            return true;
        }
        if wanted.eq_ignore_ascii_case(NOT_ASSIGNED) {
            return false;
        }
        region_matches(wanted, None, country)
            || country
                .and_then(region_for_country)
                .map(|mapped| mapped.eq_ignore_ascii_case(wanted))
                .unwrap_or(false)
    })
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn shape_location(country: Option<String>, region: Option<String>) -> (Option<String>, Option<String>) {
    let country = clean(country).map(|c| title_case_country(&c));
    let region = clean(region).or_else(|| {
        country
            .as_deref()
            .and_then(region_for_country)
            .map(str::to_string)
    });
    (country, region)
}

pub fn prepare_crm(records: Vec<CrmRecord>, scope: &[String]) -> Vec<CrmRecord> {
    records
        .into_iter()
        .map(|mut record| {
            record.name = record.name.trim().to_string();
            let (country, region) = shape_location(record.country.take(), record.region.take());
            record.country = country;
            record.region = region;
            record
        })
        .filter(|r| in_scope(scope, r.region.as_deref(), r.country.as_deref()))
        .collect()
}

pub fn prepare_equipment(records: Vec<EquipmentRecord>, scope: &[String]) -> Vec<EquipmentRecord> {
    records
        .into_iter()
        .map(|mut record| {
            record.company = normalize_company_name(&record.company);
            let (country, region) = shape_location(record.country.take(), record.region.take());
            record.country = country;
            record.region = region;
            record
        })
        .filter(|r| in_scope(scope, r.region.as_deref(), r.country.as_deref()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope(regions: &[&str]) -> Vec<String> {
        regions.iter().map(|r| r.to_string()).collect()
    }

    #[test]
    fn test_empty_scope_keeps_all() {
        assert!(in_scope(&[], None, None));
    }

    #[test]
    fn test_scope_by_region_country_or_table() {
        let europe_oceania = scope(&["Europe", "Oceania"]);
        assert!(in_scope(&europe_oceania, Some("Western Europe"), None));
        assert!(in_scope(&europe_oceania, None, Some("Finland")));
        assert!(in_scope(&europe_oceania, Some("Pacific"), Some("New Zealand")));
        assert!(!in_scope(&europe_oceania, Some("North America"), Some("USA")));
    }

    #[test]
    fn test_equipment_names_normalized_and_regions_filled() {
        let mut unit = EquipmentRecord::new("Outokumpu Oyj", "Blast Furnace");
        unit.country = Some("FINLAND ".to_string());
        let prepared = prepare_equipment(vec![unit], &[]);

        assert_eq!(prepared[0].company, "Outokumpu");
        assert_eq!(prepared[0].country.as_deref(), Some("Finland"));
        assert_eq!(prepared[0].region.as_deref(), Some("Europe"));
    }

    #[test]
    fn test_crm_names_kept_verbatim_but_trimmed() {
        let mut record = CrmRecord::new(" Outokumpu Oyj ");
        record.country = Some("germany".to_string());
        record.region = Some("  ".to_string());
        let prepared = prepare_crm(vec![record], &[]);

        assert_eq!(prepared[0].name, "Outokumpu Oyj");
        assert_eq!(prepared[0].country.as_deref(), Some("Germany"));
        assert_eq!(prepared[0].region.as_deref(), Some("Europe"));
    }

    #[test]
    fn test_acronym_countries_share_one_spelling() {
        let mut lower = EquipmentRecord::new("Nucor Corp.", "Plate Mill");
        lower.country = Some("usa".to_string());
        let mut upper = EquipmentRecord::new("Nucor Corp.", "Hot Strip Mill");
        upper.country = Some("USA".to_string());
        let prepared = prepare_equipment(vec![lower, upper], &[]);

        assert_eq!(prepared[0].country.as_deref(), Some("USA"));
        assert_eq!(prepared[1].country.as_deref(), Some("USA"));
    }

    #[test]
    fn test_scope_drops_rows() {
        let mut keep = CrmRecord::new("A");
        keep.country = Some("Austria".to_string());
        let mut drop = CrmRecord::new("B");
        drop.country = Some("Brazil".to_string());

        let prepared = prepare_crm(vec![keep, drop], &scope(&["Europe"]));
        assert_eq!(prepared.len(), 1);
        assert_eq!(prepared[0].name, "A");
    }
}
