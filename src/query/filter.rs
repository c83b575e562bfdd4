//! Filter engine over the unified view
//!
//! Translates a [`CompanyFilter`] into SQL predicates:
//! - region: canonical region group → variant list, matched by substring on
//!   the row's region (country when region is blank); `Not assigned` selects
//!   rows with no region
//! - country: HQ country, or any country the company has equipment in
//! - equipment type: public label → internal category, then list membership
//! - company name: exact match on the canonical name

use sqlx::{QueryBuilder, Sqlite};

use crate::matching::normalize::title_case_country;
use crate::model::CompanyFilter;

/// Region option selecting rows without a region
pub const NOT_ASSIGNED: &str = "Not assigned";

/// Canonical region → spellings found in the source data
pub const REGION_MAPPING: &[(&str, &[&str])] = &[
    (
        "Americas",
        &[
            "North America",
            "South America",
            "Central America",
            "Latin America",
            "Americas",
        ],
    ),
    (
        "APAC & MEA",
        &[
            "APAC",
            "Asia",
            "Middle East",
            "Africa",
            "Oceania",
            "Australia",
            "India",
            "Southeast Asia",
            "MEA",
        ],
    ),
    ("China", &["China"]),
    ("Commonwealth", &["CIS", "Commonwealth", "Russia"]),
    (
        "Europe",
        &[
            "Europe",
            "EU",
            "Western Europe",
            "Eastern Europe",
            "Central Europe",
            "Nordics",
        ],
    ),
];

/// Region choices offered to consumers
pub const REGION_OPTIONS: &[&str] = &[
    "Americas",
    "APAC & MEA",
    "China",
    "Commonwealth",
    "Europe",
    NOT_ASSIGNED,
];

/// Public equipment-type catalogue
pub const EQUIPMENT_TYPES: &[&str] = &[
    "AC-Electric Arc Furnace",
    "Batch Annealing Plant",
    "Billet-/heavy Bar Mill",
    "Blast Furnace",
    "Blooming And Slabbing Mill",
    "BOF Shop",
    "Coking Plant",
    "Continuous Annealing Line",
    "Continuous Billet Caster",
    "Continuous Bloom Caster",
    "Continuous Slab Caster",
    "DC-Electric Arc Furnace",
    "Direct or Smelting Reduction Plant",
    "Electrolytic Metal Coating Line",
    "Heavy Section Mill",
    "Hot Dip Metal Coating Line",
    "Hot Strip Mill",
    "Induction Melt Furnace",
    "Ladle Furnace",
    "Light Section And Bar Mill",
    "Medium Section Mill",
    "Open Hearth Meltshop",
    "Organic Coating Line",
    "Pelletizing Plant",
    "Pickling Line",
    "Plate Mill",
    "Reversing Cold Rolling Mill",
    "Sintering Plant",
    "Special Converter Processes",
    "Steel Remelting Furnace",
    "Tandem Mill",
    "Temper- / Skin Pass Mill (CR)",
    "Temper- / Skin Pass Mill (HR)",
    "Thin-Slab Caster",
    "Thin-Slab Rolling Mill",
    "Vacuum Degassing Plant",
    "Wire Rod Mill",
    "Wire Rod Mill In Bar Mill",
];

/// Public label → internal category (sheet names are truncated at 30 chars
/// and stripped of '/')
pub const EQUIPMENT_ALIASES: &[(&str, &str)] = &[
    (
        "Direct or Smelting Reduction Plant",
        "Direct or Smelting Reduction P",
    ),
    ("Billet-/heavy Bar Mill", "Billet-heavy Bar Mill"),
    (
        "Electrolytic Metal Coating Line",
        "Electrolytic Metal Coating Lin",
    ),
    ("Temper- / Skin Pass Mill (CR)", "Temper-  Skin Pass Mill (CR)"),
    ("Temper- / Skin Pass Mill (HR)", "Temper-  Skin Pass Mill (HR)"),
];

/// Lowercased country → region, used to fill blank regions at ingestion
pub const COUNTRY_TO_REGION: &[(&str, &str)] = &[
    ("germany", "Europe"),
    ("france", "Europe"),
    ("italy", "Europe"),
    ("spain", "Europe"),
    ("united kingdom", "Europe"),
    ("uk", "Europe"),
    ("netherlands", "Europe"),
    ("belgium", "Europe"),
    ("switzerland", "Europe"),
    ("austria", "Europe"),
    ("sweden", "Europe"),
    ("norway", "Europe"),
    ("denmark", "Europe"),
    ("finland", "Europe"),
    ("poland", "Europe"),
    ("czech republic", "Europe"),
    ("czechia", "Europe"),
    ("hungary", "Europe"),
    ("romania", "Europe"),
    ("bulgaria", "Europe"),
    ("greece", "Europe"),
    ("portugal", "Europe"),
    ("ireland", "Europe"),
    ("slovakia", "Europe"),
    ("slovenia", "Europe"),
    ("croatia", "Europe"),
    ("estonia", "Europe"),
    ("latvia", "Europe"),
    ("lithuania", "Europe"),
    ("luxembourg", "Europe"),
    ("australia", "Oceania"),
    ("new zealand", "Oceania"),
    ("nz", "Oceania"),
    ("papua new guinea", "Oceania"),
    ("fiji", "Oceania"),
];

/// Variant spellings for a canonical region
pub fn region_variants(region: &str) -> Option<&'static [&'static str]> {
    REGION_MAPPING
        .iter()
        .find(|(canonical, _)| canonical.eq_ignore_ascii_case(region))
        .map(|(_, variants)| *variants)
}

/// Internal category for a public equipment label (identity when not aliased)
pub fn equipment_category(label: &str) -> &str {
    EQUIPMENT_ALIASES
        .iter()
        .find(|(public, _)| *public == label)
        .map(|(_, internal)| *internal)
        .unwrap_or(label)
}

/// Region for a country, when the country is in the fill table
pub fn region_for_country(country: &str) -> Option<&'static str> {
    let key = country.trim().to_lowercase();
    COUNTRY_TO_REGION
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, region)| *region)
}

/// In-memory counterpart of the region predicate
pub fn region_matches(canonical: &str, region: Option<&str>, country: Option<&str>) -> bool {
    let region = region.map(str::trim).filter(|r| !r.is_empty());

    if canonical.eq_ignore_ascii_case(NOT_ASSIGNED) {
        return region.is_none();
    }

    let Some(value) = region.or(country) else {
        return false;
    };
    let value = value.to_lowercase();

    if value == canonical.to_lowercase() {
        return true;
    }
    region_variants(canonical)
        .map(|variants| {
            variants
                .iter()
                .any(|variant| value.contains(&variant.to_lowercase()))
        })
        .unwrap_or(false)
}

/// Append ` AND ...` predicates for `filter` to a `WHERE 1=1` query
pub fn push_predicates(builder: &mut QueryBuilder<'_, Sqlite>, filter: &CompanyFilter) {
    if let Some(region) = &filter.region {
        push_region(builder, region);
    }

    if let Some(country) = &filter.country {
        let titled = title_case_country(country);
        builder.push(" AND (LOWER(country) = LOWER(");
        builder.push_bind(titled.clone());
        builder.push(") OR EXISTS (SELECT 1 FROM json_each(equipment_countries) WHERE LOWER(value) = LOWER(");
        builder.push_bind(titled);
        builder.push(")))");
    }

    if let Some(equipment_type) = &filter.equipment_type {
        builder.push(" AND EXISTS (SELECT 1 FROM json_each(equipment_types) WHERE value = ");
        builder.push_bind(equipment_category(equipment_type).to_string());
        builder.push(")");
    }

    if let Some(name) = &filter.company_name {
        builder.push(" AND name = ");
        builder.push_bind(name.clone());
    }
}

const REGION_VALUE: &str = "LOWER(COALESCE(NULLIF(TRIM(region), ''), country, ''))";

fn push_region(builder: &mut QueryBuilder<'_, Sqlite>, region: &str) {
    if region.eq_ignore_ascii_case(NOT_ASSIGNED) {
        builder.push(" AND (region IS NULL OR TRIM(region) = '')");
        return;
    }

    builder.push(" AND (");
    builder.push(REGION_VALUE);
    builder.push(" = ");
    builder.push_bind(region.to_lowercase());

    for variant in region_variants(region).unwrap_or(&[]) {
        builder.push(" OR ");
        builder.push(REGION_VALUE);
        builder.push(" LIKE ");
        builder.push_bind(format!("%{}%", variant.to_lowercase()));
    }
    builder.push(")");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_western_europe_in_europe_not_americas() {
        assert!(region_matches("Europe", Some("Western Europe"), None));
        assert!(!region_matches("Americas", Some("Western Europe"), None));
    }

    #[test]
    fn test_country_used_when_region_blank() {
        assert!(region_matches("China", Some("  "), Some("China")));
        assert!(region_matches("APAC & MEA", None, Some("Australia")));
        assert!(!region_matches("Europe", None, None));
    }

    #[test]
    fn test_not_assigned() {
        assert!(region_matches(NOT_ASSIGNED, None, Some("Germany")));
        assert!(region_matches(NOT_ASSIGNED, Some(""), None));
        assert!(!region_matches(NOT_ASSIGNED, Some("Europe"), None));
    }

    #[test]
    fn test_unknown_region_matches_by_equality() {
        assert!(region_matches("Oceania", Some("oceania"), None));
        assert!(!region_matches("Oceania", Some("Europe"), None));
    }

    #[test]
    fn test_equipment_alias() {
        assert_eq!(
            equipment_category("Temper- / Skin Pass Mill (HR)"),
            "Temper-  Skin Pass Mill (HR)"
        );
        assert_eq!(equipment_category("Blast Furnace"), "Blast Furnace");
    }

    #[test]
    fn test_catalogue_and_options() {
        assert_eq!(EQUIPMENT_TYPES.len(), 38);
        for (public, _) in EQUIPMENT_ALIASES {
            assert!(EQUIPMENT_TYPES.contains(public));
        }
        for (canonical, _) in REGION_MAPPING {
            assert!(REGION_OPTIONS.contains(canonical));
        }
    }

    #[test]
    fn test_region_for_country() {
        assert_eq!(region_for_country(" Finland "), Some("Europe"));
        assert_eq!(region_for_country("NZ"), Some("Oceania"));
        assert_eq!(region_for_country("Brazil"), None);
    }

    #[test]
    fn test_predicates_sql_shape() {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT name FROM unified_companies WHERE 1=1");
        let filter = CompanyFilter::all()
            .with_region("China")
            .with_country("germany")
            .with_equipment_type("Blast Furnace")
            .with_company_name("Aperam");
        push_predicates(&mut builder, &filter);

        let sql = builder.sql();
        assert!(sql.contains("LIKE"));
        assert!(sql.contains("json_each(equipment_countries)"));
        assert!(sql.contains("json_each(equipment_types)"));
        assert!(sql.ends_with("AND name = ?"));
    }
}
