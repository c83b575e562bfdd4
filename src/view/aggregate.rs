//! Pure aggregation from source rows and mappings to unified rows

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::model::{CompanyMapping, CrmRecord, EquipmentRecord, UnifiedCompany};

/// Defaults for companies known only from the equipment extract
pub const EQUIPMENT_ONLY_INDUSTRY: &str = "Steel";
pub const EQUIPMENT_ONLY_RATING: &str = "C";
pub const EQUIPMENT_ONLY_STATUS: &str = "Operating";
/// Industry for CRM rows that carry none
pub const UNKNOWN_INDUSTRY: &str = "Unknown";

/// First value present in precedence order
pub fn first_present<T>(candidates: impl IntoIterator<Item = Option<T>>) -> Option<T> {
    candidates.into_iter().flatten().next()
}

/// Age of a unit commissioned in `start_year`; negative ages are dropped
pub fn equipment_age(reference_year: i32, start_year: Option<i64>) -> Option<i64> {
    let age = i64::from(reference_year) - start_year?;
    (age >= 0).then_some(age)
}

/// Equipment metrics for one resolved company
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EquipmentAggregate {
    pub equipment_names: Vec<String>,
    pub total_capacity: Option<f64>,
    pub equipment_count: i64,
    pub equipment_types: Vec<String>,
    pub equipment_countries: Vec<String>,
    pub country: Option<String>,
    pub region: Option<String>,
    pub oldest_equipment_age: Option<i64>,
    pub newest_equipment_age: Option<i64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub match_quality: Option<f64>,
}

#[derive(Default)]
struct Accumulator {
    names: BTreeSet<String>,
    capacity: Option<f64>,
    count: i64,
    types: BTreeSet<String>,
    countries: BTreeSet<String>,
    country: Option<String>,
    region: Option<String>,
    ages: Vec<i64>,
    coordinates: Vec<(f64, f64)>,
    confidences: Vec<f64>,
}

impl Accumulator {
    fn add(&mut self, unit: &EquipmentRecord, confidence: Option<f64>, reference_year: i32) {
        self.names.insert(unit.company.clone());
        self.count += 1;
        if let Some(capacity) = unit.capacity {
            *self.capacity.get_or_insert(0.0) += capacity;
        }
        if !unit.equipment_type.trim().is_empty() {
            self.types.insert(unit.equipment_type.clone());
        }
        if let Some(country) = non_blank(&unit.country) {
            self.countries.insert(country.to_string());
            self.country.get_or_insert_with(|| country.to_string());
        }
        if let Some(region) = non_blank(&unit.region) {
            self.region.get_or_insert_with(|| region.to_string());
        }
        if let Some(age) = equipment_age(reference_year, unit.start_year) {
            self.ages.push(age);
        }
        if let (Some(lat), Some(lon)) = (unit.latitude, unit.longitude) {
            self.coordinates.push((lat, lon));
        }
        if let Some(confidence) = confidence {
            self.confidences.push(confidence);
        }
    }

    fn finish(self) -> EquipmentAggregate {
        let (latitude, longitude) = match mean_pair(&self.coordinates) {
            Some((lat, lon)) => (Some(lat), Some(lon)),
            None => (None, None),
        };
        EquipmentAggregate {
            equipment_names: self.names.into_iter().collect(),
            total_capacity: self.capacity,
            equipment_count: self.count,
            equipment_types: self.types.into_iter().collect(),
            equipment_countries: self.countries.into_iter().collect(),
            country: self.country,
            region: self.region,
            oldest_equipment_age: self.ages.iter().copied().max(),
            newest_equipment_age: self.ages.iter().copied().min(),
            latitude,
            longitude,
            match_quality: mean(&self.confidences),
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn mean_pair(pairs: &[(f64, f64)]) -> Option<(f64, f64)> {
    if pairs.is_empty() {
        return None;
    }
    let n = pairs.len() as f64;
    let (lat, lon) = pairs
        .iter()
        .fold((0.0, 0.0), |(a, b), (lat, lon)| (a + lat, b + lon));
    Some((lat / n, lon / n))
}

/// Group equipment by resolved company name.
///
/// A unit resolves to the CRM name of its mapping when that name is still in
/// `crm_names`; otherwise it stays under its own identity. When one equipment
/// name has several mappings the first one (highest confidence) wins.
pub fn aggregate_equipment(
    equipment: &[EquipmentRecord],
    mappings: &[CompanyMapping],
    crm_names: &HashSet<&str>,
    reference_year: i32,
) -> Vec<(String, EquipmentAggregate)> {
    let mut resolved: HashMap<&str, (&str, Option<f64>)> = HashMap::new();
    for mapping in mappings {
        if crm_names.contains(mapping.crm_name.as_str()) {
            resolved
                .entry(mapping.equipment_name.as_str())
                .or_insert((mapping.crm_name.as_str(), mapping.confidence));
        }
    }

    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Accumulator> = HashMap::new();
    for unit in equipment {
        if unit.company.trim().is_empty() {
            continue;
        }
        let (name, confidence) = match resolved.get(unit.company.as_str()) {
            Some((crm_name, confidence)) => (*crm_name, *confidence),
            None => (unit.company.as_str(), None),
        };
        let group = groups.entry(name.to_string()).or_insert_with(|| {
            order.push(name.to_string());
            Accumulator::default()
        });
        group.add(unit, confidence, reference_year);
    }

    order
        .into_iter()
        .filter_map(|name| groups.remove(&name).map(|acc| (name, acc.finish())))
        .collect()
}

/// Build the unified projection.
///
/// One row per distinct CRM name (in load order) joined to its equipment
/// aggregate, followed by equipment-only companies sorted by name.
pub fn build_unified(
    crm: &[CrmRecord],
    equipment: &[EquipmentRecord],
    mappings: &[CompanyMapping],
    reference_year: i32,
) -> Vec<UnifiedCompany> {
    let crm_names: HashSet<&str> = crm
        .iter()
        .map(|r| r.name.as_str())
        .filter(|n| !n.trim().is_empty())
        .collect();

    let mut aggregates: HashMap<String, EquipmentAggregate> =
        aggregate_equipment(equipment, mappings, &crm_names, reference_year)
            .into_iter()
            .collect();

    let mut rows = Vec::with_capacity(crm_names.len() + aggregates.len());
    let mut seen = HashSet::new();
    for record in crm {
        if record.name.trim().is_empty() || !seen.insert(record.name.as_str()) {
            continue;
        }
        let aggregate = aggregates.remove(&record.name);
        rows.push(crm_row(record, aggregate));
    }

    let mut equipment_only: Vec<(String, EquipmentAggregate)> = aggregates.into_iter().collect();
    equipment_only.sort_by(|a, b| a.0.cmp(&b.0));
    rows.extend(
        equipment_only
            .into_iter()
            .map(|(name, aggregate)| equipment_only_row(name, aggregate)),
    );
    rows
}

fn crm_row(record: &CrmRecord, aggregate: Option<EquipmentAggregate>) -> UnifiedCompany {
    let agg = aggregate.as_ref();

    let (latitude, longitude) = match (record.latitude, record.longitude) {
        (Some(lat), Some(lon)) => (Some(lat), Some(lon)),
        _ => (
            agg.and_then(|a| a.latitude),
            agg.and_then(|a| a.longitude),
        ),
    };

    UnifiedCompany {
        name: record.name.clone(),
        crm_name: Some(record.name.clone()),
        industry: first_present([
            record.industry.clone(),
            Some(UNKNOWN_INDUSTRY.to_string()),
        ]),
        country: first_present([record.country.clone(), agg.and_then(|a| a.country.clone())]),
        region: first_present([record.region.clone(), agg.and_then(|a| a.region.clone())]),
        rating: record.rating.clone(),
        status: record.status.clone(),
        fte: record.fte,
        revenue: record.revenue,
        ceo: record.ceo.clone(),
        latitude,
        longitude,
        ..with_metrics(aggregate)
    }
}

fn equipment_only_row(name: String, aggregate: EquipmentAggregate) -> UnifiedCompany {
    let country = aggregate.country.clone();
    let region = aggregate.region.clone();
    let (latitude, longitude) = (aggregate.latitude, aggregate.longitude);
    UnifiedCompany {
        name,
        crm_name: None,
        industry: Some(EQUIPMENT_ONLY_INDUSTRY.to_string()),
        rating: Some(EQUIPMENT_ONLY_RATING.to_string()),
        status: Some(EQUIPMENT_ONLY_STATUS.to_string()),
        country,
        region,
        latitude,
        longitude,
        ..with_metrics(Some(aggregate))
    }
}

fn with_metrics(aggregate: Option<EquipmentAggregate>) -> UnifiedCompany {
    let Some(a) = aggregate else {
        return UnifiedCompany::default();
    };
    UnifiedCompany {
        equipment_names: a.equipment_names,
        match_quality: a.match_quality,
        total_capacity: a.total_capacity,
        equipment_count: Some(a.equipment_count),
        equipment_type_count: Some(a.equipment_types.len() as i64),
        equipment_types: a.equipment_types,
        equipment_countries: a.equipment_countries,
        oldest_equipment_age: a.oldest_equipment_age,
        newest_equipment_age: a.newest_equipment_age,
        ..UnifiedCompany::default()
    }
}
