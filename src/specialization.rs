use std::cmp::Ordering;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::records::{Entity, TopPaper};

/// Revealed comparative advantage of a country in one entity.
///
/// `(country_count / country_total) / (global_count / global_total)`,
/// computed as `(country_count * global_total) / (country_total * global_count)`
/// so exact ratios stay exact. `None` when any denominator is zero.
pub fn rca_ratio(
    country_count: u64,
    country_total: u64,
    global_count: u64,
    global_total: u64,
) -> Option<f64> {
    if country_total == 0 || global_count == 0 || global_total == 0 {
        return None;
    }
    let num = country_count as f64 * global_total as f64;
    let denom = country_total as f64 * global_count as f64;
    Some(num / denom)
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RankedEntity {
    pub id: String,
    pub name: String,
    pub works_count: u64,
    pub global_works_count: u64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub rca: Option<f64>,
    #[serde(default)]
    pub top_papers: Vec<TopPaper>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CountryRanking {
    pub by_volume: Vec<RankedEntity>,
    pub by_specialization: Vec<RankedEntity>,
}

impl CountryRanking {
    /// Ids in either list, volume list first, without repeats.
    pub fn entity_ids(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for e in self.by_volume.iter().chain(self.by_specialization.iter()) {
            if !out.contains(&e.id.as_str()) {
                out.push(e.id.as_str());
            }
        }
        out
    }
}

pub struct Specializer<'a> {
    catalog: &'a [Entity],
    global_total: u64,
    top_k: usize,
}

impl<'a> Specializer<'a> {
    pub fn new(catalog: &'a [Entity], global_total: u64, top_k: usize) -> Self {
        Self {
            catalog,
            global_total,
            top_k,
        }
    }

    /// Both ranked lists of one country. `counts` maps entity id to the
    /// country's work count; absent ids count as zero.
    pub fn score_country(&self, country_total: u64, counts: &HashMap<&str, u64>) -> CountryRanking {
        let mut by_volume = Vec::new();
        let mut by_specialization = Vec::new();
        for entity in self.catalog.iter().filter(|e| e.global_works_count > 0) {
            let count = counts.get(entity.id.as_str()).copied().unwrap_or(0);
            let rca = rca_ratio(
                count,
                country_total,
                entity.global_works_count,
                self.global_total,
            );
            let ranked = RankedEntity {
                id: entity.id.clone(),
                name: entity.display_name.clone(),
                works_count: count,
                global_works_count: entity.global_works_count,
                rca,
                top_papers: Vec::new(),
            };
            if count > 0 && rca.is_some() {
                by_specialization.push(ranked.clone());
            }
            by_volume.push(ranked);
        }
        by_volume.sort_by(volume_order);
        by_volume.truncate(self.top_k);
        by_specialization.sort_by(specialization_order);
        by_specialization.truncate(self.top_k);
        CountryRanking {
            by_volume,
            by_specialization,
        }
    }
}

fn volume_order(l: &RankedEntity, r: &RankedEntity) -> Ordering {
    r.works_count
        .cmp(&l.works_count)
        .then_with(|| l.id.cmp(&r.id))
}

fn specialization_order(l: &RankedEntity, r: &RankedEntity) -> Ordering {
    let (ls, rs) = (l.rca.unwrap_or(0.0), r.rca.unwrap_or(0.0));
    rs.total_cmp(&ls).then_with(|| volume_order(l, r))
}
