use std::{collections::BTreeMap, sync::Arc};

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};
use tqdm::Iter;
use tracing::{debug, info, warn};

use crate::{
    config::PipelineConfig,
    errors::{DataIntegrityError, Result},
    graph::{Graph, GraphBuilder, GraphScope, UNASSIGNED_SCOPE},
    para::Worker,
    records::{CountryTotal, Entity, EntityKind, FunderRecord, Snapshot, TopPaper},
    specialization::{CountryRanking, RankedEntity, Specializer},
    trends::{self, TrendPoint, TrendSeries},
};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CountryReport {
    pub country_code: String,
    pub country_name: String,
    pub total_works: u64,
    pub by_volume: Vec<RankedEntity>,
    pub by_specialization: Vec<RankedEntity>,
    pub trends: BTreeMap<String, TrendSeries>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FieldSummary {
    pub id: String,
    pub name: String,
    pub topics_count: u64,
    pub subfields_count: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TopFunder {
    pub subfield_id: String,
    pub subfield_name: String,
    pub funder_id: String,
    pub funder_name: String,
    pub works_count: u64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub total_works_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub country_code: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct SummaryCounts {
    pub fields: usize,
    pub subfields: usize,
    pub topics: usize,
    pub countries: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub last_updated: Option<String>,
    pub ranking_kind: EntityKind,
    pub fields: Vec<FieldSummary>,
    pub top_funders: Vec<TopFunder>,
    pub counts: SummaryCounts,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Artifacts {
    pub graphs: Vec<Graph>,
    pub reports: BTreeMap<String, CountryReport>,
    pub summary: Summary,
}

pub fn run(snapshot: Arc<Snapshot>, config: &PipelineConfig) -> Result<Artifacts> {
    let graphs = build_graphs(&snapshot, config)?;
    let reports = build_reports(&snapshot, config)?;
    let summary = build_summary(&snapshot, config)?;
    Ok(Artifacts {
        graphs,
        reports,
        summary,
    })
}

/// Counts in the snapshot refer to this kind.
pub fn ranking_kind(snapshot: &Snapshot, config: &PipelineConfig) -> EntityKind {
    snapshot.meta.ranking_kind.unwrap_or(config.ranking_kind)
}

/// One scope per parent, in parent id order, members as catalog indices.
pub fn graph_scopes(snapshot: &Snapshot, kind: EntityKind) -> Vec<(GraphScope, Vec<usize>)> {
    let parent_names: HashMap<&str, &str> = match kind {
        EntityKind::Subfields => snapshot
            .fields
            .iter()
            .map(|f| (f.id.as_str(), f.display_name.as_str()))
            .collect(),
        EntityKind::Topics => snapshot
            .subfields
            .iter()
            .map(|e| (e.id.as_str(), e.display_name.as_str()))
            .collect(),
    };
    let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, e) in snapshot.catalog(kind).iter().enumerate() {
        let parent = e.parent_id.as_deref().unwrap_or(UNASSIGNED_SCOPE);
        groups.entry(parent).or_default().push(i);
    }
    groups
        .into_iter()
        .map(|(parent_id, members)| {
            let parent_name = match parent_names.get(parent_id) {
                Some(name) => name.to_string(),
                None => {
                    if parent_id != UNASSIGNED_SCOPE {
                        debug!("no name for {} parent {}", kind, parent_id);
                    }
                    parent_id.to_string()
                }
            };
            let scope = GraphScope {
                kind,
                parent_id: parent_id.to_string(),
                parent_name,
            };
            (scope, members)
        })
        .collect()
}

struct GraphWorker {
    snapshot: Arc<Snapshot>,
    builder: GraphBuilder,
}

impl Worker<(GraphScope, Vec<usize>)> for GraphWorker {
    type Out = Result<Graph>;

    fn proc(&self, input: (GraphScope, Vec<usize>)) -> Self::Out {
        let (scope, members) = input;
        let catalog = self.snapshot.catalog(scope.kind);
        let entities: Vec<&Entity> = members.iter().map(|i| &catalog[*i]).collect();
        self.builder.build(scope, &entities)
    }
}

pub fn build_graphs(snapshot: &Arc<Snapshot>, config: &PipelineConfig) -> Result<Vec<Graph>> {
    snapshot.check_unique_ids()?;
    let mut jobs = graph_scopes(snapshot, EntityKind::Subfields);
    jobs.extend(graph_scopes(snapshot, EntityKind::Topics));
    info!("building {} graphs", jobs.len());

    let worker = GraphWorker {
        snapshot: Arc::clone(snapshot),
        builder: GraphBuilder::new(config.vectorizer.clone(), config.similarity_threshold),
    };
    let graphs: Vec<Graph> = worker
        .para(jobs.into_iter().tqdm(), config.n_workers())
        .into_iter()
        .collect::<Result<_>>()?;
    let n_edges: usize = graphs.iter().map(|g| g.edges.len()).sum();
    info!("built {} graphs with {} edges", graphs.len(), n_edges);
    Ok(graphs)
}

/// Per-country lookups, checked against the catalog and country list.
struct CountryIndex<'a> {
    counts: HashMap<&'a str, HashMap<&'a str, u64>>,
    yearly: HashMap<&'a str, Vec<TrendPoint<'a>>>,
    papers: HashMap<&'a str, Vec<&'a TopPaper>>,
}

impl<'a> CountryIndex<'a> {
    fn new(
        snapshot: &'a Snapshot,
        kind: EntityKind,
        max_papers: usize,
    ) -> std::result::Result<Self, DataIntegrityError> {
        let entities: HashSet<&str> = snapshot.catalog(kind).iter().map(|e| e.id.as_str()).collect();
        let countries: HashSet<&str> = snapshot
            .country_totals
            .iter()
            .map(|c| c.country_code.as_str())
            .collect();
        let check = |table: &str, country: &str, entity: &str| {
            if !countries.contains(country) {
                return Err(DataIntegrityError::UnknownCountry {
                    table: table.to_string(),
                    country: country.to_string(),
                });
            }
            if !entities.contains(entity) {
                return Err(DataIntegrityError::UnknownEntity {
                    table: table.to_string(),
                    entity: entity.to_string(),
                });
            }
            Ok(())
        };

        let mut counts: HashMap<&str, HashMap<&str, u64>> = HashMap::new();
        for rec in snapshot.country_counts.iter() {
            check("country_counts", &rec.country_code, &rec.entity_id)?;
            let per_country = counts.entry(rec.country_code.as_str()).or_default();
            if per_country
                .insert(rec.entity_id.as_str(), rec.works_count)
                .is_some()
            {
                return Err(DataIntegrityError::DuplicateCount {
                    country: rec.country_code.clone(),
                    entity: rec.entity_id.clone(),
                });
            }
        }

        let mut yearly: HashMap<&str, Vec<TrendPoint>> = HashMap::new();
        for rec in snapshot.yearly_counts.iter() {
            check("yearly_counts", &rec.country_code, &rec.entity_id)?;
            yearly
                .entry(rec.country_code.as_str())
                .or_default()
                .push(TrendPoint {
                    entity: rec.entity_id.as_str(),
                    year: rec.year,
                    volume: rec.works_count,
                });
        }

        let known: HashSet<&str> = snapshot
            .subfields
            .iter()
            .chain(snapshot.topics.iter())
            .map(|e| e.id.as_str())
            .collect();
        let mut papers: HashMap<&str, Vec<&TopPaper>> = HashMap::new();
        for paper in snapshot.top_papers.iter() {
            if !known.contains(paper.entity_id.as_str()) {
                return Err(DataIntegrityError::UnknownEntity {
                    table: "top_papers".to_string(),
                    entity: paper.entity_id.clone(),
                });
            }
            papers.entry(paper.entity_id.as_str()).or_default().push(paper);
        }
        for list in papers.values_mut() {
            // stable: equal citation counts keep input order
            list.sort_by(|l, r| r.cited_by_count.cmp(&l.cited_by_count));
            list.truncate(max_papers);
        }

        Ok(Self {
            counts,
            yearly,
            papers,
        })
    }
}

struct ReportWorker<'a> {
    catalog: &'a [Entity],
    index: CountryIndex<'a>,
    global_total: u64,
    top_k: usize,
}

impl<'a> ReportWorker<'a> {
    fn attach_papers(&self, list: &mut [RankedEntity]) {
        for e in list.iter_mut() {
            if let Some(papers) = self.index.papers.get(e.id.as_str()) {
                e.top_papers = papers.iter().map(|p| (*p).clone()).collect();
            }
        }
    }

    fn trends_by_name(
        &self,
        country: &str,
        ranking: &CountryRanking,
    ) -> std::result::Result<BTreeMap<String, TrendSeries>, DataIntegrityError> {
        let points = self.index.yearly.get(country).into_iter().flatten().copied();
        let mut series = trends::aggregate(country, points)?;

        let names: HashMap<&str, &str> = ranking
            .by_volume
            .iter()
            .chain(ranking.by_specialization.iter())
            .map(|e| (e.id.as_str(), e.name.as_str()))
            .collect();
        let mut name_uses: HashMap<&str, usize> = HashMap::new();
        for name in names.values() {
            *name_uses.entry(*name).or_insert(0) += 1;
        }

        let mut out = BTreeMap::new();
        for id in ranking.entity_ids() {
            let name = names.get(id).copied().unwrap_or(id);
            let mut key = if name_uses.get(name).copied().unwrap_or(0) > 1 {
                format!("{name} ({id})")
            } else {
                name.to_string()
            };
            // a generated key can equal another entity's plain name
            while out.contains_key(&key) {
                key = format!("{key} ({id})");
            }
            out.insert(key, series.remove(id).unwrap_or_default());
        }
        Ok(out)
    }
}

impl<'a> Worker<&'a CountryTotal> for ReportWorker<'a> {
    type Out = std::result::Result<CountryReport, DataIntegrityError>;

    fn proc(&self, country: &'a CountryTotal) -> Self::Out {
        let code = country.country_code.as_str();
        let empty = HashMap::new();
        let counts = self.index.counts.get(code).unwrap_or(&empty);
        let mut ranking = Specializer::new(self.catalog, self.global_total, self.top_k)
            .score_country(country.works_count, counts);
        self.attach_papers(&mut ranking.by_volume);
        self.attach_papers(&mut ranking.by_specialization);
        let trends = self.trends_by_name(code, &ranking)?;
        debug!(
            "{}: {} by volume, {} by specialization",
            code,
            ranking.by_volume.len(),
            ranking.by_specialization.len()
        );
        Ok(CountryReport {
            country_code: country.country_code.clone(),
            country_name: country.country_name.clone(),
            total_works: country.works_count,
            by_volume: ranking.by_volume,
            by_specialization: ranking.by_specialization,
            trends,
        })
    }
}

pub fn build_reports(
    snapshot: &Snapshot,
    config: &PipelineConfig,
) -> Result<BTreeMap<String, CountryReport>> {
    snapshot.check_unique_ids()?;
    let kind = ranking_kind(snapshot, config);
    let global_total = snapshot.meta.global_works_count;
    if global_total == 0 {
        warn!("global works count is 0, specialization lists will be empty");
    }
    info!(
        "scoring {} countries over {} {}",
        snapshot.country_totals.len(),
        snapshot.catalog(kind).len(),
        kind
    );

    let worker = ReportWorker {
        catalog: snapshot.catalog(kind),
        index: CountryIndex::new(snapshot, kind, config.max_top_papers)?,
        global_total,
        top_k: config.top_k,
    };
    let reports = worker.para(snapshot.country_totals.iter().tqdm(), config.n_workers());

    let mut out = BTreeMap::new();
    for report in reports {
        let report = report?;
        out.insert(report.country_code.clone(), report);
    }
    Ok(out)
}

pub fn build_summary(snapshot: &Snapshot, config: &PipelineConfig) -> Result<Summary> {
    snapshot.check_unique_ids()?;
    let mut subfields_per_field: HashMap<&str, usize> = HashMap::new();
    for sf in snapshot.subfields.iter() {
        if let Some(parent) = sf.parent_id.as_deref() {
            *subfields_per_field.entry(parent).or_insert(0) += 1;
        }
    }
    let mut fields: Vec<FieldSummary> = snapshot
        .fields
        .iter()
        .map(|f| FieldSummary {
            id: f.id.clone(),
            name: f.display_name.clone(),
            topics_count: f.topics_count,
            subfields_count: subfields_per_field.get(f.id.as_str()).copied().unwrap_or(0),
        })
        .collect();
    fields.sort_by(|l, r| l.id.cmp(&r.id));

    let subfield_names: HashMap<&str, &str> = snapshot
        .subfields
        .iter()
        .map(|e| (e.id.as_str(), e.display_name.as_str()))
        .collect();
    let mut best: BTreeMap<&str, &FunderRecord> = BTreeMap::new();
    for rec in snapshot.funders.iter() {
        if !subfield_names.contains_key(rec.subfield_id.as_str()) {
            return Err(DataIntegrityError::UnknownEntity {
                table: "funders".to_string(),
                entity: rec.subfield_id.clone(),
            }
            .into());
        }
        let slot = best.entry(rec.subfield_id.as_str()).or_insert(rec);
        if beats(rec, *slot) {
            *slot = rec;
        }
    }
    let top_funders = best
        .into_iter()
        .map(|(sf, rec)| TopFunder {
            subfield_id: sf.to_string(),
            subfield_name: subfield_names.get(sf).copied().unwrap_or(sf).to_string(),
            funder_id: rec.funder_id.clone(),
            funder_name: rec.funder_name.clone(),
            works_count: rec.subfield_works_count,
            total_works_count: rec.total_works_count,
            country_code: rec.country_code.clone(),
        })
        .collect();

    Ok(Summary {
        last_updated: snapshot.meta.fetch_date.clone(),
        ranking_kind: ranking_kind(snapshot, config),
        fields,
        top_funders,
        counts: SummaryCounts {
            fields: snapshot.fields.len(),
            subfields: snapshot.subfields.len(),
            topics: snapshot.topics.len(),
            countries: snapshot.country_totals.len(),
        },
    })
}

fn beats(challenger: &FunderRecord, holder: &FunderRecord) -> bool {
    (challenger.subfield_works_count, std::cmp::Reverse(&challenger.funder_id))
        > (holder.subfield_works_count, std::cmp::Reverse(&holder.funder_id))
}
