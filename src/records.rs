use std::fmt;

use hashbrown::HashSet;
use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::DataIntegrityError;

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Subfields,
    Topics,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Subfields => "subfields",
            EntityKind::Topics => "topics",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A subfield or a topic.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Entity {
    #[serde(deserialize_with = "deserialize_short_id")]
    pub id: String,
    pub display_name: String,
    #[serde(default, deserialize_with = "deserialize_non_empty")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt_short_id")]
    pub parent_id: Option<String>,
    pub works_count: u64,
    pub global_works_count: u64,
}

impl Entity {
    pub fn text_parts(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.display_name.as_str()).chain(self.description.as_deref())
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct FieldRecord {
    #[serde(deserialize_with = "deserialize_short_id")]
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub topics_count: u64,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct CountryTotal {
    pub country_code: String,
    pub country_name: String,
    pub works_count: u64,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct CountryCount {
    pub country_code: String,
    #[serde(deserialize_with = "deserialize_short_id")]
    pub entity_id: String,
    pub works_count: u64,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct YearlyCount {
    pub country_code: String,
    #[serde(deserialize_with = "deserialize_short_id")]
    pub entity_id: String,
    pub year: u16,
    pub works_count: u64,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct TopPaper {
    #[serde(default, deserialize_with = "deserialize_short_id", skip_serializing)]
    pub entity_id: String,
    pub title: String,
    pub year: Option<u16>,
    #[serde(rename(serialize = "citations"), alias = "citations")]
    pub cited_by_count: u64,
    #[serde(rename(serialize = "externalId"), alias = "externalId")]
    pub external_id: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct FunderRecord {
    #[serde(deserialize_with = "deserialize_short_id")]
    pub subfield_id: String,
    #[serde(deserialize_with = "deserialize_short_id")]
    pub funder_id: String,
    pub funder_name: String,
    pub subfield_works_count: u64,
    #[serde(default)]
    pub total_works_count: Option<u64>,
    #[serde(default, deserialize_with = "deserialize_non_empty")]
    pub country_code: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct SnapshotMeta {
    #[serde(default)]
    pub fetch_date: Option<String>,
    pub global_works_count: u64,
    #[serde(default)]
    pub ranking_kind: Option<EntityKind>,
}

/// Immutable input of one run.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub meta: SnapshotMeta,
    pub fields: Vec<FieldRecord>,
    pub subfields: Vec<Entity>,
    pub topics: Vec<Entity>,
    pub country_totals: Vec<CountryTotal>,
    pub country_counts: Vec<CountryCount>,
    pub yearly_counts: Vec<YearlyCount>,
    pub top_papers: Vec<TopPaper>,
    pub funders: Vec<FunderRecord>,
}

impl Snapshot {
    pub fn catalog(&self, kind: EntityKind) -> &[Entity] {
        match kind {
            EntityKind::Subfields => &self.subfields,
            EntityKind::Topics => &self.topics,
        }
    }

    /// Ids must be unique within their kind.
    pub fn check_unique_ids(&self) -> Result<(), DataIntegrityError> {
        for kind in [EntityKind::Subfields, EntityKind::Topics] {
            let mut seen = HashSet::new();
            for e in self.catalog(kind) {
                if !seen.insert(e.id.as_str()) {
                    return Err(DataIntegrityError::DuplicateEntity {
                        kind: kind.to_string(),
                        entity: e.id.clone(),
                    });
                }
            }
        }
        let mut seen = HashSet::new();
        for c in self.country_totals.iter() {
            if !seen.insert(c.country_code.as_str()) {
                return Err(DataIntegrityError::DuplicateEntity {
                    kind: "country".to_string(),
                    entity: c.country_code.clone(),
                });
            }
        }
        Ok(())
    }
}

/// `https://openalex.org/subfields/1702` -> `1702`
pub fn short_id(id: &str) -> &str {
    let trimmed = id.trim().trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

fn deserialize_short_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(short_id(&raw).to_string())
}

fn deserialize_opt_short_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw_o = Option::<String>::deserialize(deserializer)?;
    Ok(raw_o
        .map(|raw| short_id(&raw).to_string())
        .filter(|s| !s.is_empty()))
}

fn deserialize_non_empty<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw_o = Option::<String>::deserialize(deserializer)?;
    Ok(raw_o.filter(|s| !s.trim().is_empty()))
}
