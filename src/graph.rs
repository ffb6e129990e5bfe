use phrase_vec::{Normalizer, PhraseCorpus, VectorizerConfig};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    errors::{FieldmapError, Result},
    records::{Entity, EntityKind},
    similarity::SimilarityMatrix,
};

pub const UNASSIGNED_SCOPE: &str = "unassigned";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct GraphScope {
    pub kind: EntityKind,
    #[serde(rename = "parentId")]
    pub parent_id: String,
    #[serde(rename = "parentName")]
    pub parent_name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    pub name: String,
    pub size: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub weight: f64,
}

/// Nodes sorted by id, edges sorted by `(source, target)` with `source < target`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Graph {
    pub scope: GraphScope,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

pub struct GraphBuilder {
    normalizer: Normalizer,
    vectorizer: VectorizerConfig,
    threshold: f64,
}

impl GraphBuilder {
    pub fn new(vectorizer: VectorizerConfig, threshold: f64) -> Self {
        Self {
            normalizer: Normalizer::new(vectorizer.extra_stopwords.iter()),
            vectorizer,
            threshold,
        }
    }

    pub fn build(&self, scope: GraphScope, entities: &[&Entity]) -> Result<Graph> {
        let mut sorted: Vec<&Entity> = entities.to_vec();
        sorted.sort_by(|l, r| l.id.cmp(&r.id));

        let docs: Vec<Vec<String>> = sorted
            .iter()
            .map(|e| self.normalizer.document(e.text_parts()))
            .collect();
        let corpus = PhraseCorpus::fit(&docs, &self.vectorizer)?;
        let matrix = match SimilarityMatrix::build(&corpus.vectors) {
            Ok(m) => Some(m),
            Err(FieldmapError::InsufficientCorpus { size }) => {
                debug!(
                    "no similarity for {} {} - corpus size {}",
                    scope.kind, scope.parent_id, size
                );
                None
            }
            Err(e) => return Err(e),
        };
        debug!(
            "{} {}: {} entities, vocabulary {}",
            scope.kind,
            scope.parent_id,
            sorted.len(),
            corpus.vocabulary.len()
        );
        Ok(assemble(scope, &sorted, matrix.as_ref(), self.threshold))
    }
}

/// `entities` must be in the order the matrix was built in.
pub fn assemble(
    scope: GraphScope,
    entities: &[&Entity],
    matrix: Option<&SimilarityMatrix>,
    threshold: f64,
) -> Graph {
    let mut order: Vec<usize> = (0..entities.len()).collect();
    order.sort_by(|l, r| entities[*l].id.cmp(&entities[*r].id));

    let nodes = order
        .iter()
        .map(|i| Node {
            id: entities[*i].id.clone(),
            name: entities[*i].display_name.clone(),
            size: entities[*i].works_count,
        })
        .collect();

    let mut edges = Vec::new();
    if let Some(m) = matrix {
        for (oi, &i) in order.iter().enumerate() {
            for &j in order[oi + 1..].iter() {
                let weight = m.get(i, j);
                if weight > threshold {
                    edges.push(Edge {
                        source: entities[i].id.clone(),
                        target: entities[j].id.clone(),
                        weight,
                    });
                }
            }
        }
    }
    Graph {
        scope,
        nodes,
        edges,
    }
}
