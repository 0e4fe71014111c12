//! Qdrant-backed [`DenseIndex`]. Generalizes the teacher's
//! `rag::vector_store::VectorStore` (Qdrant client construction with
//! optional API-key auth, payload round-tripping) from its gold-loan
//! product collection to the chunk collection this crate searches;
//! collection management (`ensure_collection`/`upsert`) stays with the
//! out-of-scope ingestion pipeline, so only `search` is ported.

use async_trait::async_trait;
use qdrant_client::qdrant::{
    condition::ConditionOneOf, r#match::MatchValue, value::Kind, Condition, FieldCondition,
    Filter, Match, SearchPointsBuilder, Value as QdrantValue,
};
use qdrant_client::Qdrant;
use std::collections::HashMap;

use zimlex_core::traits::retrieval::IndexHit;
use zimlex_core::{DenseIndex, Error, Result, RetrievalFilters};

pub struct QdrantDenseIndex {
    client: Qdrant,
    collection: String,
}

impl QdrantDenseIndex {
    pub fn new(endpoint: &str, api_key: Option<&str>, collection: &str) -> Result<Self> {
        let mut builder = Qdrant::from_url(endpoint);
        if let Some(key) = api_key {
            builder = builder.api_key(key);
        }
        let client = builder
            .build()
            .map_err(|e| Error::Retrieval(format!("qdrant client build failed: {e}")))?;
        Ok(Self {
            client,
            collection: collection.to_string(),
        })
    }
}

#[async_trait]
impl DenseIndex for QdrantDenseIndex {
    async fn search(&self, query_embedding: &[f32], top_k: usize, filters: &RetrievalFilters) -> Result<Vec<IndexHit>> {
        let mut builder = SearchPointsBuilder::new(&self.collection, query_embedding.to_vec(), top_k as u64)
            .with_payload(true);
        if let Some(filter) = filters_to_qdrant(filters) {
            builder = builder.filter(filter);
        }

        let response = self
            .client
            .search_points(builder)
            .await
            .map_err(|e| Error::Retrieval(format!("qdrant search failed: {e}")))?;

        Ok(response.result.into_iter().map(point_to_hit).collect())
    }
}

fn filters_to_qdrant(filters: &RetrievalFilters) -> Option<Filter> {
    let mut conditions = Vec::new();
    if let Some(doc_type) = &filters.doc_type {
        conditions.push(keyword_condition("doc_type", &doc_type_tag(*doc_type)));
    }
    if let Some(year) = filters.year {
        conditions.push(keyword_condition("year", &year.to_string()));
    }
    if let Some(chapter) = &filters.chapter {
        conditions.push(keyword_condition("chapter", chapter));
    }
    if conditions.is_empty() {
        None
    } else {
        Some(Filter {
            must: conditions,
            ..Default::default()
        })
    }
}

fn keyword_condition(key: &str, value: &str) -> Condition {
    Condition {
        condition_one_of: Some(ConditionOneOf::Field(FieldCondition {
            key: key.to_string(),
            r#match: Some(Match {
                match_value: Some(MatchValue::Keyword(value.to_string())),
            }),
            ..Default::default()
        })),
    }
}

fn doc_type_tag(doc_type: zimlex_core::DocType) -> String {
    use zimlex_core::DocType::*;
    match doc_type {
        Constitution => "constitution",
        Act => "act",
        Ordinance => "ordinance",
        StatutoryInstrument => "statutory-instrument",
        CaseLaw => "case-law",
        Other => "other",
    }
    .to_string()
}

fn point_to_hit(point: qdrant_client::qdrant::ScoredPoint) -> IndexHit {
    let chunk_id = point
        .id
        .and_then(|pid| pid.point_id_options)
        .map(|opts| match opts {
            qdrant_client::qdrant::point_id::PointIdOptions::Uuid(u) => u,
            qdrant_client::qdrant::point_id::PointIdOptions::Num(n) => n.to_string(),
        })
        .unwrap_or_default();

    let metadata = point
        .payload
        .into_iter()
        .map(|(k, v)| (k, qdrant_value_to_json(v)))
        .collect::<HashMap<_, _>>();

    IndexHit {
        chunk_id,
        score: point.score,
        metadata,
    }
}

fn qdrant_value_to_json(value: QdrantValue) -> serde_json::Value {
    match value.kind {
        Some(Kind::StringValue(s)) => serde_json::Value::String(s),
        Some(Kind::IntegerValue(i)) => serde_json::Value::from(i),
        Some(Kind::DoubleValue(d)) => serde_json::Number::from_f64(d)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Some(Kind::BoolValue(b)) => serde_json::Value::Bool(b),
        _ => serde_json::Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zimlex_core::DocType;

    #[test]
    fn filters_with_no_fields_produce_no_qdrant_filter() {
        assert!(filters_to_qdrant(&RetrievalFilters::default()).is_none());
    }

    #[test]
    fn doc_type_filter_becomes_keyword_condition() {
        let filters = RetrievalFilters::default().with_doc_type(DocType::Act);
        let filter = filters_to_qdrant(&filters).unwrap();
        assert_eq!(filter.must.len(), 1);
    }

    #[test]
    fn qdrant_value_conversion_handles_string_and_numeric() {
        let s = QdrantValue {
            kind: Some(Kind::StringValue("hello".into())),
        };
        assert_eq!(qdrant_value_to_json(s), serde_json::Value::String("hello".into()));
        let i = QdrantValue {
            kind: Some(Kind::IntegerValue(7)),
        };
        assert_eq!(qdrant_value_to_json(i), serde_json::Value::from(7));
    }
}
