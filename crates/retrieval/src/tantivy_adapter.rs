//! Tantivy-backed [`SparseIndex`]. Generalizes the teacher's
//! `rag::sparse_search::SparseIndex` (BM25 search, multilingual
//! `SimpleTokenizer` registration) — this adapter only opens an index
//! built by the out-of-scope ingestion pipeline and searches it; the
//! teacher's `index_documents`/`delete` writer path has no counterpart
//! here.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{OwnedValue, Schema};
use tantivy::tokenizer::{Language, LowerCaser, RemoveLongFilter, SimpleTokenizer, Stemmer, TextAnalyzer};
use tantivy::{Index, IndexReader, TantivyDocument};

use zimlex_core::traits::retrieval::IndexHit;
use zimlex_core::{DocType, Error, Result, RetrievalFilters, SparseIndex};

/// Stored field names the ingestion pipeline is expected to populate.
/// `content` is the only indexed-and-searched field; the rest are
/// stored-only and copied straight into [`IndexHit::metadata`].
const CONTENT_FIELD: &str = "content";
const TITLE_FIELD: &str = "title";
const PARENT_DOC_ID_FIELD: &str = "parent_doc_id";
const DOC_TYPE_FIELD: &str = "doc_type";
const LANGUAGE_FIELD: &str = "language";
const SECTION_PATH_FIELD: &str = "section_path";

pub struct TantivySparseIndex {
    index: Index,
    reader: IndexReader,
    schema: Schema,
}

impl TantivySparseIndex {
    pub fn open(path: &str) -> Result<Self> {
        let index = Index::open_in_dir(Path::new(path))
            .map_err(|e| Error::Retrieval(format!("tantivy index open failed: {e}")))?;
        index
            .tokenizers()
            .register("multilingual", multilingual_tokenizer());
        let reader = index
            .reader()
            .map_err(|e| Error::Retrieval(format!("tantivy reader init failed: {e}")))?;
        let schema = index.schema();
        Ok(Self { index, reader, schema })
    }

    fn search_blocking(&self, query_text: &str, top_k: usize, filters: &RetrievalFilters) -> Result<Vec<IndexHit>> {
        let searcher = self.reader.searcher();
        let mut search_fields = Vec::new();
        if let Some(field) = self.schema.get_field(CONTENT_FIELD).ok() {
            search_fields.push(field);
        }
        if let Some(field) = self.schema.get_field(TITLE_FIELD).ok() {
            search_fields.push(field);
        }
        if search_fields.is_empty() {
            return Err(Error::Retrieval("tantivy schema has no searchable text field".into()));
        }

        let mut query_text = query_text.to_string();
        if let Some(doc_type) = &filters.doc_type {
            query_text = format!("{query_text} {}", doc_type_query_term(*doc_type));
        }

        let parser = QueryParser::for_index(&self.index, search_fields);
        let query = parser
            .parse_query(&query_text)
            .map_err(|e| Error::Retrieval(format!("tantivy query parse failed: {e}")))?;

        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(top_k))
            .map_err(|e| Error::Retrieval(format!("tantivy search failed: {e}")))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let doc: TantivyDocument = searcher
                .doc(address)
                .map_err(|e| Error::Retrieval(format!("tantivy doc fetch failed: {e}")))?;
            hits.push(self.doc_to_hit(&doc, score, address));
        }
        Ok(hits)
    }

    fn doc_to_hit(&self, doc: &TantivyDocument, score: f32, address: tantivy::DocAddress) -> IndexHit {
        let mut metadata = HashMap::new();
        for field_name in [CONTENT_FIELD, PARENT_DOC_ID_FIELD, DOC_TYPE_FIELD, LANGUAGE_FIELD, SECTION_PATH_FIELD] {
            if let Ok(field) = self.schema.get_field(field_name) {
                if let Some(OwnedValue::Str(s)) = doc.get_first(field) {
                    metadata.insert(field_name.to_string(), serde_json::Value::String(s.to_string()));
                }
            }
        }
        let chunk_id = metadata
            .get("id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}:{}", address.segment_ord, address.doc_id));
        IndexHit {
            chunk_id,
            score,
            metadata,
        }
    }
}

fn multilingual_tokenizer() -> TextAnalyzer {
    TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(RemoveLongFilter::limit(100))
        .filter(LowerCaser)
        .filter(Stemmer::new(Language::English))
        .build()
}

fn doc_type_query_term(doc_type: DocType) -> &'static str {
    match doc_type {
        DocType::Constitution => "constitution",
        DocType::Act => "act",
        DocType::Ordinance => "ordinance",
        DocType::StatutoryInstrument => "statutory-instrument",
        DocType::CaseLaw => "case-law",
        DocType::Other => "other",
    }
}

#[async_trait]
impl SparseIndex for TantivySparseIndex {
    async fn search(
        &self,
        query_text: &str,
        top_k: usize,
        _field_boosts: &HashMap<String, f32>,
        filters: &RetrievalFilters,
    ) -> Result<Vec<IndexHit>> {
        let query_text = query_text.to_string();
        let top_k_param = top_k;
        let filters = filters.clone();
        // tantivy's Searcher is blocking; keep it off the async executor's
        // worker thread the same way the teacher isolates CPU-bound
        // inference work in `nlp`.
        let index = self.index.clone();
        let reader = self.reader.clone();
        let schema = self.schema.clone();
        tokio::task::spawn_blocking(move || {
            let adapter = TantivySparseIndex { index, reader, schema };
            adapter.search_blocking(&query_text, top_k_param, &filters)
        })
        .await
        .map_err(|e| Error::Retrieval(format!("tantivy search task panicked: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doc_type_query_term_covers_every_variant() {
        assert_eq!(doc_type_query_term(DocType::Act), "act");
        assert_eq!(doc_type_query_term(DocType::CaseLaw), "case-law");
    }
}
