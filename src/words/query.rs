//! Translation of `WordQuery` into the document store's query grammar.

use super::types::{SortField, SortOrder, WordQuery};

/// Remote attribute backing each sort field.
fn sort_attribute(field: SortField) -> &'static str {
  match field {
    SortField::Word => "word",
    SortField::DateAdded => "$createdAt",
    SortField::Likes => "likes",
  }
}

/// Escape a term for embedding in a quoted grammar string.
fn escape(term: &str) -> String {
  term.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Full-text search across the headword and pronunciation attributes.
fn search_query(term: &str) -> String {
  let term = escape(term);
  format!(r#"or([search("word", "{term}"), search("pronunciation", "{term}")])"#)
}

/// Build the `queries[]` parameters for a paged listing.
pub fn listing_queries(query: &WordQuery) -> Vec<String> {
  let mut queries = vec![
    format!("limit({})", query.limit),
    format!("offset({})", query.offset),
  ];

  if let Some(term) = query.normalized_search() {
    queries.push(search_query(&term));
  }

  let attribute = sort_attribute(query.sort);
  queries.push(match query.order {
    SortOrder::Asc => format!(r#"orderAsc("{attribute}")"#),
    SortOrder::Desc => format!(r#"orderDesc("{attribute}")"#),
  });

  queries
}

/// Build the `queries[]` parameters for one batch of the mirror fetch.
pub fn batch_queries(limit: u64, offset: u64) -> Vec<String> {
  vec![format!("limit({limit})"), format!("offset({offset})")]
}
