//! In-process query evaluation against the full mirror, for offline mode.

use std::cmp::Ordering;

use crate::cache::Page;

use super::types::{SortField, SortOrder, WordEntry, WordQuery};

/// Case-insensitive substring match against headword, pronunciation, and
/// every definition. An entry matches if any field matches.
fn matches(entry: &WordEntry, term: &str) -> bool {
  entry.word.to_lowercase().contains(term)
    || entry.pronunciation.to_lowercase().contains(term)
    || entry
      .definitions
      .iter()
      .any(|def| def.to_lowercase().contains(term))
}

fn compare(a: &WordEntry, b: &WordEntry, field: SortField) -> Ordering {
  match field {
    SortField::Word => a.word.to_lowercase().cmp(&b.word.to_lowercase()),
    SortField::DateAdded => a.date_added.cmp(&b.date_added),
    SortField::Likes => a.likes.cmp(&b.likes),
  }
}

/// Evaluate a query against mirror entries: filter by search term, sort by
/// the query's field and order, then slice out the requested page.
///
/// `total` is the filtered count, so pagination matches what the remote
/// service would report for the same query.
pub fn query_mirror(entries: &[WordEntry], query: &WordQuery) -> Page<WordEntry> {
  let mut matched: Vec<&WordEntry> = match query.normalized_search() {
    Some(term) => entries.iter().filter(|e| matches(e, &term)).collect(),
    None => entries.iter().collect(),
  };

  matched.sort_by(|a, b| {
    let ordering = compare(a, b, query.sort);
    match query.order {
      SortOrder::Asc => ordering,
      SortOrder::Desc => ordering.reverse(),
    }
  });

  let total = matched.len() as u64;
  let start = (query.offset as usize).min(matched.len());
  let end = (start + query.limit as usize).min(matched.len());
  let entries = matched[start..end].iter().map(|e| (*e).clone()).collect();

  Page { entries, total }
}
