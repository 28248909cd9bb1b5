//! HTTP client for the remote dictionary document store.

use color_eyre::{eyre::eyre, Result};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::json;
use url::Url;

use crate::cache::Page;
use crate::config::Config;

use super::api_types::{ApiDocumentList, ApiError, ApiWordDocument};
use super::query;
use super::types::{WordEntry, WordQuery};

/// Batch size for the paged mirror fetch; the service caps page size.
const FETCH_BATCH: u64 = 100;

/// Document store API client wrapper
#[derive(Clone)]
pub struct WordsClient {
  http: reqwest::Client,
  endpoint: String,
  database_id: String,
  words_collection: String,
  messages_collection: String,
}

impl WordsClient {
  pub fn new(config: &Config) -> Result<Self> {
    let mut headers = HeaderMap::new();
    headers.insert(
      "X-Appwrite-Project",
      HeaderValue::from_str(&config.appwrite.project_id)
        .map_err(|e| eyre!("invalid project id: {e}"))?,
    );
    if let Some(key) = Config::get_api_key() {
      headers.insert(
        "X-Appwrite-Key",
        HeaderValue::from_str(&key).map_err(|e| eyre!("invalid API key: {e}"))?,
      );
    }

    let http = reqwest::Client::builder()
      .default_headers(headers)
      .build()
      .map_err(|e| eyre!("failed to create HTTP client: {e}"))?;

    Ok(Self {
      http,
      endpoint: config.appwrite.endpoint.trim_end_matches('/').to_string(),
      database_id: config.appwrite.database_id.clone(),
      words_collection: config.appwrite.words_collection_id.clone(),
      messages_collection: config.appwrite.messages_collection_id.clone(),
    })
  }

  fn documents_url(&self, collection: &str) -> Result<Url> {
    let raw = format!(
      "{}/databases/{}/collections/{}/documents",
      self.endpoint, self.database_id, collection
    );
    Url::parse(&raw).map_err(|e| eyre!("invalid endpoint URL {raw}: {e}"))
  }

  fn document_url(&self, collection: &str, id: &str) -> Result<Url> {
    let raw = format!(
      "{}/databases/{}/collections/{}/documents/{}",
      self.endpoint, self.database_id, collection, id
    );
    Url::parse(&raw).map_err(|e| eyre!("invalid endpoint URL {raw}: {e}"))
  }

  /// Surface non-success responses with the service's error message.
  async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
      return Ok(response);
    }

    let message = response
      .json::<ApiError>()
      .await
      .map(|e| e.message)
      .unwrap_or_default();
    if message.is_empty() {
      Err(eyre!("request failed with status {status}"))
    } else {
      Err(eyre!("request failed with status {status}: {message}"))
    }
  }

  /// Fetch one page of words matching the query.
  pub async fn list_words(&self, word_query: &WordQuery) -> Result<Page<WordEntry>> {
    let mut url = self.documents_url(&self.words_collection)?;
    for q in query::listing_queries(word_query) {
      url.query_pairs_mut().append_pair("queries[]", &q);
    }

    let response = self
      .http
      .get(url)
      .send()
      .await
      .map_err(|e| eyre!("failed to fetch words: {e}"))?;

    let list: ApiDocumentList = Self::check(response)
      .await?
      .json()
      .await
      .map_err(|e| eyre!("failed to parse word list: {e}"))?;

    Ok(Page {
      total: list.total,
      entries: list
        .documents
        .into_iter()
        .map(ApiWordDocument::into_entry)
        .collect(),
    })
  }

  /// Fetch the whole collection in batches, up to `cap` entries.
  pub async fn fetch_all_words(&self, cap: u64) -> Result<Vec<WordEntry>> {
    let mut all_words = Vec::new();
    let mut offset = 0u64;

    loop {
      let limit = FETCH_BATCH.min(cap - offset);
      if limit == 0 {
        break;
      }

      let mut url = self.documents_url(&self.words_collection)?;
      for q in query::batch_queries(limit, offset) {
        url.query_pairs_mut().append_pair("queries[]", &q);
      }

      let response = self
        .http
        .get(url)
        .send()
        .await
        .map_err(|e| eyre!("failed to fetch words: {e}"))?;

      let list: ApiDocumentList = Self::check(response)
        .await?
        .json()
        .await
        .map_err(|e| eyre!("failed to parse word list: {e}"))?;

      let batch_count = list.documents.len() as u64;
      all_words.extend(
        list
          .documents
          .into_iter()
          .map(ApiWordDocument::into_entry),
      );
      offset += batch_count;

      // Check if we've fetched all words
      if batch_count < limit || offset >= list.total {
        break;
      }
    }

    Ok(all_words)
  }

  /// Get a single word by document id.
  pub async fn get_word(&self, id: &str) -> Result<WordEntry> {
    let url = self.document_url(&self.words_collection, id)?;

    let response = self
      .http
      .get(url)
      .send()
      .await
      .map_err(|e| eyre!("failed to fetch word {id}: {e}"))?;

    let doc: ApiWordDocument = Self::check(response)
      .await?
      .json()
      .await
      .map_err(|e| eyre!("failed to parse word {id}: {e}"))?;

    Ok(doc.into_entry())
  }

  /// Set a word's like count to a caller-supplied value.
  ///
  /// The service offers no atomic increment: two concurrent writers can lose
  /// an update. Last writer wins.
  pub async fn set_likes(&self, id: &str, likes: u32) -> Result<WordEntry> {
    let url = self.document_url(&self.words_collection, id)?;
    let body = json!({ "data": { "likes": likes } });

    let response = self
      .http
      .patch(url)
      .json(&body)
      .send()
      .await
      .map_err(|e| eyre!("failed to update likes for {id}: {e}"))?;

    let doc: ApiWordDocument = Self::check(response)
      .await?
      .json()
      .await
      .map_err(|e| eyre!("failed to parse word {id}: {e}"))?;

    Ok(doc.into_entry())
  }

  /// Submit a free-text suggestion to the messages collection.
  pub async fn create_suggestion(&self, text: &str, name: Option<&str>) -> Result<()> {
    let text = text.trim();
    if text.is_empty() {
      return Err(eyre!("suggestion text is empty"));
    }
    let name = name
      .map(str::trim)
      .filter(|n| !n.is_empty())
      .unwrap_or("Anonymous");

    let url = self.documents_url(&self.messages_collection)?;
    let body = json!({
      "documentId": "unique()",
      "data": { "text": text, "name": name },
    });

    let response = self
      .http
      .post(url)
      .json(&body)
      .send()
      .await
      .map_err(|e| eyre!("failed to send suggestion: {e}"))?;

    Self::check(response).await?;
    Ok(())
  }
}
