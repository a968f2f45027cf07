//! Remote source of truth: the hosted backend's stores table and asset store.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::header::{CONTENT_TYPE, RANGE};
use url::Url;

use crate::config::Config;

use super::api_types::{parse_content_range, InsertStoreRow, UploadResponse, STORE_FIELDS};
use super::types::{NewStore, StoreRecord};

/// The remote record store and asset store the engine syncs against.
///
/// Implementations surface network failures as errors; the cache, queue and
/// sync layers decide how to absorb them.
#[async_trait]
pub trait StoreRemote: Send + Sync {
  /// Exact row count of the stores collection.
  async fn count_stores(&self) -> Result<usize>;

  /// One page of rows, ordered by id, with the fixed field projection.
  async fn fetch_stores_page(&self, offset: usize, limit: usize) -> Result<Vec<StoreRecord>>;

  /// Insert a store and return the created row when the server sends one
  /// back. `image_url` is the asset filename resolved beforehand.
  async fn insert_store(
    &self,
    store: &NewStore,
    image_url: Option<&str>,
  ) -> Result<Option<StoreRecord>>;

  /// Upload an image blob; returns the filename the asset store assigned.
  async fn upload_image(&self, name: &str, bytes: Vec<u8>) -> Result<String>;
}

/// HTTP client for the hosted backend's REST and storage endpoints.
#[derive(Clone)]
pub struct StoreApi {
  http: reqwest::Client,
  base: Url,
  api_key: String,
  bucket: String,
}

impl StoreApi {
  pub fn new(config: &Config) -> Result<Self> {
    let api_key = Config::get_api_key()?;
    Self::with_key(&config.remote.url, &config.remote.bucket, api_key)
  }

  /// Construct with an explicit key, for embedders that don't use the
  /// environment.
  pub fn with_key(base_url: &str, bucket: &str, api_key: String) -> Result<Self> {
    // A trailing slash keeps Url::join from eating the last path segment
    let base = Url::parse(&format!("{}/", base_url.trim_end_matches('/')))
      .map_err(|e| eyre!("Invalid remote URL {}: {}", base_url, e))?;

    let http = reqwest::Client::builder()
      .build()
      .map_err(|e| eyre!("Failed to build HTTP client: {}", e))?;

    Ok(Self {
      http,
      base,
      api_key,
      bucket: bucket.to_string(),
    })
  }

  fn stores_url(&self) -> Result<Url> {
    self
      .base
      .join("rest/v1/stores")
      .map_err(|e| eyre!("Failed to build stores URL: {}", e))
  }

  fn upload_url(&self, name: &str) -> Result<Url> {
    self
      .base
      .join(&format!("storage/v1/object/{}/{}", self.bucket, name))
      .map_err(|e| eyre!("Failed to build upload URL: {}", e))
  }

  fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    req
      .header("apikey", &self.api_key)
      .bearer_auth(&self.api_key)
  }
}

#[async_trait]
impl StoreRemote for StoreApi {
  async fn count_stores(&self) -> Result<usize> {
    let mut url = self.stores_url()?;
    url.query_pairs_mut().append_pair("select", "id");

    let resp = self
      .authed(self.http.get(url))
      .header(RANGE, "0-0")
      .header("Prefer", "count=exact")
      .send()
      .await
      .map_err(|e| eyre!("Failed to count stores: {}", e))?
      .error_for_status()
      .map_err(|e| eyre!("Count request rejected: {}", e))?;

    let range = resp
      .headers()
      .get("content-range")
      .and_then(|v| v.to_str().ok())
      .ok_or_else(|| eyre!("Count response missing content-range header"))?;

    parse_content_range(range).ok_or_else(|| eyre!("Unparseable content-range: {}", range))
  }

  async fn fetch_stores_page(&self, offset: usize, limit: usize) -> Result<Vec<StoreRecord>> {
    let mut url = self.stores_url()?;
    url
      .query_pairs_mut()
      .append_pair("select", STORE_FIELDS)
      .append_pair("order", "id.asc");

    let resp = self
      .authed(self.http.get(url))
      .header(RANGE, format!("{}-{}", offset, offset + limit - 1))
      .send()
      .await
      .map_err(|e| eyre!("Failed to fetch stores page at {}: {}", offset, e))?
      .error_for_status()
      .map_err(|e| eyre!("Page request rejected: {}", e))?;

    resp
      .json::<Vec<StoreRecord>>()
      .await
      .map_err(|e| eyre!("Failed to parse stores page: {}", e))
  }

  async fn insert_store(
    &self,
    store: &NewStore,
    image_url: Option<&str>,
  ) -> Result<Option<StoreRecord>> {
    let row = InsertStoreRow::from_new(store, image_url);

    let resp = self
      .authed(self.http.post(self.stores_url()?))
      .header("Prefer", "return=representation")
      .json(&row)
      .send()
      .await
      .map_err(|e| eyre!("Failed to insert store: {}", e))?
      .error_for_status()
      .map_err(|e| eyre!("Insert rejected: {}", e))?;

    let body = resp
      .text()
      .await
      .map_err(|e| eyre!("Failed to read insert response: {}", e))?;

    // A server configured for minimal returns sends no body; the caller
    // falls back to invalidating the cache
    if body.trim().is_empty() {
      return Ok(None);
    }

    let mut rows: Vec<StoreRecord> =
      serde_json::from_str(&body).map_err(|e| eyre!("Failed to parse created store: {}", e))?;

    Ok(rows.pop())
  }

  async fn upload_image(&self, name: &str, bytes: Vec<u8>) -> Result<String> {
    let resp = self
      .authed(self.http.post(self.upload_url(name)?))
      .header(CONTENT_TYPE, "application/octet-stream")
      .body(bytes)
      .send()
      .await
      .map_err(|e| eyre!("Failed to upload image {}: {}", name, e))?
      .error_for_status()
      .map_err(|e| eyre!("Upload rejected: {}", e))?;

    // Older storage gateways respond with an empty body; the suggested name
    // was accepted as-is in that case
    match resp.json::<UploadResponse>().await {
      Ok(upload) => Ok(upload.filename().to_string()),
      Err(_) => Ok(name.to_string()),
    }
  }
}
