//! Wire-level types for the hosted backend's REST and storage endpoints.

use serde::{Deserialize, Serialize};

use super::types::{search_name, NewStore};

/// Field projection requested on every row read. Fixed so pages are always
/// shaped the same regardless of server-side column additions.
pub const STORE_FIELDS: &str =
  "id,name,image_url,latitude,longitude,address_detail,ward,district,phone,note,active,created_at";

/// Row shape accepted by the stores insert endpoint.
///
/// `name_search` is computed client-side at insert time; the server has no
/// trigger for it.
#[derive(Debug, Serialize)]
pub struct InsertStoreRow<'a> {
  pub name: &'a str,
  pub name_search: String,
  pub image_url: Option<&'a str>,
  pub latitude: Option<f64>,
  pub longitude: Option<f64>,
  pub address_detail: Option<&'a str>,
  pub ward: Option<&'a str>,
  pub district: Option<&'a str>,
  pub phone: Option<&'a str>,
  pub note: Option<&'a str>,
  pub active: bool,
}

impl<'a> InsertStoreRow<'a> {
  pub fn from_new(store: &'a NewStore, image_url: Option<&'a str>) -> Self {
    Self {
      name: &store.name,
      name_search: search_name(&store.name),
      image_url,
      latitude: store.latitude,
      longitude: store.longitude,
      address_detail: store.address_detail.as_deref(),
      ward: store.ward.as_deref(),
      district: store.district.as_deref(),
      phone: store.phone.as_deref(),
      note: store.note.as_deref(),
      active: store.active,
    }
  }
}

/// Body returned by the asset store after an upload.
#[derive(Debug, Deserialize)]
pub struct UploadResponse {
  /// Object key, `bucket/filename`.
  #[serde(alias = "Key")]
  pub key: String,
}

impl UploadResponse {
  /// The assigned filename with the bucket prefix stripped.
  pub fn filename(&self) -> &str {
    self.key.rsplit('/').next().unwrap_or(&self.key)
  }
}

/// Parse the total row count out of a `content-range` header value such as
/// `0-24/3573` or `*/0`.
pub fn parse_content_range(value: &str) -> Option<usize> {
  let total = value.rsplit('/').next()?;
  total.parse().ok()
}
