//! Domain types for the store collection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A store as known to the remote source of truth.
///
/// `id` is assigned by the remote on insert and never changes afterwards; it
/// is the join key between cached rows and rows created through the offline
/// queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreRecord {
  pub id: i64,
  pub name: String,
  /// Asset filename only, no protocol or host.
  pub image_url: Option<String>,
  pub latitude: Option<f64>,
  pub longitude: Option<f64>,
  pub address_detail: Option<String>,
  pub ward: Option<String>,
  pub district: Option<String>,
  pub phone: Option<String>,
  pub note: Option<String>,
  /// Verification flag maintained by the team.
  #[serde(default)]
  pub active: bool,
  pub created_at: Option<DateTime<Utc>>,
}

/// Payload for creating a store. The remote assigns `id` and `created_at`;
/// the image reference is resolved separately through the asset store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewStore {
  pub name: String,
  pub latitude: Option<f64>,
  pub longitude: Option<f64>,
  pub address_detail: Option<String>,
  pub ward: Option<String>,
  pub district: Option<String>,
  pub phone: Option<String>,
  pub note: Option<String>,
  #[serde(default)]
  pub active: bool,
}

/// A store creation recorded while offline, waiting to be synced.
///
/// `local_id` lives in the queue's own id namespace and is never sent to the
/// remote. The entry is deleted only after the remote insert (and the image
/// upload, when bytes are present) succeeded.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingStore {
  pub local_id: i64,
  pub store: NewStore,
  /// Raw bytes of an already-compressed image, if one was attached.
  pub image_data: Option<Vec<u8>>,
  /// Suggested filename for the upload.
  pub image_name: Option<String>,
  pub queued_at: DateTime<Utc>,
}

/// Lowercased, diacritic-free version of a store name, stored alongside the
/// display name so searches match regardless of accent input.
pub fn search_name(name: &str) -> String {
  name.trim().to_lowercase().chars().map(fold_vietnamese).collect()
}

fn fold_vietnamese(c: char) -> char {
  match c {
    'à' | 'á' | 'ả' | 'ã' | 'ạ' | 'ă' | 'ằ' | 'ắ' | 'ẳ' | 'ẵ' | 'ặ' | 'â' | 'ầ' | 'ấ' | 'ẩ'
    | 'ẫ' | 'ậ' => 'a',
    'è' | 'é' | 'ẻ' | 'ẽ' | 'ẹ' | 'ê' | 'ề' | 'ế' | 'ể' | 'ễ' | 'ệ' => 'e',
    'ì' | 'í' | 'ỉ' | 'ĩ' | 'ị' => 'i',
    'ò' | 'ó' | 'ỏ' | 'õ' | 'ọ' | 'ô' | 'ồ' | 'ố' | 'ổ' | 'ỗ' | 'ộ' | 'ơ' | 'ờ' | 'ớ' | 'ở'
    | 'ỡ' | 'ợ' => 'o',
    'ù' | 'ú' | 'ủ' | 'ũ' | 'ụ' | 'ư' | 'ừ' | 'ứ' | 'ử' | 'ữ' | 'ự' => 'u',
    'ỳ' | 'ý' | 'ỷ' | 'ỹ' | 'ỵ' => 'y',
    'đ' => 'd',
    other => other,
  }
}
