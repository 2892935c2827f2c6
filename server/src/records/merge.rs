//! Role- and step-aware merge of inbound messages into the record store.
//!
//! Every store access runs a full load-modify-save under the store's
//! single-writer lock, on the blocking thread pool.

use chrono::Utc;
use serde_json::Value;

use crate::records::classify::{Disposition, Step};
use crate::records::store::{RecordStore, Records, StoreError};

/// What the merge pass decided for one message.
#[derive(Debug)]
pub struct MergeOutcome {
    /// Whether the snapshot was rewritten.
    pub mutated: bool,
    /// Direct reply for the requester only (the admin store dump).
    pub reply: Option<String>,
}

/// Apply a classified message to the store.
///
/// - Admin: serialize the full store as a requester-only reply; no mutation.
/// - Signup, or no step: unconditionally overwrite the record under `key`
///   with the message plus a `registered_at` timestamp.
/// - PinEntry: set `pin_code` on an existing record; no-op for unknown keys.
/// - OtpVerification: set `otp_code` and `verified_at` on an existing
///   record; no-op for unknown keys.
pub async fn apply(
    store: &RecordStore,
    disposition: &Disposition,
    message: &Value,
) -> Result<MergeOutcome, StoreError> {
    let _guard = store.lock().await;

    let task_store = store.clone();
    let task_disposition = disposition.clone();
    let task_message = message.clone();

    tokio::task::spawn_blocking(move || {
        apply_locked(&task_store, &task_disposition, &task_message)
    })
    .await
    .map_err(|e| StoreError::Io(std::io::Error::other(e)))?
}

/// The load-modify-save sequence itself. Caller holds the store lock.
fn apply_locked(
    store: &RecordStore,
    disposition: &Disposition,
    message: &Value,
) -> Result<MergeOutcome, StoreError> {
    match disposition {
        Disposition::Admin => {
            let records = store.load();
            let reply = serde_json::to_string(&records)?;
            Ok(MergeOutcome {
                mutated: false,
                reply: Some(reply),
            })
        }
        Disposition::Update { step, key } => {
            let mut records = store.load();
            let mutated = merge_update(&mut records, *step, key, message);
            if mutated {
                store.save(&records)?;
            }
            Ok(MergeOutcome {
                mutated,
                reply: None,
            })
        }
    }
}

/// Mutate the in-memory snapshot for one update. Returns whether anything
/// changed (and therefore whether the snapshot needs rewriting).
fn merge_update(records: &mut Records, step: Step, key: &str, message: &Value) -> bool {
    match step {
        // Stepless messages predate the step field and keep its behavior:
        // a full overwrite of the record.
        Step::Signup | Step::None => {
            let mut record = message.clone();
            if let Some(fields) = record.as_object_mut() {
                fields.insert("registered_at".to_string(), timestamp());
            }
            records.insert(key.to_string(), record);
            true
        }
        Step::PinEntry => match records.get_mut(key).and_then(Value::as_object_mut) {
            Some(record) => {
                let pin = message.get("pin_code").cloned().unwrap_or(Value::Null);
                record.insert("pin_code".to_string(), pin);
                true
            }
            None => false,
        },
        Step::OtpVerification => match records.get_mut(key).and_then(Value::as_object_mut) {
            Some(record) => {
                let otp = message.get("otp_code").cloned().unwrap_or(Value::Null);
                record.insert("otp_code".to_string(), otp);
                record.insert("verified_at".to_string(), timestamp());
                true
            }
            None => false,
        },
    }
}

fn timestamp() -> Value {
    Value::String(Utc::now().to_rfc3339())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::classify::classify;
    use serde_json::json;

    fn records_with(key: &str, record: Value) -> Records {
        let mut records = Records::new();
        records.insert(key.to_string(), record);
        records
    }

    #[test]
    fn signup_overwrites_existing_record() {
        let mut records = records_with("555", json!({"old": true}));
        let msg = json!({"phone_number": "555", "step": "signup", "name": "Ada"});

        let mutated = merge_update(&mut records, Step::Signup, "555", &msg);

        assert!(mutated);
        let record = records["555"].as_object().unwrap();
        assert_eq!(record["name"], "Ada");
        assert!(record.get("old").is_none());
        assert!(record["registered_at"].is_string());
    }

    #[test]
    fn stepless_update_behaves_like_signup() {
        let mut records = Records::new();
        let msg = json!({"phone_number": "555", "name": "Ada"});

        let mutated = merge_update(&mut records, Step::None, "555", &msg);

        assert!(mutated);
        let record = records["555"].as_object().unwrap();
        assert_eq!(record["name"], "Ada");
        assert!(record["registered_at"].is_string());
    }

    #[test]
    fn pin_entry_for_unknown_key_is_noop() {
        let mut records = Records::new();
        let msg = json!({"phone_number": "555", "step": "pin_entry", "pin_code": "1234"});

        let mutated = merge_update(&mut records, Step::PinEntry, "555", &msg);

        assert!(!mutated);
        assert!(records.is_empty());
    }

    #[test]
    fn pin_entry_sets_pin_and_leaves_other_fields_alone() {
        let mut records = records_with("555", json!({"name": "Ada"}));
        let msg = json!({"phone_number": "555", "step": "pin_entry", "pin_code": "1234"});

        let mutated = merge_update(&mut records, Step::PinEntry, "555", &msg);

        assert!(mutated);
        let record = records["555"].as_object().unwrap();
        assert_eq!(record["pin_code"], "1234");
        assert_eq!(record["name"], "Ada");
    }

    #[test]
    fn otp_verification_sets_code_and_second_timestamp() {
        let mut records = records_with("555", json!({"name": "Ada"}));
        let msg = json!({"phone_number": "555", "step": "otp_verification", "otp_code": "9876"});

        let mutated = merge_update(&mut records, Step::OtpVerification, "555", &msg);

        assert!(mutated);
        let record = records["555"].as_object().unwrap();
        assert_eq!(record["otp_code"], "9876");
        assert!(record["verified_at"].is_string());
    }

    #[test]
    fn otp_verification_for_unknown_key_is_noop() {
        let mut records = Records::new();
        let msg = json!({"phone_number": "555", "step": "otp_verification", "otp_code": "9876"});

        assert!(!merge_update(
            &mut records,
            Step::OtpVerification,
            "555",
            &msg
        ));
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn admin_query_dumps_store_without_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open(dir.path().to_str().unwrap()).unwrap();
        store
            .save(&records_with("555", json!({"name": "Ada"})))
            .unwrap();

        let msg = json!({"role": "admin"});
        let outcome = apply(&store, &classify(&msg), &msg).await.unwrap();

        assert!(!outcome.mutated);
        let dump: Value = serde_json::from_str(&outcome.reply.unwrap()).unwrap();
        assert_eq!(dump["555"]["name"], "Ada");
        // The snapshot on disk is untouched.
        assert_eq!(store.load()["555"], json!({"name": "Ada"}));
    }

    #[tokio::test]
    async fn apply_persists_signup_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open(dir.path().to_str().unwrap()).unwrap();

        let msg = json!({"phone_number": "555", "step": "signup"});
        let outcome = apply(&store, &classify(&msg), &msg).await.unwrap();

        assert!(outcome.mutated);
        assert!(outcome.reply.is_none());
        assert_eq!(store.load()["555"]["phone_number"], "555");
    }
}
