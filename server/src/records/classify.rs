//! Inbound message classification.
//!
//! Each parsed message is either an admin store query or a user update
//! tagged with the onboarding step it belongs to and the key it merges
//! under. Non-JSON frames never reach this point; the WS dispatch layer
//! rejects them first.

use serde_json::Value;

/// Fallback merge key for messages that carry no phone number.
pub const UNKNOWN_USER_KEY: &str = "unknown_user";

/// Onboarding step named by a message's `step` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Signup,
    PinEntry,
    OtpVerification,
    /// No recognized `step` field: the pre-step message shape.
    None,
}

impl Step {
    fn from_field(value: Option<&Value>) -> Self {
        match value.and_then(Value::as_str) {
            Some("signup") => Self::Signup,
            Some("pin_entry") => Self::PinEntry,
            Some("otp_verification") => Self::OtpVerification,
            _ => Self::None,
        }
    }
}

/// Classification outcome for one parsed inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// `role == "admin"`: reply with the full store dump; no merge, no
    /// broadcast.
    Admin,
    /// Anything else: merge into the store under `key`, then broadcast.
    Update { step: Step, key: String },
}

/// Classify a parsed message into its disposition.
pub fn classify(message: &Value) -> Disposition {
    if message.get("role").and_then(Value::as_str) == Some("admin") {
        return Disposition::Admin;
    }

    // Numeric phone numbers become string keys, same as they would after a
    // snapshot round trip.
    let key = match message.get("phone_number") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => UNKNOWN_USER_KEY.to_string(),
    };

    Disposition::Update {
        step: Step::from_field(message.get("step")),
        key,
    }
}
