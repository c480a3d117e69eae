//! Email - the domain value carried by every queued item
//!
//! Queue payloads are JSON envelopes of the form `{"email": {...}}`.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::ContractError;

/// Queue payload envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct EmailRequest {
    #[validate(nested)]
    pub email: Email,
}

/// A single email to relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Email {
    /// Sender address
    #[validate(email)]
    pub from_email: String,

    /// Sender display name (may be empty)
    #[serde(default)]
    pub from_name: String,

    /// Recipient address
    #[validate(email)]
    pub to_email: String,

    /// Recipient display name (may be empty)
    #[serde(default)]
    pub to_name: String,

    #[serde(default)]
    pub subject: String,

    /// Plain text body
    #[serde(default)]
    pub body: String,
}

impl Email {
    /// Parse a queue payload into an email
    ///
    /// # Errors
    /// Returns `PayloadParse` when the payload is not JSON, lacks the `email`
    /// envelope, or carries an invalid sender/recipient address. Such an item
    /// can never be delivered.
    pub fn from_payload(message_id: &str, payload: &str) -> Result<Self, ContractError> {
        let request: EmailRequest = serde_json::from_str(payload)
            .map_err(|e| ContractError::payload_parse(message_id, e.to_string()))?;

        request
            .validate()
            .map_err(|e| ContractError::payload_parse(message_id, e.to_string()))?;

        Ok(request.email)
    }

    /// Serialize into a queue payload
    pub fn to_payload(&self) -> Result<String, ContractError> {
        serde_json::to_string(&EmailRequest {
            email: self.clone(),
        })
        .map_err(|e| ContractError::Other(format!("payload serialize error: {e}")))
    }

    /// `From` header value
    pub fn from_header(&self) -> String {
        render_mailbox(&self.from_name, &self.from_email)
    }

    /// `To` header value
    pub fn to_header(&self) -> String {
        render_mailbox(&self.to_name, &self.to_email)
    }
}

fn render_mailbox(name: &str, address: &str) -> String {
    let name = name.trim();
    if name.is_empty() {
        address.to_string()
    } else {
        format!("{name} <{address}>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = r#"{
        "email": {
            "fromEmail": "alice@example.com",
            "fromName": "Alice",
            "toEmail": "bob@example.org",
            "toName": "",
            "subject": "Hello",
            "body": "Hi Bob"
        }
    }"#;

    #[test]
    fn test_parse_payload() {
        let email = Email::from_payload("m-1", PAYLOAD).unwrap();
        assert_eq!(email.from_email, "alice@example.com");
        assert_eq!(email.subject, "Hello");
        assert_eq!(email.body, "Hi Bob");
    }

    #[test]
    fn test_headers_fall_back_to_bare_address() {
        let email = Email::from_payload("m-1", PAYLOAD).unwrap();
        assert_eq!(email.from_header(), "Alice <alice@example.com>");
        assert_eq!(email.to_header(), "bob@example.org");
    }

    #[test]
    fn test_missing_envelope_is_rejected() {
        let flat = r#"{"fromEmail": "a@example.com", "toEmail": "b@example.com"}"#;
        let err = Email::from_payload("m-2", flat).unwrap_err();
        assert!(matches!(err, ContractError::PayloadParse { .. }));
        assert!(err.to_string().contains("m-2"));
    }

    #[test]
    fn test_invalid_address_is_rejected() {
        let payload = r#"{"email": {"fromEmail": "not-an-address", "toEmail": "b@example.com"}}"#;
        let err = Email::from_payload("m-3", payload).unwrap_err();
        assert!(matches!(err, ContractError::PayloadParse { .. }));
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(Email::from_payload("m-4", "{{{").is_err());
        assert!(Email::from_payload("m-5", "").is_err());
    }

    #[test]
    fn test_payload_round_trip() {
        let email = Email::from_payload("m-1", PAYLOAD).unwrap();
        let payload = email.to_payload().unwrap();
        assert_eq!(Email::from_payload("m-1", &payload).unwrap(), email);
    }
}
