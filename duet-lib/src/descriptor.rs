use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use webrtc::peer_connection::sdp::{
    sdp_type::RTCSdpType, session_description::RTCSessionDescription,
};

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DescriptorKind {
    Offer,
    Answer,
}

impl fmt::Display for DescriptorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Offer => "offer",
            Self::Answer => "answer",
        })
    }
}

/// `{ "type": "offer" | "answer", "sdp": "..." }`
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Descriptor {
    #[serde(rename = "type")]
    pub kind: DescriptorKind,
    pub sdp: String,
}

#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("descriptor is empty")]
    Empty,
    #[error("no connection has been initialized")]
    NoConnection,
    #[error("descriptor is not valid JSON: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("descriptor does not match the schema: {0}")]
    Schema(#[source] serde_json::Error),
}

impl Descriptor {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: DescriptorKind::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: DescriptorKind::Answer,
            sdp: sdp.into(),
        }
    }

    /// Parses `text` and checks it strictly against the descriptor schema.
    /// Nothing is coerced: a numeric `sdp` or an upper-case `type` is rejected.
    pub fn validate(text: &str) -> Result<Self, DescriptorError> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(DescriptorError::Malformed)?;
        // Derived struct deserialization also takes a sequence.
        if !value.is_object() {
            let err = <serde_json::Error as serde::de::Error>::custom("expected a descriptor object");
            return Err(DescriptorError::Schema(err));
        }
        serde_json::from_value(value).map_err(DescriptorError::Schema)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_rtc(&self) -> webrtc::error::Result<RTCSessionDescription> {
        match self.kind {
            DescriptorKind::Offer => RTCSessionDescription::offer(self.sdp.clone()),
            DescriptorKind::Answer => RTCSessionDescription::answer(self.sdp.clone()),
        }
    }

    pub fn from_rtc(desc: &RTCSessionDescription) -> Option<Self> {
        let kind = match desc.sdp_type {
            RTCSdpType::Offer => DescriptorKind::Offer,
            RTCSdpType::Answer => DescriptorKind::Answer,
            RTCSdpType::Pranswer | RTCSdpType::Unspecified | RTCSdpType::Rollback => return None,
        };
        Some(Self {
            kind,
            sdp: desc.sdp.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_offer_and_answer() {
        let desc = Descriptor::validate(r#"{"type":"offer","sdp":"v=0"}"#).unwrap();
        assert_eq!(desc, Descriptor::offer("v=0"));
        let desc = Descriptor::validate(r#"{"type":"answer","sdp":""}"#).unwrap();
        assert_eq!(desc, Descriptor::answer(""));
    }

    #[test]
    fn ignores_undefined_fields() {
        let desc = Descriptor::validate(r#"{"type":"answer","sdp":"x","extra":1}"#).unwrap();
        assert_eq!(desc, Descriptor::answer("x"));
    }

    #[test]
    fn rejects_schema_mismatches() {
        for text in [
            r#"{"type":"offer"}"#,
            r#"{"type":"hello","sdp":"x"}"#,
            r#"{"type":"Offer","sdp":"x"}"#,
            r#"{"type":"offer","sdp":1}"#,
            r#"{"sdp":"x"}"#,
            r#"["offer","x"]"#,
            r#"["offer"]"#,
            "[]",
            r#""offer""#,
            "null",
        ] {
            let err = Descriptor::validate(text).unwrap_err();
            assert!(matches!(err, DescriptorError::Schema(_)), "{text}: {err}");
        }
    }

    #[test]
    fn rejects_non_json() {
        let err = Descriptor::validate("H4sIAAAA").unwrap_err();
        assert!(matches!(err, DescriptorError::Malformed(_)), "{err}");
    }

    #[test]
    fn serializes_with_type_field() {
        let json = Descriptor::offer("v=0").to_json().unwrap();
        assert_eq!(json, r#"{"type":"offer","sdp":"v=0"}"#);
    }
}
