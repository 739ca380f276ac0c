//! Record and identifier types for the signaling log
//!
//! A call is negotiated by appending [`SignalRecord`]s to a shared,
//! subscribable log. The record layout is wire-exact: every field name
//! below matches the persisted column/JSON key, so records written here
//! interoperate with any other client of the same store (including
//! browser peers using the standard WebRTC JSON shapes for SDP and ICE
//! payloads).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque, stable identity of a member, supplied by the external
/// identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(String);

impl MemberId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MemberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MemberId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Store-assigned identifier of one signaling record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub Uuid);

impl RecordId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier of one call attempt.
///
/// A call id is not allocated separately: the offer record that opens a
/// call is published with `call_id = None`, and the store-assigned id of
/// that offer record *becomes* the call id every later record refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(pub Uuid);

impl From<RecordId> for CallId {
    fn from(id: RecordId) -> Self {
        Self(id.0)
    }
}

impl std::fmt::Display for CallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Whether a call carries audio only or audio plus video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallType {
    Audio,
    Video,
}

impl CallType {
    pub fn is_video(&self) -> bool {
        matches!(self, CallType::Video)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CallType::Audio => "audio",
            CallType::Video => "video",
        }
    }
}

/// Lifecycle status carried on signaling records and mirrored onto the
/// call session.
///
/// `ringing -> active -> ended` is the only forward path; `declined` is
/// terminal from `ringing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Ringing,
    Active,
    Declined,
    Ended,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Ringing => "ringing",
            CallStatus::Active => "active",
            CallStatus::Declined => "declined",
            CallStatus::Ended => "ended",
        }
    }
}

/// An SDP blob plus its role, in the standard WebRTC JSON shape
/// (`{ "type": "offer" | "answer", "sdp": "v=0..." }`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    /// SDP role: `"offer"` or `"answer"`.
    #[serde(rename = "type")]
    pub sdp_type: String,
    /// The raw SDP text.
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: "offer".to_string(),
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: "answer".to_string(),
            sdp: sdp.into(),
        }
    }
}

/// One ICE candidate, in the standard WebRTC JSON shape.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IceCandidateInit {
    pub candidate: String,
    #[serde(rename = "sdpMid", default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(
        rename = "sdpMLineIndex",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub sdp_mline_index: Option<u16>,
    #[serde(
        rename = "usernameFragment",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub username_fragment: Option<String>,
}

/// The signal payload, tagged by kind.
///
/// Serializes as the adjacent `signal_type` / `signal_data` field pair
/// of the wire format, so a payload can never be paired with the wrong
/// type tag. `End` carries no payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "signal_type", content = "signal_data", rename_all = "snake_case")]
pub enum Signal {
    Offer(SessionDescription),
    Answer(SessionDescription),
    IceCandidate(IceCandidateInit),
    End,
}

impl Signal {
    pub fn kind(&self) -> &'static str {
        match self {
            Signal::Offer(_) => "offer",
            Signal::Answer(_) => "answer",
            Signal::IceCandidate(_) => "ice_candidate",
            Signal::End => "end",
        }
    }
}

/// One row of the durable signaling log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    /// Store-assigned unique id.
    pub id: RecordId,
    /// The call this record belongs to. `None` only on the offer record
    /// that opens a call; its own `id` becomes the call id.
    pub call_id: Option<CallId>,
    /// Sender of this particular signal.
    pub caller_id: MemberId,
    /// Recipient of this particular signal.
    pub receiver_id: MemberId,
    pub call_type: CallType,
    #[serde(flatten)]
    pub signal: Signal,
    pub status: CallStatus,
    /// Store-assigned insertion timestamp. Ordering is insertion order,
    /// not client clock.
    pub created_at: DateTime<Utc>,
}

impl SignalRecord {
    /// The call id this record is about: the explicit `call_id`, or the
    /// record's own id for the offer that created the call.
    pub fn effective_call_id(&self) -> CallId {
        self.call_id.unwrap_or_else(|| CallId::from(self.id))
    }
}

/// A record as submitted for publication, before the store assigns
/// `id` and `created_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalDraft {
    pub call_id: Option<CallId>,
    pub caller_id: MemberId,
    pub receiver_id: MemberId,
    pub call_type: CallType,
    pub signal: Signal,
    pub status: CallStatus,
}

impl SignalDraft {
    /// Draft for the offer record that opens a call. The call id is
    /// assigned by the store on publish.
    pub fn offer(
        caller_id: MemberId,
        receiver_id: MemberId,
        call_type: CallType,
        sdp: SessionDescription,
    ) -> Self {
        Self {
            call_id: None,
            caller_id,
            receiver_id,
            call_type,
            signal: Signal::Offer(sdp),
            status: CallStatus::Ringing,
        }
    }

    pub fn answer(
        call_id: CallId,
        caller_id: MemberId,
        receiver_id: MemberId,
        call_type: CallType,
        sdp: SessionDescription,
    ) -> Self {
        Self {
            call_id: Some(call_id),
            caller_id,
            receiver_id,
            call_type,
            signal: Signal::Answer(sdp),
            status: CallStatus::Active,
        }
    }

    pub fn ice_candidate(
        call_id: CallId,
        caller_id: MemberId,
        receiver_id: MemberId,
        call_type: CallType,
        candidate: IceCandidateInit,
        status: CallStatus,
    ) -> Self {
        Self {
            call_id: Some(call_id),
            caller_id,
            receiver_id,
            call_type,
            signal: Signal::IceCandidate(candidate),
            status,
        }
    }

    pub fn end(
        call_id: CallId,
        caller_id: MemberId,
        receiver_id: MemberId,
        call_type: CallType,
        status: CallStatus,
    ) -> Self {
        Self {
            call_id: Some(call_id),
            caller_id,
            receiver_id,
            call_type,
            signal: Signal::End,
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_serializes_as_adjacent_type_and_data() {
        let signal = Signal::Offer(SessionDescription::offer("v=0\r\n"));
        let value = serde_json::to_value(&signal).unwrap();
        assert_eq!(value["signal_type"], "offer");
        assert_eq!(value["signal_data"]["type"], "offer");
        assert_eq!(value["signal_data"]["sdp"], "v=0\r\n");
    }

    #[test]
    fn end_signal_has_no_payload_and_accepts_null() {
        let value = serde_json::to_value(&Signal::End).unwrap();
        assert_eq!(value["signal_type"], "end");

        let parsed: Signal =
            serde_json::from_str(r#"{"signal_type":"end","signal_data":null}"#).unwrap();
        assert_eq!(parsed, Signal::End);
    }

    #[test]
    fn ice_candidate_uses_webrtc_json_field_names() {
        let signal = Signal::IceCandidate(IceCandidateInit {
            candidate: "candidate:1 1 UDP 2122260223 192.0.2.1 54321 typ host".to_string(),
            sdp_mid: Some("0".to_string()),
            sdp_mline_index: Some(0),
            username_fragment: None,
        });
        let value = serde_json::to_value(&signal).unwrap();
        assert_eq!(value["signal_type"], "ice_candidate");
        assert_eq!(value["signal_data"]["sdpMid"], "0");
        assert_eq!(value["signal_data"]["sdpMLineIndex"], 0);
        assert!(value["signal_data"].get("usernameFragment").is_none());
    }

    #[test]
    fn record_wire_format_is_field_exact() {
        let record = SignalRecord {
            id: RecordId::generate(),
            call_id: None,
            caller_id: MemberId::new("member-a"),
            receiver_id: MemberId::new("member-b"),
            call_type: CallType::Video,
            signal: Signal::Offer(SessionDescription::offer("v=0\r\n")),
            status: CallStatus::Ringing,
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(&record).unwrap();
        for key in [
            "id",
            "call_id",
            "caller_id",
            "receiver_id",
            "call_type",
            "signal_type",
            "signal_data",
            "status",
            "created_at",
        ] {
            assert!(value.get(key).is_some(), "missing wire field {key}");
        }
        assert_eq!(value["call_type"], "video");
        assert_eq!(value["status"], "ringing");
        assert_eq!(value["call_id"], serde_json::Value::Null);

        let back: SignalRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn offer_record_derives_call_id_from_its_own_id() {
        let record = SignalRecord {
            id: RecordId::generate(),
            call_id: None,
            caller_id: MemberId::new("a"),
            receiver_id: MemberId::new("b"),
            call_type: CallType::Audio,
            signal: Signal::Offer(SessionDescription::offer("v=0\r\n")),
            status: CallStatus::Ringing,
            created_at: Utc::now(),
        };
        assert_eq!(record.effective_call_id(), CallId::from(record.id));
    }
}
