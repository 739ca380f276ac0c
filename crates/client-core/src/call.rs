//! Call session types
//!
//! A [`CallSession`] is the coordinator's ephemeral view of one call
//! attempt. It is created on initiate/offer, mutated by the signaling
//! exchange, and dropped on end/decline. The signaling record history
//! is the durable log; nothing here is persisted.

use chrono::{DateTime, Utc};
use membercall_signal_core::{CallId, CallStatus, CallType, MemberId, SessionDescription};

/// Which side of the call this member is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallDirection {
    Outgoing,
    Incoming,
}

/// One call attempt, held in memory for the call's duration only.
#[derive(Debug, Clone)]
pub struct CallSession {
    pub call_id: CallId,
    /// The member who placed the call. Fixed at creation.
    pub caller_id: MemberId,
    /// The member being called. Fixed at creation.
    pub receiver_id: MemberId,
    pub call_type: CallType,
    pub direction: CallDirection,
    pub status: CallStatus,
    /// Set when the call transitions to active.
    pub started_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl CallSession {
    pub(crate) fn outgoing(
        call_id: CallId,
        caller_id: MemberId,
        receiver_id: MemberId,
        call_type: CallType,
    ) -> Self {
        Self {
            call_id,
            caller_id,
            receiver_id,
            call_type,
            direction: CallDirection::Outgoing,
            status: CallStatus::Ringing,
            started_at: None,
            created_at: Utc::now(),
        }
    }

    pub(crate) fn incoming_active(incoming: &IncomingCall, local_member: MemberId) -> Self {
        Self {
            call_id: incoming.call_id,
            caller_id: incoming.caller_id.clone(),
            receiver_id: local_member,
            call_type: incoming.call_type,
            direction: CallDirection::Incoming,
            status: CallStatus::Active,
            started_at: Some(Utc::now()),
            created_at: incoming.received_at,
        }
    }

    /// The other member on this call, from the local side's perspective.
    pub fn peer(&self) -> &MemberId {
        match self.direction {
            CallDirection::Outgoing => &self.receiver_id,
            CallDirection::Incoming => &self.caller_id,
        }
    }

    pub fn is_ringing(&self) -> bool {
        self.status == CallStatus::Ringing
    }

    pub fn is_active(&self) -> bool {
        self.status == CallStatus::Active
    }
}

/// A received offer awaiting the user's accept/decline decision.
///
/// No media is touched while a call sits here; camera and microphone
/// stay off until the user answers.
#[derive(Debug, Clone)]
pub struct IncomingCall {
    pub call_id: CallId,
    pub caller_id: MemberId,
    pub call_type: CallType,
    pub offer: SessionDescription,
    pub received_at: DateTime<Utc>,
}
