//! Session state owned by a timer instance.
//!
//! Two states: `Closed`, and `Open` carrying the start time and, once the
//! create call has answered, the record id. Every transition goes through
//! the methods below so the handlers never poke at fields directly.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::ProtocolViolation;
use crate::store::RecordId;

/// Current session state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    /// No session is being recorded.
    #[default]
    Closed,
    /// A session was accepted and is being recorded.
    Open {
        /// Store id; `None` until create succeeds (or forever if it failed).
        record_id: Option<RecordId>,
        /// Start timestamp sent with the create call.
        started_at: DateTime<Utc>,
        /// An update for this session is in flight.
        closing: bool,
    },
}

impl SessionState {
    /// Whether a session is open.
    pub fn is_open(&self) -> bool {
        matches!(self, SessionState::Open { .. })
    }

    /// Record id of the open session, if known.
    pub fn record_id(&self) -> Option<&RecordId> {
        match self {
            SessionState::Open { record_id, .. } => record_id.as_ref(),
            SessionState::Closed => None,
        }
    }

    /// Start time of the open session.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        match self {
            SessionState::Open { started_at, .. } => Some(*started_at),
            SessionState::Closed => None,
        }
    }

    /// Closed -> Open at `started_at`.
    pub fn open(&mut self, started_at: DateTime<Utc>) -> Result<(), ProtocolViolation> {
        if self.is_open() {
            return Err(ProtocolViolation::AlreadyOpen);
        }
        *self = SessionState::Open {
            record_id: None,
            started_at,
            closing: false,
        };
        Ok(())
    }

    /// Store the id returned by create for the session opened at `started_at`.
    ///
    /// Returns `false` if that session is no longer the open one.
    pub fn attach_record(&mut self, started_at: DateTime<Utc>, id: RecordId) -> bool {
        if let SessionState::Open {
            record_id,
            started_at: at,
            ..
        } = self
        {
            if record_id.is_none() && *at == started_at {
                *record_id = Some(id);
                return true;
            }
        }
        false
    }

    /// Mark the open session as closing and return what the update needs.
    pub fn begin_close(&mut self) -> Result<(RecordId, DateTime<Utc>), ProtocolViolation> {
        match self {
            SessionState::Closed => Err(ProtocolViolation::NotOpen),
            SessionState::Open { record_id: None, .. } => Err(ProtocolViolation::MissingRecordId),
            SessionState::Open { closing: true, .. } => Err(ProtocolViolation::CloseInProgress),
            SessionState::Open {
                record_id: Some(id),
                started_at,
                closing,
            } => {
                *closing = true;
                Ok((id.clone(), *started_at))
            }
        }
    }

    /// Clear the closing mark after a failed update, keeping the session open.
    pub fn abort_close(&mut self, id: &RecordId) {
        if let SessionState::Open {
            record_id: Some(current),
            closing,
            ..
        } = self
        {
            if current == id {
                *closing = false;
            }
        }
    }

    /// Open -> Closed for the session holding `id`.
    ///
    /// Returns `false` if `id` is not the open session's record.
    pub fn close(&mut self, id: &RecordId) -> bool {
        if self.record_id() == Some(id) {
            *self = SessionState::Closed;
            true
        } else {
            false
        }
    }

    /// Open -> Closed for a session whose create failed.
    pub fn abandon(&mut self, started_at: DateTime<Utc>) -> bool {
        let pending = matches!(
            self,
            SessionState::Open { record_id: None, started_at: at, .. } if *at == started_at
        );
        if pending {
            *self = SessionState::Closed;
        }
        pending
    }
}
