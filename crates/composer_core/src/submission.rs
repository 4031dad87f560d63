use shared::protocol::{ClinicalNoteSummary, NoteCreateRequest, NoteCreateResponse};
use thiserror::Error;

use crate::drafts::NoteDraft;

pub const SUBMIT_FALLBACK_MESSAGE: &str = "failed to save the clinical note";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("note request failed: {0}")]
    Transport(String),
    #[error("note request returned status {status}")]
    Status { status: u16, reason: Option<String> },
    #[error("server rejected the note")]
    Rejected { reason: Option<String> },
}

impl SubmitError {
    /// The server's own reason when it sent one, otherwise a generic message.
    pub fn user_message(&self) -> String {
        let reason = match self {
            Self::Transport(_) => None,
            Self::Status { reason, .. } | Self::Rejected { reason } => reason.as_deref(),
        };
        reason
            .map(str::trim)
            .filter(|reason| !reason.is_empty())
            .unwrap_or(SUBMIT_FALLBACK_MESSAGE)
            .to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    InFlight,
    EmptyNote,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Created { note: Option<ClinicalNoteSummary> },
    Failed { message: String },
    Skipped(SkipReason),
}

/// In-flight and notification state of the submit action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionState {
    submitting: bool,
    attempt: u64,
    error: Option<String>,
    success_notice: bool,
}

impl SubmissionState {
    pub fn submitting(&self) -> bool {
        self.submitting
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn success_notice(&self) -> bool {
        self.success_notice
    }

    /// Counter of claimed submits; identifies the one currently in flight.
    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    pub fn dismiss_success(&mut self) {
        self.success_notice = false;
    }

    pub fn can_submit(&self, draft: &NoteDraft) -> bool {
        !self.submitting && !draft.is_empty()
    }

    /// Claims the single submit slot and snapshots the payload.
    pub fn begin(&mut self, draft: &NoteDraft) -> Result<NoteCreateRequest, SkipReason> {
        if self.submitting {
            return Err(SkipReason::InFlight);
        }
        if draft.is_empty() {
            return Err(SkipReason::EmptyNote);
        }
        self.submitting = true;
        self.attempt += 1;
        self.error = None;
        Ok(draft.to_request())
    }

    /// Releases the slot of a submit that was dropped before it settled. The
    /// draft is untouched and no message is recorded.
    pub fn abandon(&mut self, attempt: u64) -> bool {
        if !self.submitting || self.attempt != attempt {
            return false;
        }
        self.submitting = false;
        true
    }

    /// Settles the submit. On success `draft` is replaced by an empty draft
    /// in one assignment; on failure it is left exactly as it was.
    pub fn finish(
        &mut self,
        draft: &mut NoteDraft,
        result: Result<NoteCreateResponse, SubmitError>,
    ) -> SubmitOutcome {
        self.submitting = false;

        let result = result.and_then(|response| {
            if response.ok == Some(false) {
                Err(SubmitError::Rejected {
                    reason: response.error,
                })
            } else {
                Ok(response)
            }
        });

        match result {
            Ok(response) => {
                *draft = NoteDraft::default();
                self.success_notice = true;
                SubmitOutcome::Created {
                    note: response.note,
                }
            }
            Err(err) => {
                let message = err.user_message();
                self.error = Some(message.clone());
                SubmitOutcome::Failed { message }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use shared::protocol::NoteCreateResponse;

    use super::*;
    use crate::drafts::{DiagnosisCandidate, DraftCommand};

    fn non_empty_draft() -> NoteDraft {
        NoteDraft::default().apply(DraftCommand::AddDiagnosis(DiagnosisCandidate::free_text(
            "headache",
        )))
    }

    #[test]
    fn user_message_prefers_server_reason() {
        let err = SubmitError::Status {
            status: 400,
            reason: Some("visit date is malformed".into()),
        };
        assert_eq!(err.user_message(), "visit date is malformed");
    }

    #[test]
    fn user_message_falls_back_for_transport_and_blank_reasons() {
        assert_eq!(
            SubmitError::Transport("connection refused".into()).user_message(),
            SUBMIT_FALLBACK_MESSAGE
        );
        assert_eq!(
            SubmitError::Rejected {
                reason: Some("  ".into())
            }
            .user_message(),
            SUBMIT_FALLBACK_MESSAGE
        );
    }

    #[test]
    fn begin_refuses_second_claim_and_empty_draft() {
        let mut state = SubmissionState::default();
        assert_eq!(
            state.begin(&NoteDraft::default()),
            Err(SkipReason::EmptyNote)
        );

        let draft = non_empty_draft();
        assert!(state.begin(&draft).is_ok());
        assert!(!state.can_submit(&draft));
        assert_eq!(state.begin(&draft), Err(SkipReason::InFlight));
    }

    #[test]
    fn abandon_releases_only_the_matching_attempt() {
        let mut state = SubmissionState::default();
        let draft = non_empty_draft();

        state.begin(&draft).expect("first claim");
        let first = state.attempt();
        assert!(state.abandon(first));
        assert!(state.can_submit(&draft));
        assert_eq!(state.error(), None);

        state.begin(&draft).expect("second claim");
        assert!(!state.abandon(first));
        assert!(state.submitting());
        assert!(state.abandon(state.attempt()));
        assert!(!state.abandon(state.attempt()));
    }

    #[test]
    fn ok_false_on_success_status_is_a_failure() {
        let mut state = SubmissionState::default();
        let mut draft = non_empty_draft();
        let before = draft.clone();
        state.begin(&draft).expect("claim");

        let outcome = state.finish(
            &mut draft,
            Ok(NoteCreateResponse {
                ok: Some(false),
                note: None,
                error: Some("nothing to record".into()),
            }),
        );

        assert_eq!(
            outcome,
            SubmitOutcome::Failed {
                message: "nothing to record".into()
            }
        );
        assert_eq!(draft, before);
        assert_eq!(state.error(), Some("nothing to record"));
        assert!(!state.submitting());
    }

    #[test]
    fn begin_clears_previous_error() {
        let mut state = SubmissionState::default();
        let mut draft = non_empty_draft();
        state.begin(&draft).expect("claim");
        state.finish(&mut draft, Err(SubmitError::Transport("down".into())));
        assert!(state.error().is_some());

        state.begin(&draft).expect("retry");
        assert_eq!(state.error(), None);
    }
}
