use std::{collections::VecDeque, sync::Arc};

use shared::{
    domain::{OrderType, PatientId},
    protocol::{ClinicalNoteSummary, MasterItem},
};
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

use crate::{
    drafts::{DiagnosisCandidate, DraftCommand, NoteDraft, OrderCandidate},
    lookup::{LookupCategory, LookupSettings, MasterLookup, SearchView},
    submission::{SubmissionState, SubmitOutcome},
    ClinicalNotesApi, MasterDataApi,
};

const UNDO_DEPTH: usize = 50;

#[derive(Debug, Clone, PartialEq)]
pub enum ComposerEvent {
    NoteCreated(ClinicalNoteSummary),
    SubmitFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposerStatus {
    pub submitting: bool,
    pub can_submit: bool,
    pub error: Option<String>,
    pub success_notice: bool,
}

struct ComposerSession {
    draft: NoteDraft,
    undo: VecDeque<NoteDraft>,
    submission: SubmissionState,
    active_order_type: OrderType,
}

impl ComposerSession {
    fn commit(&mut self, next: NoteDraft) {
        if next == self.draft {
            return;
        }
        let previous = std::mem::replace(&mut self.draft, next);
        if self.undo.len() == UNDO_DEPTH {
            self.undo.pop_front();
        }
        self.undo.push_back(previous);
    }
}

/// Held across the note write. If the submit future is dropped before the
/// result is applied, the claimed slot is released on drop.
struct InFlightSubmit {
    session: Arc<Mutex<ComposerSession>>,
    attempt: u64,
    armed: bool,
}

impl InFlightSubmit {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for InFlightSubmit {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let attempt = self.attempt;
        if let Ok(mut session) = self.session.try_lock() {
            session.submission.abandon(attempt);
            warn!("composer: submit cancelled before it settled");
            return;
        }
        // Someone else holds the session; release once they are done.
        let session = Arc::clone(&self.session);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                session.lock().await.submission.abandon(attempt);
            });
        }
    }
}

/// One note-composition session for one patient.
pub struct NoteComposer {
    patient_id: PatientId,
    notes_api: Arc<dyn ClinicalNotesApi>,
    lookup: MasterLookup,
    session: Arc<Mutex<ComposerSession>>,
    events: broadcast::Sender<ComposerEvent>,
}

impl NoteComposer {
    /// Mounts a composer and starts the diagnosis and drug browse lists.
    pub async fn open(
        patient_id: PatientId,
        master_api: Arc<dyn MasterDataApi>,
        notes_api: Arc<dyn ClinicalNotesApi>,
        settings: LookupSettings,
    ) -> Self {
        let (events, _) = broadcast::channel(64);
        let composer = Self {
            patient_id,
            notes_api,
            lookup: MasterLookup::new(master_api, settings),
            session: Arc::new(Mutex::new(ComposerSession {
                draft: NoteDraft::default(),
                undo: VecDeque::new(),
                submission: SubmissionState::default(),
                active_order_type: OrderType::Drug,
            })),
            events,
        };
        composer
            .lookup
            .ensure_list_loaded(LookupCategory::Diagnosis)
            .await;
        composer
            .lookup
            .ensure_list_loaded(LookupCategory::Order(OrderType::Drug))
            .await;
        composer
    }

    pub fn patient_id(&self) -> PatientId {
        self.patient_id
    }

    pub fn lookup(&self) -> &MasterLookup {
        &self.lookup
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ComposerEvent> {
        self.events.subscribe()
    }

    pub async fn draft(&self) -> NoteDraft {
        self.session.lock().await.draft.clone()
    }

    pub async fn apply(&self, command: DraftCommand) -> NoteDraft {
        let mut session = self.session.lock().await;
        let next = session.draft.apply(command);
        session.commit(next);
        session.draft.clone()
    }

    pub async fn undo(&self) -> bool {
        let mut session = self.session.lock().await;
        match session.undo.pop_back() {
            Some(previous) => {
                session.draft = previous;
                true
            }
            None => false,
        }
    }

    pub async fn reset(&self) -> NoteDraft {
        self.apply(DraftCommand::ResetAll).await
    }

    pub async fn active_order_type(&self) -> OrderType {
        self.session.lock().await.active_order_type
    }

    pub async fn select_order_type(&self, order_type: OrderType) {
        self.session.lock().await.active_order_type = order_type;
        self.lookup
            .ensure_list_loaded(LookupCategory::Order(order_type))
            .await;
    }

    pub async fn search_diagnoses(&self, query: &str) {
        self.lookup.search(LookupCategory::Diagnosis, query).await;
    }

    pub async fn search_orders(&self, query: &str) {
        let order_type = self.active_order_type().await;
        self.lookup
            .search(LookupCategory::Order(order_type), query)
            .await;
    }

    pub async fn diagnosis_search(&self) -> SearchView {
        self.lookup.search_view(LookupCategory::Diagnosis).await
    }

    pub async fn order_search(&self) -> SearchView {
        let order_type = self.active_order_type().await;
        self.lookup
            .search_view(LookupCategory::Order(order_type))
            .await
    }

    /// A blank candidate is ignored and leaves the query as typed.
    pub async fn pick_diagnosis(&self, candidate: DiagnosisCandidate) -> NoteDraft {
        if candidate.name.trim().is_empty() {
            return self.draft().await;
        }
        let draft = self.apply(DraftCommand::AddDiagnosis(candidate)).await;
        self.lookup.search(LookupCategory::Diagnosis, "").await;
        draft
    }

    pub async fn quick_add_diagnosis(&self, item: &MasterItem) -> NoteDraft {
        if item.code.trim().is_empty() || item.name.trim().is_empty() {
            return self.draft().await;
        }
        self.apply(DraftCommand::AddDiagnosis(DiagnosisCandidate::from_master(
            item,
        )))
        .await
    }

    pub async fn pick_order(&self, candidate: OrderCandidate) -> NoteDraft {
        if candidate.name.trim().is_empty() {
            return self.draft().await;
        }
        let item_type = self.active_order_type().await;
        let draft = self
            .apply(DraftCommand::AddOrder {
                item_type,
                candidate,
            })
            .await;
        self.lookup
            .search(LookupCategory::Order(item_type), "")
            .await;
        draft
    }

    pub async fn quick_add_order(&self, item: &MasterItem) -> NoteDraft {
        let item_type = self.active_order_type().await;
        self.apply(DraftCommand::AddOrder {
            item_type,
            candidate: OrderCandidate::from_master(item),
        })
        .await
    }

    pub async fn can_submit(&self) -> bool {
        let session = self.session.lock().await;
        session.submission.can_submit(&session.draft)
    }

    pub async fn status(&self) -> ComposerStatus {
        let session = self.session.lock().await;
        ComposerStatus {
            submitting: session.submission.submitting(),
            can_submit: session.submission.can_submit(&session.draft),
            error: session.submission.error().map(str::to_string),
            success_notice: session.submission.success_notice(),
        }
    }

    pub async fn dismiss_success(&self) {
        self.session.lock().await.submission.dismiss_success();
    }

    /// Writes the current draft as one note. A call made while another submit
    /// is unresolved, or with an empty draft, is skipped without a request.
    pub async fn submit(&self) -> SubmitOutcome {
        let (request, attempt) = {
            let mut session = self.session.lock().await;
            let session = &mut *session;
            match session.submission.begin(&session.draft) {
                Ok(request) => (request, session.submission.attempt()),
                Err(reason) => return SubmitOutcome::Skipped(reason),
            }
        };
        let mut in_flight = InFlightSubmit {
            session: Arc::clone(&self.session),
            attempt,
            armed: true,
        };

        let result = self.notes_api.create_note(self.patient_id, &request).await;

        let outcome = {
            let mut session = self.session.lock().await;
            in_flight.disarm();
            let session = &mut *session;
            let outcome = session.submission.finish(&mut session.draft, result);
            if matches!(outcome, SubmitOutcome::Created { .. }) {
                session.undo.clear();
            }
            outcome
        };

        match &outcome {
            SubmitOutcome::Created { note } => {
                info!(
                    patient_id = self.patient_id.0,
                    note_id = ?note.as_ref().map(|note| note.id.0),
                    "composer: clinical note saved"
                );
                if let Some(note) = note {
                    let _ = self.events.send(ComposerEvent::NoteCreated(note.clone()));
                }
            }
            SubmitOutcome::Failed { message } => {
                warn!(patient_id = self.patient_id.0, "composer: submit failed: {message}");
                let _ = self.events.send(ComposerEvent::SubmitFailed(message.clone()));
            }
            SubmitOutcome::Skipped(_) => {}
        }

        outcome
    }

    pub async fn close(&self) {
        self.lookup.shutdown().await;
    }
}

#[cfg(test)]
#[path = "tests/composer_tests.rs"]
mod tests;
