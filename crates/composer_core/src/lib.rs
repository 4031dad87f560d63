use anyhow::Result;
use async_trait::async_trait;
use shared::{
    domain::{MasterCategory, PatientId},
    protocol::{
        MasterItem, NoteCreateRequest, NoteCreateResponse, PatientCreateRequest,
        PatientDetailResponse, PatientSummary,
    },
};

pub mod chart;
pub mod composer;
pub mod config;
pub mod csrf;
pub mod drafts;
pub mod lookup;
pub mod submission;
pub mod transport;

pub use chart::PatientChart;
pub use composer::{ComposerEvent, ComposerStatus, NoteComposer};
pub use config::{load_settings, Settings};
pub use drafts::{
    DiagnosisCandidate, DiagnosisDraft, DraftCommand, NoteDraft, OrderCandidate, OrderDraft,
    OrderDraftId, OrderField,
};
pub use lookup::{
    ListState, LookupCategory, LookupEvent, LookupSettings, MasterLookup, SearchPhase,
    SearchView,
};
pub use submission::{SkipReason, SubmitError, SubmitOutcome};
pub use transport::HttpEmrClient;

/// Parameters for one `GET /api/master/items/` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterItemQuery {
    pub category: MasterCategory,
    pub page_size: u32,
    pub search: Option<String>,
}

#[async_trait]
pub trait MasterDataApi: Send + Sync {
    async fn master_items(&self, query: MasterItemQuery) -> Result<Vec<MasterItem>>;
}

#[async_trait]
pub trait ClinicalNotesApi: Send + Sync {
    /// Implementations map a non-2xx status and an `ok: false` body to
    /// [`SubmitError`]; callers still re-check `ok` on the returned body.
    async fn create_note(
        &self,
        patient_id: PatientId,
        request: &NoteCreateRequest,
    ) -> std::result::Result<NoteCreateResponse, SubmitError>;
}

#[async_trait]
pub trait PatientRegistryApi: Send + Sync {
    async fn list_patients(&self) -> Result<Vec<PatientSummary>>;
    async fn create_patient(&self, request: &PatientCreateRequest) -> Result<PatientSummary>;
    async fn patient_detail(&self, patient_id: PatientId) -> Result<PatientDetailResponse>;

    async fn find_patient(&self, patient_id: PatientId) -> Result<Option<PatientSummary>> {
        Ok(self
            .list_patients()
            .await?
            .into_iter()
            .find(|patient| patient.id == patient_id))
    }
}

#[cfg(test)]
#[path = "tests/fakes.rs"]
pub(crate) mod fakes;
