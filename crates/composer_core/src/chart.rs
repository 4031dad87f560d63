use anyhow::Result;
use shared::{
    domain::PatientId,
    protocol::{ClinicalNoteSummary, PatientDetailResponse},
};

use crate::PatientRegistryApi;

/// Number of recent notes a chart keeps on display.
pub const CHART_NOTE_LIMIT: usize = 5;

/// Host-page view of one patient: demographics plus the recent note history.
#[derive(Debug, Clone, PartialEq)]
pub struct PatientChart {
    detail: PatientDetailResponse,
}

impl PatientChart {
    pub async fn load(registry: &dyn PatientRegistryApi, patient_id: PatientId) -> Result<Self> {
        Ok(Self::new(registry.patient_detail(patient_id).await?))
    }

    pub fn new(detail: PatientDetailResponse) -> Self {
        Self { detail }
    }

    pub fn detail(&self) -> &PatientDetailResponse {
        &self.detail
    }

    pub fn notes(&self) -> &[ClinicalNoteSummary] {
        &self.detail.notes
    }

    /// Prepends a freshly created canonical note. A note already on display
    /// is left where it is.
    pub fn record_created_note(&mut self, note: ClinicalNoteSummary) -> bool {
        if self.detail.notes.iter().any(|existing| existing.id == note.id) {
            return false;
        }
        self.detail.notes.insert(0, note);
        self.detail.notes.truncate(CHART_NOTE_LIMIT);
        true
    }
}
