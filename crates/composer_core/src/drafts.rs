//! Draft aggregation for one composition session.
//!
//! A [`NoteDraft`] is a plain value. Every [`DraftCommand`] applied to it
//! yields a new snapshot and leaves the original untouched, so a holder can
//! keep earlier snapshots around for undo or comparison.

use std::fmt;

use chrono::{DateTime, Utc};
use shared::{
    domain::{DiagnosisSource, OrderType},
    protocol::{DiagnosisPayload, MasterItem, NoteCreateRequest, PrescriptionPayload},
};
use uuid::Uuid;

/// Upper bound on the surrogate code derived from a free-text diagnosis.
pub const MANUAL_CODE_MAX_CHARS: usize = 32;
pub const DEFAULT_ORDER_QTY: &str = "1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosisDraft {
    pub code: String,
    pub name: String,
    pub source: DiagnosisSource,
}

/// A diagnosis as offered by the user: a master row, a browse-list row or
/// free text. A missing or blank code marks it as manual.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosisCandidate {
    pub code: Option<String>,
    pub name: String,
}

impl DiagnosisCandidate {
    pub fn from_master(item: &MasterItem) -> Self {
        Self {
            code: Some(item.code.clone()),
            name: item.name.clone(),
        }
    }

    pub fn free_text(text: impl Into<String>) -> Self {
        Self {
            code: None,
            name: text.into(),
        }
    }

    fn normalize(&self) -> Option<DiagnosisDraft> {
        let name = self.name.trim();
        if name.is_empty() {
            return None;
        }

        match self.code.as_deref().map(str::trim).filter(|code| !code.is_empty()) {
            Some(code) => Some(DiagnosisDraft {
                code: code.to_string(),
                name: name.to_string(),
                source: DiagnosisSource::Master,
            }),
            None => Some(DiagnosisDraft {
                code: name.chars().take(MANUAL_CODE_MAX_CHARS).collect(),
                name: name.to_string(),
                source: DiagnosisSource::Manual,
            }),
        }
    }
}

/// Opaque per-draft key used for list rendering, editing and removal only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OrderDraftId(Uuid);

impl OrderDraftId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for OrderDraftId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDraft {
    pub id: OrderDraftId,
    pub item_type: OrderType,
    pub code: String,
    pub name: String,
    pub qty: String,
    pub unit: String,
    pub dose: String,
    pub freq: String,
    pub route: String,
    pub days: String,
    pub notes: String,
}

impl OrderDraft {
    fn same_item(&self, item_type: OrderType, code: &str, name: &str) -> bool {
        self.item_type == item_type && self.code == code && self.name == name
    }

    fn field_mut(&mut self, field: OrderField) -> &mut String {
        match field {
            OrderField::Qty => &mut self.qty,
            OrderField::Unit => &mut self.unit,
            OrderField::Dose => &mut self.dose,
            OrderField::Freq => &mut self.freq,
            OrderField::Route => &mut self.route,
            OrderField::Days => &mut self.days,
            OrderField::Notes => &mut self.notes,
        }
    }

    fn to_payload(&self) -> PrescriptionPayload {
        PrescriptionPayload {
            item_type: self.item_type,
            code: self.code.clone(),
            name: self.name.clone(),
            qty: self.qty.clone(),
            unit: self.unit.clone(),
            dose: self.dose.clone(),
            freq: self.freq.clone(),
            route: self.route.clone(),
            days: self.days.clone(),
            notes: self.notes.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderCandidate {
    pub code: Option<String>,
    pub name: String,
    pub unit: Option<String>,
}

impl OrderCandidate {
    pub fn from_master(item: &MasterItem) -> Self {
        Self {
            code: Some(item.code.clone()),
            name: item.name.clone(),
            unit: item.unit.clone(),
        }
    }

    pub fn free_text(text: impl Into<String>) -> Self {
        Self {
            code: None,
            name: text.into(),
            unit: None,
        }
    }
}

/// Editable order fields. The identity fields (`item_type`, `code`, `name`)
/// are fixed once a draft exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderField {
    Qty,
    Unit,
    Dose,
    Freq,
    Route,
    Days,
    Notes,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DraftCommand {
    SetNarrative(String),
    SetSocialHistory(String),
    SetFamilyHistory(String),
    SetVisitDate(Option<DateTime<Utc>>),
    AddDiagnosis(DiagnosisCandidate),
    RemoveDiagnosis {
        code: String,
        name: String,
    },
    AddOrder {
        item_type: OrderType,
        candidate: OrderCandidate,
    },
    UpdateOrderField {
        id: OrderDraftId,
        field: OrderField,
        value: String,
    },
    RemoveOrder(OrderDraftId),
    ResetAll,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoteDraft {
    narrative: String,
    social_history: String,
    family_history: String,
    visit_date: Option<DateTime<Utc>>,
    diagnoses: Vec<DiagnosisDraft>,
    orders: Vec<OrderDraft>,
}

impl NoteDraft {
    pub fn narrative(&self) -> &str {
        &self.narrative
    }

    pub fn social_history(&self) -> &str {
        &self.social_history
    }

    pub fn family_history(&self) -> &str {
        &self.family_history
    }

    pub fn visit_date(&self) -> Option<DateTime<Utc>> {
        self.visit_date
    }

    pub fn diagnoses(&self) -> &[DiagnosisDraft] {
        &self.diagnoses
    }

    pub fn orders(&self) -> &[OrderDraft] {
        &self.orders
    }

    pub fn order(&self, id: OrderDraftId) -> Option<&OrderDraft> {
        self.orders.iter().find(|order| order.id == id)
    }

    /// True when there is nothing worth writing: all text fields blank and no
    /// diagnoses or orders.
    pub fn is_empty(&self) -> bool {
        self.narrative.trim().is_empty()
            && self.social_history.trim().is_empty()
            && self.family_history.trim().is_empty()
            && self.diagnoses.is_empty()
            && self.orders.is_empty()
    }

    pub fn apply(&self, command: DraftCommand) -> NoteDraft {
        let mut next = self.clone();
        next.apply_in_place(command);
        next
    }

    fn apply_in_place(&mut self, command: DraftCommand) {
        match command {
            DraftCommand::SetNarrative(text) => self.narrative = text,
            DraftCommand::SetSocialHistory(text) => self.social_history = text,
            DraftCommand::SetFamilyHistory(text) => self.family_history = text,
            DraftCommand::SetVisitDate(visit_date) => self.visit_date = visit_date,
            DraftCommand::AddDiagnosis(candidate) => self.add_diagnosis(&candidate),
            DraftCommand::RemoveDiagnosis { code, name } => self
                .diagnoses
                .retain(|diag| !(diag.code == code && diag.name == name)),
            DraftCommand::AddOrder {
                item_type,
                candidate,
            } => self.add_order(item_type, &candidate),
            DraftCommand::UpdateOrderField { id, field, value } => {
                if let Some(order) = self.orders.iter_mut().find(|order| order.id == id) {
                    *order.field_mut(field) = value;
                }
            }
            DraftCommand::RemoveOrder(id) => self.orders.retain(|order| order.id != id),
            DraftCommand::ResetAll => *self = NoteDraft::default(),
        }
    }

    fn add_diagnosis(&mut self, candidate: &DiagnosisCandidate) {
        let Some(draft) = candidate.normalize() else {
            return;
        };
        if self
            .diagnoses
            .iter()
            .any(|diag| diag.code == draft.code && diag.name == draft.name)
        {
            return;
        }
        self.diagnoses.push(draft);
    }

    fn add_order(&mut self, item_type: OrderType, candidate: &OrderCandidate) {
        let name = candidate.name.trim();
        if name.is_empty() {
            return;
        }
        let code = candidate.code.as_deref().unwrap_or_default().trim();
        if self
            .orders
            .iter()
            .any(|order| order.same_item(item_type, code, name))
        {
            return;
        }

        self.orders.push(OrderDraft {
            id: OrderDraftId::generate(),
            item_type,
            code: code.to_string(),
            name: name.to_string(),
            qty: DEFAULT_ORDER_QTY.to_string(),
            unit: candidate
                .unit
                .as_deref()
                .unwrap_or_default()
                .trim()
                .to_string(),
            dose: String::new(),
            freq: String::new(),
            route: String::new(),
            days: String::new(),
            notes: String::new(),
        });
    }

    pub fn to_request(&self) -> NoteCreateRequest {
        NoteCreateRequest {
            narrative: self.narrative.clone(),
            social_history: self.social_history.clone(),
            family_history: self.family_history.clone(),
            visit_date: self.visit_date,
            diagnoses: self
                .diagnoses
                .iter()
                .map(|diag| DiagnosisPayload {
                    code: diag.code.clone(),
                    name: diag.name.clone(),
                    source: diag.source,
                })
                .collect(),
            prescriptions: self.orders.iter().map(OrderDraft::to_payload).collect(),
        }
    }
}

#[cfg(test)]
#[path = "tests/drafts_tests.rs"]
mod tests;
