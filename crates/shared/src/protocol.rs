use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{DiagnosisSource, Gender, MasterItemId, NoteId, OrderType, PatientId};

/// Read-only master-data row as served by `/api/master/items/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterItem {
    pub id: MasterItemId,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisPayload {
    pub code: String,
    pub name: String,
    pub source: DiagnosisSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionPayload {
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

/// Body of `POST /api/patients/{id}/notes/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteCreateRequest {
    pub narrative: String,
    pub social_history: String,
    pub family_history: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visit_date: Option<DateTime<Utc>>,
    pub diagnoses: Vec<DiagnosisPayload>,
    pub prescriptions: Vec<PrescriptionPayload>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoteCreateResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<ClinicalNoteSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisSummary {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionSummary {
    pub id: i64,
    pub item_type: OrderType,
    #[serde(default)]
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub qty: Option<f64>,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub dose: String,
    #[serde(default)]
    pub freq: String,
    #[serde(default)]
    pub route: String,
    #[serde(default)]
    pub days: i64,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicationSummary {
    pub id: i64,
    #[serde(default)]
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub dose: String,
    #[serde(default)]
    pub freq: String,
    #[serde(default)]
    pub route: String,
    #[serde(default)]
    pub duration_days: Option<i64>,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllergySummary {
    pub id: i64,
    pub substance: String,
    #[serde(default)]
    pub reaction: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VitalsSummary {
    pub systolic: Option<i64>,
    pub diastolic: Option<i64>,
    pub heart_rate: Option<i64>,
    pub resp_rate: Option<i64>,
    pub temperature_c: Option<f64>,
    pub spo2: Option<i64>,
    pub pain_score: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnthropometricsSummary {
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub bmi: Option<f64>,
    pub waist_cm: Option<f64>,
}

/// Canonical server representation of a stored clinical note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicalNoteSummary {
    pub id: NoteId,
    pub visit_date: DateTime<FixedOffset>,
    #[serde(default)]
    pub chief_complaint: String,
    #[serde(default)]
    pub subjective: String,
    #[serde(default)]
    pub objective: String,
    #[serde(default)]
    pub assessment: String,
    #[serde(default)]
    pub plan: String,
    #[serde(default)]
    pub primary_icd: String,
    #[serde(default)]
    pub narrative: String,
    #[serde(default)]
    pub social_history: String,
    #[serde(default)]
    pub family_history: String,
    #[serde(default)]
    pub medications: Vec<MedicationSummary>,
    #[serde(default)]
    pub diagnoses: Vec<DiagnosisSummary>,
    #[serde(default)]
    pub allergies: Vec<AllergySummary>,
    #[serde(default)]
    pub prescriptions: Vec<PrescriptionSummary>,
    #[serde(default)]
    pub vitals: Option<VitalsSummary>,
    #[serde(default)]
    pub anthropometrics: Option<AnthropometricsSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientSummary {
    pub id: PatientId,
    pub name: String,
    pub gender: Gender,
    pub birth_date: NaiveDate,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub rrn: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub reg_no: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientCreateRequest {
    pub name: String,
    pub gender: Gender,
    pub birth_date: NaiveDate,
    pub rrn: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalDocumentSummary {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub recorded_at: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub file_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabResultSummary {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub recorded_at: Option<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub file_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientDetailResponse {
    pub patient: PatientSummary,
    #[serde(default)]
    pub notes: Vec<ClinicalNoteSummary>,
    #[serde(default)]
    pub latest_vitals: Option<VitalsSummary>,
    #[serde(default)]
    pub latest_anthropometrics: Option<AnthropometricsSummary>,
    #[serde(default)]
    pub documents: Vec<ExternalDocumentSummary>,
    #[serde(default)]
    pub lab_results: Vec<LabResultSummary>,
}
