use std::collections::HashSet;

use chrono::TimeZone;
use shared::domain::MasterCategory;

use super::*;
use crate::fakes::item;

fn add_dx(draft: &NoteDraft, candidate: DiagnosisCandidate) -> NoteDraft {
    draft.apply(DraftCommand::AddDiagnosis(candidate))
}

fn add_order(draft: &NoteDraft, item_type: OrderType, candidate: OrderCandidate) -> NoteDraft {
    draft.apply(DraftCommand::AddOrder {
        item_type,
        candidate,
    })
}

#[test]
fn diagnosis_dedup_holds_across_entry_paths() {
    let cholera = item(1, MasterCategory::Diagnosis, "A00", "Cholera");
    let mut draft = NoteDraft::default();

    draft = add_dx(&draft, DiagnosisCandidate::from_master(&cholera));
    draft = add_dx(&draft, DiagnosisCandidate::from_master(&cholera));
    draft = add_dx(
        &draft,
        DiagnosisCandidate {
            code: Some(" A00 ".into()),
            name: "Cholera  ".into(),
        },
    );
    draft = add_dx(&draft, DiagnosisCandidate::free_text("Cholera"));
    draft = add_dx(&draft, DiagnosisCandidate::free_text("  Cholera "));

    // The free-text entry gets surrogate code "Cholera", so it is distinct
    // from the master row but never duplicated itself.
    assert_eq!(draft.diagnoses().len(), 2);
    let keys: HashSet<(&str, &str)> = draft
        .diagnoses()
        .iter()
        .map(|diag| (diag.code.as_str(), diag.name.as_str()))
        .collect();
    assert_eq!(keys.len(), draft.diagnoses().len());
    assert_eq!(draft.diagnoses()[0].source, DiagnosisSource::Master);
    assert_eq!(draft.diagnoses()[1].source, DiagnosisSource::Manual);
}

#[test]
fn free_text_diagnosis_gets_truncated_surrogate_code() {
    let long = "Chronic obstructive pulmonary disease with acute exacerbation";
    let draft = add_dx(&NoteDraft::default(), DiagnosisCandidate::free_text(long));

    let diag = &draft.diagnoses()[0];
    assert_eq!(diag.source, DiagnosisSource::Manual);
    assert_eq!(diag.name, long);
    assert_eq!(diag.code.chars().count(), MANUAL_CODE_MAX_CHARS);
    assert!(long.starts_with(&diag.code));
}

#[test]
fn surrogate_code_truncates_on_char_boundaries() {
    let text = "급성 비인두염 및 상세불명의 급성 상기도 감염증에 대한 추가 관찰";
    let draft = add_dx(&NoteDraft::default(), DiagnosisCandidate::free_text(text));
    assert_eq!(draft.diagnoses()[0].code.chars().count(), MANUAL_CODE_MAX_CHARS);
}

#[test]
fn blank_diagnosis_and_blank_order_names_are_rejected() {
    let draft = NoteDraft::default();
    let draft = add_dx(&draft, DiagnosisCandidate::free_text("   "));
    let draft = add_order(&draft, OrderType::Drug, OrderCandidate::free_text("\t"));
    assert!(draft.diagnoses().is_empty());
    assert!(draft.orders().is_empty());
    assert!(draft.is_empty());
}

#[test]
fn remove_diagnosis_targets_code_and_name_pair() {
    let mut draft = NoteDraft::default();
    draft = add_dx(&draft, DiagnosisCandidate::free_text("Fever"));
    draft = add_dx(
        &draft,
        DiagnosisCandidate::from_master(&item(1, MasterCategory::Diagnosis, "R50", "Fever")),
    );

    let removed = draft.apply(DraftCommand::RemoveDiagnosis {
        code: "R50".into(),
        name: "Fever".into(),
    });
    assert_eq!(removed.diagnoses().len(), 1);
    assert_eq!(removed.diagnoses()[0].source, DiagnosisSource::Manual);

    let unchanged = removed.apply(DraftCommand::RemoveDiagnosis {
        code: "XXX".into(),
        name: "Fever".into(),
    });
    assert_eq!(unchanged, removed);
}

#[test]
fn order_dedup_uses_type_code_and_name_and_defaults_qty() {
    let acetaminophen = {
        let mut row = item(10, MasterCategory::Drug, "D001", "Acetaminophen");
        row.unit = Some(" tab ".into());
        row
    };
    let mut draft = NoteDraft::default();

    draft = add_order(&draft, OrderType::Drug, OrderCandidate::from_master(&acetaminophen));
    draft = add_order(&draft, OrderType::Drug, OrderCandidate::from_master(&acetaminophen));
    // Same code and name under a different tab is a different order.
    draft = add_order(&draft, OrderType::Test, OrderCandidate::from_master(&acetaminophen));
    draft = add_order(&draft, OrderType::Drug, OrderCandidate::free_text("Acetaminophen"));
    draft = add_order(&draft, OrderType::Drug, OrderCandidate::free_text(" Acetaminophen"));

    assert_eq!(draft.orders().len(), 3);
    let keys: HashSet<(OrderType, &str, &str)> = draft
        .orders()
        .iter()
        .map(|order| (order.item_type, order.code.as_str(), order.name.as_str()))
        .collect();
    assert_eq!(keys.len(), 3);

    for order in draft.orders() {
        assert_eq!(order.qty, DEFAULT_ORDER_QTY);
        assert_eq!(order.dose, "");
        assert_eq!(order.freq, "");
        assert_eq!(order.route, "");
        assert_eq!(order.days, "");
        assert_eq!(order.notes, "");
    }
    assert_eq!(draft.orders()[0].unit, "tab");
    assert_eq!(draft.orders()[2].code, "");
}

#[test]
fn order_ids_are_unique() {
    let mut draft = NoteDraft::default();
    for name in ["CBC", "LFT", "Chest X-ray"] {
        draft = add_order(&draft, OrderType::Test, OrderCandidate::free_text(name));
    }
    let ids: HashSet<OrderDraftId> = draft.orders().iter().map(|order| order.id).collect();
    assert_eq!(ids.len(), 3);
}

#[test]
fn update_order_field_touches_only_one_field_of_one_draft() {
    let mut draft = NoteDraft::default();
    draft = add_order(&draft, OrderType::Drug, OrderCandidate::free_text("Amoxicillin"));
    draft = add_order(&draft, OrderType::Drug, OrderCandidate::free_text("Ibuprofen"));
    let target = draft.orders()[0].id;

    let updated = draft.apply(DraftCommand::UpdateOrderField {
        id: target,
        field: OrderField::Dose,
        value: "500mg".into(),
    });

    let mut expected = draft.orders()[0].clone();
    expected.dose = "500mg".into();
    assert_eq!(updated.order(target), Some(&expected));
    assert_eq!(updated.orders()[1], draft.orders()[1]);
    assert_eq!(updated.narrative(), draft.narrative());
}

#[test]
fn editing_fields_never_merges_or_drops_drafts() {
    let mut draft = NoteDraft::default();
    draft = add_order(&draft, OrderType::Drug, OrderCandidate::free_text("Amoxicillin"));
    draft = add_order(&draft, OrderType::Drug, OrderCandidate::free_text("Ibuprofen"));
    let first = draft.orders()[0].id;
    let second = draft.orders()[1].id;

    for (id, field) in [(first, OrderField::Qty), (second, OrderField::Qty)] {
        draft = draft.apply(DraftCommand::UpdateOrderField {
            id,
            field,
            value: "3".into(),
        });
    }
    assert_eq!(draft.orders().len(), 2);
    assert!(draft.orders().iter().all(|order| order.qty == "3"));
}

#[test]
fn update_and_remove_with_unknown_id_are_noops() {
    let draft = add_order(
        &NoteDraft::default(),
        OrderType::Proc,
        OrderCandidate::free_text("Suture"),
    );
    let stranger = add_order(
        &NoteDraft::default(),
        OrderType::Proc,
        OrderCandidate::free_text("Suture"),
    )
    .orders()[0]
        .id;

    let after_update = draft.apply(DraftCommand::UpdateOrderField {
        id: stranger,
        field: OrderField::Notes,
        value: "left hand".into(),
    });
    let after_remove = draft.apply(DraftCommand::RemoveOrder(stranger));
    assert_eq!(after_update, draft);
    assert_eq!(after_remove, draft);

    let removed = draft.apply(DraftCommand::RemoveOrder(draft.orders()[0].id));
    assert!(removed.orders().is_empty());
}

#[test]
fn apply_returns_new_snapshot_and_keeps_original() {
    let original = NoteDraft::default().apply(DraftCommand::SetNarrative("S: cough".into()));
    let next = original.apply(DraftCommand::SetNarrative("S: cough, fever".into()));
    assert_eq!(original.narrative(), "S: cough");
    assert_eq!(next.narrative(), "S: cough, fever");
}

#[test]
fn reset_all_clears_every_collection_and_text_field() {
    let visit = Utc.with_ymd_and_hms(2024, 3, 2, 0, 30, 0).single().expect("date");
    let draft = NoteDraft::default()
        .apply(DraftCommand::SetNarrative("note".into()))
        .apply(DraftCommand::SetSocialHistory("smoker".into()))
        .apply(DraftCommand::SetFamilyHistory("DM in father".into()))
        .apply(DraftCommand::SetVisitDate(Some(visit)))
        .apply(DraftCommand::AddDiagnosis(DiagnosisCandidate::free_text("cough")))
        .apply(DraftCommand::AddOrder {
            item_type: OrderType::Drug,
            candidate: OrderCandidate::free_text("Codeine"),
        });
    assert!(!draft.is_empty());

    let reset = draft.apply(DraftCommand::ResetAll);
    assert_eq!(reset, NoteDraft::default());
    assert_eq!(reset.visit_date(), None);
}

#[test]
fn whitespace_only_text_counts_as_empty() {
    let draft = NoteDraft::default()
        .apply(DraftCommand::SetNarrative("  \n".into()))
        .apply(DraftCommand::SetFamilyHistory(" ".into()));
    assert!(draft.is_empty());
}

#[test]
fn request_mirrors_snapshot_in_insertion_order() {
    let visit = Utc.with_ymd_and_hms(2024, 3, 2, 0, 30, 0).single().expect("date");
    let draft = NoteDraft::default()
        .apply(DraftCommand::SetNarrative("A/P: viral URI".into()))
        .apply(DraftCommand::SetVisitDate(Some(visit)))
        .apply(DraftCommand::AddDiagnosis(DiagnosisCandidate::free_text("URI")))
        .apply(DraftCommand::AddDiagnosis(DiagnosisCandidate::from_master(&item(
            1,
            MasterCategory::Diagnosis,
            "J00",
            "Acute nasopharyngitis",
        ))))
        .apply(DraftCommand::AddOrder {
            item_type: OrderType::Test,
            candidate: OrderCandidate::free_text("CBC"),
        });

    let request = draft.to_request();
    assert_eq!(request.narrative, "A/P: viral URI");
    assert_eq!(request.visit_date, Some(visit));
    assert_eq!(request.diagnoses[0].source, DiagnosisSource::Manual);
    assert_eq!(request.diagnoses[1].code, "J00");
    assert_eq!(request.prescriptions[0].item_type, OrderType::Test);
    assert_eq!(request.prescriptions[0].qty, "1");
}
