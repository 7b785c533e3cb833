//! Tests for the wizard controller

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::*;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
struct Headcount {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
struct Details {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    city: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
struct Finish {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
enum Form {
    Headcount(Headcount),
    Details(Details),
    Finish(Finish),
}

impl StepPayload for Form {
    fn step_id(&self) -> StepId {
        match self {
            Form::Headcount(_) => 1,
            Form::Details(_) => 2,
            Form::Finish(_) => 3,
        }
    }
}

fn zero_headcount(data: &StepData<Form>) -> bool {
    matches!(
        data.get(&1),
        Some(Form::Headcount(Headcount { count: Some(0) }))
    )
}

fn definition() -> Arc<WizardDefinition<Form>> {
    Arc::new(
        WizardDefinition::new(
            "test",
            vec![
                WizardStep::new(1, "headcount", "Headcount"),
                WizardStep::new(2, "details", "Details").skip_when(zero_headcount),
                WizardStep::new(3, "finish", "Finish"),
            ],
        )
        .unwrap(),
    )
}

fn fields(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

fn count(n: u32) -> Form {
    Form::Headcount(Headcount { count: Some(n) })
}

#[test]
fn test_new_starts_on_first_step() {
    let wizard = WizardController::new(definition()).unwrap();
    assert_eq!(wizard.current_step_id(), 1);
    assert!(wizard.state().completed.is_empty());
    assert!(wizard.state().step_data.is_empty());
}

#[test]
fn test_definition_rejects_unordered_ids() {
    let result = WizardDefinition::<Form>::new(
        "bad",
        vec![
            WizardStep::new(2, "details", "Details"),
            WizardStep::new(1, "headcount", "Headcount"),
        ],
    );
    assert!(matches!(result, Err(WizardError::InvalidDefinition(_))));
}

#[test]
fn test_definition_rejects_duplicate_slugs() {
    let result = WizardDefinition::<Form>::new(
        "bad",
        vec![
            WizardStep::new(1, "details", "Details"),
            WizardStep::new(2, "details", "Details again"),
        ],
    );
    assert!(matches!(result, Err(WizardError::InvalidDefinition(_))));
}

#[test]
fn test_definition_rejects_empty_step_list() {
    let result = WizardDefinition::<Form>::new("empty", vec![]);
    assert!(matches!(result, Err(WizardError::InvalidDefinition(_))));
}

#[test]
fn test_zero_count_skips_details_step() {
    let mut wizard = WizardController::new(definition()).unwrap();
    wizard.update_step_data(count(0)).unwrap();

    let nav = wizard.go_next();
    assert_eq!(nav, Navigation::Moved { from: 1, to: 3 });
    assert_eq!(wizard.current_step_id(), 3);
    assert!(wizard.state().is_completed(1));
}

#[test]
fn test_nonzero_count_visits_details_step() {
    let mut wizard = WizardController::new(definition()).unwrap();
    wizard.update_step_data(count(4)).unwrap();

    wizard.go_next();
    assert_eq!(wizard.current_step_id(), 2);
}

#[test]
fn test_repeated_next_never_lands_on_skipped_step() {
    for headcount in [0, 1, 7] {
        let mut wizard = WizardController::new(definition()).unwrap();
        wizard.update_step_data(count(headcount)).unwrap();
        for _ in 0..5 {
            wizard.go_next();
            assert!(!wizard.is_skipped(wizard.current_step_id()));
        }
        assert_eq!(wizard.current_step_id(), 3);
    }
}

#[test]
fn test_later_edit_retroactively_skips_step() {
    let mut wizard = WizardController::new(definition()).unwrap();
    wizard.update_step_data(count(3)).unwrap();
    wizard.go_next();
    wizard.go_next();
    assert_eq!(wizard.current_step_id(), 3);

    // Back on step 1, set the count to zero: step 2 drops out of the flow
    wizard.go_to_step(1);
    wizard.update_step_data(count(0)).unwrap();
    assert!(wizard.is_skipped(2));
    assert_eq!(wizard.go_next(), Navigation::Moved { from: 1, to: 3 });
    assert_eq!(wizard.go_previous(), Navigation::Moved { from: 3, to: 1 });
}

#[test]
fn test_go_next_at_terminal_is_noop() {
    let mut wizard = WizardController::new(definition()).unwrap();
    wizard.go_to_step(3);
    let before = wizard.state().clone();

    assert_eq!(wizard.go_next(), Navigation::AtTerminal);
    assert_eq!(wizard.state(), &before);
    assert!(wizard.is_at_terminal());
}

#[test]
fn test_go_previous_at_first_step_is_noop() {
    let mut wizard = WizardController::new(definition()).unwrap();
    assert_eq!(wizard.go_previous(), Navigation::Unchanged);
    assert_eq!(wizard.current_step_id(), 1);
}

#[test]
fn test_go_to_step_ignores_completion() {
    let mut wizard = WizardController::new(definition()).unwrap();
    for id in [3, 1, 2, 3] {
        wizard.go_to_step(id);
        assert_eq!(wizard.current_step_id(), id);
    }
    assert!(wizard.state().completed.is_empty());
}

#[test]
fn test_go_to_invalid_or_skipped_step_is_noop() {
    let mut wizard = WizardController::new(definition()).unwrap();
    wizard.update_step_data(count(0)).unwrap();
    let before = wizard.state().clone();

    assert_eq!(wizard.go_to_step(42), Navigation::Unchanged);
    assert_eq!(wizard.go_to_step(0), Navigation::Unchanged);
    assert_eq!(wizard.go_to_step(2), Navigation::Unchanged);
    assert_eq!(wizard.state(), &before);
}

#[test]
fn test_empty_patch_leaves_data_unchanged() {
    let mut wizard = WizardController::new(definition()).unwrap();
    wizard.update_step_data(Form::Headcount(Headcount::default())).unwrap();
    assert!(wizard.state().step_data.is_empty());

    wizard.update_step_data(count(2)).unwrap();
    let before = wizard.state().step_data.clone();
    wizard.update_step_data(Form::Headcount(Headcount::default())).unwrap();
    assert_eq!(wizard.state().step_data, before);
}

#[test]
fn test_update_merges_shallowly() {
    let mut wizard = WizardController::new(definition()).unwrap();
    wizard.update_step_data(count(2)).unwrap();
    wizard.go_next();

    wizard
        .update_step_data(Form::Details(Details {
            name: Some("Acme Trading".to_string()),
            city: None,
        }))
        .unwrap();
    wizard
        .update_step_data(Form::Details(Details {
            name: None,
            city: Some("Dubai".to_string()),
        }))
        .unwrap();

    assert_eq!(
        wizard.state().record(2),
        Some(&Form::Details(Details {
            name: Some("Acme Trading".to_string()),
            city: Some("Dubai".to_string()),
        }))
    );
}

#[test]
fn test_blank_value_overwrites_existing_field() {
    let mut wizard = WizardController::new(definition()).unwrap();
    wizard.update_step_data(count(2)).unwrap();
    wizard.go_next();
    wizard
        .update_step_data(Form::Details(Details {
            name: Some("Acme Trading".to_string()),
            city: Some("Dubai".to_string()),
        }))
        .unwrap();

    wizard
        .update_step_data(Form::Details(Details {
            name: Some(String::new()),
            city: None,
        }))
        .unwrap();

    assert_eq!(
        wizard.state().record(2),
        Some(&Form::Details(Details {
            name: Some(String::new()),
            city: Some("Dubai".to_string()),
        }))
    );
}

#[test]
fn test_null_field_clears_value() {
    let mut wizard = WizardController::new(definition()).unwrap();
    wizard.update_step_data(count(2)).unwrap();
    wizard.go_next();
    wizard
        .update_step_fields(fields(json!({"name": "Acme Trading", "city": "Dubai"})))
        .unwrap();

    wizard
        .update_step_fields(fields(json!({"city": null})))
        .unwrap();

    assert_eq!(
        wizard.state().record(2),
        Some(&Form::Details(Details {
            name: Some("Acme Trading".to_string()),
            city: None,
        }))
    );
}

#[test]
fn test_cleared_field_unblocks_skip_rule() {
    let mut wizard = WizardController::new(definition()).unwrap();
    wizard.update_step_fields(fields(json!({"count": 0}))).unwrap();
    assert!(wizard.is_skipped(2));

    wizard.update_step_fields(fields(json!({"count": null}))).unwrap();
    assert!(!wizard.is_skipped(2));
    assert_eq!(wizard.state().record(1), Some(&Form::Headcount(Headcount::default())));
}

#[test]
fn test_field_patch_without_keys_is_noop() {
    let mut wizard = WizardController::new(definition()).unwrap();
    wizard.update_step_fields(Map::new()).unwrap();
    assert!(wizard.state().step_data.is_empty());
}

#[test]
fn test_rejected_field_patch_leaves_record() {
    let mut wizard = WizardController::new(definition()).unwrap();
    wizard.update_step_data(count(3)).unwrap();

    let err = wizard
        .update_step_fields(fields(json!({"count": "three"})))
        .unwrap_err();
    assert!(matches!(err, WizardError::Payload(_)));
    assert_eq!(wizard.state().record(1), Some(&count(3)));
}

#[test]
fn test_update_for_other_step_is_rejected() {
    let mut wizard = WizardController::new(definition()).unwrap();
    let err = wizard
        .update_step_data(Form::Finish(Finish {
            note: Some("x".to_string()),
        }))
        .unwrap_err();
    assert!(matches!(
        err,
        WizardError::StepMismatch {
            expected: 1,
            actual: 3
        }
    ));
    assert!(wizard.state().step_data.is_empty());
}

#[test]
fn test_required_fields_block_next() {
    let definition = Arc::new(
        WizardDefinition::new(
            "required",
            vec![
                WizardStep::new(1, "headcount", "Headcount").require(&["count"]),
                WizardStep::new(2, "details", "Details"),
            ],
        )
        .unwrap(),
    );
    let mut wizard = WizardController::new(definition).unwrap();

    match wizard.go_next() {
        Navigation::Blocked { errors } => {
            assert_eq!(errors, vec![FieldError::required("count")]);
        }
        other => panic!("expected blocked navigation, got {other:?}"),
    }
    assert_eq!(wizard.current_step_id(), 1);
    assert!(wizard.state().completed.is_empty());

    wizard.update_step_data(count(1)).unwrap();
    assert!(wizard.go_next().moved());
}

#[test]
fn test_resume_recovers_from_skipped_current_step() {
    let mut state = WizardState::at(2);
    state.step_data.insert(1, count(0));
    let wizard = WizardController::resume(definition(), state).unwrap();
    assert_eq!(wizard.current_step_id(), 1);
}

#[test]
fn test_progress_counts_visible_steps_only() {
    let mut wizard = WizardController::new(definition()).unwrap();
    wizard.update_step_data(count(0)).unwrap();
    wizard.go_next();

    let progress = wizard.progress();
    assert_eq!(progress.visible, 2);
    assert_eq!(progress.completed, 1);
    assert_eq!(progress.percent, 50);
}

#[test]
fn test_payload_from_fields_adds_tag() {
    let payload: Form =
        payload_from_fields("details", json!({"name": "Acme", "city": null}))
            .unwrap();
    assert_eq!(
        payload,
        Form::Details(Details {
            name: Some("Acme".to_string()),
            city: None,
        })
    );
}

#[test]
fn test_blank_record_detection() {
    assert!(Form::Details(Details::default()).is_blank());
    assert!(Form::Details(Details {
        name: Some("  ".to_string()),
        city: None
    })
    .is_blank());
    assert!(!count(0).is_blank());
}
