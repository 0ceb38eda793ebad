/*!
 * Tests for failure paths: triggers and pragmas must come back whatever happens
 */

use std::sync::Arc;

use modlingo::database::models::{TranslationUnitRecord, TranslationVersionRecord};
use modlingo::deletion::{DeletionOptions, DeletionService, TriggerDef, TriggerRegistry, TRIGGERS};
use modlingo::errors::StorageError;

use crate::common::{self, Scenario};

const FAULT_TRIGGER: &str = r#"
CREATE TRIGGER test_fault_mod_versions
BEFORE DELETE ON mod_versions
BEGIN
    SELECT RAISE(ABORT, 'injected fault');
END;
"#;

fn inject_fault(scenario: &Scenario) {
    scenario
        .db()
        .execute(|conn| {
            conn.execute_batch(FAULT_TRIGGER)?;
            Ok(())
        })
        .unwrap();
}

/// Drops cleanly but cannot be recreated: the table it fires on does not exist
const UNRESTORABLE: TriggerDef = TriggerDef {
    name: "test_unrestorable",
    table: "translation_units_archive",
    create_sql: "CREATE TRIGGER test_unrestorable AFTER INSERT ON translation_units_archive BEGIN SELECT 1; END",
};

/// Can be created but not dropped: the unquoted name is not valid SQL
const UNDROPPABLE: TriggerDef = TriggerDef {
    name: "test-undroppable",
    table: "languages",
    create_sql: r#"CREATE TRIGGER "test-undroppable" AFTER INSERT ON languages BEGIN SELECT 1; END"#,
};

/// Service whose registry restores `UNRESTORABLE` before the real triggers
fn service_failing_restore(scenario: &Scenario) -> DeletionService {
    let mut definitions = vec![UNRESTORABLE];
    definitions.extend_from_slice(TRIGGERS);
    DeletionService::with_registry(
        scenario.db().clone(),
        DeletionOptions::default(),
        Arc::new(TriggerRegistry::with_definitions(definitions)),
    )
}

fn clear_fault(scenario: &Scenario) {
    scenario
        .db()
        .execute(|conn| {
            conn.execute_batch("DROP TRIGGER test_fault_mod_versions;")?;
            Ok(())
        })
        .unwrap();
}

#[tokio::test]
async fn test_deleteProject_withFailingStep_shouldRestoreTriggersAndPragmas() {
    let scenario = common::seed_scenario().await.unwrap();
    inject_fault(&scenario);
    let synchronous = common::pragma(scenario.db(), "synchronous").unwrap();
    let service = DeletionService::new(scenario.db().clone());

    let error = service
        .delete_project(&scenario.alpha.project.id)
        .await
        .unwrap_err();

    match &error {
        StorageError::StoreFailure { operation, .. } => assert_eq!(operation, "delete mod_versions"),
        other => panic!("expected a store failure, got {:?}", other),
    }
    assert!(error.to_string().contains("injected fault"));

    assert!(common::missing_triggers(scenario.db()).unwrap().is_empty());
    assert_eq!(common::pragma(scenario.db(), "foreign_keys").unwrap(), 1);
    assert_eq!(common::pragma(scenario.db(), "synchronous").unwrap(), synchronous);
    let metrics = service.metrics();
    assert_eq!(metrics.trigger_suspensions, 1);
    assert_eq!(metrics.trigger_restorations, 1);

    // The root row survives a failed cascade
    assert!(scenario
        .repo
        .get_project(&scenario.alpha.project.id)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_deleteProject_afterFailure_shouldLeaveWorkingDerivedRows() {
    let scenario = common::seed_scenario().await.unwrap();
    inject_fault(&scenario);
    let service = DeletionService::new(scenario.db().clone());
    service
        .delete_project(&scenario.alpha.project.id)
        .await
        .unwrap_err();

    let beta = &scenario.beta;
    let unit = TranslationUnitRecord::new(&beta.project.id, "beta_after_fault", "Beta watchtower");
    let version = TranslationVersionRecord::translated(&unit.id, &beta.languages[1].id, "Beta Wachturm");
    scenario.repo.insert_units(vec![unit.clone()]).await.unwrap();
    scenario.repo.insert_versions(vec![version.clone()]).await.unwrap();

    let cached = scenario.repo.get_cache_rows(&beta.languages[1].id).await.unwrap();
    let row = cached.iter().find(|row| row.version_id == version.id).unwrap();
    assert_eq!(row.language_code, "de");
    assert_eq!(row.source_text, "Beta watchtower");
    assert_eq!(scenario.repo.search_units("watchtower").await.unwrap(), vec![unit.id.clone()]);
    assert_eq!(scenario.repo.search_versions("wachturm").await.unwrap(), vec![version.id.clone()]);

    // Units removed before the fault are gone from the rebuilt index too
    assert_eq!(scenario.repo.count_unit_index_hits("lighthouse").await.unwrap(), 0);
}

#[tokio::test]
async fn test_deleteProject_retriedAfterFault_shouldComplete() {
    let scenario = common::seed_scenario().await.unwrap();
    inject_fault(&scenario);
    let service = DeletionService::new(scenario.db().clone());
    service
        .delete_project(&scenario.alpha.project.id)
        .await
        .unwrap_err();

    clear_fault(&scenario);
    service.delete_project(&scenario.alpha.project.id).await.unwrap();

    for (table, count) in common::descendant_counts(scenario.db(), &scenario.alpha).unwrap() {
        assert_eq!(count, 0, "{} still holds rows of the deleted project", table);
    }
    assert_eq!(service.metrics().trigger_restorations, 2);
}

#[tokio::test]
async fn test_deleteProject_withTriggerAlreadyMissing_shouldRestoreFullSet() {
    let scenario = common::seed_scenario().await.unwrap();
    scenario
        .db()
        .execute(|conn| {
            conn.execute_batch("DROP TRIGGER trg_view_cache_unit_update;")?;
            Ok(())
        })
        .unwrap();
    let service = DeletionService::new(scenario.db().clone());

    service.delete_project(&scenario.alpha.project.id).await.unwrap();

    assert!(common::missing_triggers(scenario.db()).unwrap().is_empty());
}

#[tokio::test]
async fn test_deleteProject_withFailingStepAndRestore_shouldReportBothErrors() {
    let scenario = common::seed_scenario().await.unwrap();
    let triggers_before = common::trigger_sql(scenario.db()).unwrap();
    let synchronous = common::pragma(scenario.db(), "synchronous").unwrap();
    inject_fault(&scenario);
    let service = service_failing_restore(&scenario);

    let error = service
        .delete_project(&scenario.alpha.project.id)
        .await
        .unwrap_err();

    assert!(error.is_restoration_failure());
    match &error {
        StorageError::RestorationFailure { prior: Some(prior), source } => {
            match prior.as_ref() {
                StorageError::StoreFailure { operation, .. } => assert_eq!(operation, "delete mod_versions"),
                other => panic!("expected the failing step as prior error, got {:?}", other),
            }
            assert!(prior.to_string().contains("injected fault"));
            assert!(format!("{:#}", source).contains("test_unrestorable"));
        }
        other => panic!("expected a restoration failure with a prior error, got {:?}", other),
    }

    // Pragmas come back even though the triggers did not
    assert_eq!(common::pragma(scenario.db(), "foreign_keys").unwrap(), 1);
    assert_eq!(common::pragma(scenario.db(), "synchronous").unwrap(), synchronous);
    assert_eq!(common::missing_triggers(scenario.db()).unwrap().len(), TRIGGERS.len());
    let metrics = service.metrics();
    assert_eq!(metrics.trigger_suspensions, 1);
    assert_eq!(metrics.trigger_restorations, 0);

    // No rebuild without triggers: units deleted before the fault still match
    assert_eq!(scenario.repo.count_unit_index_hits("lighthouse").await.unwrap(), 3);

    let repaired = scenario
        .db()
        .execute(|conn| TriggerRegistry::new().repair(conn))
        .unwrap();
    assert_eq!(repaired.len(), TRIGGERS.len());
    assert!(common::missing_triggers(scenario.db()).unwrap().is_empty());
    clear_fault(&scenario);
    assert_eq!(common::trigger_sql(scenario.db()).unwrap(), triggers_before);
}

#[tokio::test]
async fn test_deleteProject_withFailingRestoreOnly_shouldReturnRestorationFailure() {
    let scenario = common::seed_scenario().await.unwrap();
    let service = service_failing_restore(&scenario);

    let error = service
        .delete_project(&scenario.alpha.project.id)
        .await
        .unwrap_err();

    match &error {
        StorageError::RestorationFailure { prior: None, .. } => {}
        other => panic!("expected a restoration failure without prior error, got {:?}", other),
    }

    // The rows are gone, only the triggers are missing
    for (table, count) in common::descendant_counts(scenario.db(), &scenario.alpha).unwrap() {
        assert_eq!(count, 0, "{} still holds rows of the deleted project", table);
    }
    assert!(scenario
        .repo
        .get_project(&scenario.alpha.project.id)
        .await
        .unwrap()
        .is_none());
    assert_eq!(common::pragma(scenario.db(), "foreign_keys").unwrap(), 1);
    assert!(!common::missing_triggers(scenario.db()).unwrap().is_empty());
    assert_eq!(scenario.repo.count_unit_index_hits("lighthouse").await.unwrap(), 3);

    scenario
        .db()
        .execute(|conn| TriggerRegistry::new().repair(conn))
        .unwrap();
    assert!(common::missing_triggers(scenario.db()).unwrap().is_empty());
}

#[tokio::test]
async fn test_deleteProject_withPartialSuspend_shouldRecreateDroppedTriggers() {
    let scenario = common::seed_scenario().await.unwrap();
    let triggers_before = common::trigger_sql(scenario.db()).unwrap();
    let synchronous = common::pragma(scenario.db(), "synchronous").unwrap();
    let half = TRIGGERS.len() / 2;
    let mut definitions = TRIGGERS[..half].to_vec();
    definitions.push(UNDROPPABLE);
    definitions.extend_from_slice(&TRIGGERS[half..]);
    let service = DeletionService::with_registry(
        scenario.db().clone(),
        DeletionOptions::default(),
        Arc::new(TriggerRegistry::with_definitions(definitions)),
    );

    let error = service
        .delete_project(&scenario.alpha.project.id)
        .await
        .unwrap_err();

    match &error {
        StorageError::StoreFailure { operation, .. } => assert_eq!(operation, "suspend triggers"),
        other => panic!("expected the suspend to fail, got {:?}", other),
    }
    assert_eq!(service.metrics().trigger_suspensions, 0);

    // Only the dropped half was recreated; the rest was never touched
    assert!(common::missing_triggers(scenario.db()).unwrap().is_empty());
    let triggers_after: Vec<(String, String)> = common::trigger_sql(scenario.db())
        .unwrap()
        .into_iter()
        .filter(|(name, _)| name != UNDROPPABLE.name)
        .collect();
    assert_eq!(triggers_after, triggers_before);
    assert_eq!(common::pragma(scenario.db(), "foreign_keys").unwrap(), 1);
    assert_eq!(common::pragma(scenario.db(), "synchronous").unwrap(), synchronous);
    assert!(scenario
        .repo
        .get_project(&scenario.alpha.project.id)
        .await
        .unwrap()
        .is_some());
}
