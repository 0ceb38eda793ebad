/*!
 * Tests for trigger suspension as seen through the derived tables
 */

use modlingo::database::models::{TranslationUnitRecord, TranslationVersionRecord};
use modlingo::deletion::{TriggerRegistry, TRIGGERS};

use crate::common;

#[tokio::test]
async fn test_suspendedTriggers_shouldStopMaintainingDerivedRows() {
    let scenario = common::seed_scenario().await.unwrap();
    let registry = TriggerRegistry::new();
    let beta = &scenario.beta;

    scenario.db().execute(|conn| registry.suspend(conn)).unwrap();

    let unit = TranslationUnitRecord::new(&beta.project.id, "beta_suspended", "Beta harbour");
    let version = TranslationVersionRecord::translated(&unit.id, &beta.languages[0].id, "Beta port");
    scenario.repo.insert_units(vec![unit.clone()]).await.unwrap();
    scenario.repo.insert_versions(vec![version.clone()]).await.unwrap();

    let cached = scenario.repo.get_cache_rows(&beta.languages[0].id).await.unwrap();
    assert!(cached.iter().all(|row| row.version_id != version.id));
    assert!(scenario.repo.search_versions("port").await.unwrap().is_empty());

    scenario.db().execute(|conn| registry.restore(conn)).unwrap();
    assert!(common::missing_triggers(scenario.db()).unwrap().is_empty());
}

#[tokio::test]
async fn test_restoredTriggers_shouldMaintainDerivedRowsAgain() {
    let scenario = common::seed_scenario().await.unwrap();
    let registry = TriggerRegistry::new();
    let beta = &scenario.beta;

    scenario
        .db()
        .execute(|conn| {
            registry.suspend(conn)?;
            registry.restore(conn)
        })
        .unwrap();

    let unit = TranslationUnitRecord::new(&beta.project.id, "beta_restored", "Beta harbour");
    let version = TranslationVersionRecord::translated(&unit.id, &beta.languages[0].id, "Beta port");
    scenario.repo.insert_units(vec![unit.clone()]).await.unwrap();
    scenario.repo.insert_versions(vec![version.clone()]).await.unwrap();

    let cached = scenario.repo.get_cache_rows(&beta.languages[0].id).await.unwrap();
    let row = cached.iter().find(|row| row.version_id == version.id).unwrap();
    assert_eq!(row.unit_key, "beta_restored");
    assert_eq!(row.language_code, "fr");
    assert_eq!(scenario.repo.search_versions("port").await.unwrap(), vec![version.id.clone()]);
    assert_eq!(scenario.repo.search_units("harbour").await.unwrap(), vec![unit.id.clone()]);
}

#[tokio::test]
async fn test_repair_afterPartialLoss_shouldRestoreFullSet() {
    let scenario = common::seed_scenario().await.unwrap();
    let registry = TriggerRegistry::new();
    let before = common::trigger_sql(scenario.db()).unwrap();

    scenario
        .db()
        .execute(|conn| {
            for def in TRIGGERS.iter().step_by(3) {
                conn.execute_batch(&format!("DROP TRIGGER {};", def.name))?;
            }
            Ok(())
        })
        .unwrap();
    assert_eq!(
        common::missing_triggers(scenario.db()).unwrap().len(),
        TRIGGERS.iter().step_by(3).count()
    );

    let repaired = scenario.db().execute(|conn| registry.repair(conn)).unwrap();

    assert_eq!(repaired.len(), TRIGGERS.iter().step_by(3).count());
    assert_eq!(common::trigger_sql(scenario.db()).unwrap(), before);
}
