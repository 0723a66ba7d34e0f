#![cfg(feature = "postgres-tests")]

use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use residency_config::EngineConfig;
use residency_storage::{AssignmentMutation, AssignmentRepository, PersonRepository, StorageError};

async fn insert_resident(pool: &PgPool, pgy_level: i16, email: &str) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO people (id, display_name, role_kind, pgy_level, email) VALUES ($1, 'Test Resident', 'resident', $2, $3)",
    )
    .bind(id)
    .bind(pgy_level)
    .bind(email)
    .execute(pool)
    .await
    .unwrap();
    id
}

async fn insert_faculty(pool: &PgPool, email: &str) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO people (id, display_name, role_kind, email) VALUES ($1, 'Test Faculty', 'faculty', $2)")
        .bind(id)
        .bind(email)
        .execute(pool)
        .await
        .unwrap();
    id
}

async fn insert_rotation(pool: &PgPool, name: &str, category: &str) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO rotations (id, name, category, min_coverage, max_coverage) VALUES ($1, $2, $3, 0, 10)")
        .bind(id)
        .bind(name)
        .bind(category)
        .execute(pool)
        .await
        .unwrap();
    id
}

async fn insert_block(pool: &PgPool, date: NaiveDate, sequence_number: i32) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO blocks (id, date, session, sequence_number, is_weekend) VALUES ($1, $2, 'AM', $3, false)",
    )
    .bind(id)
    .bind(date)
    .bind(sequence_number)
    .execute(pool)
    .await
    .unwrap();
    id
}

/// spec §8 scenario 2: an admission that would push a resident's rolling
/// 4-week average over the 80-hour cap is rejected, no write lands.
#[sqlx::test(migrations = "../../migrations")]
async fn apply_assignments_rejects_admission_over_the_80_hour_cap(pool: PgPool) -> Result<(), sqlx::Error> {
    let person_repo = PersonRepository::new(pool.clone());
    let assignment_repo = AssignmentRepository::new(pool.clone());
    let mut config = EngineConfig::default_for_tests();
    // 28 half-day blocks at this weight sum to well over the 320-hour
    // (80 h/week x 4) cap for the window.
    config.rotation_hour_weights.insert("Inpatient".to_string(), 30.0);

    let resident = insert_resident(&pool, 2, "over-cap@example.org").await;
    let rotation = insert_rotation(&pool, "Inpatient Ward", "inpatient").await;

    let start = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
    let mut seq = 0i32;
    let mut mutations = Vec::new();
    for day in 0..28 {
        let date = start + chrono::Duration::days(day);
        let block = insert_block(&pool, date, seq).await;
        seq += 1;
        mutations.push(AssignmentMutation::UpsertAssignment {
            id: Uuid::new_v4(),
            block_id: block,
            person_id: resident,
            rotation_id: rotation,
            notes: None,
        });
    }

    let result = assignment_repo
        .apply_assignments(&mutations, &[resident], &person_repo, &config.rotation_hour_weights)
        .await;

    let Err(StorageError::Invariant { details, .. }) = result else {
        panic!("expected an Invariant rejection, got {result:?}");
    };
    assert_eq!(details["limit"], 80.0);
    assert!(details["hours_after"].as_f64().unwrap() > 80.0);

    let committed = assignment_repo
        .list_for_person_range(resident, start, start + chrono::Duration::days(27))
        .await
        .map_err(|e| sqlx::Error::Protocol(e.to_string()))?;
    assert!(committed.is_empty(), "no assignment should have been written on rejection");

    Ok(())
}

/// spec §8 scenario 6: admitting a third PGY-1 onto an Inpatient rotation
/// under a single faculty member is rejected with the exact
/// `PGY1_SUPERVISION` / `2:1` / `3:1` shape.
#[sqlx::test(migrations = "../../migrations")]
async fn apply_assignments_rejects_third_pgy1_under_one_faculty(pool: PgPool) -> Result<(), sqlx::Error> {
    let person_repo = PersonRepository::new(pool.clone());
    let assignment_repo = AssignmentRepository::new(pool.clone());
    let config = EngineConfig::default_for_tests();

    let faculty = insert_faculty(&pool, "attending@example.org").await;
    let pgy1_a = insert_resident(&pool, 1, "pgy1-a@example.org").await;
    let pgy1_b = insert_resident(&pool, 1, "pgy1-b@example.org").await;
    let pgy1_c = insert_resident(&pool, 1, "pgy1-c@example.org").await;
    let rotation = insert_rotation(&pool, "Inpatient Ward", "inpatient").await;
    let date = NaiveDate::from_ymd_opt(2026, 2, 3).unwrap();
    let block = insert_block(&pool, date, 1).await;

    let seed = vec![
        AssignmentMutation::UpsertAssignment {
            id: Uuid::new_v4(),
            block_id: block,
            person_id: faculty,
            rotation_id: rotation,
            notes: None,
        },
        AssignmentMutation::UpsertAssignment {
            id: Uuid::new_v4(),
            block_id: block,
            person_id: pgy1_a,
            rotation_id: rotation,
            notes: None,
        },
        AssignmentMutation::UpsertAssignment {
            id: Uuid::new_v4(),
            block_id: block,
            person_id: pgy1_b,
            rotation_id: rotation,
            notes: None,
        },
    ];
    assignment_repo
        .apply_assignments(&seed, &[faculty, pgy1_a, pgy1_b], &person_repo, &config.rotation_hour_weights)
        .await
        .map_err(|e| sqlx::Error::Protocol(e.to_string()))?;

    let admission = vec![AssignmentMutation::UpsertAssignment {
        id: Uuid::new_v4(),
        block_id: block,
        person_id: pgy1_c,
        rotation_id: rotation,
        notes: None,
    }];
    let result = assignment_repo
        .apply_assignments(&admission, &[pgy1_c], &person_repo, &config.rotation_hour_weights)
        .await;

    let Err(StorageError::Invariant { details, .. }) = result else {
        panic!("expected an Invariant rejection, got {result:?}");
    };
    assert_eq!(details["rule"], "PGY1_SUPERVISION");
    assert_eq!(details["current_ratio"], "2:1");
    assert_eq!(details["proposed"], "3:1");

    Ok(())
}
