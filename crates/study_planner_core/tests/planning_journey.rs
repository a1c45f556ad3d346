mod common;

use chrono::{Duration, Utc};
use serde_json::json;

use common::{seeded, university, MemoryDatabase};
use study_planner_core::dashboard::{build_dashboard, DASHBOARD_TODOS};
use study_planner_core::domain::{Level, SopStatus, TodoCategory, TodoFilter, TodoPriority};
use study_planner_core::executor::ActionExecutor;
use study_planner_core::onboarding::{
    onboarding_status, require_profile, submit_onboarding, OnboardingError,
};
use study_planner_core::planner::Planner;
use study_planner_core::strength::{AcademicTier, ExamReadiness};
use study_planner_core::todos::{
    complete_todo, create_todo, list_todos, update_todo, NewTodo, TodoPatch,
};

fn new_todo(title: &str, priority: TodoPriority) -> NewTodo {
    NewTodo {
        title: title.to_string(),
        description: None,
        category: TodoCategory::Document,
        priority,
        deadline: None,
        university_id: None,
    }
}

#[tokio::test]
async fn stage_follows_the_planner_state() {
    let toronto = university("University of Toronto", Some(21), Level::Medium);
    let (db, user, profile) = seeded(vec![toronto.clone()]);

    let dashboard = build_dashboard(&db, &profile).await.expect("dashboard");
    assert_eq!(dashboard.profile_strength.academic, AcademicTier::Strong);
    assert_eq!(dashboard.profile_strength.exams, ExamReadiness::Completed);
    assert_eq!(dashboard.profile_strength.sop, SopStatus::Draft);
    assert!(dashboard.profile_strength.overall_score >= 70);
    assert_eq!(dashboard.stage_info.current_stage, 2);
    assert_eq!(dashboard.stage_info.next_action, "Talk to AI Counsellor to discover universities");

    ActionExecutor::new(&db)
        .execute(
            user.user_id,
            &[json!({"type": "shortlist_university", "university_id": toronto.id.to_string()})],
        )
        .await;
    let dashboard = build_dashboard(&db, &profile).await.expect("dashboard");
    assert_eq!(dashboard.stage_info.current_stage, 3);
    assert_eq!(dashboard.shortlisted_count, 1);

    let planner = Planner::new(&db);
    planner.lock(user.user_id, toronto.id).await.expect("lock");
    let dashboard = build_dashboard(&db, &profile).await.expect("dashboard");
    assert_eq!(dashboard.stage_info.current_stage, 4);
    assert_eq!(dashboard.stage_info.stage_name, "Application Preparation");
    assert!(!dashboard.stage_info.is_locked);

    planner.unlock(user.user_id, toronto.id).await.expect("unlock");
    let dashboard = build_dashboard(&db, &profile).await.expect("dashboard");
    assert_eq!(dashboard.stage_info.current_stage, 3);
}

#[tokio::test]
async fn dashboard_shows_the_ten_most_pressing_todos() {
    let (db, user, profile) = seeded(Vec::new());
    for i in 0..12 {
        create_todo(&db, user.user_id, new_todo(&format!("low {i}"), TodoPriority::Low))
            .await
            .expect("create");
    }
    let urgent = create_todo(&db, user.user_id, new_todo("Pay deposit", TodoPriority::High))
        .await
        .expect("create");

    let dashboard = build_dashboard(&db, &profile).await.expect("dashboard");
    assert_eq!(dashboard.todos.len(), DASHBOARD_TODOS);
    assert_eq!(dashboard.todos[0].id, urgent.id);
}

#[tokio::test]
async fn todo_completion_keeps_its_first_timestamp() {
    let (db, user, _) = seeded(Vec::new());
    let draft = new_todo("Notarize transcripts", TodoPriority::Medium);
    let todo = create_todo(&db, user.user_id, draft).await.expect("create");

    let done = complete_todo(&db, user.user_id, todo.id).await.expect("complete");
    let first = done.completed_at.expect("completion stamped");

    let again = complete_todo(&db, user.user_id, todo.id).await.expect("complete");
    assert_eq!(again.completed_at, Some(first));

    let reopened = update_todo(
        &db,
        user.user_id,
        todo.id,
        TodoPatch {
            is_complete: Some(false),
            ..TodoPatch::default()
        },
    )
    .await
    .expect("reopen");
    assert_eq!(reopened.completed_at, None);

    let open = list_todos(
        &db,
        user.user_id,
        TodoFilter {
            completed: Some(false),
            category: None,
        },
    )
    .await
    .expect("list");
    assert_eq!(open.len(), 1);
}

#[tokio::test]
async fn todos_of_other_users_are_not_found() {
    let (db, user, _) = seeded(Vec::new());
    let stranger = db.seed_user("Someone Else");
    let todo = create_todo(&db, user.user_id, new_todo("Private", TodoPriority::Low))
        .await
        .expect("create");

    assert!(complete_todo(&db, stranger.user_id, todo.id).await.is_err());
}

#[tokio::test]
async fn onboarding_is_validated_and_marked_complete() {
    let db = MemoryDatabase::new();
    let user = db.seed_user("New Student");

    let status = onboarding_status(&db, user.user_id).await.expect("status");
    assert!(!status.exists && !status.is_complete);
    assert!(require_profile(&db, user.user_id).await.is_err());

    let mut draft = common::profile(user.user_id);
    draft.completed_at = None;
    draft.budget_min = Some(80000);
    draft.budget_max = Some(20000);
    let err = submit_onboarding(&db, user.user_id, draft.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, OnboardingError::Invalid(_)));

    draft.budget_min = Some(10000);
    draft.preferred_countries = vec![" Canada ".to_string(), "".to_string()];
    let before = Utc::now() - Duration::seconds(1);
    let stored = submit_onboarding(&db, user.user_id, draft)
        .await
        .expect("submit");
    assert!(stored.completed_at.expect("completed") > before);
    assert_eq!(stored.preferred_countries, vec!["Canada".to_string()]);

    let status = onboarding_status(&db, user.user_id).await.expect("status");
    assert!(status.exists && status.is_complete);
}
