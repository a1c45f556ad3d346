//! crates/study_planner_core/src/dashboard.rs
//!
//! The at-a-glance view: strength, stage and the most pressing todos.

use serde::Serialize;
use uuid::Uuid;

use crate::domain::{Profile, Todo, TodoFilter};
use crate::ports::{DatabaseService, PortResult};
use crate::stage::{determine_stage, StageInfo};
use crate::strength::{calculate_profile_strength, ProfileStrength};
use crate::todos::sort_for_display;

pub const DASHBOARD_TODOS: usize = 10;

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub profile_strength: ProfileStrength,
    pub stage_info: StageInfo,
    pub todos: Vec<Todo>,
    pub shortlisted_count: i64,
    pub locked_count: i64,
}

pub async fn build_dashboard(db: &dyn DatabaseService, profile: &Profile) -> PortResult<Dashboard> {
    let user_id: Uuid = profile.user_id;
    let strength = calculate_profile_strength(profile);
    let counts = db.count_user_universities(user_id).await?;
    let stage = determine_stage(strength.overall_score, counts.shortlisted, counts.locked);

    let mut todos = db.list_todos(user_id, TodoFilter::default()).await?;
    sort_for_display(&mut todos);
    todos.truncate(DASHBOARD_TODOS);

    Ok(Dashboard {
        profile_strength: strength,
        stage_info: stage.info(),
        todos,
        shortlisted_count: counts.shortlisted,
        locked_count: counts.locked,
    })
}
