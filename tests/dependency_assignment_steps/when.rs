//! When steps for dependency assignment BDD scenarios.

use super::world::{DependencyWorld, run_async};
use gantry::board::domain::TaskId;
use rstest_bdd_macros::when;

#[when("task {task:i64} is made to depend on task {candidate:i64}")]
fn assign_dependency(
    world: &mut DependencyWorld,
    task: i64,
    candidate: i64,
) -> Result<(), eyre::Report> {
    let result = run_async(
        world
            .board()?
            .assign_dependency(TaskId::new(task), TaskId::new(candidate)),
    );
    world.last_assignment = Some(result);
    Ok(())
}
