pub mod context_turn;
pub mod plan;
pub mod project;
pub mod prompt;
pub mod reminder;
pub mod task;
pub mod team;
pub mod user;

#[cfg(test)]
pub(crate) mod test_utils;
