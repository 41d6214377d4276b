use std::{env, fs, path::Path};

use ts_rs::TS;

fn generate_types_content() -> String {
    // Declarations are emitted in dependency order.
    let decls: Vec<String> = vec![
        utils::response::ApiResponse::<()>::decl(),
        db::models::user::User::decl(),
        db::models::user::CreateUser::decl(),
        db::models::project::Project::decl(),
        db::models::project::CreateProject::decl(),
        db::models::project::UpdateProject::decl(),
        db::models::task::TaskStatus::decl(),
        db::models::task::TaskPriority::decl(),
        db::models::task::Task::decl(),
        db::models::task::CreateTask::decl(),
        db::models::task::UpdateTask::decl(),
        db::models::team::TeamRole::decl(),
        db::models::team::Team::decl(),
        db::models::team::CreateTeam::decl(),
        db::models::team::UpdateTeam::decl(),
        db::models::reminder::Reminder::decl(),
        db::models::reminder::UpdateReminder::decl(),
        db::models::context_turn::Action::decl(),
        db::models::context_turn::ContextBucket::decl(),
        db::models::context_turn::MessageRole::decl(),
        db::models::context_turn::ContextTurn::decl(),
        db::models::prompt::Prompt::decl(),
        db::models::plan::Plan::decl(),
        db::models::plan::PlanSort::decl(),
        services::services::config::LlmConfig::decl(),
        services::services::config::ReportConfig::decl(),
        services::services::config::Config::decl(),
        services::services::llm_gateway::CompletionOptions::decl(),
        services::services::context_assembler::ChatMessage::decl(),
        services::services::conversation::ActionRequest::decl(),
        services::services::response_interpreter::Derived::decl(),
        services::services::response_interpreter::InterpretOutcome::decl(),
        services::services::report::TaskDuration::decl(),
        services::services::report::TaskBreakdown::decl(),
        services::services::report::DurationPick::decl(),
        services::services::report::DeveloperRanking::decl(),
        services::services::report::DeveloperReport::decl(),
        services::services::report::ProjectReport::decl(),
        server::error::ApiError::decl(),
    ];

    let body = decls
        .into_iter()
        .map(|d| {
            let trimmed = d.trim_start();
            if trimmed.starts_with("export") {
                d
            } else {
                format!("export {trimmed}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "// This file was generated by `cargo run --bin generate_types`. Do not edit manually.\n\n{body}\n"
    )
}

fn main() {
    let check_mode = env::args().any(|arg| arg == "--check");
    let shared_path = Path::new("shared");
    let types_path = shared_path.join("types.ts");
    let generated = generate_types_content();

    if check_mode {
        match fs::read_to_string(&types_path) {
            Ok(current) if current == generated => {
                println!("✅ shared/types.ts is up to date.");
                std::process::exit(0);
            }
            _ => {
                eprintln!("❌ shared/types.ts is not up to date. Run `cargo run --bin generate_types`.");
                std::process::exit(1);
            }
        }
    }

    println!("Generating TypeScript types…");
    if let Err(e) = fs::create_dir_all(shared_path) {
        eprintln!("Failed to create {}: {}", shared_path.display(), e);
        std::process::exit(1);
    }
    if let Err(e) = fs::write(&types_path, generated) {
        eprintln!("Failed to write {}: {}", types_path.display(), e);
        std::process::exit(1);
    }
    println!("✅ TypeScript types written to {}", types_path.display());
}
