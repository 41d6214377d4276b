use std::sync::Arc;

use db::models::{
    context_turn::{Action, ContextTurn, CreateContextTurn, MessageRole},
    project::Project,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use ts_rs::TS;

use super::prompt_catalog::PromptCatalog;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub text: String,
}

impl ChatMessage {
    pub fn new(role: MessageRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }
}

impl From<ContextTurn> for ChatMessage {
    fn from(turn: ContextTurn) -> Self {
        Self {
            role: turn.role,
            text: turn.message,
        }
    }
}

/// Message list ready to send, plus the user turns recorded for it.
#[derive(Debug, Clone)]
pub struct AssembledContext {
    pub messages: Vec<ChatMessage>,
    pub user_turns: Vec<ContextTurn>,
}

/// Template text, then the project description, then the optional problem
/// statement.
pub fn compose_instruction(template: &str, description: Option<&str>, problem: Option<&str>) -> String {
    let mut text = format!("{}\n\n{}", template, description.unwrap_or_default());
    if let Some(problem) = problem.filter(|p| !p.trim().is_empty()) {
        text.push_str("\n\nProblem description: ");
        text.push_str(problem);
    }
    text
}

#[derive(Clone)]
pub struct ContextAssembler {
    pool: SqlitePool,
    catalog: Arc<PromptCatalog>,
}

impl ContextAssembler {
    pub fn new(pool: SqlitePool, catalog: Arc<PromptCatalog>) -> Self {
        Self { pool, catalog }
    }

    async fn history(&self, project_id: i64, action: Action, depth: i64) -> Result<Vec<ChatMessage>, sqlx::Error> {
        let Some(bucket) = action.bucket() else {
            return Ok(Vec::new());
        };
        let turns = ContextTurn::find_recent(&self.pool, project_id, bucket, depth).await?;
        Ok(turns.into_iter().map(ChatMessage::from).collect())
    }

    /// Builds `[system?, ...history, ...request]` for `action` and records
    /// every outgoing user message as a turn. History is read before any
    /// turn is written, so it never contains this request's own messages.
    ///
    /// With no caller `messages`, the request is the composed instruction
    /// alone. Otherwise the instruction is prefixed to each caller `user`
    /// message and other roles pass through unchanged.
    pub async fn assemble(
        &self,
        project: &Project,
        action: Action,
        depth: i64,
        problem: Option<&str>,
        request: &[ChatMessage],
    ) -> Result<AssembledContext, sqlx::Error> {
        let mut messages = Vec::new();
        match self.catalog.system() {
            Some(system) => messages.push(ChatMessage::new(MessageRole::System, system)),
            None => tracing::debug!("No system prompt configured"),
        }

        messages.extend(self.history(project.id, action, depth).await?);

        let instruction = self
            .catalog
            .get(action)
            .map(|template| compose_instruction(template, project.description.as_deref(), problem));
        if instruction.is_none() {
            tracing::warn!(
                "No prompt template for action '{}' in project {}",
                action,
                project.id
            );
        }

        let outgoing: Vec<ChatMessage> = if request.is_empty() {
            instruction
                .map(|text| ChatMessage::new(MessageRole::User, text))
                .into_iter()
                .collect()
        } else {
            request
                .iter()
                .map(|message| match (message.role, instruction.as_deref()) {
                    (MessageRole::User, Some(instruction)) => ChatMessage::new(
                        MessageRole::User,
                        format!("{}\n\n{}", instruction, message.text),
                    ),
                    _ => message.clone(),
                })
                .collect()
        };

        let mut user_turns = Vec::new();
        for message in outgoing.iter().filter(|m| m.role == MessageRole::User) {
            let turn = ContextTurn::insert(
                &self.pool,
                &CreateContextTurn {
                    project_id: project.id,
                    role: MessageRole::User,
                    action,
                    message: message.text.clone(),
                },
            )
            .await?;
            user_turns.push(turn);
        }
        messages.extend(outgoing);

        Ok(AssembledContext {
            messages,
            user_turns,
        })
    }

    /// The system prompt and history `assemble` would send, without
    /// composing or recording an instruction.
    pub async fn preview(&self, project_id: i64, action: Action, depth: i64) -> Result<Vec<ChatMessage>, sqlx::Error> {
        let mut messages = Vec::new();
        if let Some(system) = self.catalog.system() {
            messages.push(ChatMessage::new(MessageRole::System, system));
        }
        messages.extend(self.history(project_id, action, depth).await?);
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use db::{
        DBService,
        models::{
            project::CreateProject,
            user::{CreateUser, User},
        },
    };

    use super::*;
    use crate::services::response_interpreter::ResponseInterpreter;

    async fn setup(catalog: PromptCatalog) -> (SqlitePool, Project, ContextAssembler) {
        let pool = DBService::new_in_memory().await.unwrap().pool;
        User::create(
            &pool,
            &CreateUser {
                id: Some(1),
                name: "owner".into(),
            },
        )
        .await
        .unwrap();
        let project = Project::create(
            &pool,
            &CreateProject {
                title: "Apollo".into(),
                description: Some("Landing page rewrite".into()),
                chat_link: None,
                repo_link: None,
                owner_id: 1,
            },
        )
        .await
        .unwrap();
        let assembler = ContextAssembler::new(pool.clone(), Arc::new(catalog));
        (pool, project, assembler)
    }

    fn full_catalog() -> PromptCatalog {
        PromptCatalog::from_templates([
            (Action::System, "You are a project manager."),
            (Action::Plan, "Write a plan."),
            (Action::ReTask, "Split the tasks again."),
        ])
    }

    #[test]
    fn instruction_appends_description_and_problem() {
        assert_eq!(compose_instruction("Plan it.", Some("A shop"), None), "Plan it.\n\nA shop");
        assert_eq!(compose_instruction("Plan it.", None, None), "Plan it.\n\n");
        assert_eq!(
            compose_instruction("Plan it.", Some("A shop"), Some("checkout is slow")),
            "Plan it.\n\nA shop\n\nProblem description: checkout is slow"
        );
    }

    #[tokio::test]
    async fn zero_depth_sends_only_system_and_instruction() {
        let (_pool, project, assembler) = setup(full_catalog()).await;
        assembler.assemble(&project, Action::Plan, 5, None, &[]).await.unwrap();

        let context = assembler.assemble(&project, Action::Plan, 0, None, &[]).await.unwrap();
        let roles: Vec<_> = context.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![MessageRole::System, MessageRole::User]);
        assert_eq!(context.messages[1].text, "Write a plan.\n\nLanding page rewrite");
    }

    #[tokio::test]
    async fn deep_history_is_returned_in_full_oldest_first() {
        let (pool, project, assembler) = setup(full_catalog()).await;
        for _ in 0..3 {
            assembler.assemble(&project, Action::Plan, 0, None, &[]).await.unwrap();
        }

        let context = assembler
            .assemble(&project, Action::Plan, 100, Some("budget cut"), &[])
            .await
            .unwrap();
        // system + three stored turns + the new instruction
        assert_eq!(context.messages.len(), 5);
        assert_eq!(context.messages[0].role, MessageRole::System);
        assert!(context.messages[4].text.ends_with("Problem description: budget cut"));

        let stored = ContextTurn::find_by_project(&pool, project.id).await.unwrap();
        assert_eq!(stored.len(), 4);
        assert_eq!(context.user_turns.len(), 1);
        assert_eq!(context.user_turns[0].id, stored[3].id);
    }

    #[tokio::test]
    async fn missing_template_sends_history_without_recording() {
        let (pool, project, assembler) = setup(full_catalog()).await;
        assembler.assemble(&project, Action::ReTask, 0, None, &[]).await.unwrap();

        let context = assembler.assemble(&project, Action::DivTask, 5, None, &[]).await.unwrap();
        assert!(context.user_turns.is_empty());
        assert_eq!(context.messages.len(), 2);
        assert_eq!(context.messages[1].text, "Split the tasks again.\n\nLanding page rewrite");
        assert_eq!(ContextTurn::find_by_project(&pool, project.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_system_prompt_is_tolerated() {
        let catalog = PromptCatalog::from_templates([(Action::Plan, "Write a plan.")]);
        let (_pool, project, assembler) = setup(catalog).await;

        let context = assembler.assemble(&project, Action::Plan, 5, None, &[]).await.unwrap();
        assert_eq!(context.messages.len(), 1);
        assert_eq!(context.messages[0].role, MessageRole::User);
    }

    #[tokio::test]
    async fn preview_does_not_record() {
        let (pool, project, assembler) = setup(full_catalog()).await;
        assembler.assemble(&project, Action::Plan, 0, None, &[]).await.unwrap();

        let preview = assembler.preview(project.id, Action::RePlan, 5).await.unwrap();
        assert_eq!(preview.len(), 2);
        assert_eq!(ContextTurn::find_by_project(&pool, project.id).await.unwrap().len(), 1);
    }

    fn lineage_catalog() -> PromptCatalog {
        PromptCatalog::from_templates([
            (Action::System, "You are a project manager."),
            (Action::Plan, "Write a plan."),
            (Action::RePlan, "Improve the plan."),
            (Action::Task, "Return tasks as JSON."),
            (Action::ReTask, "Redo tasks."),
        ])
    }

    fn completion(text: &str) -> serde_json::Value {
        serde_json::json!({ "result": { "alternatives": [ { "message": { "role": "assistant", "text": text } } ] } })
    }

    fn transcript(messages: &[ChatMessage]) -> Vec<(MessageRole, &str)> {
        messages.iter().map(|m| (m.role, m.text.as_str())).collect()
    }

    #[tokio::test]
    async fn plan_exchange_feeds_re_plan_and_task_generation() {
        let (pool, project, assembler) = setup(lineage_catalog()).await;
        let interpreter = ResponseInterpreter::new(pool.clone());

        assembler.assemble(&project, Action::Plan, 5, None, &[]).await.unwrap();
        interpreter
            .interpret(project.id, Action::Plan, &completion("1. Design 2. Build"))
            .await
            .unwrap();

        let re_plan = assembler.assemble(&project, Action::RePlan, 5, None, &[]).await.unwrap();
        assert_eq!(
            transcript(&re_plan.messages),
            vec![
                (MessageRole::System, "You are a project manager."),
                (MessageRole::User, "Write a plan.\n\nLanding page rewrite"),
                (MessageRole::Assistant, "1. Design 2. Build"),
                (MessageRole::User, "Improve the plan.\n\nLanding page rewrite"),
            ]
        );

        let task = assembler.assemble(&project, Action::Task, 5, None, &[]).await.unwrap();
        let history = transcript(&task.messages[1..task.messages.len() - 1]);
        assert_eq!(history.len(), 3);
        assert_eq!(history[1], (MessageRole::Assistant, "1. Design 2. Build"));
    }

    #[tokio::test]
    async fn re_task_sees_task_generation_turns() {
        let (pool, project, assembler) = setup(lineage_catalog()).await;
        let interpreter = ResponseInterpreter::new(pool.clone());
        let reply = r#"{"tasks":[{"a":"b"}]}"#;

        assembler.assemble(&project, Action::Task, 5, None, &[]).await.unwrap();
        interpreter
            .interpret(project.id, Action::Task, &completion(reply))
            .await
            .unwrap();

        let context = assembler.assemble(&project, Action::ReTask, 5, None, &[]).await.unwrap();
        assert_eq!(
            transcript(&context.messages),
            vec![
                (MessageRole::System, "You are a project manager."),
                (MessageRole::User, "Return tasks as JSON.\n\nLanding page rewrite"),
                (MessageRole::Assistant, reply),
                (MessageRole::User, "Redo tasks.\n\nLanding page rewrite"),
            ]
        );

        // the task exchange stays out of the plan lineage
        let re_plan = assembler.preview(project.id, Action::RePlan, 5).await.unwrap();
        assert_eq!(re_plan.len(), 1);
    }

    #[tokio::test]
    async fn caller_messages_carry_the_instruction() {
        let (pool, project, assembler) = setup(lineage_catalog()).await;
        let request = vec![
            ChatMessage::new(MessageRole::User, "Focus on mobile."),
            ChatMessage::new(MessageRole::Assistant, "Noted."),
            ChatMessage::new(MessageRole::User, "Keep it to two weeks."),
        ];

        let context = assembler
            .assemble(&project, Action::Plan, 5, Some("no budget"), &request)
            .await
            .unwrap();
        let instruction = "Write a plan.\n\nLanding page rewrite\n\nProblem description: no budget";
        let first = format!("{instruction}\n\nFocus on mobile.");
        let second = format!("{instruction}\n\nKeep it to two weeks.");
        assert_eq!(
            transcript(&context.messages[1..]),
            vec![
                (MessageRole::User, first.as_str()),
                (MessageRole::Assistant, "Noted."),
                (MessageRole::User, second.as_str()),
            ]
        );

        assert_eq!(context.user_turns.len(), 2);
        let stored = ContextTurn::find_by_project(&pool, project.id).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().all(|t| t.role == MessageRole::User));
        assert!(stored[1].message.ends_with("Keep it to two weeks."));
    }
}
