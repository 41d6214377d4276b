pub mod config;
pub mod context_assembler;
pub mod conversation;
pub mod llm_gateway;
pub mod prompt_catalog;
pub mod report;
pub mod response_interpreter;
