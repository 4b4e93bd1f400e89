mod conversation;
mod directive;
mod human;
mod instructions;
mod models;
mod parser;
mod runner;


pub use conversation::{Conversation, DEFAULT_MAX_MESSAGES, PINNED_MESSAGES};
pub use directive::{ASK_USER, AgentAction, AgentDirective, PASS_RESULT};
pub use human::{
    ChannelHumanInput, ConsoleInput, HumanInput, HumanInputError, HumanRequest, NoHumanInput,
    human_channel,
};
pub use instructions::compose_system_prompt;
pub use models::{
    AgentOptions, AgentOutcome, AgentStep, DEFAULT_MAX_DEPTH, DEFAULT_MODEL_RETRIES,
    DEPTH_EXCEEDED_RESPONSE, FALLBACK_RESPONSE, TaskStatus,
};
pub use parser::{normalize_params, parse_action, parse_all};
pub use runner::Agent;
pub(crate) use runner::prompt_with_retries;
