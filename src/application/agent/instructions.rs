use super::directive::{ASK_USER, PASS_RESULT};

/// Builds the system instruction for one task: who the agent is, what it was
/// asked, the tools it may call and the reply format the parser understands.
pub fn compose_system_prompt(identity: &str, description: &str, task: &str, tools: &str) -> String {
    let mut prompt = format!("You are {identity}.\n");
    if !description.trim().is_empty() {
        prompt.push_str(description.trim());
        prompt.push('\n');
    }
    prompt.push_str(&format!(
        "\n## Task\n{task}\n\n## Tools\n{tools}\n\n## Responding\n\
When you need a tool, reply with exactly one fenced YAML block and nothing after it:\n\n\
```yaml\nthoughts: <your reasoning for this step>\nname: <tool name, {ASK_USER} or {PASS_RESULT}>\nparams:\n  <parameter>: <value>\n```\n\n\
- Use `{ASK_USER}` with a `question` parameter when you need information from the user.\n\
- Use `{PASS_RESULT}` with a `result` parameter to hand back the finished result.\n\
- A reply without a YAML block is taken as your final answer.\n\
- Only call the tools listed above.\n"
    ));
    prompt
}
