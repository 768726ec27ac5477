use convo_core::{Message, Role};

/// Render messages as `Human:`/`Assistant:` lines, one per message.
///
/// Messages with any other role are left out.
pub fn render_prompt(messages: &[Message]) -> String {
    messages
        .iter()
        .filter_map(|message| match message.role {
            Role::User => Some(format!("Human: {}", message.content)),
            Role::Assistant => Some(format!("Assistant: {}", message.content)),
            Role::Other(_) => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}
