//! Injects per-call instructions into the system message before dispatch.

use super::types::{CallOptions, Message, Role};

const DOCS_INSTRUCTION: &str = "Refer to the attached documentation when it is available.";
const CODER_INSTRUCTION: &str =
    "Focus your answer on programming and code. Keep replies concise and technical.";
const MULTI_AGENT_INSTRUCTION: &str = "You may take on several roles or collaborate with other virtual experts to solve complex problems.";

/// Return a copy of `messages` with the option-driven instructions applied.
///
/// The context prompt is appended to the first system message, or becomes a
/// new leading system message when there is none. The docs, coder and
/// multi-agent sentences are appended in that order, and only when a system
/// message exists after the context prompt step.
pub fn apply_options(messages: &[Message], options: &CallOptions) -> Vec<Message> {
    let mut out = messages.to_vec();

    if let Some(prompt) = options.context_prompt.as_deref().filter(|p| !p.is_empty()) {
        match system_index(&out) {
            Some(idx) => append(&mut out[idx], prompt),
            None => out.insert(0, Message::system(prompt)),
        }
    }

    let flags = [
        (options.use_docs, DOCS_INSTRUCTION),
        (options.coder_mode, CODER_INSTRUCTION),
        (options.multi_agent, MULTI_AGENT_INSTRUCTION),
    ];
    if let Some(idx) = system_index(&out) {
        for (_, sentence) in flags.iter().filter(|(enabled, _)| *enabled) {
            append(&mut out[idx], sentence);
        }
    }

    out
}

fn system_index(messages: &[Message]) -> Option<usize> {
    messages.iter().position(|m| m.role == Role::System)
}

fn append(message: &mut Message, text: &str) {
    message.content.push_str("\n\n");
    message.content.push_str(text);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn conversation() -> Vec<Message> {
        vec![Message::system("Be terse."), Message::user("Hi")]
    }

    #[test]
    fn test_context_prompt_appended_to_system() {
        let options = CallOptions::new("m").with_context_prompt("Reply in French.");
        let out = apply_options(&conversation(), &options);
        assert_eq!(out[0].content, "Be terse.\n\nReply in French.");
        assert_eq!(out[1], Message::user("Hi"));
    }

    #[test]
    fn test_context_prompt_inserts_leading_system() {
        let options = CallOptions::new("m").with_context_prompt("Reply in French.");
        let out = apply_options(&[Message::user("Hi")], &options);
        assert_eq!(
            out,
            vec![Message::system("Reply in French."), Message::user("Hi")]
        );
    }

    #[test]
    fn test_empty_context_prompt_is_ignored() {
        let options = CallOptions::new("m").with_context_prompt("");
        let input = [Message::user("Hi")];
        assert_eq!(apply_options(&input, &options), input.to_vec());
    }

    #[test]
    fn test_flags_append_in_fixed_order() {
        let options = CallOptions::new("m")
            .with_multi_agent(true)
            .with_coder_mode(true)
            .with_use_docs(true);
        let out = apply_options(&conversation(), &options);
        let expected = format!(
            "Be terse.\n\n{DOCS_INSTRUCTION}\n\n{CODER_INSTRUCTION}\n\n{MULTI_AGENT_INSTRUCTION}"
        );
        assert_eq!(out[0].content, expected);
    }

    #[test]
    fn test_flags_without_system_message_are_noops() {
        let options = CallOptions::new("m").with_coder_mode(true).with_use_docs(true);
        let input = [Message::user("Hi"), Message::assistant("Hello")];
        assert_eq!(apply_options(&input, &options), input.to_vec());
    }

    #[test]
    fn test_flags_follow_inserted_context_prompt() {
        let options = CallOptions::new("m")
            .with_context_prompt("ctx")
            .with_coder_mode(true);
        let out = apply_options(&[Message::user("Hi")], &options);
        assert_eq!(out[0].content, format!("ctx\n\n{CODER_INSTRUCTION}"));
    }

    #[test]
    fn test_only_first_system_message_is_touched() {
        let input = [
            Message::system("one"),
            Message::user("q"),
            Message::system("two"),
        ];
        let options = CallOptions::new("m").with_context_prompt("extra");
        let out = apply_options(&input, &options);
        assert_eq!(out[0].content, "one\n\nextra");
        assert_eq!(out[2].content, "two");
    }

    #[test]
    fn test_one_insertion_per_call() {
        let input = conversation();
        let options = CallOptions::new("m").with_context_prompt("Reply in French.");
        let first = apply_options(&input, &options);
        let second = apply_options(&input, &options);
        assert_eq!(first, second);
        assert_eq!(first[0].content.matches("Reply in French.").count(), 1);
        // Caller's slice is untouched.
        assert_eq!(input[0].content, "Be terse.");
    }
}
