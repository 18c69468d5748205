//! Steps 4-7 of the preparer pipeline (spec.md §4.2): map messages to
//! provider-formatted turns, reconcile tool responses against expected
//! function calls, and repair alternation violations with placeholders.

use serde_json::{Map, Value};

use crate::traits::{ProviderPart, ProviderRole, ProviderTurn};
use crate::types::{Message, MessageType, Role};

#[derive(Clone, Copy, PartialEq, Eq)]
enum PrevKind {
    User,
    ModelNoFc,
    ModelFc,
    Tool,
}

/// Assemble the filtered/optimized/scratchpad-injected message list into a
/// provider-consumable sequence, repairing violations in place.
pub fn assemble(messages: &[Message]) -> (Vec<ProviderTurn>, Vec<String>) {
    let mut out: Vec<ProviderTurn> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();
    let mut pending_expected: Vec<(String, String)> = Vec::new();
    let mut prev_kind: Option<PrevKind> = None;

    for msg in messages {
        match msg.role {
            Role::User => {
                close_pending_model_fc(&mut out, &mut pending_expected, &mut warnings, &mut prev_kind);
                if prev_kind == Some(PrevKind::Tool) && pending_expected.is_empty() {
                    out.push(placeholder_model_turn());
                    warnings.push("inserted placeholder model turn after a tool response with no pending model turn".into());
                }
                if prev_kind == Some(PrevKind::User) {
                    out.push(placeholder_model_turn());
                    warnings.push("inserted placeholder model turn between consecutive user turns".into());
                }
                out.push(ProviderTurn {
                    role: ProviderRole::User,
                    parts: vec![ProviderPart::Text(msg.content.clone())],
                });
                prev_kind = Some(PrevKind::User);
            }
            Role::Assistant | Role::System => {
                if prev_kind == Some(PrevKind::ModelFc) && !pending_expected.is_empty() {
                    for (id, name) in pending_expected.drain(..) {
                        out.push(placeholder_tool_turn(&id, &name));
                    }
                    warnings.push(
                        "inserted placeholder tool responses before the next model turn".into(),
                    );
                    // Mirrors the source behavior: the triggering model message
                    // itself is dropped rather than emitted after the placeholders.
                    prev_kind = Some(PrevKind::Tool);
                    continue;
                }
                if prev_kind == Some(PrevKind::ModelNoFc) && !msg.is_internal {
                    warnings.push(
                        "consecutive model turns with no function call and no internal tag"
                            .into(),
                    );
                }

                let content = wrapped_content(msg);
                let mut parts = Vec::new();
                if !content.is_empty() {
                    parts.push(ProviderPart::Text(content));
                }
                let mut has_fc = false;
                if let Some(calls) = &msg.tool_calls {
                    for call in calls {
                        has_fc = true;
                        let args = parse_call_args(&call.arguments);
                        parts.push(ProviderPart::FunctionCall {
                            id: call.id.clone(),
                            name: call.name.clone(),
                            args,
                        });
                        pending_expected.push((call.id.clone(), call.name.clone()));
                    }
                }
                out.push(ProviderTurn {
                    role: ProviderRole::Model,
                    parts,
                });
                prev_kind = Some(if has_fc {
                    PrevKind::ModelFc
                } else {
                    PrevKind::ModelNoFc
                });
            }
            Role::Tool => {
                if prev_kind == Some(PrevKind::Tool) && pending_expected.is_empty() {
                    out.push(placeholder_model_turn());
                    warnings
                        .push("inserted placeholder model turn between consecutive tool turns".into());
                    prev_kind = Some(PrevKind::ModelNoFc);
                }
                match resolve_tool_id(msg.tool_call_id.as_deref(), msg.name.as_deref(), &pending_expected, &mut warnings) {
                    None => {
                        warnings.push(format!(
                            "dropped tool message with no matching expected call (id={:?})",
                            msg.tool_call_id
                        ));
                        continue;
                    }
                    Some((id, name)) => {
                        pending_expected.retain(|(eid, _)| eid != &id);
                        let response = parse_tool_content(&msg.content);
                        out.push(ProviderTurn {
                            role: ProviderRole::Tool,
                            parts: vec![ProviderPart::FunctionResponse { id, name, response }],
                        });
                        prev_kind = Some(PrevKind::Tool);
                    }
                }
            }
        }
    }

    // Step 7: final check — unresolved trailing function calls are kept, just warned about.
    if !pending_expected.is_empty() {
        warnings.push(format!(
            "sequence ends with {} unresolved function call(s); kept as pending state",
            pending_expected.len()
        ));
    }

    (out, warnings)
}

fn close_pending_model_fc(
    out: &mut Vec<ProviderTurn>,
    pending_expected: &mut Vec<(String, String)>,
    warnings: &mut Vec<String>,
    prev_kind: &mut Option<PrevKind>,
) {
    if pending_expected.is_empty() {
        return;
    }
    for (id, name) in pending_expected.drain(..) {
        out.push(placeholder_tool_turn(&id, &name));
    }
    warnings.push("inserted placeholder tool responses before a user turn".into());
    *prev_kind = Some(PrevKind::Tool);
}

fn placeholder_tool_turn(id: &str, name: &str) -> ProviderTurn {
    ProviderTurn {
        role: ProviderRole::Tool,
        parts: vec![ProviderPart::FunctionResponse {
            id: id.to_string(),
            name: name.to_string(),
            response: serde_json::json!({ "result": format!("[No tool result was provided for {name}]") }),
        }],
    }
}

fn placeholder_model_turn() -> ProviderTurn {
    ProviderTurn {
        role: ProviderRole::Model,
        parts: vec![ProviderPart::Text(String::new())],
    }
}

fn wrapped_content(msg: &Message) -> String {
    if !msg.is_internal {
        return msg.content.clone();
    }
    match &msg.message_type {
        Some(MessageType::Thought) => format!("[THOUGHT] {}", msg.content),
        Some(MessageType::Reflection) => format!("[REFLECTION] {}", msg.content),
        Some(MessageType::Plan) => format!("[PLAN] {}", msg.content),
        Some(MessageType::WorkflowStage) => format!("[WORKFLOW] {}", msg.content),
        Some(MessageType::ContextSummary) => format!("===== MEMORY CONTEXT =====\n{}", msg.content),
        Some(MessageType::Other(_)) | None => msg.content.clone(),
    }
}

/// Parse a serialized `ToolCallRequest.arguments` string into a provider
/// args map (spec.md §4.2 step 4).
fn parse_call_args(raw: &str) -> Map<String, Value> {
    if raw.trim().is_empty() {
        return Map::new();
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        Ok(Value::Null) => Map::new(),
        Ok(other) => {
            let mut m = Map::new();
            m.insert("value".to_string(), other);
            m
        }
        Err(_) => {
            let mut m = Map::new();
            m.insert("raw".to_string(), Value::String(raw.to_string()));
            m
        }
    }
}

/// Parse a tool message's `content` into a function-response payload
/// (spec.md §4.2 step 5, §8 boundary behaviors).
fn parse_tool_content(content: &str) -> Value {
    if content.trim().is_empty() {
        return serde_json::json!({ "result": "Tool returned empty content." });
    }
    match serde_json::from_str::<Value>(content) {
        Ok(Value::Null) => serde_json::json!({ "result": "Tool returned no content." }),
        Ok(v) => v,
        Err(_) => serde_json::json!({ "result": content }),
    }
}

/// Resolve a tool message's `(id, name)` against pending expected calls
/// (spec.md §4.2 step 5).
fn resolve_tool_id(
    id: Option<&str>,
    name: Option<&str>,
    pending: &[(String, String)],
    warnings: &mut Vec<String>,
) -> Option<(String, String)> {
    match id {
        Some(id) => {
            let expected = pending.iter().find(|(eid, _)| eid == id)?;
            if expected.1 != name.unwrap_or_default() {
                warnings.push(format!(
                    "repaired tool message name for id {id}: {:?} -> {}",
                    name, expected.1
                ));
            }
            Some((expected.0.clone(), expected.1.clone()))
        }
        None => {
            if pending.len() == 1 {
                Some(pending[0].clone())
            } else {
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Timestamp, ToolCallRequest};

    #[test]
    fn simple_user_model_pair() {
        let messages = vec![
            Message::user("hi", Timestamp(1)),
            Message::assistant("hello", Timestamp(2)),
        ];
        let (turns, warnings) = assemble(&messages);
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, ProviderRole::User);
        assert_eq!(turns[1].role, ProviderRole::Model);
        assert!(warnings.is_empty());
    }

    #[test]
    fn model_with_fc_inserts_tool_turns() {
        let messages = vec![
            Message::user("list repos", Timestamp(1)),
            Message::assistant_with_tool_calls(
                "",
                vec![ToolCallRequest {
                    id: "c1".into(),
                    name: "repo-list".into(),
                    arguments: "{}".into(),
                }],
                Timestamp(2),
            ),
            Message::tool_result("c1", "repo-list", r#"{"ok":true}"#, false, Timestamp(3)),
            Message::assistant("done", Timestamp(4)),
        ];
        let (turns, warnings) = assemble(&messages);
        assert_eq!(turns.len(), 4);
        assert_eq!(turns[2].role, ProviderRole::Tool);
        assert!(warnings.is_empty());
    }

    #[test]
    fn missing_tool_response_gets_placeholder() {
        let messages = vec![
            Message::user("list repos", Timestamp(1)),
            Message::assistant_with_tool_calls(
                "",
                vec![ToolCallRequest {
                    id: "c1".into(),
                    name: "repo-list".into(),
                    arguments: "{}".into(),
                }],
                Timestamp(2),
            ),
            Message::user("nevermind", Timestamp(3)),
        ];
        let (turns, warnings) = assemble(&messages);
        // user, model(fc), placeholder-tool, placeholder-model, user
        assert_eq!(turns.len(), 5);
        assert_eq!(turns[2].role, ProviderRole::Tool);
        assert_eq!(turns[3].role, ProviderRole::Model);
        assert!(!warnings.is_empty());
    }

    #[test]
    fn consecutive_user_turns_get_placeholder_model() {
        let messages = vec![
            Message::user("hi", Timestamp(1)),
            Message::user("are you there?", Timestamp(2)),
        ];
        let (turns, warnings) = assemble(&messages);
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0].role, ProviderRole::User);
        assert_eq!(turns[1].role, ProviderRole::Model);
        assert_eq!(turns[2].role, ProviderRole::User);
        assert!(warnings.iter().any(|w| w.contains("consecutive user turns")));
    }

    #[test]
    fn tool_message_with_unknown_id_is_dropped() {
        let messages = vec![Message::tool_result("ghost", "repo-list", "{}", false, Timestamp(1))];
        let (turns, warnings) = assemble(&messages);
        assert!(turns.is_empty());
        assert!(warnings.iter().any(|w| w.contains("dropped")));
    }

    #[test]
    fn tool_message_missing_id_inferred_when_single_pending() {
        let messages = vec![
            Message::assistant_with_tool_calls(
                "",
                vec![ToolCallRequest {
                    id: "c1".into(),
                    name: "repo-list".into(),
                    arguments: "{}".into(),
                }],
                Timestamp(1),
            ),
            Message::tool_result("", "repo-list", "{}", false, Timestamp(2)).tap_clear_id(),
        ];
        let (turns, _warnings) = assemble(&messages);
        assert_eq!(turns.len(), 2);
        if let ProviderPart::FunctionResponse { id, .. } = &turns[1].parts[0] {
            assert_eq!(id, "c1");
        } else {
            panic!("expected function response");
        }
    }

    trait TapClearId {
        fn tap_clear_id(self) -> Self;
    }
    impl TapClearId for Message {
        fn tap_clear_id(mut self) -> Self {
            self.tool_call_id = None;
            self
        }
    }
}
