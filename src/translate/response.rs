use super::anthropic_types::{ErrorResponse, MessagesResponse, ResponseContentBlock, Usage};
use super::openai_types::{ChatCompletionResponse, ChatErrorResponse};

/// Translate an OpenAI Chat Completion response into an Anthropic Messages response.
/// Pure function: `original_model` is what the client originally requested.
pub fn openai_to_anthropic(
    resp: &ChatCompletionResponse,
    original_model: &str,
) -> MessagesResponse {
    let mut message = MessagesResponse::empty(original_model);

    if let Some(choice) = resp.choices.first() {
        message.content.push(ResponseContentBlock::Text {
            text: choice.message.content.clone().unwrap_or_default(),
        });
        message.stop_reason = choice
            .finish_reason
            .as_deref()
            .and_then(map_finish_reason)
            .map(str::to_string);
    }

    if let Some(ref usage) = resp.usage {
        message.usage = Usage {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        };
    }

    message
}

/// Map OpenAI finish_reason to Anthropic stop_reason.
///
/// Only a natural stop has an agreed equivalent; everything else is left unset.
pub fn map_finish_reason(reason: &str) -> Option<&'static str> {
    match reason {
        "stop" => Some("end_turn"),
        _ => None,
    }
}

/// Translate an OpenAI error into an Anthropic error response
pub fn openai_error_to_anthropic(err: &ChatErrorResponse) -> ErrorResponse {
    let error_type = match err.error.error_type.as_str() {
        "invalid_request_error" => "invalid_request_error",
        "not_found_error" => "not_found_error",
        "rate_limit_error" | "rate_limit_exceeded" => "rate_limit_error",
        _ => "api_error",
    };

    ErrorResponse::new(error_type, &err.error.message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::openai_types::*;

    fn make_response(content: Option<&str>, finish_reason: Option<&str>) -> ChatCompletionResponse {
        ChatCompletionResponse {
            id: "chatcmpl-abc123".to_string(),
            model: "llama3.2:latest".to_string(),
            choices: vec![Choice {
                index: 0,
                message: ChoiceMessage {
                    role: Some("assistant".to_string()),
                    content: content.map(String::from),
                },
                finish_reason: finish_reason.map(String::from),
            }],
            usage: Some(ChatUsage {
                prompt_tokens: 10,
                completion_tokens: 20,
                total_tokens: 30,
            }),
        }
    }

    #[test]
    fn test_simple_text_response() {
        let resp = make_response(Some("Hello!"), Some("stop"));
        let result = openai_to_anthropic(&resp, "llama3.2");

        assert!(result.id.starts_with("msg_"));
        assert_eq!(result.response_type, "message");
        assert_eq!(result.role, "assistant");
        assert_eq!(result.model, "llama3.2");
        assert_eq!(result.stop_reason.as_deref(), Some("end_turn"));
        assert_eq!(
            result.content,
            vec![ResponseContentBlock::Text {
                text: "Hello!".to_string()
            }]
        );
        assert_eq!(result.usage.input_tokens, 10);
        assert_eq!(result.usage.output_tokens, 20);
    }

    #[test]
    fn test_other_finish_reasons_leave_stop_reason_unset() {
        for reason in [Some("length"), Some("tool_calls"), Some("content_filter"), None] {
            let result = openai_to_anthropic(&make_response(Some("x"), reason), "m");
            assert_eq!(result.stop_reason, None, "finish_reason {reason:?}");
        }
    }

    #[test]
    fn test_unset_stop_reason_serializes_as_null() {
        let result = openai_to_anthropic(&make_response(Some("x"), Some("length")), "m");
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.as_object().unwrap().contains_key("stop_reason"));
        assert_eq!(json["stop_reason"], serde_json::Value::Null);
    }

    #[test]
    fn test_empty_content_still_produces_a_block() {
        for content in [Some(""), None] {
            let result = openai_to_anthropic(&make_response(content, Some("stop")), "m");
            assert_eq!(
                result.content,
                vec![ResponseContentBlock::Text {
                    text: String::new()
                }]
            );
        }
    }

    #[test]
    fn test_missing_choice_yields_empty_content() {
        let resp = ChatCompletionResponse {
            choices: Vec::new(),
            usage: None,
            ..make_response(None, None)
        };
        let result = openai_to_anthropic(&resp, "m");
        assert!(result.content.is_empty());
        assert_eq!(result.stop_reason, None);
        assert_eq!(result.usage, Usage::default());
    }

    #[test]
    fn test_only_first_choice_is_used() {
        let mut resp = make_response(Some("first"), Some("stop"));
        resp.choices.push(Choice {
            index: 1,
            message: ChoiceMessage {
                role: None,
                content: Some("second".to_string()),
            },
            finish_reason: Some("length".to_string()),
        });
        let result = openai_to_anthropic(&resp, "m");
        assert_eq!(result.content.len(), 1);
        assert_eq!(
            result.content[0],
            ResponseContentBlock::Text {
                text: "first".to_string()
            }
        );
    }

    #[test]
    fn test_ids_are_fresh_per_response() {
        let resp = make_response(Some("x"), Some("stop"));
        assert_ne!(
            openai_to_anthropic(&resp, "m").id,
            openai_to_anthropic(&resp, "m").id
        );
    }

    #[test]
    fn test_finish_reason_mapping() {
        assert_eq!(map_finish_reason("stop"), Some("end_turn"));
        assert_eq!(map_finish_reason("length"), None);
        assert_eq!(map_finish_reason(""), None);
    }

    #[test]
    fn test_error_mapping() {
        let err = ChatErrorResponse {
            error: ChatError {
                message: "slow down".to_string(),
                error_type: "rate_limit_exceeded".to_string(),
            },
        };
        let mapped = openai_error_to_anthropic(&err);
        assert_eq!(mapped.error.error_type, "rate_limit_error");
        assert_eq!(mapped.error.message, "slow down");

        let err = ChatErrorResponse {
            error: ChatError {
                message: "boom".to_string(),
                error_type: String::new(),
            },
        };
        assert_eq!(openai_error_to_anthropic(&err).error.error_type, "api_error");
    }
}
