//! Prompt text shared by the answer and decision backends.

use ps_domain::context::PreviousContext;

use crate::traits::AnswerRequest;

/// System message for chat-style backends.
pub const SYSTEM_PROMPT: &str = "You are a concise search assistant.";

/// Single-string prompt for CLI backends that take no message list.
pub fn answer_prompt(req: &AnswerRequest) -> String {
    let mut lines = vec!["You are a concise search assistant. Answer the user query in Korean.".to_owned()];
    if let Some(ref previous) = req.previous {
        lines.push(previous.prompt_line());
    }
    lines.push(format!("User query: {}", req.query));
    if !req.user_id.is_empty() {
        lines.push(format!("User id: {}", req.user_id));
    }
    lines.join("\n")
}

/// Chat messages (`role`/`content` objects) for OpenAI-style backends.
pub fn answer_messages(req: &AnswerRequest) -> Vec<serde_json::Value> {
    let mut messages = vec![serde_json::json!({"role": "system", "content": SYSTEM_PROMPT})];
    if let Some(previous) = req.previous.as_ref().map(PreviousContext::prompt_line) {
        messages.push(serde_json::json!({"role": "system", "content": previous}));
    }
    messages.push(serde_json::json!({"role": "user", "content": req.query}));
    messages
}

/// Prompt asking a delegate whether to call the wiki search tool.
pub fn decision_prompt(query: &str, user_id: Option<&str>) -> String {
    let mut lines = vec![
        "너는 검색 도구 호출 여부를 결정하는 에이전트다.".to_owned(),
        "사용자 질의를 읽고 위키 검색 도구를 호출할지 판단해라.".to_owned(),
        "응답은 반드시 JSON으로만 출력한다.".to_owned(),
        r#"형식: {"shouldCallTool": true|false, "keyword": "검색어"}"#.to_owned(),
        "keyword는 1개의 한국어 검색어 또는 짧은 구로만 작성하라.".to_owned(),
        format!("Query: {query}"),
    ];
    if let Some(user_id) = user_id.filter(|u| !u.is_empty()) {
        lines.push(format!("UserId: {user_id}"));
    }
    lines.join("\n")
}
