//! Agent loop behaviour tests
//!
//! Drives full runs against a scripted completion client and checks the
//! event stream, the returned history and the upstream calls made.

use futures::StreamExt;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

use stepwise::agent::{
    AgentLoop, Phase, SynthesisMode, TerminationPolicy, JUDGMENT_SCHEMA, RESPONSE_SCHEMA,
    SCORE_SCHEMA,
};
use stepwise::core::{Event, EventKind, EventPayload, Message, Role, StepwiseError};
use stepwise::llm::{CallKind, ScriptedClient};
use stepwise::tools::{builtin::math_tools, ToolRegistry, SELECTION_SCHEMA};

fn math_loop(client: &Arc<ScriptedClient>, max_steps: usize) -> AgentLoop {
    AgentLoop::builder(client.clone())
        .registry(ToolRegistry::new(math_tools()).unwrap())
        .max_steps(max_steps)
        .build()
        .unwrap()
}

fn kinds(events: &[Event]) -> Vec<EventKind> {
    events.iter().map(Event::kind).collect()
}

fn count(events: &[Event], kind: EventKind) -> usize {
    events.iter().filter(|e| e.kind() == kind).count()
}

fn no_tools() -> serde_json::Value {
    json!({"tool_calls": []})
}

#[tokio::test]
async fn test_add_then_multiply_scenario() {
    let client = Arc::new(ScriptedClient::new());
    client
        .push_value(
            SELECTION_SCHEMA,
            json!({"tool_calls": [{"tool": "add", "arguments": {"a": 2, "b": 3}}]}),
        )
        .push_stream(["2 + 3 = 5. ", "Next I multiply 5 by 4."])
        .push_value(JUDGMENT_SCHEMA, json!({"is_final": false}))
        .push_value(
            SELECTION_SCHEMA,
            json!({"tool_calls": [{"tool": "multiply", "arguments": {"a": 5, "b": 4}}]}),
        )
        .push_stream(["5 × 4 = ", "20."])
        .push_value(JUDGMENT_SCHEMA, json!({"is_final": true}));

    let outcome = math_loop(&client, 3)
        .run_to_completion(vec![Message::user("What is 2+3 then multiply by 4?")])
        .await
        .unwrap();

    let step = [
        EventKind::ToolCall,
        EventKind::ToolOutput,
        EventKind::MessageStream,
        EventKind::MessageStream,
        EventKind::Message,
        EventKind::Evaluation,
    ];
    assert_eq!(kinds(&outcome.events), [step, step].concat());

    let outputs: Vec<(usize, &str, &str)> = outcome
        .events
        .iter()
        .filter_map(|e| match &e.payload {
            EventPayload::ToolOutput(o) => Some((e.step, o.name.as_str(), o.output.as_str())),
            _ => None,
        })
        .collect();
    assert_eq!(outputs, vec![(1, "add", "5"), (2, "multiply", "20")]);

    assert_eq!(outcome.steps, 2);
    assert!(outcome.final_message.contains("20"));

    let history: Vec<&str> = outcome.messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(
        history,
        vec![
            "What is 2+3 then multiply by 4?",
            "I will call these tools:\nadd({\"a\":2,\"b\":3})",
            "5",
            "2 + 3 = 5. Next I multiply 5 by 4.",
            "I will call these tools:\nmultiply({\"a\":5,\"b\":4})",
            "20",
            "5 × 4 = 20.",
        ]
    );
    assert!(outcome.messages[1..].iter().all(|m| m.role == Role::Assistant));
}

#[tokio::test]
async fn test_bounded_termination() {
    let client = Arc::new(ScriptedClient::new());
    client
        .fallback_value(SELECTION_SCHEMA, no_tools())
        .fallback_value(JUDGMENT_SCHEMA, json!({"is_final": false}))
        .push_reply("one")
        .push_reply("two")
        .push_reply("three")
        .push_reply("never used");

    let outcome = math_loop(&client, 3)
        .run_to_completion(vec![Message::user("Keep going")])
        .await
        .unwrap();

    assert_eq!(outcome.steps, 3);
    assert_eq!(count(&outcome.events, EventKind::Message), 3);
    assert_eq!(outcome.final_message, "three");

    // No evaluation on the last permitted step
    let evaluated_steps: Vec<usize> = outcome
        .events
        .iter()
        .filter(|e| e.kind() == EventKind::Evaluation)
        .map(|e| e.step)
        .collect();
    assert_eq!(evaluated_steps, vec![1, 2]);
    assert_eq!(client.extractions_of(JUDGMENT_SCHEMA), 2);
    assert_eq!(client.extractions_of(SELECTION_SCHEMA), 3);
}

#[tokio::test]
async fn test_early_termination() {
    let client = Arc::new(ScriptedClient::new());
    client
        .push_value(SELECTION_SCHEMA, no_tools())
        .push_reply("Paris is the capital of France.")
        .push_value(JUDGMENT_SCHEMA, json!({"is_final": true}));

    let outcome = math_loop(&client, 5)
        .run_to_completion(vec![Message::user("Capital of France?")])
        .await
        .unwrap();

    assert_eq!(outcome.steps, 1);
    assert!(outcome.events.iter().all(|e| e.step == 1));
    assert_eq!(client.extractions_of(SELECTION_SCHEMA), 1);
    assert_eq!(client.count(&CallKind::Stream), 1);
}

#[tokio::test]
async fn test_zero_tool_path_still_synthesizes() {
    let client = Arc::new(ScriptedClient::new());
    client
        .push_value(SELECTION_SCHEMA, no_tools())
        .push_stream(["Hello", " there"]);

    let outcome = math_loop(&client, 1)
        .run_to_completion(vec![Message::user("Hi")])
        .await
        .unwrap();

    assert_eq!(count(&outcome.events, EventKind::ToolCall), 0);
    assert_eq!(count(&outcome.events, EventKind::ToolOutput), 0);
    assert_eq!(outcome.final_message, "Hello there");

    // History untouched by selection and execution
    assert_eq!(outcome.messages.len(), 2);

    // The synthesizer saw exactly the seed history
    let stream_call = client
        .calls()
        .into_iter()
        .find(|c| c.kind == CallKind::Stream)
        .unwrap();
    assert_eq!(stream_call.messages, vec![Message::user("Hi")]);
}

#[tokio::test]
async fn test_stream_fragments_concatenate_to_message() {
    let client = Arc::new(ScriptedClient::new());
    client
        .fallback_value(SELECTION_SCHEMA, no_tools())
        .fallback_value(JUDGMENT_SCHEMA, json!({"is_final": false}))
        .push_stream(["a", "b", "c"])
        .push_stream(["d", "", "ef"]);

    let outcome = math_loop(&client, 2)
        .run_to_completion(vec![Message::user("letters")])
        .await
        .unwrap();

    let mut streamed: HashMap<&str, String> = HashMap::new();
    let mut messages = Vec::new();
    for event in &outcome.events {
        match &event.payload {
            EventPayload::MessageStream(fragment) => {
                assert!(!fragment.is_empty());
                streamed.entry(event.id.as_str()).or_default().push_str(fragment);
            }
            EventPayload::Message(text) => {
                assert_eq!(streamed.get(event.id.as_str()), Some(text));
                messages.push(text.clone());
            }
            _ => {}
        }
    }

    assert_eq!(messages, vec!["abc", "def"]);
    assert_eq!(streamed.len(), 2);
}

#[tokio::test]
async fn test_structured_synthesis_streams_response_field() {
    let client = Arc::new(ScriptedClient::new());
    client
        .push_value(SELECTION_SCHEMA, no_tools())
        .push_value(RESPONSE_SCHEMA, json!({"response": "Structured answers stream too."}));

    let agent_loop = AgentLoop::builder(client.clone())
        .registry(ToolRegistry::new(math_tools()).unwrap())
        .synthesis(SynthesisMode::Structured)
        .max_steps(1)
        .build()
        .unwrap();

    let outcome = agent_loop
        .run_to_completion(vec![Message::user("Say something")])
        .await
        .unwrap();

    assert!(count(&outcome.events, EventKind::MessageStream) > 1);
    assert_eq!(outcome.final_message, "Structured answers stream too.");
    assert_eq!(client.count(&CallKind::ExtractStream(RESPONSE_SCHEMA.to_string())), 1);
}

#[tokio::test]
async fn test_empty_registry_is_pure_chat() {
    let client = Arc::new(ScriptedClient::new());
    client
        .fallback_value(JUDGMENT_SCHEMA, json!({"is_final": false}))
        .push_reply("first")
        .push_reply("second");

    let agent_loop = AgentLoop::builder(client.clone()).max_steps(2).build().unwrap();
    let outcome = agent_loop
        .run_to_completion(vec![Message::user("Chat with me")])
        .await
        .unwrap();

    assert_eq!(
        kinds(&outcome.events),
        vec![
            EventKind::MessageStream,
            EventKind::Message,
            EventKind::Evaluation,
            EventKind::MessageStream,
            EventKind::Message,
        ]
    );
    assert_eq!(client.extractions_of(SELECTION_SCHEMA), 0);
}

#[tokio::test]
async fn test_failing_tool_does_not_abort_the_step() {
    let client = Arc::new(ScriptedClient::new());
    client
        .push_value(
            SELECTION_SCHEMA,
            json!({"tool_calls": [
                {"tool": "divide", "arguments": {"a": 1, "b": 0}},
                {"tool": "add", "arguments": {"a": 1, "b": 1}}
            ]}),
        )
        .push_reply("Division by zero is undefined; 1 + 1 is 2.");

    let outcome = math_loop(&client, 1)
        .run_to_completion(vec![Message::user("1/0 and 1+1?")])
        .await
        .unwrap();

    let outputs: Vec<_> = outcome
        .events
        .iter()
        .filter_map(|e| match &e.payload {
            EventPayload::ToolOutput(o) => Some(o.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(outputs.len(), 2);
    assert!(outputs[0].failed);
    assert!(!outputs[1].failed);

    // The synthesizer saw the error text
    assert_eq!(
        outcome.messages[2].content,
        "Tool execution error: division by zero\n2"
    );
}

#[tokio::test]
async fn test_selection_failure_reports_phase_and_step() {
    let client = Arc::new(ScriptedClient::new());
    client
        .push_value(SELECTION_SCHEMA, no_tools())
        .push_reply("step one")
        .push_value(JUDGMENT_SCHEMA, json!({"is_final": false}))
        .fail_value(SELECTION_SCHEMA, "model answered with prose");

    let mut run = math_loop(&client, 3).run(vec![Message::user("Go")]);
    let mut events = Vec::new();
    let mut failure = None;
    while let Some(item) = run.next().await {
        match item {
            Ok(event) => events.push(event),
            Err(e) => failure = Some(e),
        }
    }

    let err = failure.expect("run should fail");
    assert_eq!(err.location(), Some((Phase::Selecting, 2)));
    assert!(matches!(err.root(), StepwiseError::Extraction { .. }));
    assert_eq!(count(&events, EventKind::Message), 1);

    // History accumulated before the failure is handed back
    let history = run.finish().await.unwrap();
    let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["Go", "step one"]);
}

#[tokio::test]
async fn test_synthesis_and_evaluation_failures() {
    let client = Arc::new(ScriptedClient::new());
    client
        .push_value(SELECTION_SCHEMA, no_tools())
        .fail_reply("connection refused");

    let err = math_loop(&client, 2)
        .run_to_completion(vec![Message::user("Go")])
        .await
        .unwrap_err();
    assert_eq!(err.location(), Some((Phase::Synthesizing, 1)));
    assert!(err.to_string().contains("connection refused"));

    let client = Arc::new(ScriptedClient::new());
    client
        .push_value(SELECTION_SCHEMA, no_tools())
        .push_reply("answer");

    let err = math_loop(&client, 2)
        .run_to_completion(vec![Message::user("Go")])
        .await
        .unwrap_err();
    assert_eq!(err.location(), Some((Phase::Evaluating, 1)));
}

#[tokio::test]
async fn test_score_threshold_policy() {
    let client = Arc::new(ScriptedClient::new());
    client
        .fallback_value(SELECTION_SCHEMA, no_tools())
        .push_reply("draft")
        .push_value(SCORE_SCHEMA, json!({"score": 2}))
        .push_reply("better")
        .push_value(SCORE_SCHEMA, json!({"score": 4}));

    let agent_loop = AgentLoop::builder(client.clone())
        .registry(ToolRegistry::new(math_tools()).unwrap())
        .termination(TerminationPolicy::ScoreThreshold { min_score: 3 })
        .max_steps(5)
        .build()
        .unwrap();

    let outcome = agent_loop
        .run_to_completion(vec![Message::user("Explain")])
        .await
        .unwrap();

    let scores: Vec<Option<u8>> = outcome
        .events
        .iter()
        .filter_map(|e| match &e.payload {
            EventPayload::Evaluation(evaluation) => Some(evaluation.score),
            _ => None,
        })
        .collect();
    assert_eq!(scores, vec![Some(2), Some(4)]);
    assert_eq!(outcome.steps, 2);
    assert_eq!(outcome.final_message, "better");
}

#[tokio::test]
async fn test_dropping_the_run_stops_it() {
    let client = Arc::new(ScriptedClient::new());
    client
        .fallback_value(SELECTION_SCHEMA, json!({"tool_calls": [
            {"tool": "add", "arguments": {"a": 1, "b": 2}}
        ]}))
        .push_reply("unused");

    let mut run = math_loop(&client, 3).run(vec![Message::user("Go")]);
    let first = run.next().await.unwrap().unwrap();
    assert_eq!(first.kind(), EventKind::ToolCall);
    drop(run);

    // Only the selection was requested
    assert_eq!(client.calls().len(), 1);
}

#[tokio::test]
async fn test_events_serialize_with_type_and_content() {
    let client = Arc::new(ScriptedClient::new());
    client
        .push_value(
            SELECTION_SCHEMA,
            json!({"tool_calls": [{"tool": "multiply", "arguments": {"a": 5, "b": 4}}]}),
        )
        .push_reply("20");

    let outcome = math_loop(&client, 1)
        .run_to_completion(vec![Message::user("5*4")])
        .await
        .unwrap();

    let value = serde_json::to_value(&outcome.events[1]).unwrap();
    assert_eq!(value["type"], "tool_output");
    assert_eq!(value["step"], 1);
    assert_eq!(value["content"]["output"], "20");
    assert_eq!(value["content"]["failed"], false);
    assert!(!value["id"].as_str().unwrap().is_empty());
}
