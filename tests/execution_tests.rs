//! Integration tests for workflow execution
//!
//! These tests drive complete workflows against scripted backends and check
//! the resulting transcripts, completion requests and reports.

mod common;

use std::sync::Arc;

use mockall::mock;

use common::mocks::{MockExecutor, MockLLMClient, MockSnippetDatabase};
use common::{mock_backends, program};
use statechat::frontend::Frontend;
use statechat::interpolation::{NO_EXTRACTS_FOUND, NO_PYTHON_BLOCK};
use statechat::memory::{PruningPolicy, PruningTrigger};
use statechat::tools::ScriptOutcome;
use statechat::types::{Message, MessageRole, Snippet};
use statechat::workflows::{AgentStatus, Backends, Phase, RunnerOptions, WorkflowRunner};

mock! {
    pub Presenter {}

    impl Frontend for Presenter {
        fn handle_rtfm_output(&self, agent: &str, snippets: &[Snippet]) -> u64;
        fn handle_message(&self, agent: &str, message: &Message);
    }
}

const MINIMAL_YAML: &str = r#"
agents:
-   name: agent1
    states:
    -   name: initial
        action:
        -   goto: some_state
    -   name: some_state
        conditions:
        -   default:
                action:
                -   end
"#;

const SIMPLE_PYTHON_YAML: &str = r#"
agents:
-   name: agent1
    states:
    -   name: initial
        action:
        -   goto: some_state
    -   name: some_state
        conditions:
        -   default:
                action:
                -   message: "The Python output is:\n\n{python()}\n\nEnd of Python output."
                -   end
"#;

const SIMPLE_RTFM_YAML: &str = r#"
agents:
-   name: agent1
    states:
    -   name: initial
        action:
        -   system_message: "Here are your instructions."
        -   goto: some_state
    -   name: some_state
        conditions:
        -   default:
                action:
                -   message: "The RTFM output is:\n\n{rtfm()}\n\nEnd of RTFM output."
                -   end
"#;

const PYTHON_REPLY: &str = "Let's execute some Python.\n\n$$$python\nprint(f\"Hello, world! 1+1={1+1}\")\n$$$\n\nHow does that look?";

const RTFM_REPLY: &str = "Let's execute some RTFM.\n\n$$$rtfm\nSomething here.\n$$$\n\nHow does that look?";

fn texts(messages: &[Message]) -> Vec<&str> {
    messages.iter().map(|m| m.text.as_str()).collect()
}

fn session_texts(runner: &WorkflowRunner, agent: usize) -> Vec<String> {
    runner.agent_runners()[agent]
        .session()
        .messages()
        .map(|m| m.text.clone())
        .collect()
}

fn strip_frame<'a>(text: &'a str, prefix: &str, suffix: &str) -> &'a str {
    assert!(text.starts_with(prefix), "unexpected start: {:?}", text);
    assert!(text.ends_with(suffix), "unexpected end: {:?}", text);
    &text[prefix.len()..text.len() - suffix.len()]
}

fn python_backends(llm: Arc<MockLLMClient>, executor: MockExecutor) -> Backends {
    Backends {
        llm,
        executor: Arc::new(executor),
        ..mock_backends(MockLLMClient::new(""))
    }
}

#[tokio::test]
async fn test_minimal_workflow_terminates_silently() {
    let llm = Arc::new(MockLLMClient::new("Hello, world from chat completion!"));
    let backends = Backends {
        llm: llm.clone(),
        ..mock_backends(MockLLMClient::new(""))
    };
    let mut runner = WorkflowRunner::new(program(MINIMAL_YAML), backends, RunnerOptions::default())
        .unwrap();

    let report = runner.run().await;

    assert!(report.all_terminated());
    assert_eq!(report.agents[0].final_state, "some_state");
    assert_eq!(report.agents[0].messages, 0);
    assert_eq!(llm.request_count(), 0);
    assert_eq!(runner.agent_runners()[0].phase(), Phase::Terminated);
}

#[tokio::test]
async fn test_python_output_is_interpolated() {
    let llm = Arc::new(MockLLMClient::new(PYTHON_REPLY).with_ttl(Some(1)));
    let executor = MockExecutor::new(ScriptOutcome::Completed {
        stdout: "Hello, world! 1+1=2\n".to_string(),
    });
    let mut runner = WorkflowRunner::new(
        program(SIMPLE_PYTHON_YAML),
        python_backends(llm.clone(), executor),
        RunnerOptions::default(),
    )
    .unwrap();

    let report = runner.run().await;
    assert!(report.all_terminated());
    assert_eq!(llm.request_count(), 1);

    let session = runner.agent_runners()[0].session();
    assert_eq!(session.len(), 2);
    let last = session.last().unwrap();
    assert_eq!(last.role, MessageRole::User);
    assert_eq!(
        last.text,
        "The Python output is:\n\nHello, world! 1+1=2\n\nEnd of Python output."
    );
}

#[tokio::test]
async fn test_python_source_reaches_executor() {
    let llm = Arc::new(MockLLMClient::new(PYTHON_REPLY));
    let executor = Arc::new(MockExecutor::default());
    let backends = Backends {
        llm,
        executor: executor.clone(),
        ..mock_backends(MockLLMClient::new(""))
    };
    let mut runner =
        WorkflowRunner::new(program(SIMPLE_PYTHON_YAML), backends, RunnerOptions::default())
            .unwrap();

    runner.run().await;
    assert_eq!(
        executor.sources(),
        vec!["print(f\"Hello, world! 1+1={1+1}\")".to_string()]
    );
}

#[tokio::test]
async fn test_no_python_block() {
    let llm = Arc::new(MockLLMClient::new(
        "Let's execute some Python.\n\nHow does that look?",
    ));
    let executor = Arc::new(MockExecutor::default());
    let backends = Backends {
        llm,
        executor: executor.clone(),
        ..mock_backends(MockLLMClient::new(""))
    };
    let mut runner =
        WorkflowRunner::new(program(SIMPLE_PYTHON_YAML), backends, RunnerOptions::default())
            .unwrap();

    let report = runner.run().await;
    assert!(report.all_terminated());
    assert!(executor.sources().is_empty());

    let texts = session_texts(&runner, 0);
    assert_eq!(texts.len(), 2);
    let body = strip_frame(
        &texts[1],
        "The Python output is:\n\n",
        "\n\nEnd of Python output.",
    );
    assert!(body.starts_with(NO_PYTHON_BLOCK));
}

#[tokio::test]
async fn test_unterminated_python_block() {
    let llm = Arc::new(MockLLMClient::new(
        "Let's execute some Python.\n\n$$$python\nprint(\"foo\")\n\nHow does that look?",
    ));
    let mut runner = WorkflowRunner::new(
        program(SIMPLE_PYTHON_YAML),
        python_backends(llm, MockExecutor::default()),
        RunnerOptions::default(),
    )
    .unwrap();

    runner.run().await;

    let texts = session_texts(&runner, 0);
    assert_eq!(texts.len(), 2);
    let body = strip_frame(
        &texts[1],
        "The Python output is:\n\n",
        "\n\nEnd of Python output.",
    );
    assert!(body.starts_with(NO_PYTHON_BLOCK));
}

#[tokio::test]
async fn test_failing_script_is_reported_to_the_model() {
    let llm = Arc::new(MockLLMClient::new(PYTHON_REPLY));
    let executor = MockExecutor::new(ScriptOutcome::Failed {
        stdout: String::new(),
        stderr: "NameError: name 'x' is not defined".to_string(),
        exit_code: Some(1),
    });
    let mut runner = WorkflowRunner::new(
        program(SIMPLE_PYTHON_YAML),
        python_backends(llm, executor),
        RunnerOptions::default(),
    )
    .unwrap();

    let report = runner.run().await;
    assert!(report.all_terminated());

    let texts = session_texts(&runner, 0);
    assert!(texts[1].contains("exit status 1"));
    assert!(texts[1].contains("NameError"));
}

#[tokio::test]
async fn test_rtfm_extracts_use_frontend_numbering() {
    let llm = Arc::new(MockLLMClient::new(RTFM_REPLY).with_ttl(Some(1)));
    let snippets = Arc::new(MockSnippetDatabase::new(vec![
        Snippet::new("hello, world", "source1", 0),
        Snippet::new("goodbye, cruel world", "source2", 10).with_pages(10, 10),
    ]));

    let mut frontend = MockPresenter::new();
    frontend
        .expect_handle_rtfm_output()
        .withf(|agent, snippets| agent == "agent1" && snippets.len() == 2)
        .times(1)
        .returning(|_, _| 123);
    frontend.expect_handle_message().times(3).return_const(());

    let backends = Backends {
        llm,
        snippets: snippets.clone(),
        executor: Arc::new(MockExecutor::default()),
        frontend: Arc::new(frontend),
    };
    let mut runner =
        WorkflowRunner::new(program(SIMPLE_RTFM_YAML), backends, RunnerOptions::default())
            .unwrap();

    let report = runner.run().await;
    assert!(report.all_terminated());
    assert_eq!(snippets.queries(), vec![("Something here.".to_string(), 5)]);

    let texts = session_texts(&runner, 0);
    assert_eq!(texts.len(), 3);
    assert_eq!(texts[0], "Here are your instructions.");
    let body = strip_frame(&texts[2], "The RTFM output is:\n\n", "\n\nEnd of RTFM output.");
    assert_eq!(
        body,
        "Extract #123:\n\nhello, world\n-----\nExtract #124:\n\ngoodbye, cruel world"
    );
}

#[tokio::test]
async fn test_rtfm_with_no_results() {
    let mut frontend = MockPresenter::new();
    frontend.expect_handle_rtfm_output().never();
    frontend.expect_handle_message().return_const(());

    let backends = Backends {
        llm: Arc::new(MockLLMClient::new(RTFM_REPLY)),
        snippets: Arc::new(MockSnippetDatabase::empty()),
        executor: Arc::new(MockExecutor::default()),
        frontend: Arc::new(frontend),
    };
    let mut runner =
        WorkflowRunner::new(program(SIMPLE_RTFM_YAML), backends, RunnerOptions::default())
            .unwrap();

    runner.run().await;
    let texts = session_texts(&runner, 0);
    let body = strip_frame(&texts[2], "The RTFM output is:\n\n", "\n\nEnd of RTFM output.");
    assert_eq!(body, NO_EXTRACTS_FOUND);
}

#[tokio::test]
async fn test_first_request_sees_system_message() {
    let llm = Arc::new(MockLLMClient::new(RTFM_REPLY));
    let backends = Backends {
        llm: llm.clone(),
        snippets: Arc::new(MockSnippetDatabase::new(vec![Snippet::new("x", "s", 0)])),
        ..mock_backends(MockLLMClient::new(""))
    };
    let mut runner =
        WorkflowRunner::new(program(SIMPLE_RTFM_YAML), backends, RunnerOptions::default())
            .unwrap();

    runner.run().await;

    let requests = llm.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(texts(&requests[0].messages), vec!["Here are your instructions."]);
    assert_eq!(requests[0].messages[0].role, MessageRole::System);
    assert_eq!(requests[0].model, None);
}

const LOOP_YAML: &str = r#"
agents:
-   name: agent1
    states:
    -   name: ask
        model: gpt-4o
        action:
        -   message: "Say yes."
        conditions:
        -   if:
                contains: "yes"
                action:
                -   message: "Great."
                -   end
        -   default:
                action:
                -   message: "Try again."
"#;

#[tokio::test]
async fn test_staying_in_a_state_asks_again() {
    let llm = Arc::new(MockLLMClient::scripted(&["no", "still no", "yes"]));
    let backends = Backends {
        llm: llm.clone(),
        ..mock_backends(MockLLMClient::new(""))
    };
    let mut runner =
        WorkflowRunner::new(program(LOOP_YAML), backends, RunnerOptions::default()).unwrap();

    let report = runner.run().await;
    assert!(report.all_terminated());
    assert_eq!(report.agents[0].turns, 3);

    assert_eq!(
        session_texts(&runner, 0),
        vec!["Say yes.", "no", "Try again.", "still no", "Try again.", "yes", "Great."]
    );

    let requests = llm.requests();
    assert_eq!(requests.len(), 3);
    assert!(requests
        .iter()
        .all(|request| request.model.as_deref() == Some("gpt-4o")));
    assert_eq!(texts(&requests[1].messages), vec!["Say yes.", "no", "Try again."]);
}

#[tokio::test]
async fn test_regex_condition() {
    let yaml = r#"
agents:
-   name: agent1
    states:
    -   name: ask
        conditions:
        -   if:
                matches: "(?i)^answer: \\d+$"
                action:
                -   goto: done
        -   default:
                action:
                -   message: "Reply with 'Answer: <number>'."
    -   name: done
        action:
        -   end
"#;
    let llm = Arc::new(MockLLMClient::scripted(&["I think seven", "ANSWER: 7"]));
    let backends = Backends {
        llm: llm.clone(),
        ..mock_backends(MockLLMClient::new(""))
    };
    let mut runner =
        WorkflowRunner::new(program(yaml), backends, RunnerOptions::default()).unwrap();

    let report = runner.run().await;
    assert!(report.all_terminated());
    assert_eq!(report.agents[0].final_state, "done");
    assert_eq!(llm.request_count(), 2);
}

const ROUTER_YAML: &str = r#"
agents:
-   name: agent1
    states:
    -   name: main
        conditions:
        -   if:
                contains: "$$$python"
                action:
                -   goto: run
        -   default:
                action:
                -   message: "Please write some Python."
    -   name: run
        conditions:
        -   default:
                action:
                -   message: "Output: {python()}"
                -   end
"#;

#[tokio::test]
async fn test_goto_hands_the_reply_to_python() {
    let llm = Arc::new(MockLLMClient::scripted(&[
        "$$$python\nprint(1)\n$$$",
        "no code here",
    ]));
    let executor = Arc::new(MockExecutor::new(ScriptOutcome::Completed {
        stdout: "1\n".to_string(),
    }));
    let backends = Backends {
        llm: llm.clone(),
        executor: executor.clone(),
        ..mock_backends(MockLLMClient::new(""))
    };
    let mut runner =
        WorkflowRunner::new(program(ROUTER_YAML), backends, RunnerOptions::default()).unwrap();

    let report = runner.run().await;
    assert!(report.all_terminated());
    assert_eq!(report.agents[0].final_state, "run");
    assert_eq!(llm.request_count(), 1);
    assert_eq!(executor.sources(), vec!["print(1)".to_string()]);
    assert_eq!(
        session_texts(&runner, 0),
        vec!["$$$python\nprint(1)\n$$$", "Output: 1"]
    );
}

#[tokio::test]
async fn test_goto_hands_the_reply_to_conditions() {
    let yaml = r#"
agents:
-   name: agent1
    states:
    -   name: triage
        conditions:
        -   if:
                contains: "billing"
                action:
                -   goto: billing
        -   default:
                action:
                -   message: "Which department?"
    -   name: billing
        conditions:
        -   if:
                contains: "refund"
                action:
                -   message: "Refund approved."
                -   end
        -   default:
                action:
                -   message: "No refund."
                -   end
"#;
    let llm = Arc::new(MockLLMClient::scripted(&["billing: I want a refund", "nothing"]));
    let backends = Backends {
        llm: llm.clone(),
        ..mock_backends(MockLLMClient::new(""))
    };
    let mut runner =
        WorkflowRunner::new(program(yaml), backends, RunnerOptions::default()).unwrap();

    let report = runner.run().await;
    assert!(report.all_terminated());
    assert_eq!(report.agents[0].final_state, "billing");
    assert_eq!(llm.request_count(), 1);
    assert_eq!(
        session_texts(&runner, 0),
        vec!["billing: I want a refund", "Refund approved."]
    );
}

#[tokio::test]
async fn test_entry_message_after_goto_asks_again() {
    let yaml = r#"
agents:
-   name: agent1
    states:
    -   name: triage
        conditions:
        -   if:
                contains: "billing"
                action:
                -   goto: billing
        -   default:
                action:
                -   message: "Which department?"
    -   name: billing
        action:
        -   message: "Describe the charge."
        conditions:
        -   if:
                contains: "refund"
                action:
                -   end
        -   default:
                action:
                -   message: "Noted."
                -   end
"#;
    let llm = Arc::new(MockLLMClient::scripted(&["billing", "I want a refund"]));
    let backends = Backends {
        llm: llm.clone(),
        ..mock_backends(MockLLMClient::new(""))
    };
    let mut runner =
        WorkflowRunner::new(program(yaml), backends, RunnerOptions::default()).unwrap();

    let report = runner.run().await;
    assert!(report.all_terminated());
    assert_eq!(llm.request_count(), 2);

    let requests = llm.requests();
    assert_eq!(texts(&requests[1].messages), vec!["billing", "Describe the charge."]);
    assert_eq!(requests[1].messages.last().unwrap().role, MessageRole::User);
    assert_eq!(
        session_texts(&runner, 0),
        vec!["billing", "Describe the charge.", "I want a refund"]
    );
}

#[tokio::test]
async fn test_turn_limit_fails_the_agent() {
    let llm = Arc::new(MockLLMClient::new("no"));
    let backends = Backends {
        llm,
        ..mock_backends(MockLLMClient::new(""))
    };
    let options = RunnerOptions {
        max_turns: 2,
        ..RunnerOptions::default()
    };
    let mut runner = WorkflowRunner::new(program(LOOP_YAML), backends, options).unwrap();

    let report = runner.run().await;
    match &report.agents[0].status {
        AgentStatus::Failed(reason) => assert!(reason.contains("exceeded 2 completion turns")),
        other => panic!("unexpected status {:?}", other),
    }
    assert_eq!(runner.agent_runners()[0].phase(), Phase::Failed);
}

#[tokio::test]
async fn test_transition_limit_fails_the_agent() {
    let yaml = r#"
agents:
-   name: pingpong
    states:
    -   name: ping
        action:
        -   goto: pong
    -   name: pong
        action:
        -   goto: ping
"#;
    let options = RunnerOptions {
        max_transitions: 10,
        ..RunnerOptions::default()
    };
    let mut runner = WorkflowRunner::new(
        program(yaml),
        mock_backends(MockLLMClient::new("")),
        options,
    )
    .unwrap();

    let report = runner.run().await;
    assert!(matches!(
        &report.agents[0].status,
        AgentStatus::Failed(reason) if reason.contains("exceeded 10 state transitions")
    ));
    assert_eq!(report.agents[0].turns, 0);
    assert_eq!(runner.agent_runners()[0].transitions(), 11);
}

#[tokio::test]
async fn test_backend_failure_is_isolated_to_one_agent() {
    let yaml = r#"
agents:
-   name: reader
    states:
    -   name: ask
        conditions:
        -   default:
                action:
                -   message: "{rtfm()}"
                -   end
-   name: quiet
    states:
    -   name: initial
        action:
        -   end
"#;
    let backends = Backends {
        llm: Arc::new(MockLLMClient::new(RTFM_REPLY)),
        snippets: Arc::new(MockSnippetDatabase::failing()),
        ..mock_backends(MockLLMClient::new(""))
    };
    let mut runner =
        WorkflowRunner::new(program(yaml), backends, RunnerOptions::default()).unwrap();

    let report = runner.run().await;
    assert_eq!(report.agents.len(), 2);
    assert_eq!(report.agents[0].agent, "reader");
    assert!(matches!(
        &report.agents[0].status,
        AgentStatus::Failed(reason) if reason.contains("Mock index unavailable")
    ));
    assert_eq!(report.agents[1].agent, "quiet");
    assert_eq!(report.agents[1].status, AgentStatus::Terminated);
    assert_eq!(
        report.failed().map(|r| r.agent.as_str()).collect::<Vec<_>>(),
        vec!["reader"]
    );
}

#[tokio::test]
async fn test_llm_failure_fails_the_agent() {
    let mut runner = WorkflowRunner::new(
        program(LOOP_YAML),
        mock_backends(MockLLMClient::failing()),
        RunnerOptions::default(),
    )
    .unwrap();

    let report = runner.run().await;
    assert!(matches!(
        &report.agents[0].status,
        AgentStatus::Failed(reason) if reason.contains("Mock LLM failure")
    ));
    assert_eq!(report.agents[0].final_state, "ask");
}

#[tokio::test]
async fn test_agents_have_independent_transcripts() {
    let yaml = r#"
agents:
-   name: first
    states:
    -   name: s
        action:
        -   message: "one"
        -   end
-   name: second
    states:
    -   name: s
        action:
        -   message: "two"
        -   message: "three"
        -   end
"#;
    let mut runner = WorkflowRunner::new(
        program(yaml),
        mock_backends(MockLLMClient::new("")),
        RunnerOptions::default(),
    )
    .unwrap();

    let report = runner.run().await;
    assert!(report.all_terminated());
    assert_eq!(session_texts(&runner, 0), vec!["one"]);
    assert_eq!(session_texts(&runner, 1), vec!["two", "three"]);
    assert_eq!(runner.agent_runners()[1].name(), "second");
}

#[tokio::test]
async fn test_expired_messages_are_pruned_from_requests() {
    let yaml = r#"
agents:
-   name: agent1
    states:
    -   name: ask
        action:
        -   message:
                text: "Temporary hint"
                ttl: 0
        conditions:
        -   if:
                contains: "yes"
                action:
                -   end
        -   default:
                action:
                -   message: "Again."
"#;
    let llm = Arc::new(MockLLMClient::scripted(&["no", "yes"]));
    let backends = Backends {
        llm: llm.clone(),
        ..mock_backends(MockLLMClient::new(""))
    };
    let options = RunnerOptions {
        pruning: PruningPolicy {
            trigger: PruningTrigger::Always,
            ..PruningPolicy::default()
        },
        ..RunnerOptions::default()
    };
    let mut runner = WorkflowRunner::new(program(yaml), backends, options).unwrap();

    let report = runner.run().await;
    assert!(report.all_terminated());

    let requests = llm.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(texts(&requests[0].messages), vec!["Temporary hint"]);
    assert_eq!(texts(&requests[1].messages), vec!["no", "Again."]);

    // The transcript keeps pruned messages.
    assert_eq!(
        session_texts(&runner, 0),
        vec!["Temporary hint", "no", "Again.", "yes"]
    );
}

#[tokio::test]
async fn test_every_appended_message_reaches_the_frontend() {
    let mut frontend = MockPresenter::new();
    frontend
        .expect_handle_message()
        .withf(|agent, _| agent == "agent1")
        .times(2)
        .return_const(());

    let backends = Backends {
        llm: Arc::new(MockLLMClient::new(PYTHON_REPLY)),
        snippets: Arc::new(MockSnippetDatabase::empty()),
        executor: Arc::new(MockExecutor::default()),
        frontend: Arc::new(frontend),
    };
    let mut runner =
        WorkflowRunner::new(program(SIMPLE_PYTHON_YAML), backends, RunnerOptions::default())
            .unwrap();

    assert!(runner.run().await.all_terminated());
}
