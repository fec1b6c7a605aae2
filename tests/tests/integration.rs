use agentkit_core::context::Context;
use agentkit_core::message::{Message, Role};
use agentkit_runtime::graph::{ConditionFn, ExecuteFn, Graph, GraphState, Node};
use agentkit_runtime::middleware::{RateLimiter, RateLimiterInterceptor};
use agentkit_runtime::runner::{ParallelRunner, Runner, Task};
use agentkit_runtime::agent::Agent;
use agentkit_testing::MockLlmClient;
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn retention_keeps_system_plus_last_three_non_system() {
    let context = Context::new(4);
    context.add(Message::system("S1")).await;
    context.add(Message::user("U1")).await;
    context.add(Message::assistant("A1")).await;
    context.add(Message::user("U2")).await;
    context.add(Message::assistant("A2")).await;
    context.add(Message::user("U3")).await;

    let messages = context.get().await;
    let texts: Vec<String> = messages.iter().map(|m| m.text_content()).collect();
    assert_eq!(texts, vec!["S1", "U2", "A2", "U3"]);
    assert_eq!(context.size().await, 4);
    assert_eq!(messages[0].role, Role::System);
}

#[tokio::test]
async fn condition_graph_routes_low_branch() {
    // `start` triggers the x-setting action directly so the initial state
    // carries x=7 before `check` evaluates its condition.
    let mut graph = Graph::new();
    graph
        .add_node(Node::start("start").with_children(vec!["start_action"]))
        .unwrap();
    graph
        .add_node(Node::action("start_action", set_x_fn()).with_children(vec!["check"]))
        .unwrap();
    graph
        .add_node(
            Node::condition("check", condition_fn())
                .with_branch("high", "h")
                .with_branch("low", "l"),
        )
        .unwrap();
    graph
        .add_node(Node::action("h", set_r_fn("H")).with_children(vec!["end"]))
        .unwrap();
    graph
        .add_node(Node::action("l", set_r_fn("L")).with_children(vec!["end"]))
        .unwrap();
    graph.add_node(Node::end("end")).unwrap();

    let result = graph.execute(GraphState::new()).await.unwrap();
    assert_eq!(result.get("r").and_then(|v| v.as_str()), Some("L"));
}

fn set_x_fn() -> ExecuteFn {
    Arc::new(|mut state: GraphState| {
        Box::pin(async move {
            state.insert("x", json!(7));
            Ok(state)
        })
    })
}

fn condition_fn() -> ConditionFn {
    Arc::new(|state: &GraphState| {
        let high = state.get("x").and_then(|v| v.as_i64()).unwrap_or(0) > 10;
        Box::pin(async move { Ok(if high { "high".to_string() } else { "low".to_string() }) })
    })
}

fn set_r_fn(value: &'static str) -> ExecuteFn {
    Arc::new(move |mut state: GraphState| {
        Box::pin(async move {
            state.insert("r", json!(value));
            Ok(state)
        })
    })
}

#[tokio::test]
async fn join_graph_waits_for_both_branches() {
    let mut graph = Graph::new();
    graph
        .add_node(Node::start("start").with_children(vec!["a", "b"]))
        .unwrap();

    let set_a: ExecuteFn = Arc::new(|mut state: GraphState| {
        Box::pin(async move {
            state.insert("a", json!(1));
            Ok(state)
        })
    });
    graph.add_node(Node::action("a", set_a).with_children(vec!["j"])).unwrap();

    let set_b: ExecuteFn = Arc::new(|mut state: GraphState| {
        Box::pin(async move {
            state.insert("b", json!(1));
            Ok(state)
        })
    });
    graph.add_node(Node::action("b", set_b).with_children(vec!["j"])).unwrap();

    let join: ExecuteFn = Arc::new(|mut state: GraphState| {
        Box::pin(async move {
            assert!(state.get("a").is_some());
            assert!(state.get("b").is_some());
            state.insert("joined", json!(true));
            Ok(state)
        })
    });
    graph
        .add_node(Node::action("j", join).with_children(vec!["end"]).wait_all_parents())
        .unwrap();
    graph.add_node(Node::end("end")).unwrap();

    let result = graph.execute(GraphState::new()).await.unwrap();
    assert_eq!(result.get("a").and_then(|v| v.as_i64()), Some(1));
    assert_eq!(result.get("b").and_then(|v| v.as_i64()), Some(1));
    assert_eq!(result.get("joined").and_then(|v| v.as_bool()), Some(true));
}

#[tokio::test]
async fn parallel_batch_returns_results_in_task_order() {
    let runner = ParallelRunner::new(Runner::with_capacity(2));

    let mut tasks = Vec::new();
    for (index, reply) in ["r1", "r2", "r3"].into_iter().enumerate() {
        let client = MockLlmClient::new();
        client.set_fallback_response(reply);
        let agent = Agent::new("worker", "sys", Arc::new(client));
        tasks.push(Task::new(format!("t{}", index + 1), agent, "go"));
    }

    let token = CancellationToken::new();
    let results = runner.run_parallel(&token, tasks).await;
    let ids: Vec<String> = results.iter().map(|r| r.task_id.clone()).collect();
    let outputs: Vec<String> = results.iter().map(|r| r.output.clone().unwrap()).collect();
    assert_eq!(ids, vec!["t1", "t2", "t3"]);
    assert_eq!(outputs, vec!["r1", "r2", "r3"]);
}

#[tokio::test]
async fn rate_limiter_rejects_without_invoking_business_logic_again() {
    let client = MockLlmClient::new();
    client.set_fallback_response("ok");
    let mut agent = Agent::new("limited", "sys", Arc::new(client));

    let limiter = Arc::new(RateLimiter::new(1));
    agent.add_middleware(Arc::new(RateLimiterInterceptor::new(limiter)));

    let token = CancellationToken::new();
    let first = agent.run("one", &token).await;
    assert!(first.is_ok());

    let second = agent.run("two", &token).await;
    assert!(second.is_err());

    // context only reflects the first (successful) run's turns, confirming
    // the second call's business logic never ran.
    let messages = agent.context().get().await;
    assert_eq!(messages.iter().filter(|m| m.role == Role::User).count(), 1);
}
