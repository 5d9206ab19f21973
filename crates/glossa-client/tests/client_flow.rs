//! Client-level plumbing: frame queue, response routing, and the flush
//! driver.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use glossa_client::{drive, Client, DEFAULT_FLUSH_PERIOD};
use glossa_engine::{Submission, Value};
use glossa_model::{CompileFailure, Conversion, WorkbenchRequest, WorkbenchResponse};
use pretty_assertions::assert_eq;
use tokio::sync::{mpsc, Mutex};

fn slot() -> (
    Arc<StdMutex<Option<Value>>>,
    impl FnOnce(Value) + Send + 'static,
) {
    let cell = Arc::new(StdMutex::new(None));
    let writer = cell.clone();
    (cell, move |v| *writer.lock().unwrap() = Some(v))
}

/// Pull the request ids out of an encoded `RunProgram` frame.
fn ids_in_frame(frame: &str) -> Vec<u32> {
    match serde_json::from_str::<WorkbenchRequest>(frame).unwrap() {
        WorkbenchRequest::RunProgram { to_convert, .. } => {
            to_convert.iter().map(|c| c.id).collect()
        }
        other => panic!("expected a RunProgram frame, got {other:?}"),
    }
}

#[test]
fn formulas_flow_out_as_frames_and_back_in_as_values() {
    let mut client = Client::new();
    let outbound = client.outbound();

    let (result, cb) = slot();
    assert_eq!(
        client
            .submit_formula(r#"=run("grimm", "pater")"#, cb)
            .unwrap(),
        Submission::Pending
    );
    assert!(outbound.is_empty(), "nothing sent before the flush tick");

    client.flush();
    let frames = outbound.drain();
    assert_eq!(frames.len(), 1);
    let ids = ids_in_frame(&frames[0]);
    assert_eq!(ids.len(), 1);

    let response = serde_json::to_string(&WorkbenchResponse::RunResult {
        to_convert: vec![Conversion {
            id: ids[0],
            data: Ok("fater".into()),
        }],
    })
    .unwrap();
    assert_eq!(client.handle_frame(&response).unwrap(), None);
    assert_eq!(*result.lock().unwrap(), Some(Value::Text("fater".into())));
}

#[test]
fn test_area_conversions_share_the_formula_cache() {
    let mut client = Client::new();
    let outbound = client.outbound();

    // One direct request and one formula for the same pair.
    let (direct, direct_cb) = slot();
    assert_eq!(
        client.request_conversion("grimm", "pater", direct_cb),
        Submission::Pending
    );
    let (formula, formula_cb) = slot();
    assert_eq!(
        client
            .submit_formula(r#"=run("grimm", "pater")"#, formula_cb)
            .unwrap(),
        Submission::Pending
    );

    client.flush();
    let frames = outbound.drain();
    assert_eq!(frames.len(), 1);
    let ids = ids_in_frame(&frames[0]);
    assert_eq!(ids.len(), 1, "the pair is requested once across both paths");

    let response = serde_json::to_string(&WorkbenchResponse::RunResult {
        to_convert: vec![Conversion {
            id: ids[0],
            data: Ok("fater".into()),
        }],
    })
    .unwrap();
    client.handle_frame(&response).unwrap();
    assert_eq!(*direct.lock().unwrap(), Some(Value::Text("fater".into())));
    assert_eq!(*formula.lock().unwrap(), Some(Value::Text("fater".into())));
}

#[test]
fn loading_a_program_invalidates_its_cache_and_queues_a_frame() {
    let mut client = Client::new();
    let outbound = client.outbound();

    let (_, cb) = slot();
    client.request_conversion("grimm", "pater", cb);
    client.flush();
    let ids = ids_in_frame(&outbound.drain()[0]);
    let response = serde_json::to_string(&WorkbenchResponse::RunResult {
        to_convert: vec![Conversion {
            id: ids[0],
            data: Ok("fater".into()),
        }],
    })
    .unwrap();
    client.handle_frame(&response).unwrap();
    assert!(client.engine().cached_result("grimm", "pater").is_some());

    client.load_program("grimm", "stop > fricative / V_V").unwrap();
    assert!(client.engine().cached_result("grimm", "pater").is_none());
    let frames = outbound.drain();
    assert_eq!(frames.len(), 1);
    assert!(frames[0].starts_with(r#"{"LoadProgram":"#));
}

#[test]
fn non_conversion_responses_are_handed_back_to_the_host() {
    let mut client = Client::new();

    let failure = WorkbenchResponse::CompilationResult {
        result: Some(CompileFailure {
            error_message: "unknown feature".into(),
            line_contents: "stop > fricative".into(),
            line_number: Some(3),
        }),
    };
    let frame = serde_json::to_string(&failure).unwrap();
    assert_eq!(client.handle_frame(&frame).unwrap(), Some(failure));
}

#[tokio::test(start_paused = true)]
async fn driver_flushes_on_cadence_and_routes_frames() {
    let client = Arc::new(Mutex::new(Client::new()));
    let outbound = client.lock().await.outbound();

    let (inbound_tx, inbound_rx) = mpsc::channel(8);
    let (events_tx, mut events_rx) = mpsc::channel(8);
    let driver = tokio::spawn(drive(
        client.clone(),
        inbound_rx,
        events_tx,
        DEFAULT_FLUSH_PERIOD,
    ));

    let (result, cb) = slot();
    client
        .lock()
        .await
        .submit_formula(r#"=run("grimm", "pater")"#, cb)
        .unwrap();

    // The next tick flushes the batch without any explicit flush call.
    tokio::time::sleep(Duration::from_millis(250)).await;
    let frames = outbound.drain();
    assert_eq!(frames.len(), 1);
    let ids = ids_in_frame(&frames[0]);

    let response = serde_json::to_string(&WorkbenchResponse::RunResult {
        to_convert: vec![Conversion {
            id: ids[0],
            data: Ok("fater".into()),
        }],
    })
    .unwrap();
    inbound_tx.send(response).await.unwrap();

    let success = serde_json::to_string(&WorkbenchResponse::Success).unwrap();
    inbound_tx.send(success).await.unwrap();

    assert_eq!(events_rx.recv().await, Some(WorkbenchResponse::Success));
    assert_eq!(*result.lock().unwrap(), Some(Value::Text("fater".into())));

    drop(inbound_tx);
    driver.await.unwrap();
}
