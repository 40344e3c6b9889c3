//! Session bridge integration tests
//!
//! Exercises the full stack: handle registries → bridge → engine.

use lattice_ffi::{
    clear_all_registries, get_version, graph_add_operation, graph_create, graph_delete,
    operation_output_count, session_close, session_create, session_delete, session_extend,
    session_run, tensor_create, tensor_data, tensor_delete, tensor_dtype, tensor_shape, Error,
};
use serial_test::serial;

fn f32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

#[test]
fn test_version() {
    let version = get_version();
    assert!(!version.is_empty(), "Version should not be empty");
    assert!(
        version.chars().any(|c| c.is_numeric()),
        "Version should contain numbers"
    );
}

#[test]
#[serial]
fn test_zero_handle_rejected_everywhere() {
    clear_all_registries();

    assert!(matches!(session_create(0, None, None), Err(Error::InvalidHandle { .. })));
    assert!(matches!(session_close(0), Err(Error::InvalidHandle { .. })));
    assert!(matches!(session_delete(0), Err(Error::InvalidHandle { .. })));
    assert!(matches!(session_extend(0), Err(Error::InvalidHandle { .. })));
    assert!(matches!(
        session_run(0, None, &[], &[], &[], &[], &[], &[], false, &mut []),
        Err(Error::InvalidHandle { .. })
    ));
    assert!(matches!(graph_delete(0), Err(Error::InvalidHandle { .. })));
    assert!(matches!(
        graph_add_operation(0, "noop", "n", &[], &[], 0),
        Err(Error::InvalidHandle { .. })
    ));
    assert!(matches!(operation_output_count(0), Err(Error::InvalidHandle { .. })));
    assert!(matches!(tensor_delete(0), Err(Error::InvalidHandle { .. })));
    assert!(matches!(tensor_shape(0), Err(Error::InvalidHandle { .. })));
}

#[test]
#[serial]
fn test_session_lifecycle() {
    clear_all_registries();

    let graph = graph_create();
    let session = session_create(graph, None, None).unwrap();
    assert_ne!(session, 0, "Session handle should not be zero");

    session_close(session).unwrap();
    session_delete(session).unwrap();

    // The handle is stale after delete.
    assert!(matches!(session_close(session), Err(Error::InvalidHandle { .. })));
}

#[test]
#[serial]
fn test_delete_swallows_close_failure() {
    clear_all_registries();

    let graph = graph_create();
    let session = session_create(graph, None, None).unwrap();

    // First close succeeds; the second, issued by delete, fails inside the
    // engine. Deletion must still proceed and report success.
    session_close(session).unwrap();
    session_delete(session).unwrap();
    assert!(matches!(session_extend(session), Err(Error::InvalidHandle { .. })));
}

#[test]
#[serial]
fn test_create_with_target_and_config() {
    clear_all_registries();

    let graph = graph_create();
    let config = br#"{"cpu_device_count":2,"log_device_placement":true}"#;
    let session = session_create(graph, Some("grpc://worker:2222"), Some(config)).unwrap();
    assert_ne!(session, 0);
    session_delete(session).unwrap();
}

#[test]
#[serial]
fn test_create_with_malformed_config_fails() {
    clear_all_registries();

    let graph = graph_create();
    let err = session_create(graph, None, Some(b"\x08\x01garbage")).unwrap_err();
    assert!(matches!(err, Error::ConfigParse(_)));
}

#[test]
#[serial]
fn test_empty_config_bytes_mean_no_config() {
    clear_all_registries();

    let graph = graph_create();
    let session = session_create(graph, None, Some(b"")).unwrap();
    assert_ne!(session, 0);
    session_delete(session).unwrap();
}

#[test]
#[serial]
fn test_feed_fetch_round_trip() {
    clear_all_registries();

    let graph = graph_create();
    let x = graph_add_operation(graph, "placeholder", "x", &[], &[], 0).unwrap();
    let y = graph_add_operation(graph, "placeholder", "y", &[], &[], 0).unwrap();
    let sum = graph_add_operation(graph, "add", "sum", &[x, y], &[0, 0], 0).unwrap();
    let session = session_create(graph, None, None).unwrap();

    let a = tensor_create("f32", "[3]", &f32_bytes(&[1.0, 2.0, 3.0])).unwrap();
    let b = tensor_create("f32", "[3]", &f32_bytes(&[10.0, 20.0, 30.0])).unwrap();

    let mut out = [0u64; 1];
    let metadata = session_run(
        session,
        None,
        &[a, b],
        &[x, y],
        &[0, 0],
        &[sum],
        &[0],
        &[],
        false,
        &mut out,
    )
    .unwrap();
    assert!(metadata.is_none(), "Metadata was not requested");
    assert_ne!(out[0], 0);

    assert_eq!(tensor_dtype(out[0]).unwrap(), "f32");
    assert_eq!(tensor_shape(out[0]).unwrap(), "[3]");
    assert_eq!(tensor_data(out[0]).unwrap(), f32_bytes(&[11.0, 22.0, 33.0]));

    tensor_delete(out[0]).unwrap();
    session_delete(session).unwrap();
}

#[test]
#[serial]
fn test_targets_only_run_writes_no_outputs() {
    clear_all_registries();

    let graph = graph_create();
    let noop = graph_add_operation(graph, "noop", "nothing", &[], &[], 0).unwrap();
    let session = session_create(graph, None, None).unwrap();

    let metadata = session_run(session, None, &[], &[], &[], &[], &[], &[noop], false, &mut [])
        .unwrap();
    assert!(metadata.is_none());

    session_delete(session).unwrap();
}

#[test]
#[serial]
fn test_metadata_requested_and_decoded() {
    clear_all_registries();

    let graph = graph_create();
    let value = tensor_create("i32", "[1]", &7i32.to_le_bytes()).unwrap();
    let c = graph_add_operation(graph, "const", "c", &[], &[], value).unwrap();
    let session = session_create(graph, None, None).unwrap();

    let mut out = [0u64; 1];
    let metadata = session_run(session, None, &[], &[], &[], &[c], &[0], &[], true, &mut out)
        .unwrap()
        .expect("metadata was requested");

    let decoded: lattice_engine::RunMetadata = serde_json::from_slice(&metadata).unwrap();
    assert_eq!(decoded.step, 1);
    assert_eq!(decoded.num_fetches, 1);
    assert_eq!(decoded.nodes_evaluated, vec!["c".to_string()]);

    tensor_delete(out[0]).unwrap();
    session_delete(session).unwrap();
}

#[test]
#[serial]
fn test_run_failure_publishes_no_outputs() {
    clear_all_registries();

    let graph = graph_create();
    let x = graph_add_operation(graph, "placeholder", "x", &[], &[], 0).unwrap();
    let session = session_create(graph, None, None).unwrap();

    // Fetching an unfed placeholder is an engine failure, not a handle
    // failure; the output slot must stay untouched.
    let mut out = [0u64; 1];
    let err = session_run(session, None, &[], &[], &[], &[x], &[0], &[], false, &mut out)
        .unwrap_err();
    assert!(matches!(err, Error::RunFailed(_)));
    assert_eq!(out[0], 0);

    session_delete(session).unwrap();
}

#[test]
#[serial]
fn test_extend_then_run_new_node() {
    clear_all_registries();

    let graph = graph_create();
    let session = session_create(graph, None, None).unwrap();

    let value = tensor_create("f32", "[1]", &f32_bytes(&[42.0])).unwrap();
    let c = graph_add_operation(graph, "const", "late", &[], &[], value).unwrap();

    // The node was added after session creation: invisible until extend.
    let mut out = [0u64; 1];
    let err = session_run(session, None, &[], &[], &[], &[c], &[0], &[], false, &mut out)
        .unwrap_err();
    assert!(matches!(err, Error::RunFailed(_)));

    session_extend(session).unwrap();
    session_run(session, None, &[], &[], &[], &[c], &[0], &[], false, &mut out).unwrap();
    assert_eq!(tensor_data(out[0]).unwrap(), f32_bytes(&[42.0]));

    tensor_delete(out[0]).unwrap();
    session_delete(session).unwrap();
}

#[test]
#[serial]
fn test_run_options_zero_length_is_no_options() {
    clear_all_registries();

    let graph = graph_create();
    let noop = graph_add_operation(graph, "noop", "n", &[], &[], 0).unwrap();
    let session = session_create(graph, None, None).unwrap();

    session_run(session, Some(b""), &[], &[], &[], &[], &[], &[noop], false, &mut []).unwrap();
    session_run(
        session,
        Some(br#"{"trace":true,"timeout_ms":50}"#),
        &[],
        &[],
        &[],
        &[],
        &[],
        &[noop],
        false,
        &mut [],
    )
    .unwrap();

    let err = session_run(
        session,
        Some(b"definitely not json"),
        &[],
        &[],
        &[],
        &[],
        &[],
        &[noop],
        false,
        &mut [],
    )
    .unwrap_err();
    assert!(matches!(err, Error::RunFailed(_)));

    session_delete(session).unwrap();
}

#[test]
#[serial]
fn test_end_to_end_scenario() {
    clear_all_registries();

    // Create a context on an empty graph with no target or config.
    let graph = graph_create();
    let session = session_create(graph, None, None).unwrap();
    assert_ne!(session, 0);

    // One no-op node, pushed into the session by an explicit extend.
    let noop = graph_add_operation(graph, "noop", "tick", &[], &[], 0).unwrap();
    session_extend(session).unwrap();

    // Run with 0 inputs, 0 outputs, 1 target: succeeds, no output handles,
    // no metadata.
    let metadata = session_run(session, None, &[], &[], &[], &[], &[], &[noop], false, &mut [])
        .unwrap();
    assert!(metadata.is_none());

    // Delete the context; the caller observes no error.
    session_delete(session).unwrap();
    graph_delete(graph).unwrap();
}

#[test]
#[serial]
fn test_graph_delete_invalidates_operations() {
    clear_all_registries();

    let graph = graph_create();
    let noop = graph_add_operation(graph, "noop", "n", &[], &[], 0).unwrap();
    graph_delete(graph).unwrap();

    assert!(matches!(operation_output_count(noop), Err(Error::InvalidHandle { .. })));
}

#[test]
#[serial]
fn test_operation_output_counts() {
    clear_all_registries();

    let graph = graph_create();
    let noop = graph_add_operation(graph, "noop", "n", &[], &[], 0).unwrap();
    let x = graph_add_operation(graph, "placeholder", "x", &[], &[], 0).unwrap();
    assert_eq!(operation_output_count(noop).unwrap(), 0);
    assert_eq!(operation_output_count(x).unwrap(), 1);
}
