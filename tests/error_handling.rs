//! Error handling and edge case tests.

mod common;

use common::{config, controller, RecordingStore};
use keyed_state::{
    AsyncExecutionController, KeyedState, ListState, ListStateDescriptor, RequestPayload,
    RequestType, SerializerFactory, StateError, ValueState, ValueStateDescriptor, VoidNamespace,
};
use std::sync::Arc;

fn events_store() -> Arc<RecordingStore> {
    // Fails the third append on key 7 only: the JSON encoding of 3.
    Arc::new(RecordingStore::new().failing_when(|request| {
        request.key == 7 && matches!(&request.payload, RequestPayload::Value(v) if v == b"3")
    }))
}

// --- Store Failures ---

#[test]
fn test_failure_does_not_block_later_requests() {
    let store = events_store();
    let controller = controller(store.clone(), config(4));
    let events = ListState::new(
        controller.clone(),
        ListStateDescriptor::<u32>::new("events", SerializerFactory::json()),
    );

    let mut futures = Vec::new();
    for i in 1..=5u32 {
        for key in [7, 9] {
            controller.set_current_key(key);
            futures.push((key, i, events.async_add(&i).unwrap()));
        }
    }
    controller.drain_inflight();

    for (key, i, future) in &futures {
        let result = future.try_get().expect("every request completes");
        if *key == 7 && *i == 3 {
            assert_eq!(result, Err(StateError::Store("injected failure".into())));
        } else {
            assert_eq!(result, Ok(()));
        }
    }

    controller.set_current_key(7);
    assert_eq!(events.get().unwrap(), vec![1, 2, 4, 5]);
    controller.set_current_key(9);
    assert_eq!(events.get().unwrap(), vec![1, 2, 3, 4, 5]);
}

#[test]
fn test_failed_request_is_not_retried() {
    let store = events_store();
    let controller = controller(store.clone(), config(1));
    let events = ListState::new(
        controller.clone(),
        ListStateDescriptor::<u32>::new("events", SerializerFactory::json()),
    );

    controller.set_current_key(7);
    let failed = events.async_add(&3).unwrap();
    assert!(controller.wait_for(&failed).is_err());
    controller.drain_inflight();

    let attempts = store
        .executed_for(7, "events")
        .iter()
        .filter(|e| e.failed)
        .count();
    assert_eq!(attempts, 1);
}

#[test]
fn test_failure_propagates_through_continuations() {
    let store = events_store();
    let controller = controller(store, config(2));
    let events = ListState::new(
        controller.clone(),
        ListStateDescriptor::<u32>::new("events", SerializerFactory::json()),
    );

    controller.set_current_key(7);
    let chained = events.async_add(&3).unwrap().then_apply(|()| "unreachable");
    assert!(matches!(
        controller.wait_for(&chained),
        Err(StateError::Store(_))
    ));
}

#[test]
fn test_undecodable_value_fails_future() {
    let controller = controller(Arc::new(RecordingStore::new()), config(2));
    let descriptor = ValueStateDescriptor::<i64>::new("counter", SerializerFactory::json());
    let raw: KeyedState<u64, VoidNamespace, i64> =
        KeyedState::new(controller.clone(), descriptor.descriptor().clone());
    let counter = ValueState::new(controller.clone(), descriptor);

    controller.set_current_key(1);
    raw.handle_request(
        RequestType::ValueUpdate,
        RequestPayload::Value(b"not json".to_vec()),
    )
    .unwrap();
    let read = counter.async_value().unwrap();

    assert!(matches!(
        controller.wait_for(&read),
        Err(StateError::Deserialization(_))
    ));

    // The controller keeps working.
    counter.async_update(&4).unwrap();
    assert_eq!(counter.value().unwrap(), Some(4));
}

// --- Programming Errors ---

#[test]
fn test_kind_mismatch_fails_synchronously() {
    let controller = controller(Arc::new(RecordingStore::new()), config(2));
    let descriptor = ValueStateDescriptor::<i64>::new("counter", SerializerFactory::json());
    let raw: KeyedState<u64, VoidNamespace, i64> =
        KeyedState::new(controller.clone(), descriptor.descriptor().clone());

    controller.set_current_key(1);
    let err = raw
        .handle_request(RequestType::ListGet, RequestPayload::Empty)
        .unwrap_err();
    assert!(matches!(err, StateError::KindMismatch { .. }));
    assert!(err.is_programming_error());
    assert_eq!(controller.in_flight_count(), 0);
}

#[test]
fn test_payload_mismatch_fails_synchronously() {
    let controller = controller(Arc::new(RecordingStore::new()), config(2));
    let descriptor = ValueStateDescriptor::<i64>::new("counter", SerializerFactory::json());
    let raw: KeyedState<u64, VoidNamespace, i64> =
        KeyedState::new(controller.clone(), descriptor.descriptor().clone());

    controller.set_current_key(1);
    let err = raw
        .handle_request(RequestType::ValueUpdate, RequestPayload::Empty)
        .unwrap_err();
    assert!(matches!(err, StateError::PayloadMismatch { .. }));
    assert_eq!(controller.in_flight_count(), 0);
}

#[test]
fn test_request_without_current_key() {
    let controller = controller(Arc::new(RecordingStore::new()), config(2));
    let counter = ValueState::new(
        controller.clone(),
        ValueStateDescriptor::<i64>::new("counter", SerializerFactory::json()),
    );

    assert_eq!(counter.async_value().unwrap_err(), StateError::NoCurrentKey);
    assert_eq!(counter.update(&1).unwrap_err(), StateError::NoCurrentKey);
}

// --- Lifecycle ---

#[test]
fn test_close_drains_then_rejects() {
    let controller = controller(Arc::new(RecordingStore::new()), config(100));
    let counter = ValueState::new(
        controller.clone(),
        ValueStateDescriptor::<i64>::new("counter", SerializerFactory::json()),
    );

    controller.set_current_key(1);
    let pending = counter.async_update(&1).unwrap();
    controller.close();

    assert_eq!(pending.try_get(), Some(Ok(())));
    assert!(controller.is_closed());
    assert_eq!(counter.async_value().unwrap_err(), StateError::Closed);

    // Closing twice is harmless.
    controller.close();
}

#[test]
fn test_invalid_config() {
    let result = AsyncExecutionController::<u64>::new(
        Arc::new(RecordingStore::new()),
        keyed_state::ControllerConfig {
            worker_threads: 0,
            ..Default::default()
        },
    );
    assert!(matches!(result, Err(StateError::InvalidConfig(_))));
}
