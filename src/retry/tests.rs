use crate::retry::{retry_with_backoff, Classify, ErrorConfig, RetryOptions, RetryState, RetryStates};
use crate::{ApiError, NetworkCode};

use color_eyre::eyre::{Report, Result};
use std::cell::Cell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// An operation that fails `failures` times with `error` and then succeeds.
fn flaky(failures: u32, error: ApiError, calls: Rc<Cell<u32>>) -> impl FnMut() -> std::future::Ready<Result<u32, ApiError>> {
    move || {
        calls.set(calls.get() + 1);
        let result = match calls.get() <= failures {
            true => Err(error.clone()),
            false => Ok(calls.get()),
        };
        std::future::ready(result)
    }
}

// ----------------------------------------------------------------------------
// Classification

#[test]
fn classify_default_status_codes() -> Result<(), Report> {
    let config = ErrorConfig::default();
    for status in [429, 500, 501, 502, 503, 504, 507, 599] {
        assert!(config.is_retryable(&ApiError::status(status, "")), "{status}");
    }
    for status in [400, 401, 403, 404, 405, 422, 409, 418, 300, 200] {
        assert!(!config.is_retryable(&ApiError::status(status, "")), "{status}");
    }
    Ok(())
}

#[test]
fn classify_network_errors() -> Result<(), Report> {
    let config = ErrorConfig::default();

    let coded = ApiError::Network { message: "socket hang up".to_string(), code: Some(NetworkCode::ConnectionReset) };
    assert!(config.is_retryable(&coded));
    assert!(config.is_retryable(&ApiError::network("Network Error")));
    assert!(config.is_retryable(&ApiError::network("request timed out")));
    assert!(config.is_retryable(&ApiError::network("TypeError: Failed to fetch")));

    assert!(!config.is_retryable(&ApiError::network("certificate rejected")));
    assert!(!config.is_retryable(&ApiError::InvalidInput("bad variant".to_string())));
    let decode = ApiError::Decode { url: String::new(), message: "expected value".to_string() };
    assert!(!config.is_retryable(&decode));
    Ok(())
}

#[test]
fn classify_render_errors() -> Result<(), Report> {
    let render = ApiError::Render { format: "TSV".to_string(), message: "invalid UTF-8".to_string() };
    assert!(!ErrorConfig::default().is_retryable(&render));
    assert_eq!(render.to_string(), "Failed to render TSV output: invalid UTF-8");
    assert!(!render.to_string().contains("decode"));
    Ok(())
}

#[test]
fn classify_overrides() -> Result<(), Report> {
    let config = ErrorConfig { retryable_status_codes: vec![404, 409], non_retryable_status_codes: vec![503, 409] };
    assert!(config.is_retryable(&ApiError::status(404, "")));
    assert!(!config.is_retryable(&ApiError::status(503, "")));
    // listed in both
    assert!(!config.is_retryable(&ApiError::status(409, "")));
    // unlisted codes use the defaults
    assert!(config.is_retryable(&ApiError::status(502, "")));
    assert!(!config.is_retryable(&ApiError::status(400, "")));
    Ok(())
}

#[test]
fn should_retry_replaces_classification() -> Result<(), Report> {
    let options = RetryOptions::<ApiError>::default().should_retry(|e| !matches!(e, ApiError::Status { status: 503, .. }));
    assert!(!options.is_retryable(&ApiError::status(503, "")));
    assert!(options.is_retryable(&ApiError::status(404, "")));
    Ok(())
}

// ----------------------------------------------------------------------------
// Delay

#[test]
fn delay_doubles_up_to_ceiling() -> Result<(), Report> {
    let options = RetryOptions::<ApiError>::default();
    let observed: Vec<_> = (1..=6).map(|attempt| options.delay(attempt).as_millis()).collect();
    assert_eq!(observed, [300, 600, 1200, 2400, 3000, 3000]);
    // no overflow on absurd attempt numbers
    assert_eq!(options.delay(u32::MAX), Duration::from_millis(3000));
    Ok(())
}

// ----------------------------------------------------------------------------
// Retry

#[tokio::test(start_paused = true)]
async fn retry_fails_twice_then_succeeds() -> Result<(), Report> {
    let calls = Rc::new(Cell::new(0));
    let retries = Arc::new(Mutex::new(Vec::new()));
    let successes = Arc::new(Mutex::new(Vec::new()));

    let options = RetryOptions::default()
        .on_retry({
            let retries = retries.clone();
            move |_: &ApiError, attempt| retries.lock().unwrap().push(attempt)
        })
        .on_success({
            let successes = successes.clone();
            move |attempts| successes.lock().unwrap().push(attempts)
        });

    let start = Instant::now();
    let operation = flaky(2, ApiError::status(503, "https://example.org"), calls.clone());
    let result = retry_with_backoff(operation, &options, None).await;

    assert_eq!(result, Ok(3));
    assert_eq!(calls.get(), 3);
    assert_eq!(*retries.lock().unwrap(), [1, 2]);
    assert_eq!(*successes.lock().unwrap(), [2]);
    assert_eq!(start.elapsed(), Duration::from_millis(300 + 600));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn retry_non_retryable_fails_immediately() -> Result<(), Report> {
    let calls = Rc::new(Cell::new(0));
    let retries = Arc::new(AtomicU32::new(0));
    let options = RetryOptions::default().on_retry({
        let retries = retries.clone();
        move |_: &ApiError, _| {
            retries.fetch_add(1, Ordering::SeqCst);
        }
    });

    let start = Instant::now();
    let error = ApiError::status(404, "https://example.org/genes/NOTAGENE.json");
    let result = retry_with_backoff(flaky(u32::MAX, error.clone(), calls.clone()), &options, None).await;

    assert_eq!(result, Err(error));
    assert_eq!(calls.get(), 1);
    assert_eq!(retries.load(Ordering::SeqCst), 0);
    assert_eq!(start.elapsed(), Duration::ZERO);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn retry_exhausted() -> Result<(), Report> {
    let calls = Rc::new(Cell::new(0));
    let options = RetryOptions::default();
    let error = ApiError::Network { message: "timeout".to_string(), code: Some(NetworkCode::Timeout) };
    let mut state = RetryState::new("variant");

    let start = Instant::now();
    let result = retry_with_backoff(flaky(u32::MAX, error.clone(), calls.clone()), &options, Some(&mut state)).await;

    assert_eq!(result, Err(error.clone()));
    assert_eq!(calls.get(), 3);
    assert_eq!(state.attempts, 3);
    assert_eq!(state.last_error, Some(error.to_string()));
    assert!(!state.in_progress);
    // no delay after the final failure
    assert_eq!(start.elapsed(), Duration::from_millis(900));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn retry_zero_or_one_fails_fast() -> Result<(), Report> {
    for max_retries in [0, 1] {
        let calls = Rc::new(Cell::new(0));
        let options = RetryOptions::default().max_retries(max_retries);
        let start = Instant::now();
        let result = retry_with_backoff(flaky(1, ApiError::status(500, ""), calls.clone()), &options, None).await;

        assert!(result.is_err(), "{max_retries}");
        assert_eq!(calls.get(), 1, "{max_retries}");
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn retry_shares_external_state() -> Result<(), Report> {
    let options = RetryOptions::default().max_retries(4);
    let mut state = RetryState::new("gene");

    // first call consumes two attempts
    let calls = Rc::new(Cell::new(0));
    let result = retry_with_backoff(flaky(2, ApiError::status(502, ""), calls.clone()), &options, Some(&mut state)).await;
    assert!(result.is_ok());
    assert_eq!(state.attempts, 2);

    // second call continues from the shared counter: only two attempts remain
    let calls = Rc::new(Cell::new(0));
    let start = Instant::now();
    let result = retry_with_backoff(flaky(5, ApiError::status(502, ""), calls.clone()), &options, Some(&mut state)).await;
    assert!(result.is_err());
    assert_eq!(calls.get(), 2);
    assert_eq!(state.attempts, 4);
    // backoff after attempt 3
    assert_eq!(start.elapsed(), Duration::from_millis(1200));

    state.reset();
    assert_eq!(state, RetryState::new("gene"));
    Ok(())
}

#[test]
fn retry_states_reset_all() -> Result<(), Report> {
    let mut states = RetryStates::new();
    states.gene.attempts = 2;
    states.variant.in_progress = true;
    states.inheritance.last_error = Some("boom".to_string());
    assert!(states.any_in_progress());

    states.reset_all();
    assert_eq!(states, RetryStates::new());
    assert!(!states.any_in_progress());
    assert_eq!(states.variant.component, "variant");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn retry_runs_on_spawned_task() -> Result<(), Report> {
    let retries = Arc::new(AtomicU32::new(0));
    let options = RetryOptions::<ApiError>::default()
        .should_retry(|e| e.response_status() == Some(503))
        .on_retry({
            let retries = retries.clone();
            move |_, _| {
                retries.fetch_add(1, Ordering::SeqCst);
            }
        });

    let handle = tokio::spawn(async move {
        let calls = AtomicU32::new(0);
        let operation = || {
            let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
            let result = match call {
                1 => Err(ApiError::status(503, "")),
                _ => Ok(call),
            };
            std::future::ready(result)
        };
        retry_with_backoff(operation, &options, None).await
    });

    assert_eq!(handle.await?, Ok(2));
    assert_eq!(retries.load(Ordering::SeqCst), 1);
    Ok(())
}
