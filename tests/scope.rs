use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use batchload::{resolve_found, BatchFunction, BoxError, LoadError, LoadResult, RequestScope};
use futures::future;

type CallLog = Arc<Mutex<Vec<Vec<i64>>>>;

struct NamedContext {
    map: HashMap<i64, String>,
    calls: CallLog,
}

impl NamedContext {
    fn new(entries: &[(i64, &str)]) -> (Self, CallLog) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let map = entries.iter().map(|(k, v)| (*k, (*v).to_owned())).collect();
        (Self { map, calls: calls.clone() }, calls)
    }
}

async fn lookup(keys: &[i64], context: &NamedContext) -> Result<Vec<LoadResult<String>>, BoxError> {
    context.calls.lock().unwrap().push(keys.to_vec());
    let found =
        keys.iter().filter_map(|k| context.map.get(k).map(|v| (*k, v.clone()))).collect::<Vec<_>>();
    Ok(resolve_found(keys, found))
}

struct UserLoader;

#[async_trait]
impl BatchFunction for UserLoader {
    type Key = i64;
    type Value = String;
    type Context = NamedContext;

    async fn load(keys: &[i64], context: &NamedContext) -> Result<Vec<LoadResult<String>>, BoxError> {
        lookup(keys, context).await
    }
}

struct OfferLoader;

#[async_trait]
impl BatchFunction for OfferLoader {
    type Key = i64;
    type Value = String;
    type Context = NamedContext;

    async fn load(keys: &[i64], context: &NamedContext) -> Result<Vec<LoadResult<String>>, BoxError> {
        lookup(keys, context).await
    }
}

struct SleepyLoader;

#[async_trait]
impl BatchFunction for SleepyLoader {
    type Key = i64;
    type Value = String;
    type Context = CallLog;

    async fn load(keys: &[i64], calls: &CallLog) -> Result<Vec<LoadResult<String>>, BoxError> {
        calls.lock().unwrap().push(keys.to_vec());
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(resolve_found(keys, Vec::<(i64, String)>::new()))
    }
}

#[tokio::test]
async fn scope_shares_one_loader_instance_per_entity_type() {
    let (context, _) = NamedContext::new(&[(1, "alice")]);
    let scope = RequestScope::new();
    scope.register::<UserLoader>(context);

    let first = scope.loader::<UserLoader>();
    let second = scope.loader::<UserLoader>();
    assert!(Arc::ptr_eq(&first, &second));
}

#[tokio::test]
async fn concurrent_scope_loads_coalesce_into_one_batch() {
    let (context, calls) = NamedContext::new(&[(1, "alice"), (2, "bob")]);
    let scope = RequestScope::new();
    scope.register::<UserLoader>(context);

    let (a, b, c) = future::join3(
        scope.load::<UserLoader>(1),
        scope.load::<UserLoader>(2),
        scope.load::<UserLoader>(1),
    )
    .await;

    assert_eq!(a, Ok("alice".to_owned()));
    assert_eq!(b, Ok("bob".to_owned()));
    assert_eq!(c, Ok("alice".to_owned()));
    assert_eq!(*calls.lock().unwrap(), vec![vec![1, 2]]);
}

#[tokio::test]
async fn entity_types_batch_independently_within_one_scope() {
    let (users, user_calls) = NamedContext::new(&[(1, "alice")]);
    let (offers, offer_calls) = NamedContext::new(&[(7, "senior gopher")]);
    let scope = RequestScope::new();
    scope.register::<UserLoader>(users);
    scope.register::<OfferLoader>(offers);

    let (user, offer) =
        future::join(scope.load::<UserLoader>(1), scope.load::<OfferLoader>(7)).await;

    assert_eq!(user, Ok("alice".to_owned()));
    assert_eq!(offer, Ok("senior gopher".to_owned()));
    assert_eq!(*user_calls.lock().unwrap(), vec![vec![1]]);
    assert_eq!(*offer_calls.lock().unwrap(), vec![vec![7]]);
}

#[tokio::test]
async fn scopes_are_fully_isolated() {
    let (context_a, calls_a) = NamedContext::new(&[(1, "alice")]);
    let (context_b, calls_b) = NamedContext::new(&[(1, "from-b")]);
    let scope_a = RequestScope::new();
    let scope_b = RequestScope::new();
    scope_a.register::<UserLoader>(context_a);
    scope_b.register::<UserLoader>(context_b);

    assert_eq!(scope_a.load::<UserLoader>(1).await, Ok("alice".to_owned()));
    assert_eq!(scope_b.load::<UserLoader>(1).await, Ok("from-b".to_owned()));

    // Each scope issued its own backing lookup; nothing crossed over.
    assert_eq!(*calls_a.lock().unwrap(), vec![vec![1]]);
    assert_eq!(*calls_b.lock().unwrap(), vec![vec![1]]);
}

#[tokio::test]
#[should_panic(expected = "no batch function registered")]
async fn unregistered_entity_type_panics() {
    let scope = RequestScope::new();
    let _ = scope.loader::<UserLoader>();
}

#[tokio::test]
#[should_panic(expected = "already registered")]
async fn duplicate_registration_panics() {
    let (context_a, _) = NamedContext::new(&[]);
    let (context_b, _) = NamedContext::new(&[]);
    let scope = RequestScope::new();
    scope.register::<UserLoader>(context_a);
    scope.register::<UserLoader>(context_b);
}

#[tokio::test]
#[should_panic(expected = "has completed")]
async fn loading_after_complete_panics() {
    let (context, _) = NamedContext::new(&[]);
    let scope = RequestScope::new();
    scope.register::<UserLoader>(context);
    scope.complete();
    let _ = scope.loader::<UserLoader>();
}

#[tokio::test]
#[should_panic(expected = "has completed")]
async fn registering_after_complete_panics() {
    let (context, _) = NamedContext::new(&[]);
    let scope = RequestScope::new();
    scope.complete();
    scope.register::<UserLoader>(context);
}

#[tokio::test]
async fn completing_scope_cancels_inflight_loads() {
    let calls: CallLog = Arc::new(Mutex::new(Vec::new()));
    let scope = RequestScope::new();
    scope.register::<SleepyLoader>(calls.clone());

    let loader = scope.loader::<SleepyLoader>();
    let pending = tokio::spawn(async move { loader.load(1).await });

    // Give the worker time to dispatch; the batch call is now in flight.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(*calls.lock().unwrap(), vec![vec![1]]);

    scope.complete();
    assert_eq!(pending.await.unwrap(), Err(LoadError::Cancelled));
}

#[tokio::test]
async fn dropping_scope_cancels_inflight_loads() {
    let calls: CallLog = Arc::new(Mutex::new(Vec::new()));
    let scope = RequestScope::new();
    scope.register::<SleepyLoader>(calls.clone());

    let loader = scope.loader::<SleepyLoader>();
    let pending = tokio::spawn(async move { loader.load(1).await });

    tokio::time::sleep(Duration::from_millis(20)).await;
    drop(scope);

    assert_eq!(pending.await.unwrap(), Err(LoadError::Cancelled));
}
