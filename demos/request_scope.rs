use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use batchload::{resolve_found, BatchFunction, BoxError, LoadResult, RequestScope};
use futures::future;

#[derive(Debug, Clone)]
struct User {
    name: String,
}

#[derive(Debug, Clone)]
struct Offer {
    title: String,
    owner_id: i64,
}

// Stand-in for the relational store a real API would query.
struct Store {
    users: HashMap<i64, User>,
    offers: HashMap<i64, Offer>,
}

struct UserLoader;

#[async_trait]
impl BatchFunction for UserLoader {
    type Key = i64;
    type Value = User;
    type Context = Arc<Store>;

    async fn load(keys: &[i64], store: &Arc<Store>) -> Result<Vec<LoadResult<User>>, BoxError> {
        println!("user batch: {keys:?}");
        let found = keys.iter().filter_map(|k| store.users.get(k).map(|u| (*k, u.clone())));
        Ok(resolve_found(keys, found))
    }
}

struct OfferLoader;

#[async_trait]
impl BatchFunction for OfferLoader {
    type Key = i64;
    type Value = Offer;
    type Context = Arc<Store>;

    async fn load(keys: &[i64], store: &Arc<Store>) -> Result<Vec<LoadResult<Offer>>, BoxError> {
        println!("offer batch: {keys:?}");
        let found = keys.iter().filter_map(|k| store.offers.get(k).map(|o| (*k, o.clone())));
        Ok(resolve_found(keys, found))
    }
}

#[tokio::main]
async fn main() {
    let store = Arc::new(Store {
        users: [
            (10, User { name: "adriana".to_owned() }),
            (20, User { name: "bruno".to_owned() }),
        ]
        .into_iter()
        .collect(),
        offers: [
            (1, Offer { title: "backend engineer".to_owned(), owner_id: 10 }),
            (2, Offer { title: "data engineer".to_owned(), owner_id: 20 }),
            (3, Offer { title: "platform engineer".to_owned(), owner_id: 10 }),
        ]
        .into_iter()
        .collect(),
    });

    // One scope per incoming request, created at ingress.
    let scope = RequestScope::new();
    scope.register::<UserLoader>(store.clone());
    scope.register::<OfferLoader>(store.clone());

    // A query resolving several offer fields at once issues one offer batch.
    let offers = scope.load_many::<OfferLoader>(vec![1, 2, 3, 9]).await;

    // Resolving each offer's owner concurrently coalesces into one user
    // batch over the distinct owner ids.
    let owners =
        future::join_all(offers.iter().flatten().map(|o| scope.load::<UserLoader>(o.owner_id)))
            .await;

    for (offer, owner) in offers.iter().flatten().zip(owners) {
        match owner {
            Ok(user) => println!("{} <- {}", offer.title, user.name),
            Err(e) => println!("{} <- error: {e}", offer.title),
        }
    }
    for outcome in &offers {
        if let Err(e) = outcome {
            println!("offer error: {e}");
        }
    }

    // The request is done; everything scoped to it goes away.
    scope.complete();
}
