#![allow(dead_code)]

pub mod fixture;

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use rentals::{
    config::{AppConfig, DatabaseConfig},
    models::Rental,
    query::{self, FilterClauses, SELECT_RENTALS},
    repository::{RentalStore, RepositoryError},
    server::Server,
};
use serde_json::Value;
use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};
use tower::ServiceExt;

/// Serves rentals from memory. Listings validate their clauses the same way
/// the Postgres repository does and return every stored rental in id order.
#[derive(Default)]
pub struct InMemoryRentals {
    rentals: Vec<Rental>,
    fail_with: Mutex<Option<RepositoryError>>,
    last_clauses: Mutex<Option<FilterClauses>>,
    closes: AtomicUsize,
}

impl InMemoryRentals {
    pub fn with_rentals(rentals: Vec<Rental>) -> Self {
        Self {
            rentals,
            ..Self::default()
        }
    }

    /// Makes the next store call fail with `err`.
    pub fn fail_next(&self, err: RepositoryError) {
        *self.fail_with.lock().expect("lock poisoned") = Some(err);
    }

    pub fn last_clauses(&self) -> Option<FilterClauses> {
        self.last_clauses.lock().expect("lock poisoned").clone()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    fn take_failure(&self) -> Result<(), RepositoryError> {
        match self.fail_with.lock().expect("lock poisoned").take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RentalStore for InMemoryRentals {
    async fn retrieve_rental_by_id(&self, id: i32) -> Result<Rental, RepositoryError> {
        self.take_failure()?;
        self.rentals
            .iter()
            .find(|rental| rental.id == id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn retrieve_rentals(
        &self,
        clauses: &FilterClauses,
    ) -> Result<Vec<Rental>, RepositoryError> {
        *self.last_clauses.lock().expect("lock poisoned") = Some(clauses.clone());
        query::build_query(SELECT_RENTALS, clauses)?;
        self.take_failure()?;
        Ok(self.rentals.clone())
    }

    async fn close(&self) -> Result<(), RepositoryError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.take_failure()
    }
}

pub fn rental(id: i32, name: &str) -> Rental {
    Rental {
        id,
        name: name.to_string(),
        description: format!("{name} description"),
        rental_type: "camper-van".to_string(),
        vehicle_make: "Volkswagen".to_string(),
        vehicle_model: "Bay Window".to_string(),
        vehicle_year: 1978,
        vehicle_length: 15.0,
        sleeps: 4,
        primary_image_url: format!("https://example.com/{id}.png"),
        price_per_day: 16900,
        home_city: "Costa Mesa".to_string(),
        home_state: "CA".to_string(),
        home_zip: "92627".to_string(),
        home_country: "US".to_string(),
        lat: 33.64,
        lng: -117.93,
        user_id: Some(1),
        first_name: Some("John".to_string()),
        last_name: Some("Smith".to_string()),
    }
}

pub fn test_config(database: DatabaseConfig) -> AppConfig {
    AppConfig {
        listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        database,
        max_pool_size: 2,
        shutdown_grace: Duration::from_secs(1),
    }
}

pub fn unused_database() -> DatabaseConfig {
    DatabaseConfig {
        host: "localhost".to_string(),
        port: 5432,
        username: "unused".to_string(),
        password: "unused".to_string(),
        name: "unused".to_string(),
        ssl_root_cert: None,
        ssl_cert: None,
        ssl_key: None,
    }
}

pub fn router_for(store: Arc<InMemoryRentals>) -> Router {
    Server::with_store(test_config(unused_database()), store).router()
}

pub async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("failed to build request");

    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("router should respond");

    let status = response.status();
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}
