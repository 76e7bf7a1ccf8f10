//! HTTP handlers and the public response shapes.

use crate::{
    error::{Result, ServiceError},
    models::Rental,
    query::FilterClauses,
    state::AppState,
};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RentalResponse {
    pub id: i32,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub rental_type: String,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub length: f64,
    pub sleeps: i32,
    pub primary_image_url: String,
    pub price: PriceResponse,
    pub location: LocationResponse,
    pub user: UserResponse,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceResponse {
    pub day: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationResponse {
    pub city: String,
    pub state: String,
    pub zip: String,
    pub country: String,
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Option<i32>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RentalsResponse {
    pub rentals: Vec<RentalResponse>,
}

impl From<Rental> for RentalResponse {
    fn from(rental: Rental) -> Self {
        Self {
            id: rental.id,
            name: rental.name,
            description: rental.description,
            rental_type: rental.rental_type,
            make: rental.vehicle_make,
            model: rental.vehicle_model,
            year: rental.vehicle_year,
            length: rental.vehicle_length,
            sleeps: rental.sleeps,
            primary_image_url: rental.primary_image_url,
            price: PriceResponse {
                day: rental.price_per_day,
            },
            location: LocationResponse {
                city: rental.home_city,
                state: rental.home_state,
                zip: rental.home_zip,
                country: rental.home_country,
                lat: rental.lat,
                lng: rental.lng,
            },
            user: UserResponse {
                id: rental.user_id,
                first_name: rental.first_name,
                last_name: rental.last_name,
            },
        }
    }
}

/// `GET /rentals/:id`, also mounted at `/rentals/` so an empty id is a 400.
pub async fn retrieve_rental_by_id(
    State(state): State<AppState>,
    id: Option<Path<String>>,
) -> Result<Json<RentalResponse>> {
    let raw = id.map(|Path(id)| id).unwrap_or_default();
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ServiceError::MissingParameter("id"));
    }

    let id = raw
        .parse::<i32>()
        .map_err(|_| ServiceError::InvalidRequest(format!("invalid id parameter '{raw}'")))?;

    let rental = state
        .rentals
        .retrieve_rental_by_id(id)
        .await
        .map_err(|err| ServiceError::repository("failed to retrieve rental by id", err))?;

    Ok(Json(rental.into()))
}

/// `GET /rentals?price_min=&price_max=&ids=&near=&sort=&offset=&limit=`
pub async fn retrieve_rentals(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<RentalsResponse>> {
    let clauses: FilterClauses = params.into_iter().collect();

    let rentals = state
        .rentals
        .retrieve_rentals(&clauses)
        .await
        .map_err(|err| ServiceError::repository("failed to retrieve rentals", err))?;

    Ok(Json(RentalsResponse {
        rentals: rentals.into_iter().map(RentalResponse::from).collect(),
    }))
}
