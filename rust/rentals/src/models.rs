//! Row model for the rentals catalog.

use diesel::deserialize::QueryableByName;
use diesel::sql_types::{Float8, Int4, Int8, Nullable, Text};
use tokio_postgres::Row;

/// One rental joined with its owning user.
///
/// Field names match the column labels produced by the base SELECT (`type`
/// is aliased to `rental_type`). Filtered listings map rows through diesel and
/// the prepared by-id lookup maps them through `TryFrom<&Row>`.
#[derive(Debug, Clone, PartialEq, QueryableByName)]
pub struct Rental {
    #[diesel(sql_type = Int4)]
    pub id: i32,
    #[diesel(sql_type = Text)]
    pub name: String,
    #[diesel(sql_type = Text)]
    pub description: String,
    #[diesel(sql_type = Text)]
    pub rental_type: String,
    #[diesel(sql_type = Text)]
    pub vehicle_make: String,
    #[diesel(sql_type = Text)]
    pub vehicle_model: String,
    #[diesel(sql_type = Int4)]
    pub vehicle_year: i32,
    #[diesel(sql_type = Float8)]
    pub vehicle_length: f64,
    #[diesel(sql_type = Int4)]
    pub sleeps: i32,
    #[diesel(sql_type = Text)]
    pub primary_image_url: String,
    #[diesel(sql_type = Int8)]
    pub price_per_day: i64,
    #[diesel(sql_type = Text)]
    pub home_city: String,
    #[diesel(sql_type = Text)]
    pub home_state: String,
    #[diesel(sql_type = Text)]
    pub home_zip: String,
    #[diesel(sql_type = Text)]
    pub home_country: String,
    #[diesel(sql_type = Float8)]
    pub lat: f64,
    #[diesel(sql_type = Float8)]
    pub lng: f64,

    // Nullable because users are LEFT JOINed.
    #[diesel(sql_type = Nullable<Int4>)]
    pub user_id: Option<i32>,
    #[diesel(sql_type = Nullable<Text>)]
    pub first_name: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub last_name: Option<String>,
}

/// Maps a row returned by the prepared by-id statement.
impl TryFrom<&Row> for Rental {
    type Error = tokio_postgres::Error;

    fn try_from(row: &Row) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            rental_type: row.try_get("rental_type")?,
            vehicle_make: row.try_get("vehicle_make")?,
            vehicle_model: row.try_get("vehicle_model")?,
            vehicle_year: row.try_get("vehicle_year")?,
            vehicle_length: row.try_get("vehicle_length")?,
            sleeps: row.try_get("sleeps")?,
            primary_image_url: row.try_get("primary_image_url")?,
            price_per_day: row.try_get("price_per_day")?,
            home_city: row.try_get("home_city")?,
            home_state: row.try_get("home_state")?,
            home_zip: row.try_get("home_zip")?,
            home_country: row.try_get("home_country")?,
            lat: row.try_get("lat")?,
            lng: row.try_get("lng")?,
            user_id: row.try_get("user_id")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
        })
    }
}
