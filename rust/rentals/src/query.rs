//! Translates rental listing parameters into parameterized SQL.
//!
//! Values from the query string are never spliced into the statement text.
//! Every value becomes a `$n` bind parameter and the only dynamic identifiers
//! are sort columns taken from a fixed whitelist.

use std::collections::BTreeMap;
use thiserror::Error;

/// Rentals joined with their owning user. Numeric columns are cast so that
/// row mapping does not depend on the exact numeric column types.
pub const SELECT_RENTALS: &str = "SELECT r.id, name, description, type AS rental_type, \
     vehicle_make, vehicle_model, vehicle_year, vehicle_length::float8 AS vehicle_length, \
     sleeps, primary_image_url, price_per_day::int8 AS price_per_day, home_city, home_state, \
     home_zip, home_country, lat::float8 AS lat, lng::float8 AS lng, user_id, first_name, \
     last_name FROM rentals r LEFT JOIN users u ON r.user_id = u.id";

const EARTH_RADIUS_MILES: u32 = 3959;
const NEAR_RADIUS_MILES: u32 = 100;

pub const PRICE_MIN: &str = "price_min";
pub const PRICE_MAX: &str = "price_max";
pub const IDS: &str = "ids";
pub const NEAR: &str = "near";
pub const SORT: &str = "sort";
pub const OFFSET: &str = "offset";
pub const LIMIT: &str = "limit";

/// Raw listing parameters keyed by query-string name.
///
/// Keys may repeat in a query string; every value is kept but only the first
/// one per key is consulted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterClauses {
    clauses: BTreeMap<String, Vec<String>>,
}

impl FilterClauses {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.clauses
            .entry(key.into())
            .or_default()
            .push(value.into());
    }

    pub fn first(&self, key: &str) -> Option<&str> {
        self.clauses
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for FilterClauses
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut clauses = Self::new();
        for (key, value) in iter {
            clauses.insert(key, value);
        }
        clauses
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BindParam {
    Int(i64),
    Float(f64),
}

/// A complete statement and its bind values in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: Vec<BindParam>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {key} parameter: {reason}")]
pub struct FilterError {
    pub key: &'static str,
    pub reason: String,
}

impl FilterError {
    fn new(key: &'static str, reason: impl Into<String>) -> Self {
        Self {
            key,
            reason: reason.into(),
        }
    }
}

type Result<T> = std::result::Result<T, FilterError>;

/// Maps a public sort key onto its column.
pub fn sort_column(key: &str) -> Option<&'static str> {
    match key {
        "price" => Some("price_per_day"),
        "year" => Some("vehicle_year"),
        _ => None,
    }
}

/// Appends WHERE, ORDER BY, OFFSET and LIMIT (in that order) to `base`.
///
/// `base` must be a plain SELECT without any of those clauses.
pub fn build_query(base: &str, clauses: &FilterClauses) -> Result<BuiltQuery> {
    let mut builder = SqlBuilder::new(base);

    let mut conditions = Vec::new();
    if let Some(raw) = clauses.first(PRICE_MIN) {
        let price = builder.bind(BindParam::Int(parse_int(PRICE_MIN, raw)?));
        conditions.push(format!("price_per_day >= {price}"));
    }
    if let Some(raw) = clauses.first(PRICE_MAX) {
        let price = builder.bind(BindParam::Int(parse_int(PRICE_MAX, raw)?));
        conditions.push(format!("price_per_day <= {price}"));
    }
    if let Some(raw) = clauses.first(IDS) {
        let placeholders = parse_ids(raw)?
            .into_iter()
            .map(|id| builder.bind(BindParam::Int(id)))
            .collect::<Vec<_>>();
        conditions.push(format!("r.id IN ({})", placeholders.join(", ")));
    }
    if let Some(raw) = clauses.first(NEAR) {
        let (lat, lng) = parse_coordinates(raw)?;
        let lat = builder.bind(BindParam::Float(lat));
        let lng = builder.bind(BindParam::Float(lng));
        conditions.push(near_condition(&lat, &lng));
    }

    if !conditions.is_empty() {
        builder.push(" WHERE ");
        builder.push(&conditions.join(" AND "));
    }

    if let Some(column) = clauses.first(SORT).and_then(sort_column) {
        builder.push(" ORDER BY ");
        builder.push(column);
    }

    if let Some(raw) = clauses.first(OFFSET) {
        let offset = builder.bind(BindParam::Int(parse_non_negative(OFFSET, raw)?));
        builder.push(&format!(" OFFSET {offset}"));
    }
    if let Some(raw) = clauses.first(LIMIT) {
        let limit = builder.bind(BindParam::Int(parse_non_negative(LIMIT, raw)?));
        builder.push(&format!(" LIMIT {limit}"));
    }

    Ok(builder.finish())
}

// Great-circle distance in miles between the bound point and the rental.
// acos is clamped to 1.0 so rounding at distance zero stays in its domain.
fn near_condition(lat: &str, lng: &str) -> String {
    format!(
        "{EARTH_RADIUS_MILES} * acos(LEAST(1.0, cos(radians({lat})) * cos(radians(r.lat)) \
         * cos(radians(r.lng) - radians({lng})) + sin(radians({lat})) * sin(radians(r.lat)))) \
         < {NEAR_RADIUS_MILES}"
    )
}

struct SqlBuilder {
    sql: String,
    params: Vec<BindParam>,
}

impl SqlBuilder {
    fn new(base: &str) -> Self {
        Self {
            sql: base.trim_end().to_string(),
            params: Vec::new(),
        }
    }

    /// Registers a bind value and returns its placeholder.
    fn bind(&mut self, param: BindParam) -> String {
        self.params.push(param);
        format!("${}", self.params.len())
    }

    fn push(&mut self, fragment: &str) {
        self.sql.push_str(fragment);
    }

    fn finish(self) -> BuiltQuery {
        BuiltQuery {
            sql: self.sql,
            params: self.params,
        }
    }
}

fn parse_int(key: &'static str, raw: &str) -> Result<i64> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| FilterError::new(key, format!("expected an integer, got '{raw}'")))
}

fn parse_non_negative(key: &'static str, raw: &str) -> Result<i64> {
    let value = parse_int(key, raw)?;
    if value < 0 {
        return Err(FilterError::new(key, "must not be negative"));
    }
    Ok(value)
}

fn parse_ids(raw: &str) -> Result<Vec<i64>> {
    if raw.trim().is_empty() {
        return Err(FilterError::new(IDS, "expected at least one id"));
    }

    raw.split(',').map(|part| parse_int(IDS, part)).collect()
}

fn parse_coordinates(raw: &str) -> Result<(f64, f64)> {
    let (lat, lng) = raw
        .split_once(',')
        .ok_or_else(|| FilterError::new(NEAR, format!("expected '<lat>,<lng>', got '{raw}'")))?;

    let lat = parse_degrees(lat, 90.0)?;
    let lng = parse_degrees(lng, 180.0)?;
    Ok((lat, lng))
}

fn parse_degrees(raw: &str, bound: f64) -> Result<f64> {
    let value = raw
        .trim()
        .parse::<f64>()
        .map_err(|_| FilterError::new(NEAR, format!("expected a number, got '{raw}'")))?;

    if !value.is_finite() || value.abs() > bound {
        return Err(FilterError::new(
            NEAR,
            format!("coordinate {value} is outside [-{bound}, {bound}]"),
        ));
    }
    Ok(value)
}
