//! Uber rider and driver operations.

use serde_json::{json, Value};

use super::{CompletionRule, OperationSpec, ParamKind, ParamSpec, SessionPlan};
use crate::error::{EngineError, Result};
use crate::request::Params;

const MOBILE_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) \
     AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Mobile/15E148 Safari/604.1";

fn rider_session() -> SessionPlan {
    SessionPlan::new(
        "https://auth.uber.com/v2/?next_url=https%3A%2F%2Fm.uber.com%2Fgo",
        "uber.com",
        CompletionRule::UrlPrefix("https://m.uber.com/go".to_string()),
    )
    .user_agent(MOBILE_USER_AGENT)
}

fn driver_session() -> SessionPlan {
    SessionPlan::new(
        "https://auth.uber.com/v2/?next_url=https%3A%2F%2Fdrivers.uber.com",
        "uber.com",
        CompletionRule::UrlPrefix("https://drivers.uber.com".to_string()),
    )
}

pub(super) fn operations() -> Vec<OperationSpec> {
    vec![
        OperationSpec::new("uber_rider:profile", "getUberRiderProfile", rider_profile)
            .session(rider_session()),
        OperationSpec::new(
            "uber_rider:trip_history",
            "getUberRiderTripHistory",
            rider_trip_history,
        )
        .param(ParamSpec::optional("cursor", ParamKind::String))
        .session(rider_session()),
        OperationSpec::new("uber_rider:trip", "getUberRiderTrip", rider_trip)
            .param(ParamSpec::required("id", ParamKind::String))
            .session(rider_session()),
        OperationSpec::new("uber_driver:profile", "getUberDriverProfile", driver_profile)
            .session(driver_session()),
        OperationSpec::new("uber_driver:trips", "getUberDriverTrips", driver_trips)
            .param(ParamSpec::required("start_date", ParamKind::String))
            .param(ParamSpec::required("end_date", ParamKind::String))
            .param(ParamSpec::optional("cursor", ParamKind::String))
            .session(driver_session()),
        OperationSpec::new(
            "uber_rider:fare_estimate",
            "getUberFareEstimate",
            fare_estimate,
        )
        .param(ParamSpec::required("pickup_latitude", ParamKind::Number))
        .param(ParamSpec::required("pickup_longitude", ParamKind::Number))
        .param(ParamSpec::required("destination_latitude", ParamKind::Number))
        .param(ParamSpec::required("destination_longitude", ParamKind::Number))
        .check(check_coordinates)
        .session(rider_session()),
    ]
}

fn rider_profile(_: &Params) -> Value {
    json!({
        "uuid": "8f1c2a3e-0000-4000-8000-00000000a001",
        "first_name": "Alex",
        "last_name": "Rider",
        "email": "alex.rider@example.com",
        "mobile": "+15555550101",
        "rating": 4.92,
        "member_since": "2019-04-12",
    })
}

fn rider_trip_history(params: &Params) -> Value {
    let cursor = params.str("cursor").unwrap_or("");
    // Two fixed pages; any cursor other than the first page's ends the list.
    let (trips, next_cursor) = if cursor.is_empty() {
        (
            vec![
                trip("a1f7c2d0-0001", "2024-03-02T18:21:00Z", 18.45),
                trip("a1f7c2d0-0002", "2024-02-27T08:03:00Z", 11.20),
            ],
            Some("page-2"),
        )
    } else if cursor == "page-2" {
        (vec![trip("a1f7c2d0-0003", "2024-02-14T21:47:00Z", 32.10)], None)
    } else {
        (Vec::new(), None)
    };
    json!({ "trips": trips, "next_cursor": next_cursor })
}

fn rider_trip(params: &Params) -> Value {
    let id = params.str("id").unwrap_or_default();
    let mut detail = trip(id, "2024-03-02T18:21:00Z", 18.45);
    detail["pickup"] = json!({ "address": "1 Market St, San Francisco", "latitude": 37.7941, "longitude": -122.3951 });
    detail["dropoff"] = json!({ "address": "Pier 39, San Francisco", "latitude": 37.8087, "longitude": -122.4098 });
    detail["distance_miles"] = json!(2.1);
    detail["duration_minutes"] = json!(14);
    detail
}

fn trip(id: &str, requested_at: &str, fare: f64) -> Value {
    json!({
        "uuid": id,
        "requested_at": requested_at,
        "status": "COMPLETED",
        "product": "UberX",
        "fare": { "amount": fare, "currency": "USD" },
    })
}

fn driver_profile(_: &Params) -> Value {
    json!({
        "uuid": "8f1c2a3e-0000-4000-8000-00000000d001",
        "first_name": "Sam",
        "last_name": "Driver",
        "rating": 4.97,
        "lifetime_trips": 3120,
        "vehicle": { "make": "Toyota", "model": "Prius", "year": 2021 },
        "activated_at": "2020-06-01",
    })
}

fn driver_trips(params: &Params) -> Value {
    let start = params.str("start_date").unwrap_or_default();
    let end = params.str("end_date").unwrap_or_default();
    json!({
        "start_date": start,
        "end_date": end,
        "trips": [
            { "uuid": "d7e3b9a1-0001", "completed_at": start, "earnings": { "amount": 14.32, "currency": "USD" } },
            { "uuid": "d7e3b9a1-0002", "completed_at": end, "earnings": { "amount": 9.87, "currency": "USD" } },
        ],
        "next_cursor": Value::Null,
    })
}

fn check_coordinates(params: &Params) -> Result<()> {
    for (name, limit) in [
        ("pickup_latitude", 90.0),
        ("pickup_longitude", 180.0),
        ("destination_latitude", 90.0),
        ("destination_longitude", 180.0),
    ] {
        let value = params.f64(name).unwrap_or_default();
        if !value.is_finite() || value.abs() > limit {
            return Err(EngineError::InvalidParams(format!(
                "param '{}' must be within ±{}",
                name, limit
            )));
        }
    }
    Ok(())
}

const EARTH_RADIUS_KM: f64 = 6371.0;
const BASE_FARE: f64 = 2.50;
const PER_KM: f64 = 1.20;
const PER_MINUTE: f64 = 0.30;
const AVERAGE_SPEED_KMH: f64 = 30.0;

fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();
    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

fn cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn fare_estimate(params: &Params) -> Value {
    let coordinate = |name: &str| params.f64(name).unwrap_or_default();
    let distance_km = haversine_km(
        coordinate("pickup_latitude"),
        coordinate("pickup_longitude"),
        coordinate("destination_latitude"),
        coordinate("destination_longitude"),
    );
    let minutes = (distance_km / AVERAGE_SPEED_KMH * 60.0).round().max(1.0);
    let fare = BASE_FARE + PER_KM * distance_km + PER_MINUTE * minutes;

    json!({
        "currency": "USD",
        "distance_km": cents(distance_km),
        "duration_minutes": minutes as u64,
        "fare_estimate": cents(fare),
        "products": [
            { "name": "UberX", "low": cents(fare * 0.9), "high": cents(fare * 1.15) },
            { "name": "Comfort", "low": cents(fare * 1.2), "high": cents(fare * 1.45) },
        ],
    })
}
