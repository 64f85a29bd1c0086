use axum::{
    body::Bytes,
    extract::State as AxumState,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use lixi_types::{
    api::{ClaimRequest, ClaimResponse, CreateRoomRequest, CreateRoomResponse, MessageResponse},
    room::{AMOUNT_MAX_CEILING, AMOUNT_MIN_FLOOR},
    Rejection, RoomId,
};
use serde::Serialize;
use serde_json::Value;
use std::fmt::Write;
use std::sync::Arc;
use std::time::Instant;

use crate::metrics::LatencySnapshot;
use crate::Server;

/// Largest integer a JSON float can carry without losing precision.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

#[derive(Serialize)]
struct HealthzResponse {
    ok: bool,
}

pub(super) async fn healthz() -> Response {
    Json(HealthzResponse { ok: true }).into_response()
}

pub(super) async fn stats(AxumState(server): AxumState<Arc<Server>>) -> Response {
    Json(server.store().stats()).into_response()
}

pub(super) async fn http_metrics(AxumState(server): AxumState<Arc<Server>>) -> Response {
    Json(server.http_metrics_snapshot()).into_response()
}

pub(super) async fn prometheus_metrics(AxumState(server): AxumState<Arc<Server>>) -> Response {
    let body = render_prometheus_metrics(&server);
    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; version=0.0.4"),
        )],
        body,
    )
        .into_response()
}

/// `POST /api/room`
pub(super) async fn create_room(
    AxumState(server): AxumState<Arc<Server>>,
    body: Bytes,
) -> Response {
    let start = Instant::now();
    let response = match parse_create_room(&parse_body(&body)) {
        Ok(CreateRoomRequest {
            amount: [amount_min, amount_max],
        }) => {
            let id = server.store().create_room(amount_min, amount_max);
            server.http_metrics().inc_room_created();
            tracing::info!(room_id = %id, amount_min, amount_max, "Room created");
            Json(CreateRoomResponse { id }).into_response()
        }
        Err(rejection) => reject(&server, rejection),
    };
    server.http_metrics().record_create_room(start.elapsed());
    response
}

/// `POST /api/get-lixi`
pub(super) async fn claim(AxumState(server): AxumState<Arc<Server>>, body: Bytes) -> Response {
    let start = Instant::now();
    let response = match handle_claim(&server, &parse_body(&body)) {
        Ok(money) => Json(ClaimResponse { money }).into_response(),
        Err(rejection) => reject(&server, rejection),
    };
    server.http_metrics().record_claim(start.elapsed());
    response
}

fn handle_claim(server: &Server, body: &Value) -> Result<i64, Rejection> {
    let ClaimRequest { id, account_id } = parse_claim(body)?;

    if server.store().get_room(&id).is_none() {
        return Err(Rejection::RoomNotFound);
    }

    match server.store().claim(&id, &account_id) {
        Ok(outcome) => {
            server.http_metrics().inc_claim(outcome.repeated);
            tracing::info!(
                room_id = %id,
                account_id = %account_id,
                amount = outcome.amount,
                repeated = outcome.repeated,
                "Lixi claimed"
            );
            Ok(outcome.amount)
        }
        Err(err) => {
            tracing::warn!(room_id = %id, account_id = %account_id, "Claim failed: {err}");
            Err(Rejection::ClaimFailed)
        }
    }
}

fn reject(server: &Server, rejection: Rejection) -> Response {
    server.http_metrics().inc_rejection(rejection);
    tracing::debug!(reason = rejection.as_str(), "Request rejected");
    Json(MessageResponse::from(rejection)).into_response()
}

/// Bodies that are not JSON are handled like an empty object.
fn parse_body(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes).unwrap_or(Value::Null)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn whole_number(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|n| n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER)
            .map(|n| n as i64)
    })
}

fn parse_create_room(body: &Value) -> Result<CreateRoomRequest, Rejection> {
    let amount = body
        .get("amount")
        .filter(|amount| is_truthy(amount))
        .ok_or(Rejection::AmountRequired)?;

    let pair = match amount.as_array() {
        Some(items) if items.len() == 2 => items,
        _ => return Err(Rejection::AmountNotPair),
    };

    match (whole_number(&pair[0]), whole_number(&pair[1])) {
        (Some(amount_min), Some(amount_max))
            if amount_min >= AMOUNT_MIN_FLOOR
                && amount_max <= AMOUNT_MAX_CEILING
                && amount_min <= amount_max =>
        {
            Ok(CreateRoomRequest {
                amount: [amount_min, amount_max],
            })
        }
        _ => Err(Rejection::AmountOutOfRange),
    }
}

/// Participant key for an `accountId`. Integral numbers are keyed by their
/// integer form whatever their JSON spelling, so `100`, `100.0` and `1e2`
/// name the same participant as `"100"`.
fn account_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(
            whole_number(value)
                .map(|n| n.to_string())
                .unwrap_or_else(|| number.to_string()),
        ),
        Value::Bool(true) => Some("true".to_string()),
        _ => None,
    }
}

fn parse_claim(body: &Value) -> Result<ClaimRequest, Rejection> {
    let id = body
        .get("id")
        .and_then(Value::as_str)
        .and_then(|raw| RoomId::parse(raw).ok())
        .ok_or(Rejection::InvalidId)?;

    let account_id = body
        .get("accountId")
        .filter(|account| is_truthy(account))
        .and_then(account_string)
        .ok_or(Rejection::InvalidAccount)?;

    Ok(ClaimRequest { id, account_id })
}

fn render_prometheus_metrics(server: &Server) -> String {
    let http = server.http_metrics_snapshot();
    let stats = server.store().stats();

    let mut out = String::new();
    append_histogram(&mut out, "lixi_http_create_room_latency_ms", &http.create_room);
    append_histogram(&mut out, "lixi_http_claim_latency_ms", &http.claim);
    append_counter(&mut out, "lixi_rooms_created_total", http.rooms_created);
    append_counter(&mut out, "lixi_claims_issued_total", http.claims_issued);
    append_counter(&mut out, "lixi_claims_repeated_total", http.claims_repeated);
    append_counter(
        &mut out,
        "lixi_http_reject_body_limit_total",
        http.reject_body_limit,
    );

    let _ = writeln!(out, "# TYPE lixi_rejections_total counter");
    let rejections = http.rejections;
    for (reason, count) in [
        (Rejection::AmountRequired, rejections.amount_required),
        (Rejection::AmountNotPair, rejections.amount_not_pair),
        (Rejection::AmountOutOfRange, rejections.amount_out_of_range),
        (Rejection::InvalidId, rejections.invalid_id),
        (Rejection::InvalidAccount, rejections.invalid_account),
        (Rejection::RoomNotFound, rejections.room_not_found),
        (Rejection::ClaimFailed, rejections.claim_failed),
    ] {
        let _ = writeln!(
            out,
            "lixi_rejections_total{{reason=\"{}\"}} {count}",
            reason.as_str()
        );
    }

    append_gauge(&mut out, "lixi_rooms", stats.rooms);
    append_gauge(&mut out, "lixi_claims", stats.claims);
    out
}

fn append_counter(out: &mut String, name: &str, value: u64) {
    let _ = writeln!(out, "# TYPE {name} counter");
    let _ = writeln!(out, "{name} {value}");
}

fn append_gauge(out: &mut String, name: &str, value: impl std::fmt::Display) {
    let _ = writeln!(out, "# TYPE {name} gauge");
    let _ = writeln!(out, "{name} {value}");
}

fn append_histogram(out: &mut String, name: &str, snapshot: &LatencySnapshot) {
    let _ = writeln!(out, "# TYPE {name} histogram");
    let mut cumulative = 0u64;
    for (bucket, count) in snapshot.buckets_ms.iter().zip(snapshot.counts.iter()) {
        cumulative = cumulative.saturating_add(*count);
        let _ = writeln!(out, "{name}_bucket{{le=\"{bucket}\"}} {cumulative}");
    }
    cumulative = cumulative.saturating_add(snapshot.overflow);
    let _ = writeln!(out, "{name}_bucket{{le=\"+Inf\"}} {cumulative}");
    let _ = writeln!(out, "{name}_count {}", snapshot.count);
    let sum = snapshot.avg_ms * snapshot.count as f64;
    let _ = writeln!(out, "{name}_sum {sum}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn truthiness() {
        for value in [json!(null), json!(false), json!(0), json!(0.0), json!("")] {
            assert!(!is_truthy(&value), "{value}");
        }
        for value in [json!(true), json!(1), json!(-2.5), json!("0"), json!([]), json!({})] {
            assert!(is_truthy(&value), "{value}");
        }
    }

    #[test]
    fn amount_validation_order() {
        // Shape is checked before range.
        assert_eq!(
            parse_create_room(&json!({ "amount": [1, 2, 3] })),
            Err(Rejection::AmountNotPair)
        );
        assert_eq!(
            parse_create_room(&json!({ "amount": [10, 10] })),
            Ok(CreateRoomRequest { amount: [10, 10] })
        );
        assert_eq!(
            parse_create_room(&json!({ "amount": [10, 500] })),
            Ok(CreateRoomRequest { amount: [10, 500] })
        );
        assert_eq!(
            parse_create_room(&json!({ "amount": [9, 500] })),
            Err(Rejection::AmountOutOfRange)
        );
    }

    #[test]
    fn claim_validation_order() {
        // An invalid id wins over a missing account.
        assert_eq!(parse_claim(&json!({ "id": "xyz" })), Err(Rejection::InvalidId));
        assert_eq!(
            parse_claim(&json!({ "id": "0123456789ABCDEF01234567", "accountId": 7 })),
            Ok(ClaimRequest {
                id: RoomId::parse("0123456789ABCDEF01234567").unwrap(),
                account_id: "7".to_string(),
            })
        );
        assert_eq!(
            parse_claim(&json!({ "id": "0123456789abcdef01234567", "accountId": true }))
                .map(|request| request.account_id),
            Ok("true".to_string())
        );
    }

    #[test]
    fn integral_account_spellings_share_a_key() {
        for raw in ["100", "100.0", "1e2", "1.0e2", "\"100\""] {
            let value: Value = serde_json::from_str(raw).unwrap();
            assert_eq!(account_string(&value).as_deref(), Some("100"), "{raw}");
        }
        assert_eq!(account_string(&json!(1.5)).as_deref(), Some("1.5"));
    }

    #[test]
    fn whole_numbers() {
        assert_eq!(whole_number(&json!(12)), Some(12));
        assert_eq!(whole_number(&json!(12.0)), Some(12));
        assert_eq!(whole_number(&json!(12.5)), None);
        assert_eq!(whole_number(&json!("12")), None);
        assert_eq!(whole_number(&json!(1e300)), None);
    }
}
