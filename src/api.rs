//! # REST API
//!
//! Builds the axum router that exposes the ledger over HTTP. Handlers only
//! translate between HTTP and the typed ledger calls; every rule lives in
//! [`Ledger`].
//!
//! ## Endpoints
//!
//! | Method | Path                                 | Description                 |
//! |--------|--------------------------------------|-----------------------------|
//! | GET    | `/`                                  | Welcome text                |
//! | GET    | `/health`                            | Liveness check              |
//! | POST   | `/api/transactions`                  | Create a transaction        |
//! | GET    | `/api/transactions?user_id=ID`       | List a user's transactions  |
//! | GET    | `/api/transactions/:transaction_id`  | Fetch one transaction       |
//! | PUT    | `/api/transactions/:transaction_id`  | Complete or fail it         |

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::dto::{
    CreateTransaction, ListTransactionsQuery, Transaction, TransactionList, UpdateStatusRequest,
};
use crate::{Error, Ledger};

#[derive(Clone)]
pub struct AppState {
    pub ledger: Ledger,
}

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(ledger: Ledger) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/", get(welcome_handler))
        .route("/health", get(health_handler))
        .route(
            "/api/transactions",
            get(list_transactions_handler).post(create_transaction_handler),
        )
        .route(
            "/api/transactions/:transaction_id",
            get(get_transaction_handler).put(update_status_handler),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { ledger })
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// An error response: a status code and an `{"error": ...}` body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::InvalidTransition { .. } => StatusCode::CONFLICT,
            Error::Persistence(e) => {
                tracing::error!(error = %e, "store failure while serving request");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn welcome_handler() -> &'static str {
    "Welcome to the transaction ledger API!"
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// `POST /api/transactions`
async fn create_transaction_handler(
    State(state): State<AppState>,
    body: Result<Json<CreateTransaction>, JsonRejection>,
) -> Result<(StatusCode, Json<Transaction>), ApiError> {
    let Json(request) = body?;
    let transaction = state.ledger.create(request).await?;
    Ok((StatusCode::CREATED, Json(transaction)))
}

/// `GET /api/transactions?user_id=ID`
async fn list_transactions_handler(
    State(state): State<AppState>,
    query: Result<Query<ListTransactionsQuery>, QueryRejection>,
) -> Result<Json<TransactionList>, ApiError> {
    let Query(query) = query?;
    let transactions = state.ledger.list_by_user(query).await?;
    Ok(Json(TransactionList { transactions }))
}

/// `GET /api/transactions/:transaction_id`
async fn get_transaction_handler(
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
) -> Result<Json<Transaction>, ApiError> {
    Ok(Json(state.ledger.get_by_id(&transaction_id).await?))
}

/// `PUT /api/transactions/:transaction_id`
async fn update_status_handler(
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
    body: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<Transaction>, ApiError> {
    let Json(request) = body?;
    Ok(Json(
        state.ledger.update_status(&transaction_id, request).await?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::{TransactionStatus, TransactionType};
    use crate::stores::MemoryStore;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_router() -> Router {
        create_router(Ledger::new(Arc::new(MemoryStore::new())))
    }

    async fn send(router: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    async fn get(router: &Router, path: &str) -> (StatusCode, serde_json::Value) {
        let req = Request::builder().uri(path).body(Body::empty()).unwrap();
        send(router, req).await
    }

    async fn send_json(
        router: &Router,
        method: &str,
        path: &str,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let req = Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        send(router, req).await
    }

    async fn create(router: &Router, amount: u32, kind: &str, user: u64) -> Transaction {
        let (status, body) = send_json(
            router,
            "POST",
            "/api/transactions",
            json!({ "amount": amount, "transaction_type": kind, "user": user }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        serde_json::from_value(body).unwrap()
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let router = test_router();
        let (status, body) = get(&router, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn create_returns_201_with_assigned_fields() {
        let router = test_router();
        let (status, body) = send_json(
            &router,
            "POST",
            "/api/transactions",
            json!({ "amount": 100, "transaction_type": "DEPOSIT", "user": 7 }),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["transaction_id"], 1);
        assert_eq!(body["amount"], 100);
        assert_eq!(body["transaction_type"], "DEPOSIT");
        assert_eq!(body["status"], "PENDING");
        assert_eq!(body["user"], 7);
        assert!(body["timestamp"].is_string());

        let created: Transaction = serde_json::from_value(body).unwrap();
        assert_eq!(created.amount, dec!(100));
    }

    #[tokio::test]
    async fn fractional_amount_is_returned_as_number() {
        let router = test_router();
        let (status, body) = send_json(
            &router,
            "POST",
            "/api/transactions",
            json!({ "amount": 12.34567, "transaction_type": "WITHDRAWAL", "user": 7 }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["amount"], 12.3456);

        let (_, body) = get(&router, "/api/transactions/1").await;
        assert_eq!(body["amount"], 12.3456);
    }

    #[tokio::test]
    async fn lowercase_transaction_type_returns_400() {
        let router = test_router();
        let (status, body) = send_json(
            &router,
            "POST",
            "/api/transactions",
            json!({ "amount": 10, "transaction_type": "deposit", "user": 7 }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn create_assigns_increasing_ids() {
        let router = test_router();
        assert_eq!(create(&router, 100, "DEPOSIT", 7).await.transaction_id, 1);
        assert_eq!(create(&router, 50, "WITHDRAWAL", 7).await.transaction_id, 2);
    }

    #[tokio::test]
    async fn create_with_missing_or_zero_fields_returns_400() {
        let router = test_router();
        for body in [
            json!({ "transaction_type": "DEPOSIT", "user": 7 }),
            json!({ "amount": 0, "transaction_type": "DEPOSIT", "user": 7 }),
            json!({ "amount": 5, "user": 7 }),
            json!({ "amount": 5, "transaction_type": "DEPOSIT" }),
        ] {
            let (status, resp) = send_json(&router, "POST", "/api/transactions", body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(
                resp["error"],
                "amount, transaction_type, user fields are required."
            );
        }

        let (_, body) = get(&router, "/api/transactions?user_id=7").await;
        assert_eq!(body["transactions"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn create_with_unknown_type_returns_400() {
        let router = test_router();
        let (status, body) = send_json(
            &router,
            "POST",
            "/api/transactions",
            json!({ "amount": 5, "transaction_type": "TRANSFER", "user": 7 }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn list_by_user_returns_only_that_user() {
        let router = test_router();
        create(&router, 100, "DEPOSIT", 7).await;
        create(&router, 50, "WITHDRAWAL", 7).await;
        create(&router, 10, "DEPOSIT", 8).await;

        let (status, body) = get(&router, "/api/transactions?user_id=7").await;
        assert_eq!(status, StatusCode::OK);
        let list: TransactionList = serde_json::from_value(body).unwrap();
        let mut ids: Vec<_> = list.transactions.iter().map(|t| t.transaction_id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn list_without_user_id_returns_400() {
        let router = test_router();
        let (status, body) = get(&router, "/api/transactions").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "user_id is required as a query parameter.");

        let (status, _) = get(&router, "/api/transactions?user_id=abc").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn get_by_id_round_trips() {
        let router = test_router();
        let created = create(&router, 25, "WITHDRAWAL", 3).await;

        let (status, body) = get(&router, "/api/transactions/1").await;
        assert_eq!(status, StatusCode::OK);
        let fetched: Transaction = serde_json::from_value(body).unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.transaction_type, TransactionType::Withdrawal);
    }

    #[tokio::test]
    async fn get_missing_returns_404_and_bad_id_returns_400() {
        let router = test_router();
        let (status, body) = get(&router, "/api/transactions/42").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Transaction not found.");

        let (status, _) = get(&router, "/api/transactions/abc").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn put_completes_transaction() {
        let router = test_router();
        create(&router, 100, "DEPOSIT", 7).await;
        create(&router, 50, "WITHDRAWAL", 7).await;

        let (status, body) = send_json(
            &router,
            "PUT",
            "/api/transactions/1",
            json!({ "status": "COMPLETED" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "COMPLETED");
        assert_eq!(body["transaction_id"], 1);

        let (_, body) = get(&router, "/api/transactions/2").await;
        assert_eq!(body["status"], "PENDING");
    }

    #[tokio::test]
    async fn put_unknown_id_returns_404() {
        let router = test_router();
        let (status, _) = send_json(
            &router,
            "PUT",
            "/api/transactions/999",
            json!({ "status": "COMPLETED" }),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn put_invalid_status_or_id_returns_400() {
        let router = test_router();
        create(&router, 100, "DEPOSIT", 7).await;

        for body in [
            json!({ "status": "PENDING" }),
            json!({ "status": "DONE" }),
            json!({}),
        ] {
            let (status, _) = send_json(&router, "PUT", "/api/transactions/1", body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }

        let (status, body) = send_json(
            &router,
            "PUT",
            "/api/transactions/x1",
            json!({ "status": "FAILED" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid transaction_id: Must be a valid number.");
    }

    #[tokio::test]
    async fn put_on_terminal_status_returns_409() {
        let router = test_router();
        create(&router, 100, "DEPOSIT", 7).await;
        send_json(
            &router,
            "PUT",
            "/api/transactions/1",
            json!({ "status": "FAILED" }),
        )
        .await;

        let (status, _) = send_json(
            &router,
            "PUT",
            "/api/transactions/1",
            json!({ "status": "COMPLETED" }),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, body) = get(&router, "/api/transactions/1").await;
        let stored: Transaction = serde_json::from_value(body).unwrap();
        assert_eq!(stored.status, TransactionStatus::Failed);
    }
}
