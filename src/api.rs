use crate::error::MineError;
use crate::ledger::Ledger;
use crate::pow::CancelFlag;
use actix_web::{rt, web, HttpResponse, Responder};
use log::{error, warn};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub struct AppState {
    /// Held for the whole of `mine`, so one pending batch can only be sealed once.
    pub ledger: Arc<Mutex<Ledger>>,
    /// Parent of every in-flight seal; cancelled on shutdown.
    pub shutdown: CancelFlag,
    pub mine_timeout: Duration,
}

impl AppState {
    pub fn new(ledger: Ledger, mine_timeout: Duration) -> Self {
        AppState {
            ledger: Arc::new(Mutex::new(ledger)),
            shutdown: CancelFlag::new(),
            mine_timeout,
        }
    }
}

#[derive(Deserialize)]
pub struct VoteRequest {
    pub voter_id: String,
    pub candidate: String,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/vote", web::post().to(handle_vote))
        .route("/mine", web::post().to(handle_mine))
        .route("/chain", web::get().to(get_chain))
        .route("/pending", web::get().to(get_pending))
        .route("/validate", web::get().to(validate_chain))
        .route("/history", web::get().to(get_history))
        .route("/votes", web::get().to(get_votes_by_voter))
        .route("/tally", web::get().to(get_tally));
}

async fn handle_vote(data: web::Data<AppState>, vote: web::Json<VoteRequest>) -> impl Responder {
    let vote = vote.into_inner();
    let mut ledger = data.ledger.lock().await;
    ledger.add_vote(vote.voter_id, vote.candidate);
    HttpResponse::Ok().json(json!({ "pending": ledger.pending().len() }))
}

async fn handle_mine(data: web::Data<AppState>) -> impl Responder {
    let mut ledger = data.ledger.clone().lock_owned().await;
    let cancel = data.shutdown.child();

    let timer = {
        let cancel = cancel.clone();
        let timeout = data.mine_timeout;
        rt::spawn(async move {
            rt::time::sleep(timeout).await;
            warn!("mining exceeded {:?}, cancelling", timeout);
            cancel.cancel();
        })
    };

    // The search is CPU-bound; keep it off the worker thread.
    let outcome = web::block(move || {
        let result = ledger.mine_with(&cancel);
        (result, ledger.last_block().hash.clone())
    })
    .await;
    timer.abort();

    match outcome {
        Ok((Ok(index), hash)) => HttpResponse::Ok().json(json!({
            "index": index,
            "hash": hash,
        })),
        Ok((Err(MineError::NothingPending), _)) => {
            HttpResponse::Conflict().json(json!({ "error": MineError::NothingPending.to_string() }))
        }
        Ok((Err(err), _)) => {
            error!("mining failed: {}", err);
            HttpResponse::InternalServerError().json(json!({ "error": err.to_string() }))
        }
        Err(err) => {
            error!("mining task failed: {}", err);
            HttpResponse::InternalServerError().json(json!({ "error": err.to_string() }))
        }
    }
}

async fn get_chain(data: web::Data<AppState>) -> impl Responder {
    let ledger = data.ledger.lock().await;
    HttpResponse::Ok().json(ledger.chain())
}

async fn get_pending(data: web::Data<AppState>) -> impl Responder {
    let ledger = data.ledger.lock().await;
    HttpResponse::Ok().json(ledger.pending())
}

async fn validate_chain(data: web::Data<AppState>) -> impl Responder {
    let ledger = data.ledger.lock().await;
    match ledger.validate() {
        Ok(()) => HttpResponse::Ok().json(json!({ "valid": true })),
        Err(fault) => HttpResponse::Ok().json(json!({
            "valid": false,
            "index": fault.index,
            "reason": fault.kind.to_string(),
        })),
    }
}

async fn get_history(data: web::Data<AppState>) -> impl Responder {
    let ledger = data.ledger.lock().await;
    HttpResponse::Ok().json(ledger.history())
}

async fn get_votes_by_voter(
    data: web::Data<AppState>,
    query: web::Query<HashMap<String, String>>,
) -> impl Responder {
    let voter_id = match query.get("voter_id") {
        Some(id) => id,
        None => return HttpResponse::BadRequest().body("Missing voter_id parameter"),
    };

    let ledger = data.ledger.lock().await;
    HttpResponse::Ok().json(ledger.votes_by_voter(voter_id))
}

async fn get_tally(data: web::Data<AppState>) -> impl Responder {
    let ledger = data.ledger.lock().await;
    HttpResponse::Ok().json(ledger.tally())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use serde_json::Value;

    use crate::config::LedgerConfig;

    fn state_with(config: LedgerConfig, mine_timeout: Duration) -> web::Data<AppState> {
        web::Data::new(AppState::new(Ledger::with_config(config), mine_timeout))
    }

    macro_rules! service {
        () => {
            service!(state_with(LedgerConfig::default(), Duration::from_secs(30)))
        };
        ($state:expr) => {
            test::init_service(App::new().app_data($state).configure(configure)).await
        };
    }

    macro_rules! vote {
        ($app:expr, $voter:expr, $candidate:expr) => {{
            let req = test::TestRequest::post()
                .uri("/vote")
                .set_json(json!({ "voter_id": $voter, "candidate": $candidate }))
                .to_request();
            test::call_service(&$app, req).await
        }};
    }

    #[actix_web::test]
    async fn vote_then_mine_then_validate() {
        let app = service!();

        for (voter, candidate) in [("v1", "A"), ("v2", "B")] {
            let resp = vote!(app, voter, candidate);
            assert_eq!(resp.status(), StatusCode::OK);
        }

        let req = test::TestRequest::post().uri("/mine").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["index"], 1);
        assert!(body["hash"].as_str().unwrap().starts_with("00"));

        let req = test::TestRequest::get().uri("/validate").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["valid"], true);

        let req = test::TestRequest::get().uri("/chain").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let chain = body.as_array().unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0]["data"]["votes"], Value::Null);
        assert_eq!(chain[1]["data"][1]["candidate"], "B");

        let req = test::TestRequest::get().uri("/pending").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert!(body.as_array().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn mine_without_votes_conflicts() {
        let app = service!();
        let req = test::TestRequest::post().uri("/mine").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[actix_web::test]
    async fn votes_query_requires_voter_id() {
        let app = service!();
        let req = test::TestRequest::get().uri("/votes").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn history_votes_and_tally() {
        let app = service!();
        for (voter, candidate) in [("v1", "A"), ("v2", "A"), ("v3", "B")] {
            vote!(app, voter, candidate);
        }
        let req = test::TestRequest::post().uri("/mine").to_request();
        test::call_service(&app, req).await;

        let req = test::TestRequest::get().uri("/history").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.as_array().unwrap().len(), 3);

        let req = test::TestRequest::get().uri("/votes?voter_id=v3").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body[0]["candidate"], "B");
        assert_eq!(body[0]["block_index"], 1);

        let req = test::TestRequest::get().uri("/tally").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, json!({ "A": 2, "B": 1 }));
    }

    #[actix_web::test]
    async fn failed_mine_returns_500_and_keeps_pending() {
        let app = service!(state_with(
            LedgerConfig {
                difficulty: 64,
                max_attempts: Some(100),
            },
            Duration::from_secs(30),
        ));
        vote!(app, "v1", "A");

        let req = test::TestRequest::post().uri("/mine").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = test::read_body_json(resp).await;
        assert!(body["error"].as_str().unwrap().contains("100 attempts"));

        let req = test::TestRequest::get().uri("/pending").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.as_array().unwrap().len(), 1);

        let req = test::TestRequest::get().uri("/chain").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[actix_web::test]
    async fn mine_is_cancelled_after_timeout() {
        let app = service!(state_with(
            LedgerConfig {
                difficulty: 64,
                max_attempts: None,
            },
            Duration::from_millis(50),
        ));
        vote!(app, "v1", "A");

        let req = test::TestRequest::post().uri("/mine").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = test::read_body_json(resp).await;
        assert!(body["error"].as_str().unwrap().contains("cancelled"));

        let req = test::TestRequest::get().uri("/pending").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[actix_web::test]
    async fn shutdown_cancels_mining() {
        let state = state_with(
            LedgerConfig {
                difficulty: 64,
                max_attempts: None,
            },
            Duration::from_secs(30),
        );
        state.shutdown.cancel();
        let app = service!(state.clone());
        vote!(app, "v1", "A");

        let req = test::TestRequest::post().uri("/mine").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(state.ledger.lock().await.pending().len(), 1);
    }
}
