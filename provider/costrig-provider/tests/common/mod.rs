use axum::{Router, extract::State, http::StatusCode, routing::any};
use costrig_models::TriggerDoc;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Scripted platform endpoint: each request pops the next status code and
/// is counted. An empty script answers 200.
#[derive(Clone)]
pub struct ScriptedRouter {
    statuses: Arc<Mutex<VecDeque<u16>>>,
    hits: Arc<Mutex<usize>>,
}

impl ScriptedRouter {
    pub fn hits(&self) -> usize {
        *self.hits.lock().unwrap()
    }
}

async fn respond(State(script): State<ScriptedRouter>) -> StatusCode {
    *script.hits.lock().unwrap() += 1;
    let code = script
        .statuses
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or(200);
    StatusCode::from_u16(code).unwrap()
}

/// Serve the scripted endpoint on an ephemeral port, returning its base URL.
pub async fn serve_scripted(statuses: Vec<u16>) -> (String, ScriptedRouter) {
    let script = ScriptedRouter {
        statuses: Arc::new(Mutex::new(statuses.into())),
        hits: Arc::new(Mutex::new(0)),
    };
    let app = Router::new()
        .fallback(any(respond))
        .with_state(script.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), script)
}

pub fn trigger(id: &str, worker: &str) -> TriggerDoc {
    TriggerDoc {
        id: id.to_string(),
        rev: None,
        apikey: Some("uuid:key".to_string()),
        bucket: "my-bucket".to_string(),
        endpoint: Some("s3.example.test".to_string()),
        bucket_apikey: None,
        interval: 1,
        worker: worker.to_string(),
        status: None,
        additional_data: None,
    }
}
