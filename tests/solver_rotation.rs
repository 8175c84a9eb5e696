//! Rotation and failure-policy tests for the solve dispatcher, driven by
//! a scripted in-memory model instead of the real Gemini API.

use async_trait::async_trait;
use gdz_bot_rs::llm::pool::KeyPool;
use gdz_bot_rs::llm::store::{InMemoryKeyStore, KeyStore};
use gdz_bot_rs::llm::{
    ImageAttachment, LlmError, Mode, SolveError, SolveRequest, Solver, TextModel,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

type Script = Box<dyn Fn(usize, &str) -> Result<String, LlmError> + Send + Sync>;

/// Model whose outcome is scripted per call; records every key it was
/// handed so tests can assert on rotation order.
struct ScriptedModel {
    calls: AtomicUsize,
    keys_seen: Mutex<Vec<String>>,
    script: Script,
}

impl ScriptedModel {
    fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            keys_seen: Mutex::new(Vec::new()),
            script,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn keys_seen(&self) -> Vec<String> {
        self.keys_seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextModel for ScriptedModel {
    async fn generate(
        &self,
        api_key: &str,
        _system_prompt: &str,
        _prompt: &str,
        _image: Option<&ImageAttachment>,
    ) -> Result<String, LlmError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.keys_seen.lock().unwrap().push(api_key.to_string());
        (self.script)(call, api_key)
    }
}

fn make_solver(model: Arc<ScriptedModel>, pool_keys: &[&str]) -> (Solver, Arc<InMemoryKeyStore>) {
    let store = Arc::new(InMemoryKeyStore::new());
    let pool = KeyPool::new(pool_keys.iter().map(ToString::to_string).collect());
    let solver = Solver::with_model(model, pool, store.clone(), "система".to_string());
    (solver, store)
}

fn request() -> SolveRequest {
    SolveRequest::text("2 + 2 = ?", Mode::Detailed)
}

#[tokio::test]
async fn rate_limited_pool_tries_each_key_exactly_once() {
    let model = ScriptedModel::new(Box::new(|_, _| Err(LlmError::RateLimited)));
    let (solver, _) = make_solver(model.clone(), &["k1", "k2", "k3"]);

    let result = solver.solve(1, &request()).await;

    assert!(matches!(result, Err(SolveError::PoolExhausted)));
    assert_eq!(model.calls(), 3);
    assert_eq!(model.keys_seen(), vec!["k1", "k2", "k3"]);
    // N rotations wrap the cursor back to the starting key
    assert_eq!(solver.pool().current().as_deref(), Some("k1"));
}

#[tokio::test]
async fn two_key_pool_exhaustion_wraps_cursor_twice() {
    let model = ScriptedModel::new(Box::new(|_, _| Err(LlmError::RateLimited)));
    let (solver, _) = make_solver(model.clone(), &["k1", "k2"]);

    let result = solver.solve(1, &request()).await;

    assert!(matches!(result, Err(SolveError::PoolExhausted)));
    assert_eq!(solver.pool().current().as_deref(), Some("k1"));
}

#[tokio::test]
async fn success_on_second_key_stops_rotation() {
    let model = ScriptedModel::new(Box::new(|call, _| {
        if call == 0 {
            Err(LlmError::RateLimited)
        } else {
            Ok("Ответ: 4".to_string())
        }
    }));
    let (solver, _) = make_solver(model.clone(), &["k1", "k2", "k3"]);

    let result = solver.solve(1, &request()).await.unwrap();

    assert_eq!(result, "Ответ: 4");
    assert_eq!(model.calls(), 2);
    // success does not advance the cursor past the key that answered
    assert_eq!(solver.pool().current().as_deref(), Some("k2"));
}

#[tokio::test(start_paused = true)]
async fn transient_failure_rotates_like_a_rate_limit() {
    let model = ScriptedModel::new(Box::new(|call, _| {
        if call == 0 {
            Err(LlmError::Api("500 Internal Server Error".to_string()))
        } else {
            Ok("готово".to_string())
        }
    }));
    let (solver, _) = make_solver(model.clone(), &["k1", "k2"]);

    let result = solver.solve(1, &request()).await.unwrap();

    assert_eq!(result, "готово");
    assert_eq!(model.keys_seen(), vec!["k1", "k2"]);
}

#[tokio::test(start_paused = true)]
async fn malformed_response_counts_as_transient() {
    let model = ScriptedModel::new(Box::new(|_, _| {
        Err(LlmError::InvalidResponse("no candidates".to_string()))
    }));
    let (solver, _) = make_solver(model.clone(), &["k1", "k2"]);

    let result = solver.solve(1, &request()).await;

    assert!(matches!(result, Err(SolveError::PoolExhausted)));
    assert_eq!(model.calls(), 2);
}

#[tokio::test]
async fn override_key_wins_over_pool() {
    let model = ScriptedModel::new(Box::new(|_, _| Ok("решено".to_string())));
    let (solver, store) = make_solver(model.clone(), &["k1", "k2"]);
    store.set(42, "AIzaUserKey".to_string());

    let result = solver.solve(42, &request()).await.unwrap();

    assert_eq!(result, "решено");
    assert_eq!(model.keys_seen(), vec!["AIzaUserKey"]);
}

#[tokio::test]
async fn override_key_rate_limit_is_terminal_and_leaves_pool_alone() {
    let model = ScriptedModel::new(Box::new(|_, _| Err(LlmError::RateLimited)));
    let (solver, store) = make_solver(model.clone(), &["k1", "k2"]);
    store.set(7, "AIzaUserKey".to_string());

    let result = solver.solve(7, &request()).await;

    // no pool to fall back to: terminal after a single attempt
    assert!(matches!(result, Err(SolveError::UserKeyExhausted)));
    assert_eq!(model.calls(), 1);
    assert_eq!(solver.pool().current().as_deref(), Some("k1"));
}

#[tokio::test(start_paused = true)]
async fn override_key_transient_failures_retry_then_give_up() {
    let model = ScriptedModel::new(Box::new(|_, _| {
        Err(LlmError::Network("connection refused".to_string()))
    }));
    let (solver, store) = make_solver(model.clone(), &["k1"]);
    store.set(7, "AIzaUserKey".to_string());

    let result = solver.solve(7, &request()).await;

    assert!(matches!(
        result,
        Err(SolveError::Transient(LlmError::Network(_)))
    ));
    assert_eq!(model.calls(), 3);
    assert_eq!(solver.pool().current().as_deref(), Some("k1"));
}

#[tokio::test]
async fn empty_pool_without_override_is_a_config_error() {
    let model = ScriptedModel::new(Box::new(|_, _| Ok("unreachable".to_string())));
    let (solver, _) = make_solver(model.clone(), &[]);

    let result = solver.solve(1, &request()).await;

    assert!(matches!(result, Err(SolveError::NoCredentials)));
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn byok_works_with_an_empty_pool() {
    let model = ScriptedModel::new(Box::new(|_, _| Ok("решено своим ключом".to_string())));
    let (solver, store) = make_solver(model.clone(), &[]);
    store.set(9, "AIzaUserKey".to_string());

    let result = solver.solve(9, &request()).await.unwrap();

    assert_eq!(result, "решено своим ключом");
}

#[tokio::test]
async fn image_request_reaches_the_model() {
    let model = ScriptedModel::new(Box::new(|_, _| Ok("фото решено".to_string())));
    let (solver, _) = make_solver(model.clone(), &["k1"]);

    let image = ImageAttachment {
        bytes: vec![1, 2, 3],
        mime_type: "image/jpeg".to_string(),
    };
    let request = SolveRequest::with_image("Реши задачу с фото", image, Mode::Exam);

    let result = solver.solve(1, &request).await.unwrap();
    assert_eq!(result, "фото решено");
}
