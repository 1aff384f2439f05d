use std::sync::Arc;

use axum::Router;
use tempfile::TempDir;
use tokio::sync::broadcast;

use arabic_learning_backend::config::{Config, EngineConfig, LlmConfig, WorkerConfig};
use arabic_learning_backend::engine::Engine;
use arabic_learning_backend::routes::build_router;
use arabic_learning_backend::services::llm_provider::LlmProvider;
use arabic_learning_backend::state::AppState;
use arabic_learning_backend::store::Store;

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub store: Arc<Store>,
    pub engine: Arc<Engine>,
    _temp_dir: TempDir,
}

pub async fn spawn_test_server() -> TestApp {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let sled_path = temp_dir.path().join("arabic-test.sled");

    // 直接构造 Config，避免 set_var 在多线程测试下的环境变量竞态
    let config = Config {
        host: std::net::IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
        port: 3000,
        log_level: "info".to_string(),
        enable_file_logs: false,
        log_dir: "./logs".to_string(),
        sled_path: sled_path.to_string_lossy().to_string(),
        cors_origin: "http://localhost:5173".to_string(),
        worker: WorkerConfig {
            is_leader: false,
            enable_material_pipeline: false,
            enable_token_backfill: false,
        },
        llm: LlmConfig {
            enabled: true,
            mock: true,
            providers: Vec::new(),
            timeout_secs: 5,
            max_generation_retries: 1,
            verify_mappings: false,
        },
        engine: EngineConfig::default(),
    };

    let store = Arc::new(Store::open(&config.sled_path).expect("open store"));
    let engine = Arc::new(Engine::new(config.engine.clone(), store.clone()));
    let llm = Arc::new(LlmProvider::new(&config.llm));
    let (shutdown_tx, _) = broadcast::channel::<()>(8);

    let state = AppState::new(
        store.clone(),
        engine.clone(),
        llm,
        &config,
        shutdown_tx,
    );

    let app = build_router(state.clone());

    TestApp {
        app,
        state,
        store,
        engine,
        _temp_dir: temp_dir,
    }
}
