use std::sync::Arc;

use mocknet_runtime::{Backend, Instantiate, Instantiated, MocknetConfig};
use parking_lot::Mutex;
use serde_json::{json, Value};

/// Account that sends the messages of the tests.
pub const SENDER: &str = "mocknet1sender";

pub struct TestData {}

impl TestData {
    /// Compiles the WAT source of a test contract in `tests/contracts`.
    pub fn get_test_contract_code(name: &str) -> Vec<u8> {
        let mut sc_filepath = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        sc_filepath.push(format!("./tests/contracts/{name}.wat"));
        wat::parse_file(sc_filepath).unwrap()
    }

    /// Installs a subscriber so that `RUST_LOG=mocknet_runtime=trace` shows what the contracts do.
    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    /// Runs `f` and returns what it logged, at any level.
    pub fn capture_logs(f: impl FnOnce()) -> String {
        let buffer = LogBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let logs = buffer.0.lock();
        String::from_utf8_lossy(&logs).into_owned()
    }

    pub fn backend() -> Backend {
        Self::init_tracing();
        Backend::new(MocknetConfig::default())
    }
}

#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Uploads a test contract and instantiates it once.
pub fn deploy(backend: &Backend, name: &str, label: &str, init_msg: Value) -> Instantiated {
    let code = backend.upload(&TestData::get_test_contract_code(name));
    backend
        .instantiate(SENDER, Instantiate::new(code.code_id, label, init_msg))
        .unwrap()
}

/// Deploys a proxy contract that forwards its queries to `target`.
pub fn deploy_proxy(backend: &Backend, label: &str, target: &str) -> Instantiated {
    deploy(backend, "proxy", label, json!(target))
}
