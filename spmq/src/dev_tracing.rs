/// Development helper: initialize a tracing subscriber when `RUST_LOG` is set.
///
/// Benches and tests can call `spmq::dev_tracing::init_tracing()` to see the
/// socket layer's lifecycle and message movement logs. This is a no-op when
/// `RUST_LOG` is not set or a global subscriber is already installed.
pub fn init_tracing() {
    use std::env;

    if env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_thread_names(true)
            .try_init();
    }
}
