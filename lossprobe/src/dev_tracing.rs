/// Initialize a tracing subscriber when `RUST_LOG` is set.
///
/// Binaries, tests and benches call `lossprobe::dev_tracing::init_tracing()`.
/// Output goes to stderr; stdout carries nothing but progress counts. This is
/// a no-op when `RUST_LOG` is unset or a global subscriber already exists.
pub fn init_tracing() {
    if std::env::var_os("RUST_LOG").is_some() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .try_init();
    }
}
