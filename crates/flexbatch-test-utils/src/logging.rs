/// Install a fmt subscriber for test output. Safe to call from every
/// test; only the first call takes effect.
pub fn init() {
    let _ = tracing_subscriber::fmt().with_env_filter("debug").try_init();
}
