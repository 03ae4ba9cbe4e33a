use tracing_subscriber::filter::LevelFilter;

/// Routes `log` records to the test writer so pool and queue diagnostics
/// show up with `--nocapture`. Safe to call from every test.
pub(crate) fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(LevelFilter::TRACE)
        .with_test_writer()
        .try_init();
}
