pub mod mock_media_source;

pub use mock_media_source::{MockCall, MockMediaSource, MockSourceHandle};

/// Initialize tracing for tests with proper test output handling
pub fn tracing_init() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}
