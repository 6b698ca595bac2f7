pub mod fixture;

#[allow(unused_imports)]
pub use fixture::{SessionFixture, LESSON};

/// Initialize tracing for tests with proper test output handling
pub fn tracing_init() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}
