//! Progress-callback trait for per-file batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to hear about
//! each certificate as the batch works through it. Files are processed one
//! after another, so callbacks arrive in order and never concurrently.
//!
//! # Example
//!
//! ```rust
//! use famcert::{BatchProgressCallback, ConversionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     done: AtomicUsize,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_file_complete(&self, index: usize, total: usize, records: usize) {
//!         self.done.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{}/{} done ({} family members)", index, total, records);
//!     }
//! }
//!
//! let cb = Arc::new(CountingCallback { done: AtomicUsize::new(0) });
//! let config = ConversionConfig::builder()
//!     .progress_callback(cb as Arc<dyn BatchProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the batch driver around each file.
///
/// All methods have default no-op implementations.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before the first file.
    fn on_batch_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called before the OCR request for a file.
    ///
    /// # Arguments
    /// * `index`: 1-indexed position in the batch
    /// * `name`: original file name
    fn on_file_start(&self, index: usize, total: usize, name: &str) {
        let _ = (index, total, name);
    }

    /// Called when a file's document has been rendered.
    ///
    /// `records` is the number of populated family rows.
    fn on_file_complete(&self, index: usize, total: usize, records: usize) {
        let _ = (index, total, records);
    }

    /// Called when a file fails. The batch stops right after this.
    fn on_file_error(&self, index: usize, total: usize, error: &str) {
        let _ = (index, total, error);
    }

    /// Called once after the last file when the whole batch succeeded.
    fn on_batch_complete(&self, total_files: usize) {
        let _ = total_files;
    }
}

/// Shared handle type stored in the config.
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;

/// A callback that ignores every event.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder(Mutex<Vec<String>>);

    impl BatchProgressCallback for Recorder {
        fn on_file_start(&self, index: usize, total: usize, name: &str) {
            self.0.lock().unwrap().push(format!("start {index}/{total} {name}"));
        }
    }

    #[test]
    fn defaults_are_noops() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(2);
        cb.on_file_complete(1, 2, 3);
        cb.on_file_error(2, 2, "boom");
        cb.on_batch_complete(2);
    }

    #[test]
    fn overridden_method_is_called() {
        let rec = Recorder(Mutex::new(Vec::new()));
        rec.on_file_start(1, 3, "a.pdf");
        rec.on_file_complete(1, 3, 4);
        assert_eq!(*rec.0.lock().unwrap(), vec!["start 1/3 a.pdf".to_string()]);
    }
}
