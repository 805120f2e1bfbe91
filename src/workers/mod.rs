pub mod throttle_cleanup;

pub use throttle_cleanup::ThrottleCleanupWorker;
