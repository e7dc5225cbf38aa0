//! porthistory: switch port history jobs
//!
//! Finds unused switch ports and records which MACs (with their addresses
//! and DNS names) sit behind which ports.

/// Logs an error message to stderr
macro_rules! log_error {
    ($($arg:tt)*) => {
        porthistory::log_error!($($arg)*)
    };
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(e) = porthistory::logging::init_logging() {
        eprintln!("[WARN] Failed to initialize structured logging: {}", e);
    }

    if let Err(e) = porthistory::app::run(std::env::args()).await {
        log_error!("{:#}", e);
        std::process::exit(1);
    }
}
