pub mod artwork;
pub mod client;
pub mod clock;
pub mod config;
pub mod credential;
pub mod error;
pub mod notify;
pub mod screen;
pub mod server;
pub mod session;
pub mod storage;
pub mod wallet;

// Test-only printing helper: expands to eprintln! in tests and debug builds and is a no-op otherwise.
// Usage: tprintln!("debug: {}", value);
#[cfg(any(test, debug_assertions))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ( eprintln!($($arg)*) );
}

// In release builds, provide a no-op tprintln! so calls compile without effect.
#[cfg(not(any(test, debug_assertions)))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ({
        // Keep the format arguments type-checked
        if false { let _ = format!($($arg)*); }
    });
}
