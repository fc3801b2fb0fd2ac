pub mod error;
pub mod config;
pub mod ident;
pub mod storage;
pub mod cache;
pub mod normalize;
pub mod selection;
pub mod chart;
pub mod frame;
pub mod viewer;
pub mod server;
pub mod cli;

// Debug printing helper: eprintln! in tests and debug builds.
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
        // Preserve formatting checks in release without producing code
        if false { let _ = format!($($arg)*); }
    });
}
