mod commit;
mod cursor;
mod failures;
mod simple;

use crate::{commit::commit, cursor::cursor, failures::failures, simple::simple};
use log::LevelFilter;
use mercury::Executor;
use std::env;

pub fn init_logs() {
    let mut logger = env_logger::builder();
    logger
        .is_test(true)
        .format_file(true)
        .format_line_number(true);
    if env::var("RUST_LOG").is_err() {
        logger.filter_level(LevelFilter::Warn);
    }
    let _ = logger.try_init();
}

/// Run every suite against the executor. The behaviour is expected to be the
/// same for a plain connection, a dispatcher and a pool entry.
pub fn execute_tests<E: Executor>(mut executor: E) {
    simple(&mut executor);
    cursor(&mut executor);
    failures(&mut executor);
    commit(&mut executor);
}

#[macro_export]
macro_rules! silent_logs {
    ($($code:tt)+) => {{
        let level = log::max_level();
        log::set_max_level(log::LevelFilter::Off);
        $($code)+
        log::set_max_level(level);
    }};
}
