use std::sync::atomic::{AtomicBool, Ordering};

static ENABLED: AtomicBool = AtomicBool::new(true);

#[inline(always)]
pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::SeqCst)
}

pub fn disable() {
    ENABLED.store(false, Ordering::SeqCst)
}

pub fn enable() {
    ENABLED.store(true, Ordering::SeqCst)
}

static LEVEL_FROM_ENV: AtomicBool = AtomicBool::new(false);

/// Install `env_logger` as the global logger.
///
/// `RUST_LOG` wins when set, otherwise the level is `info` (`debug` if `verbose`) and may be
/// changed later with [`set_verbose`].
pub fn init(verbose: bool) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(::log::LevelFilter::Debug);
    let filters = std::env::var("RUST_LOG").ok();
    if let Some(filters) = &filters {
        builder.parse_filters(filters);
    }
    if builder.try_init().is_err() {
        return;
    }
    LEVEL_FROM_ENV.store(filters.is_some(), Ordering::SeqCst);
    set_verbose(verbose);
}

/// Switch between `info` and `debug` levels. No-op if the level comes from `RUST_LOG`.
pub fn set_verbose(verbose: bool) {
    if LEVEL_FROM_ENV.load(Ordering::SeqCst) {
        return;
    }
    ::log::set_max_level(if verbose {
        ::log::LevelFilter::Debug
    } else {
        ::log::LevelFilter::Info
    });
}

#[macro_export]
macro_rules! sync_info {
    (target: $target:expr, $($arg:tt)+) => {
        if $crate::log::is_enabled() {
            log::info!(target: $target, $($arg)+)
        }
    };
    ($($arg:tt)+) => {
        if $crate::log::is_enabled() {
            log::info!($($arg)+)
        }
    };
}

#[macro_export]
macro_rules! sync_warn {
    (target: $target:expr, $($arg:tt)+) => {
        if $crate::log::is_enabled() {
            log::warn!(target: $target, $($arg)+)
        }
    };
    ($($arg:tt)+) => {
        if $crate::log::is_enabled() {
            log::warn!($($arg)+)
        }
    };
}

#[macro_export]
macro_rules! sync_error {
    (target: $target:expr, $($arg:tt)+) => {
        if $crate::log::is_enabled() {
            log::error!(target: $target, $($arg)+)
        }
    };
    ($($arg:tt)+) => {
        if $crate::log::is_enabled() {
            log::error!($($arg)+)
        }
    };
}

#[macro_export]
macro_rules! sync_debug {
    (target: $target:expr, $($arg:tt)+) => {
        if $crate::log::is_enabled() {
            log::debug!(target: $target, $($arg)+)
        }
    };
    ($($arg:tt)+) => {
        if $crate::log::is_enabled() {
            log::debug!($($arg)+)
        }
    };
}
