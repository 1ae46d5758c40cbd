//! Call-site capture and logging macros

/// Reduces a `type_name` path of the probe function declared by
/// [`function_name!`] to the name of the enclosing function.
#[doc(hidden)]
#[must_use]
pub fn function_name_from_path(path: &'static str) -> &'static str {
    let path = path.strip_suffix("::__probe").unwrap_or(path);
    path.rsplit("::")
        .find(|segment| *segment != "{{closure}}")
        .unwrap_or(path)
}

/// Name of the enclosing function, as a `&'static str`.
///
/// Closures and async blocks report the function they are written in.
#[macro_export]
macro_rules! function_name {
    () => {{
        fn __probe() {}
        fn __type_name_of<T>(_: T) -> &'static str {
            ::core::any::type_name::<T>()
        }
        $crate::__function_name_from_path(__type_name_of(__probe))
    }};
}

/// [`CallSite`](crate::CallSite) of the macro invocation
#[macro_export]
macro_rules! call_site {
    () => {
        $crate::CallSite::new(::core::file!(), $crate::function_name!(), ::core::line!())
    };
}

/// Logs through an explicit service.
///
/// The message is formatted at the call, on the calling thread.
///
/// ```no_run
/// # let service = relaylog::LoggingService::new(Default::default()).unwrap();
/// use relaylog::{Level, log_message};
///
/// log_message!(service, Level::Warning, "Storage", "disk {}% full", 91);
/// let context = std::sync::Arc::new(7_u32);
/// log_message!(service, Level::Error, "Storage", context = context, "write failed");
/// ```
#[macro_export]
macro_rules! log_message {
    ($service:expr, $level:expr, $channel:expr, context = $context:expr, $($arg:tt)+) => {{
        let context: $crate::ContextObject = $context;
        $service.log(
            $level,
            $channel,
            $crate::call_site!(),
            ::core::option::Option::Some(context),
            $crate::LogOptions::empty(),
            ::std::format!($($arg)+),
        )
    }};
    ($service:expr, $level:expr, $channel:expr, $($arg:tt)+) => {
        $service.log(
            $level,
            $channel,
            $crate::call_site!(),
            ::core::option::Option::None,
            $crate::LogOptions::empty(),
            ::std::format!($($arg)+),
        )
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __log_global {
    ($level:expr, $channel:expr, $($arg:tt)+) => {
        if let ::core::option::Option::Some(service) = $crate::global() {
            $crate::log_message!(service, $level, $channel, $($arg)+);
        }
    };
}

/// Logs at [`Level::Debug`](crate::Level::Debug) to the global service.
///
/// Compiled out of builds without debug assertions unless the
/// `release-debug-logs` feature is enabled.
#[macro_export]
macro_rules! debug {
    ($channel:expr, $($arg:tt)+) => {
        if $crate::Level::Debug.is_enabled_static() {
            $crate::__log_global!($crate::Level::Debug, $channel, $($arg)+);
        }
    };
}

/// Logs at [`Level::Information`](crate::Level::Information) to the global service
#[macro_export]
macro_rules! information {
    ($channel:expr, $($arg:tt)+) => {
        $crate::__log_global!($crate::Level::Information, $channel, $($arg)+)
    };
}

/// Logs at [`Level::Notice`](crate::Level::Notice) to the global service
#[macro_export]
macro_rules! notice {
    ($channel:expr, $($arg:tt)+) => {
        $crate::__log_global!($crate::Level::Notice, $channel, $($arg)+)
    };
}

/// Logs at [`Level::Warning`](crate::Level::Warning) to the global service
#[macro_export]
macro_rules! warning {
    ($channel:expr, $($arg:tt)+) => {
        $crate::__log_global!($crate::Level::Warning, $channel, $($arg)+)
    };
}

/// Logs at [`Level::Error`](crate::Level::Error) to the global service
#[macro_export]
macro_rules! error {
    ($channel:expr, $($arg:tt)+) => {
        $crate::__log_global!($crate::Level::Error, $channel, $($arg)+)
    };
}

/// Logs at [`Level::Critical`](crate::Level::Critical) to the global service
#[macro_export]
macro_rules! critical {
    ($channel:expr, $($arg:tt)+) => {
        $crate::__log_global!($crate::Level::Critical, $channel, $($arg)+)
    };
}

/// Logs at [`Level::Alert`](crate::Level::Alert) to the global service
#[macro_export]
macro_rules! alert {
    ($channel:expr, $($arg:tt)+) => {
        $crate::__log_global!($crate::Level::Alert, $channel, $($arg)+)
    };
}

/// Logs at [`Level::Emergency`](crate::Level::Emergency) to the global service
#[macro_export]
macro_rules! emergency {
    ($channel:expr, $($arg:tt)+) => {
        $crate::__log_global!($crate::Level::Emergency, $channel, $($arg)+)
    };
}
