use std::panic;

use log::error;

/// Install the process panic hook.
///
/// Debug builds get `better-panic` backtraces, release builds the
/// `human-panic` crash report. Either way the panic is written to the log
/// file first, since stderr may not be visible to the user.
pub fn initialize_panic_handler() {
    #[cfg(debug_assertions)]
    better_panic::install();

    #[cfg(not(debug_assertions))]
    human_panic::setup_panic!();

    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let thread = std::thread::current();
        error!(
            "Panic in thread {}: {panic_info}",
            thread.name().unwrap_or("<unnamed>")
        );
        log::logger().flush();

        default_hook(panic_info);
    }));
}
