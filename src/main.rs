use std::{any::Any, env, panic, process};

use backtrace::Backtrace;
use clap::Parser;

use librelink::cli::Options;

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "<no message>"
    }
}

fn install_panic_hook() {
    panic::set_hook(Box::new(|info| {
        log::error!(
            "relink {} hit an internal error and has to stop.",
            env!("CARGO_PKG_VERSION")
        );
        log::error!("Details: {}", panic_message(info.payload()));

        if let Some(location) = info.location() {
            log::error!("at {}:{}", location.file(), location.line());
        }

        if env::var_os("RUST_BACKTRACE").map_or(false, |value| value == "1") {
            eprintln!("{:?}", Backtrace::new());
        } else {
            eprintln!("note: set RUST_BACKTRACE=1 to print a backtrace.");
        }

        process::exit(1);
    }));
}

fn main() {
    install_panic_hook();

    let options = Options::parse();

    let log_filter = match options.global.verbosity {
        0 => "info",
        1 => "info,librelink=debug",
        2 => "info,librelink=trace",
        _ => "trace",
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_filter))
        .format_module_path(false)
        .format_timestamp(None)
        .format_indent(Some(8))
        .write_style(options.global.color.into())
        .init();

    if let Err(err) = options.run() {
        log::error!("{:?}", err);
        process::exit(1);
    }
}
