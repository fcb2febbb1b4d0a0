//! Example demonstrating directive-driven loading and the plugin lifecycle.
//!
//! Run with: cargo run --example plugin_loader

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use apples_runtime::{Error, PluginModule, PluginRuntime, StaticLoader};
use serde_json::json;

fn main() -> apples_runtime::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    println!("=== Plugin Loader Example ===\n");

    let ticks = Arc::new(AtomicUsize::new(0));
    let clock_ticks = ticks.clone();

    // Modules compiled into the host, keyed by plugin identity
    let loader = StaticLoader::new()
        .with_module("display", |name| {
            Ok(PluginModule::new(name)
                .with_hook("setup", || {
                    println!("  display: opening window");
                    Ok(())
                })
                .with_hook("cleanup", || {
                    println!("  display: closing window");
                    Ok(())
                }))
        })
        .with_module("clock", move |name| {
            let ticks = clock_ticks.clone();
            Ok(PluginModule::new(name)
                .with_hook("on_display_ready", || {
                    println!("  clock: display is up, drawing face");
                    Ok(())
                })
                .with_hook("loop", move || {
                    let tick = ticks.fetch_add(1, Ordering::Relaxed) + 1;
                    println!("  clock: tick {}", tick);
                    if tick == 3 {
                        return Err(Error::exit(0, "clock finished"));
                    }
                    Ok(())
                }))
        })
        .with_module("alsa", |name| Ok(PluginModule::new(name)));

    let runtime = PluginRuntime::with_loader(loader);
    runtime.on_event(|event| {
        if let Some(name) = event.plugin_name() {
            println!("  [event] {} {}", event.event_name(), name);
        }
    });

    // Raw manifest records, as a host would read them from disk
    let records = vec![
        json!({
            "format": "0.1.0",
            "name": "clock",
            "human-name": "Clock",
            "load-directives": [
                { "directive": "load-after", "module": "$output" },
                { "directive": "run-after-load", "module": "display", "method": "on_display_ready" },
            ],
        }),
        json!({ "format": "0.1.0", "name": "display", "human-name": "Display", "service": "output" }),
        json!({ "format": "0.1.0", "name": "alsa", "human-name": "ALSA", "service": "output" }),
    ];

    println!("=== Loading ===");
    let plugins = runtime.initialize(records)?;
    println!("Load order: {:?}", plugins.load_order());
    println!("Output plugins: {}", plugins.service("output").len());

    println!("\n=== Lifecycle ===");
    runtime.setup(&plugins)?;

    let code = loop {
        match runtime.run_loop(&plugins) {
            Ok(()) => continue,
            Err(err) if err.is_exit_request() => {
                println!("  exit requested: {}", err);
                break err.exit_code().unwrap_or(0);
            }
            Err(err) => return Err(err),
        }
    };

    runtime.cleanup(&plugins)?;

    println!("\n=== Example Complete (exit code {}) ===", code);
    Ok(())
}
