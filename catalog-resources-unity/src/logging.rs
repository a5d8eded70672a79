use anyhow::Result;
use tracing_subscriber::{
    fmt::{format::FmtSpan, Layer as FmtLayer},
    layer::SubscriberExt as _,
    Registry,
};

pub struct Options {
    pub verbose: bool,
    pub color: bool,
}

/// Log to stderr. Stdout carries the provider protocol.
pub fn set_up(options: &Options) -> Result<()> {
    let level = if options.verbose {
        tracing::Level::TRACE
    } else {
        tracing::Level::INFO
    };

    let span_events = if options.verbose {
        // include enter/exit events for detailed tracing
        FmtSpan::FULL
    } else {
        // announce what we do and when we're done
        FmtSpan::NEW | FmtSpan::CLOSE
    };

    let fmt_layer = FmtLayer::new()
        .with_writer(std::io::stderr)
        .with_span_events(span_events)
        .with_ansi(options.color);
    let subscriber = Registry::default()
        .with(tracing_subscriber::filter::LevelFilter::from_level(level))
        .with(fmt_layer);

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("failed to set up tracing: {}", e))?;

    Ok(())
}
