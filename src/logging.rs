//! Tracing setup and the wrapper every interaction handler runs inside.

use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Instant;
use tracing::{error, info, info_span, Instrument};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::discord::InteractionKind;
use crate::error::{BotError, HandlerOutcome, Result};

/// Install the global subscriber. `RUST_LOG` overrides the default `info`.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_level(true),
        )
        .with(filter)
        .init();
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run a handler future inside a span, log its duration and result, and turn
/// a panic into [`BotError::Internal`].
pub async fn instrument_handler<F>(key: &str, kind: InteractionKind, handler: F) -> Result<HandlerOutcome>
where
    F: Future<Output = Result<HandlerOutcome>> + Send,
{
    let span = info_span!("handler", key = %key, kind = ?kind);
    let started = Instant::now();
    let result = AssertUnwindSafe(handler)
        .catch_unwind()
        .instrument(span.clone())
        .await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    span.in_scope(|| match result {
        Ok(Ok(outcome)) => {
            info!(elapsed_ms, outcome = ?outcome, "Handler finished");
            Ok(outcome)
        }
        Ok(Err(e)) => {
            error!(elapsed_ms, error = %e, "Handler failed");
            Err(e)
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(elapsed_ms, panic = %message, "Handler panicked");
            Err(BotError::internal(format!("handler panicked: {}", message)))
        }
    })
}
