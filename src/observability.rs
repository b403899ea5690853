use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("klatsch.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("klatsch.client.request_errors");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("klatsch.client.request_duration_seconds");

pub(crate) static STREAM_CHUNKS: Counter = Counter::new("klatsch.stream.chunks");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("klatsch.stream.errors");
pub(crate) static STREAM_BYTES: Counter = Counter::new("klatsch.stream.bytes");
pub(crate) static STREAM_TTFB: Moments = Moments::new("klatsch.stream.ttfb_seconds");
pub(crate) static STREAM_DURATION: Moments = Moments::new("klatsch.stream.duration_seconds");

pub(crate) static EXCHANGES_STARTED: Counter = Counter::new("klatsch.exchange.started");
pub(crate) static EXCHANGES_COMPLETED: Counter = Counter::new("klatsch.exchange.completed");
pub(crate) static EXCHANGES_ABANDONED: Counter = Counter::new("klatsch.exchange.abandoned");
pub(crate) static EXCHANGES_REJECTED: Counter = Counter::new("klatsch.exchange.rejected");
pub(crate) static EXCHANGE_FRAGMENTS: Counter = Counter::new("klatsch.exchange.fragments");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&STREAM_CHUNKS);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_counter(&STREAM_BYTES);
    collector.register_moments(&STREAM_TTFB);
    collector.register_moments(&STREAM_DURATION);

    collector.register_counter(&EXCHANGES_STARTED);
    collector.register_counter(&EXCHANGES_COMPLETED);
    collector.register_counter(&EXCHANGES_ABANDONED);
    collector.register_counter(&EXCHANGES_REJECTED);
    collector.register_counter(&EXCHANGE_FRAGMENTS);
}
