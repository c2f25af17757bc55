use lazy_static::lazy_static;
use prometheus::{
    Counter, Gauge, HistogramOpts, HistogramVec, IntCounterVec, Opts, register_counter,
    register_gauge, register_histogram_vec, register_int_counter_vec,
};


lazy_static! {
    pub static ref SUBMISSIONS_TOTAL: Counter =
        register_counter!("bugsubmit_requests_total", "Total number of image submissions").unwrap();
    pub static ref RATE_LIMITED_TOTAL: Counter =
        register_counter!("bugsubmit_rate_limited_total", "Submissions rejected by the rate limiter").unwrap();
    pub static ref TRACKED_CLIENTS: Gauge =
        register_gauge!("bugsubmit_tracked_clients", "Clients currently held in the upload log").unwrap();
    pub static ref UPSTREAM_FAILURES: IntCounterVec = register_int_counter_vec!(
        Opts::new("classifier_failures_total", "Failed calls to the classifier"),
        &["endpoint"]
    )
    .unwrap();
    pub static ref UPSTREAM_LATENCY: HistogramVec = register_histogram_vec!(
        HistogramOpts::new("classifier_latency_seconds", "Classifier call latency in seconds"),
        &["endpoint"]
    )
    .unwrap();
}
