use clap::Parser;
use std::time::Duration;

use crate::normalizer::DEFAULT_WIDTH;
use crate::rate_limit::RatePolicy;

pub const DEFAULT_MAX_UPLOAD_MB: usize = 10;

// CLI argument structure, every flag can also come from the environment
#[derive(Parser, Debug, Clone)]
#[command(name = "species-proxy")]
#[command(about = "Upload proxy in front of a remote species classifier")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    // Classifier base url, "host:port" is accepted too
    #[arg(short, long, env = "CLASSIFIER_URL", default_value = "http://qorey.webredirect.org:9001")]
    pub upstream: String,

    // Max uploads per client per window
    #[arg(long, env = "UPLOAD_RATE_LIMIT", default_value_t = 5)]
    pub rate_limit: usize,

    // Rate limit window in seconds, a zero window would disable limiting
    #[arg(
        long,
        env = "UPLOAD_RATE_WINDOW",
        default_value_t = 60,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub rate_window: u64,

    // Width every upload is resized to
    #[arg(long, env = "RESIZE_WIDTH", default_value_t = DEFAULT_WIDTH)]
    pub resize_width: u32,

    // Timeout for calls to the classifier, in seconds
    #[arg(long, env = "UPSTREAM_TIMEOUT", default_value_t = 30)]
    pub upstream_timeout: u64,

    // Largest accepted request body
    #[arg(long, env = "MAX_UPLOAD_MB", default_value_t = DEFAULT_MAX_UPLOAD_MB)]
    pub max_upload_mb: usize,

    // How often idle clients are dropped from the upload log
    #[arg(long, env = "SWEEP_INTERVAL", default_value_t = 60)]
    pub sweep_interval: u64,
}

impl Args {
    pub fn rate_policy(&self) -> RatePolicy {
        RatePolicy {
            max: self.rate_limit,
            window_ms: i64::try_from(Duration::from_secs(self.rate_window).as_millis())
                .unwrap_or(i64::MAX),
        }
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval.max(1))
    }

    pub fn max_upload_bytes(&self) -> usize {
        mb_to_bytes(self.max_upload_mb)
    }
}

pub fn mb_to_bytes(mb: usize) -> usize {
    mb.saturating_mul(1024 * 1024)
}

// Add http:// if no scheme is present and drop trailing slashes
pub fn normalize_base_url(url: &str) -> String {
    let url = url.trim();
    let full_url = if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("http://{}", url)
    };
    full_url.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    use clap::CommandFactory;

    // Read from the command definition so env fallbacks cannot leak in
    fn default_of(id: &str) -> String {
        let cmd = Args::command();
        let arg = cmd
            .get_arguments()
            .find(|a| a.get_id().as_str() == id)
            .unwrap();
        arg.get_default_values()[0].to_string_lossy().into_owned()
    }

    #[test]
    fn defaults_match_the_documented_policy() {
        assert_eq!(default_of("port"), "8080");
        assert_eq!(default_of("upstream"), "http://qorey.webredirect.org:9001");
        assert_eq!(default_of("rate_limit"), "5");
        assert_eq!(default_of("rate_window"), "60");
        assert_eq!(default_of("resize_width"), "400");
        assert_eq!(default_of("upstream_timeout"), "30");
        assert_eq!(default_of("max_upload_mb"), "10");
        assert_eq!(mb_to_bytes(DEFAULT_MAX_UPLOAD_MB), 10 * 1024 * 1024);
    }

    #[test]
    fn zero_rate_window_is_rejected() {
        let err = Args::try_parse_from(["species-proxy", "--rate-window", "0"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn huge_rate_window_saturates_instead_of_wrapping() {
        let args = Args::try_parse_from([
            "species-proxy",
            "--rate-window",
            &u64::MAX.to_string(),
        ])
        .unwrap();
        assert_eq!(args.rate_policy().window_ms, i64::MAX);
    }

    #[test]
    fn flags_override_defaults() {
        let args = Args::parse_from([
            "species-proxy",
            "--upstream",
            "localhost:9001",
            "--rate-limit",
            "2",
            "--rate-window",
            "10",
        ]);
        assert_eq!(args.upstream, "localhost:9001");
        assert_eq!(args.rate_policy(), RatePolicy { max: 2, window_ms: 10_000 });
    }

    #[test]
    fn base_url_gets_scheme_and_loses_trailing_slash() {
        assert_eq!(normalize_base_url("localhost:9001"), "http://localhost:9001");
        assert_eq!(normalize_base_url(" https://api.example/ "), "https://api.example");
        assert_eq!(normalize_base_url("http://host:1//"), "http://host:1");
    }
}
