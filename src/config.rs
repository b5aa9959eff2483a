use crate::loader::{DEFAULT_MAX_COMPOUNDS, DEFAULT_MAX_UPLOAD_BYTES, Limits};
use crate::predictor::DEFAULT_API_URL;
use crate::views::DEFAULT_VIEWS_FILE;
use clap::Args;
use std::path::PathBuf;
use std::time::Duration;

/// Settings shared by everything that talks to the prediction service
///
/// Each flag can also be set through the environment variable named next to
/// it, including from a `.env` file.
#[derive(Debug, Clone, Args)]
pub struct PredictorConfig {
    /// Prediction service endpoint
    #[arg(long, env = "PKM2PRED_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Maximum number of compounds per submission
    #[arg(long, env = "PKM2PRED_MAX_COMPOUNDS", default_value_t = DEFAULT_MAX_COMPOUNDS)]
    pub max_compounds: usize,

    /// Maximum size of an uploaded file in bytes
    #[arg(long, env = "PKM2PRED_MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: usize,

    /// Request timeout for the prediction service, in seconds
    #[arg(long, env = "PKM2PRED_TIMEOUT_SECS", default_value_t = 60)]
    pub timeout_secs: u64,
}

impl PredictorConfig {
    pub fn limits(&self) -> Limits {
        Limits {
            max_compounds: self.max_compounds,
            max_upload_bytes: self.max_upload_bytes,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Settings of the web server
#[derive(Debug, Clone, Args)]
pub struct ServerConfig {
    /// Address to listen on
    #[arg(long, env = "PKM2PRED_BIND", default_value = "127.0.0.1:3000")]
    pub bind: String,

    /// Flat file holding the page view count
    #[arg(long, env = "PKM2PRED_VIEWS_FILE", default_value = DEFAULT_VIEWS_FILE)]
    pub views_file: PathBuf,

    #[command(flatten)]
    pub predictor: PredictorConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        server: ServerConfig,
    }

    #[test]
    fn flags_override_defaults() {
        let cli = TestCli::parse_from([
            "pkm2pred-web",
            "--bind",
            "0.0.0.0:8080",
            "--max-compounds",
            "5",
            "--timeout-secs",
            "3",
        ]);

        assert_eq!(cli.server.bind, "0.0.0.0:8080");
        assert_eq!(cli.server.predictor.limits().max_compounds, 5);
        assert_eq!(cli.server.predictor.timeout(), Duration::from_secs(3));
    }
}
