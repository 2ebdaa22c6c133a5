//! 🔧 App Configuration: the sacred env-to-TOML-to-flags-to-struct pipeline.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the fridge.
//! In the junk drawer. Nothing." (every developer at 3am) 🦆
//!
//! 🏗️ Powered by Figment, because manually parsing env vars is a form of
//! self-harm that even the borrow checker wouldn't approve of.
//!
//! Precedence, lowest to highest:
//! serde defaults → `LOGSTREAMER_*` env vars → TOML file → CLI flags.

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::common::RoutingMetadata;

/// 📦 The AppConfig: one struct to rule them all. Built once, read-only after that.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct AppConfig {
    /// 📡 Where the batches go.
    #[serde(default)]
    pub sink: ElasticsearchSinkConfig,
    /// 🧵 How often, how much, how many workers.
    #[serde(default)]
    pub runtime: RuntimeConfig,
    /// 🐛 Verbose mode: echo every ingested line and log raw response bodies.
    #[serde(default)]
    pub debug: bool,
}

/// 📡 The bulk endpoint and how we talk to it.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ElasticsearchSinkConfig {
    /// 📡 Base URL. `_bulk` is appended.
    #[serde(default = "default_url")]
    pub url: String,
    /// 🔑 The routing token. Also the index name. Logsene does it this way, so do we.
    #[serde(default)]
    pub token: String,
    /// 🏷️ Document type tag stamped on every directive.
    #[serde(default = "default_log_type")]
    pub log_type: String,
    /// ⏱️ Whole-request timeout. Connect timeout is a fixed 10s.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// 🫁 Gzip the bulk body.
    #[serde(default)]
    pub compression: bool,
}

fn default_url() -> String {
    "https://logsene-receiver.eu.sematext.com/".to_string()
}

fn default_log_type() -> String {
    "logstreamer".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for ElasticsearchSinkConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            token: String::new(),
            log_type: default_log_type(),
            request_timeout_secs: default_request_timeout_secs(),
            compression: false,
        }
    }
}

impl ElasticsearchSinkConfig {
    pub fn routing(&self) -> RoutingMetadata {
        RoutingMetadata {
            url: self.url.clone(),
            token: self.token.clone(),
            log_type: self.log_type.clone(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// 🧵 Knobs for the triggers and the drain worker pool.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// ⏱️ Milliseconds between timer drains. 0 = no timer at all.
    #[serde(default = "default_poll_interval_ms", alias = "timebeforedrain")]
    pub poll_interval_ms: u64,
    /// 📏 Lines appended before a forced drain. 0 = no size trigger.
    #[serde(default = "default_max_items", alias = "maxitems")]
    pub max_items: usize,
    /// 👷 Drain workers, i.e. the ceiling on concurrent bulk requests.
    #[serde(default = "default_drain_workers")]
    pub drain_workers: usize,
    /// 📬 Queued drain requests before new ones get coalesced.
    #[serde(default = "default_pending_drain_requests")]
    pub pending_drain_requests: usize,
}

fn default_poll_interval_ms() -> u64 {
    10_000
}

fn default_max_items() -> usize {
    100
}

fn default_drain_workers() -> usize {
    2
}

fn default_pending_drain_requests() -> usize {
    4
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_items: default_max_items(),
            drain_workers: default_drain_workers(),
            pending_drain_requests: default_pending_drain_requests(),
        }
    }
}

impl RuntimeConfig {
    /// ⏱️ `None` when the timer trigger is disabled.
    pub fn poll_interval(&self) -> Option<Duration> {
        match self.poll_interval_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// 📏 `None` when the size trigger is disabled.
    pub fn max_items(&self) -> Option<usize> {
        match self.max_items {
            0 => None,
            n => Some(n),
        }
    }

    pub fn drain_workers(&self) -> usize {
        self.drain_workers.max(1)
    }

    pub fn pending_drain_requests(&self) -> usize {
        self.pending_drain_requests.max(1)
    }
}

/// 🚩 Values that came in on the command line. `None` means "not given, let the
/// lower layers decide", and gets skipped during serialization so it never
/// clobbers a value from the file or the environment.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ConfigOverrides {
    pub sink: SinkOverrides,
    pub runtime: RuntimeOverrides,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<bool>,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct SinkOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_type: Option<String>,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct RuntimeOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,
}

/// 🚀 Load the config from env vars, an optional TOML file and the CLI flags.
///
/// 📐 If `config_file_name` is None → env vars + flags only. No file. No assumptions.
/// If it's Some → the file is layered over the env, and the flags over everything.
///
/// 💀 Returns an error if config is unparseable. Check the message, it says where.
pub fn load_config(
    config_file_name: Option<&Path>,
    overrides: &ConfigOverrides,
) -> anyhow::Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    // 🏗️ env vars as the base layer. `__` separates nesting: LOGSTREAMER_SINK__URL → sink.url
    let config = Figment::new().merge(Env::prefixed("LOGSTREAMER_").split("__"));

    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };

    // 🚩 flags last. They were typed by a human, moments ago, on purpose.
    let config = config.merge(Serialized::defaults(overrides));

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}', environment variables (LOGSTREAMER_*) and flags. \
             The file exists in our hearts, but apparently not in a shape serde can love.",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables (LOGSTREAMER_*) and flags. \
                 No file was provided, this one's all on the environment. Classic."
            .to_string(),
    };

    config.extract().context(context_msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_test_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("💀 tempfile refused to exist. The filesystem said 'new phone who dis'.");
        file.write_all(contents.as_bytes())
            .expect("💀 Failed to write test config.");
        file
    }

    #[test]
    fn the_one_where_the_file_fills_in_every_knob() -> anyhow::Result<()> {
        let config_file = write_test_config(
            r#"
            debug = true

            [sink]
            url = "http://localhost:9200/"
            token = "abc-123"
            log_type = "nginx"
            compression = true

            [runtime]
            poll_interval_ms = 250
            max_items = 7
            drain_workers = 3
            "#,
        );

        let app_config = load_config(Some(config_file.path()), &ConfigOverrides::default())?;

        assert!(app_config.debug);
        assert_eq!(app_config.sink.url, "http://localhost:9200/");
        assert_eq!(app_config.sink.token, "abc-123");
        assert_eq!(app_config.sink.log_type, "nginx");
        assert!(app_config.sink.compression);
        assert_eq!(app_config.runtime.poll_interval(), Some(Duration::from_millis(250)));
        assert_eq!(app_config.runtime.max_items(), Some(7));
        assert_eq!(app_config.runtime.drain_workers(), 3);
        assert_eq!(app_config.runtime.pending_drain_requests(), 4);
        Ok(())
    }

    #[test]
    fn the_one_where_flags_beat_the_file_but_only_where_given() -> anyhow::Result<()> {
        let config_file = write_test_config(
            r#"
            [sink]
            token = "from-file"
            log_type = "from-file"

            [runtime]
            max_items = 50
            "#,
        );
        let overrides = ConfigOverrides {
            sink: SinkOverrides {
                token: Some("from-flag".into()),
                ..Default::default()
            },
            runtime: RuntimeOverrides {
                poll_interval_ms: Some(0),
                ..Default::default()
            },
            debug: None,
        };

        let app_config = load_config(Some(config_file.path()), &overrides)?;

        assert_eq!(app_config.sink.token, "from-flag");
        assert_eq!(app_config.sink.log_type, "from-file");
        assert_eq!(app_config.runtime.max_items(), Some(50));
        assert_eq!(app_config.runtime.poll_interval(), None, "0 disables the timer");
        assert!(!app_config.debug);
        Ok(())
    }

    #[test]
    fn the_one_where_env_sits_between_defaults_and_the_file() {
        // 🔒 Jail: private env and cwd, restored on the way out. Only keys no other
        // test relies on, since plain tests do not wait for the jail lock.
        figment::Jail::expect_with(|jail| {
            jail.set_env("LOGSTREAMER_SINK__TOKEN", "from-env");
            jail.set_env("LOGSTREAMER_SINK__LOG_TYPE", "env-type");
            jail.set_env("LOGSTREAMER_SINK__URL", "http://env-host:9200/");
            jail.create_file(
                "logstreamer.toml",
                r#"
                [sink]
                log_type = "file-type"
                "#,
            )?;
            let config_file = Path::new("logstreamer.toml");

            let app_config = load_config(Some(config_file), &ConfigOverrides::default())
                .map_err(|err| format!("{err:#}"))?;
            assert_eq!(app_config.sink.token, "from-env", "env fills what the file leaves out");
            assert_eq!(app_config.sink.log_type, "file-type", "the file beats env");
            assert_eq!(app_config.sink.url, "http://env-host:9200/", "env beats defaults");

            let overrides = ConfigOverrides {
                sink: SinkOverrides {
                    token: Some("from-flag".into()),
                    ..Default::default()
                },
                ..Default::default()
            };
            let app_config =
                load_config(Some(config_file), &overrides).map_err(|err| format!("{err:#}"))?;
            assert_eq!(app_config.sink.token, "from-flag", "flags beat env");
            Ok(())
        });
    }

    #[test]
    fn the_one_where_defaults_show_up_uninvited_but_helpful() {
        let app_config: AppConfig = toml::from_str("").expect("empty TOML is still TOML");
        assert_eq!(app_config, AppConfig::default());
        assert_eq!(app_config.sink.url, "https://logsene-receiver.eu.sematext.com/");
        assert_eq!(app_config.sink.log_type, "logstreamer");
        assert_eq!(app_config.runtime.poll_interval_ms, 10_000);
        assert_eq!(app_config.runtime.max_items, 100);
    }

    #[test]
    fn the_one_where_the_old_flag_names_still_work_in_toml() {
        let runtime: RuntimeConfig = toml::from_str(
            r#"
            timebeforedrain = 500
            maxitems = 0
            drain_workers = 0
            "#,
        )
        .expect("aliases should parse");
        assert_eq!(runtime.poll_interval(), Some(Duration::from_millis(500)));
        assert_eq!(runtime.max_items(), None, "0 disables the size trigger");
        assert_eq!(runtime.drain_workers(), 1, "zero workers would ship nothing, forever");
    }

    #[test]
    fn the_one_where_garbage_config_gets_a_useful_error() {
        let config_file = write_test_config("[runtime]\nmax_items = \"lots\"\n");
        let err = load_config(Some(config_file.path()), &ConfigOverrides::default())
            .expect_err("a string is not a usize, no matter how hard it tries");
        assert!(err.to_string().contains("Failed to parse configuration"));
    }
}
