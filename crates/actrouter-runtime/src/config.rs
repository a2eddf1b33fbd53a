//! Daemon configuration: optional TOML file, then command-line overrides.

use std::path::Path;

use actrouter_core::RouterConfig;
use anyhow::Context;

use crate::cli::DaemonOpts;

/// Build the router config for `opts`. Flags win over the file.
pub fn load(opts: &DaemonOpts) -> anyhow::Result<RouterConfig> {
    let mut config = match &opts.config {
        Some(path) => read_file(path)?,
        None => RouterConfig::default(),
    };
    apply_overrides(&mut config, opts);
    config.validate().context("invalid router settings")?;
    Ok(config)
}

fn read_file(path: &Path) -> anyhow::Result<RouterConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read config file {}", path.display()))?;
    RouterConfig::from_toml_str(&text)
        .with_context(|| format!("invalid config file {}", path.display()))
}

fn apply_overrides(config: &mut RouterConfig, opts: &DaemonOpts) {
    if let Some(v) = opts.dwell_ms {
        config.dwell_ms = v;
    }
    if let Some(v) = opts.max_history {
        config.max_history = v;
    }
    if let Some(v) = opts.oneshot_retention_ms {
        config.oneshot_retention_ms = v;
    }
    if let Some(v) = opts.progress_retention_ms {
        config.progress_retention_ms = v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(text: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("tempfile");
        file.write_all(text.as_bytes()).expect("write");
        file
    }

    #[test]
    fn defaults_without_file_or_flags() {
        let config = load(&DaemonOpts::default()).expect("load");
        assert_eq!(config, RouterConfig::default());
    }

    #[test]
    fn file_values_then_flag_overrides() {
        let file = write_config("dwell_ms = 200\nmax_history = 20\n");
        let opts = DaemonOpts {
            config: Some(file.path().to_path_buf()),
            max_history: Some(5),
            ..DaemonOpts::default()
        };
        let config = load(&opts).expect("load");
        assert_eq!(config.dwell_ms, 200);
        assert_eq!(config.max_history, 5);
        assert_eq!(config.oneshot_retention_ms, 1000);
    }

    #[test]
    fn zero_dwell_flag_is_rejected() {
        let opts = DaemonOpts {
            dwell_ms: Some(0),
            ..DaemonOpts::default()
        };
        let err = load(&opts).expect_err("zero dwell");
        assert!(format!("{err:#}").contains("dwell_ms"));
    }

    #[test]
    fn unknown_key_in_file_is_rejected() {
        let file = write_config("dwel_ms = 5\n");
        let opts = DaemonOpts {
            config: Some(file.path().to_path_buf()),
            ..DaemonOpts::default()
        };
        assert!(load(&opts).is_err());
    }

    #[test]
    fn missing_file_names_path() {
        let opts = DaemonOpts {
            config: Some("/nonexistent/actrouter.toml".into()),
            ..DaemonOpts::default()
        };
        let err = load(&opts).expect_err("missing");
        assert!(err.to_string().contains("/nonexistent/actrouter.toml"));
    }
}
