//! Process configuration.
//!
//! Sources, later ones winning: built-in defaults, an optional JSON settings
//! file, environment variables, command flags.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::util::{Error, Result};

/// Multi-process group settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub world_size: usize,
    pub rank: usize,
    /// Rank 0 listens here; other ranks connect to it.
    pub coordinator: String,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            world_size: 1,
            rank: 0,
            coordinator: "127.0.0.1:7100".to_string(),
        }
    }
}

/// Bridge settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // Control link
    pub port: u16,
    pub device: String,
    pub anim_frames: usize,
    pub scene: Option<PathBuf>,
    /// Samples per render step.
    pub samples: u32,
    pub threads: usize,

    // Conversion relay
    pub space_enabled: bool,
    pub space_port: u16,
    pub space_server: String,
    pub space_server_port: u16,
    pub volume_geometry: Option<String>,
    pub volume_attribute: Option<String>,

    pub world: WorldConfig,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 7000,
            device: "CPU".to_string(),
            anim_frames: 1,
            scene: None,
            samples: 1,
            threads: 0,
            space_enabled: false,
            space_port: 6000,
            space_server: "localhost".to_string(),
            space_server_port: 5005,
            volume_geometry: None,
            volume_attribute: None,
            world: WorldConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

/// Result of parsing the command line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Run(Config),
    Help,
}

impl Config {
    /// Per-user settings file, if a config directory exists.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push("render-bridge");
            p.push("settings.json");
            p
        })
    }

    /// Read a JSON settings file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::from_open(path, e))?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Build the configuration from the process environment and `args`
    /// (without the program name).
    pub fn from_args(args: &[String]) -> Result<Command> {
        Self::resolve(args, |k| std::env::var(k).ok())
    }

    /// Like [`from_args`](Self::from_args) with an explicit environment.
    pub fn resolve(args: &[String], env: impl Fn(&str) -> Option<String>) -> Result<Command> {
        if args.iter().any(|a| a == "-h" || a == "--help") {
            return Ok(Command::Help);
        }

        let mut config = match flag_value(args, "--config") {
            Some(path) => Self::load(Path::new(path))?,
            None => match Self::default_path().filter(|p| p.is_file()) {
                Some(path) => Self::load(&path).unwrap_or_else(|e| {
                    tracing::warn!(path = %path.display(), error = %e, "ignoring settings file");
                    Self::default()
                }),
                None => Self::default(),
            },
        };
        config.apply_env(env);
        config.apply_flags(args);
        Ok(Command::Run(config))
    }

    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("CYCLES_VOLUME_GEOM") {
            self.volume_geometry = Some(v);
        }
        if let Some(v) = env("CYCLES_VOLUME_ATTR") {
            self.volume_attribute = Some(v);
        }
        if let Some(v) = env("RENDER_BRIDGE_RANK").and_then(|v| parse_or_warn("RENDER_BRIDGE_RANK", &v)) {
            self.world.rank = v;
        }
        if let Some(v) = env("RENDER_BRIDGE_WORLD_SIZE").and_then(|v| parse_or_warn("RENDER_BRIDGE_WORLD_SIZE", &v)) {
            self.world.world_size = v;
        }
        if let Some(v) = env("RENDER_BRIDGE_COORDINATOR") {
            self.world.coordinator = v;
        }
    }

    fn apply_flags(&mut self, args: &[String]) {
        let mut it = args.iter().peekable();
        while let Some(arg) = it.next() {
            match arg.as_str() {
                "-v" | "--verbose" => self.log_level = "debug".into(),
                "-vv" | "--trace" => self.log_level = "trace".into(),
                "-q" | "--quiet" => self.log_level = "error".into(),
                flag @ ("--port" | "--anim" | "--scene" | "--device" | "--space-port" | "--space-server"
                | "--space-server-port" | "--rank" | "--world-size" | "--coordinator" | "--samples"
                | "--threads" | "--config") => {
                    let Some(value) = it.next_if(|v| !v.starts_with("--")) else {
                        tracing::warn!(flag, "flag is missing its value");
                        continue;
                    };
                    self.apply_flag(flag, value);
                }
                other => tracing::debug!(arg = other, "ignoring unknown argument"),
            }
        }
    }

    fn apply_flag(&mut self, flag: &str, value: &str) {
        match flag {
            "--port" => set_parsed(&mut self.port, flag, value),
            "--anim" => set_parsed(&mut self.anim_frames, flag, value),
            "--scene" => self.scene = Some(PathBuf::from(value)),
            "--device" => self.device = value.to_string(),
            "--space-port" => {
                set_parsed(&mut self.space_port, flag, value);
                self.space_enabled = true;
            }
            "--space-server" => {
                self.space_server = value.to_string();
                self.space_enabled = true;
            }
            "--space-server-port" => {
                set_parsed(&mut self.space_server_port, flag, value);
                self.space_enabled = true;
            }
            "--rank" => set_parsed(&mut self.world.rank, flag, value),
            "--world-size" => set_parsed(&mut self.world.world_size, flag, value),
            "--coordinator" => self.world.coordinator = value.to_string(),
            "--samples" => set_parsed(&mut self.samples, flag, value),
            "--threads" => set_parsed(&mut self.threads, flag, value),
            _ => {}
        }
    }

    /// `tracing` filter directive for the configured level.
    pub fn filter_directive(&self) -> &str {
        &self.log_level
    }

    /// Conversion server address.
    pub fn space_server_addr(&self) -> String {
        format!("{}:{}", self.space_server, self.space_server_port)
    }
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter().position(|a| a == flag).and_then(|i| args.get(i + 1)).map(String::as_str)
}

fn parse_or_warn<T: std::str::FromStr>(what: &str, value: &str) -> Option<T> {
    let parsed = value.parse().ok();
    if parsed.is_none() {
        tracing::warn!(what, value, "ignoring unparsable value");
    }
    parsed
}

fn set_parsed<T: std::str::FromStr>(slot: &mut T, flag: &str, value: &str) {
    if let Some(v) = parse_or_warn(flag, value) {
        *slot = v;
    }
}

/// Usage text for `-h`.
pub fn usage(program: &str) -> String {
    format!(
        "render-bridge - remote rendering bridge (built {date} {time})

Usage: {program} [options]

Options:
  --scene PATH               Scene index to load (per target: PATH_00000, ...)
  --device NAME              Compute device (default CPU)
  --port N                   Control port (default 7000)
  --anim N                   Number of animation frames / targets (default 1)
  --samples N                Samples per render step (default 1)
  --threads N                Render threads, 0 for automatic
  --space-port N             Enable the conversion relay, front-end port (default 6000)
  --space-server HOST        Conversion server host (default localhost)
  --space-server-port N      Conversion server port (default 5005)
  --rank N                   Rank in a multi-process group
  --world-size N             Group size
  --coordinator HOST:PORT    Rank 0 group address
  --config PATH              JSON settings file
  -v, --verbose              Debug output
  -vv, --trace               Trace output
  -q, --quiet                Errors only
  -h, --help                 Show this help

Environment:
  RUST_LOG                   Log filter, overrides the level flags
  CYCLES_VOLUME_GEOM, CYCLES_VOLUME_ATTR
                             Geometry and attribute that receive relayed volumes
  RENDER_BRIDGE_RANK, RENDER_BRIDGE_WORLD_SIZE, RENDER_BRIDGE_COORDINATOR",
        date = env!("RENDER_BRIDGE_BUILD_DATE"),
        time = env!("RENDER_BRIDGE_BUILD_TIME"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn run(list: &[&str], env: &[(&str, &str)]) -> Config {
        let env: Vec<(String, String)> = env.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        let lookup = |k: &str| env.iter().find(|(key, _)| key == k).map(|(_, v)| v.clone());
        match Config::resolve(&args(list), lookup).unwrap() {
            Command::Run(c) => c,
            Command::Help => panic!("unexpected help"),
        }
    }

    #[test]
    fn test_defaults() {
        let c = Config::default();
        assert_eq!(c.port, 7000);
        assert_eq!(c.device, "CPU");
        assert_eq!(c.anim_frames, 1);
        assert_eq!(c.world, WorldConfig::default());
        assert!(!c.space_enabled);
    }

    #[test]
    fn test_flags_and_unknowns() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = dir.path().join("s.json");
        Config::default().save(&cfg).unwrap();
        let cfg = cfg.to_string_lossy().to_string();
        let c = run(
            &["--config", &cfg, "--port", "7100", "--bogus", "--anim", "3", "--device", "cuda", "--scene", "a.xml", "-v"],
            &[],
        );
        assert_eq!(c.port, 7100);
        assert_eq!(c.anim_frames, 3);
        assert_eq!(c.device, "cuda");
        assert_eq!(c.scene, Some(PathBuf::from("a.xml")));
        assert_eq!(c.log_level, "debug");
    }

    #[test]
    fn test_bad_values_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = dir.path().join("s.json");
        Config::default().save(&cfg).unwrap();
        let cfg = cfg.to_string_lossy().to_string();
        let c = run(&["--config", &cfg, "--port", "nope", "--anim"], &[]);
        assert_eq!(c.port, 7000);
        assert_eq!(c.anim_frames, 1);
    }

    #[test]
    fn test_space_flags_enable_relay() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = dir.path().join("s.json");
        Config::default().save(&cfg).unwrap();
        let cfg = cfg.to_string_lossy().to_string();
        let c = run(&["--config", &cfg, "--space-server", "conv"], &[]);
        assert!(c.space_enabled);
        assert_eq!(c.space_server_addr(), "conv:5005");
    }

    #[test]
    fn test_layering() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = dir.path().join("s.json");
        std::fs::write(&cfg, r#"{ "port": 7200, "world": { "world_size": 2 } }"#).unwrap();
        let cfg = cfg.to_string_lossy().to_string();
        let c = run(
            &["--config", &cfg, "--rank", "1"],
            &[("RENDER_BRIDGE_WORLD_SIZE", "4"), ("CYCLES_VOLUME_GEOM", "smoke")],
        );
        assert_eq!(c.port, 7200);
        assert_eq!(c.world.world_size, 4);
        assert_eq!(c.world.rank, 1);
        assert_eq!(c.volume_geometry.as_deref(), Some("smoke"));
        assert_eq!(c.world.coordinator, "127.0.0.1:7100");
    }

    #[test]
    fn test_help() {
        assert_eq!(Config::resolve(&args(&["--port", "1", "-h"]), |_| None).unwrap(), Command::Help);
        assert!(usage("rb").contains("--space-port"));
    }

    #[test]
    fn test_missing_config_file_is_error() {
        let r = Config::resolve(&args(&["--config", "/nonexistent/render-bridge.json"]), |_| None);
        assert!(matches!(r, Err(Error::FileNotFound(_))));
    }
}
