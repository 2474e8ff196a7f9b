use std::{
    collections::HashMap,
    env,
    fs,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
    time::Duration,
};

use directories::BaseDirs;

#[derive(Debug, Clone)]
pub struct Config {
    inner: HashMap<String, String>,
    pub config_path: PathBuf,
}

impl Config {
    pub fn load() -> Self {
        let mut map = default_map();
        let config_path = default_config_path();

        // Read .pypadrc if exists
        if let Ok(file) = fs::File::open(&config_path) {
            map.extend(parse_rc(BufReader::new(file)));
        }

        // Overlay environment variables (take precedence)
        for (k, v) in env::vars() {
            if is_config_key(&k) {
                map.insert(k, v);
            }
        }

        Self { inner: map, config_path }
    }

    /// Defaults merged with one rc file, ignoring the environment.
    pub fn from_rc_file(path: &Path) -> std::io::Result<Self> {
        let mut map = default_map();
        let file = fs::File::open(path)?;
        map.extend(parse_rc(BufReader::new(file)));
        Ok(Self {
            inner: map,
            config_path: path.to_path_buf(),
        })
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key).cloned()
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.inner.insert(key.to_string(), value.into());
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key)
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false)
    }

    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.get(key).and_then(|v| v.trim().parse::<usize>().ok())
    }

    pub fn get_path(&self, key: &str) -> Option<PathBuf> {
        self.get(key).filter(|v| !v.is_empty()).map(PathBuf::from)
    }

    pub fn python(&self) -> String {
        self.get("PYPAD_PYTHON")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| crate::process::python::default_program().to_string())
    }

    pub fn compile_timeout(&self) -> Duration {
        Duration::from_millis(self.get_millis("PYPAD_COMPILE_TIMEOUT_MS", 3000))
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.get_millis("PYPAD_FLUSH_INTERVAL_MS", 150).max(10))
    }

    pub fn advance_cursor(&self) -> bool {
        self.get_bool("PYPAD_ADVANCE_CURSOR")
    }

    pub fn cell_highlight(&self) -> bool {
        self.get_bool("PYPAD_CELL_HIGHLIGHT")
    }

    /// Non-blocking `plt.show()` and figure event pumping in the worker.
    pub fn matplotlib_events(&self) -> bool {
        self.get_bool("PYPAD_MATPLOTLIB")
    }

    pub fn max_console_lines(&self) -> usize {
        self.get_usize("PYPAD_MAX_CONSOLE_LINES").unwrap_or(5000)
    }

    pub fn snippet_log_path(&self) -> PathBuf {
        self.get_path("PYPAD_SNIPPET_LOG")
            .unwrap_or_else(|| home_dir().join("codeSnippetsLog.txt"))
    }

    pub fn log_file(&self) -> PathBuf {
        self.get_path("PYPAD_LOG_FILE").unwrap_or_else(|| {
            let base = BaseDirs::new()
                .map(|b| b.cache_dir().to_path_buf())
                .unwrap_or_else(env::temp_dir);
            base.join("pypad").join("pypad.log")
        })
    }

    fn get_millis(&self, key: &str, default: u64) -> u64 {
        self.get(key)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(default)
    }
}

/// `KEY=VALUE` lines; blanks and `#` comments are skipped.
fn parse_rc(reader: impl BufRead) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in reader.lines().map_while(Result::ok) {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((k, v)) = line.split_once('=') {
            map.insert(k.trim().to_string(), v.trim().to_string());
        }
    }
    map
}

fn is_config_key(k: &str) -> bool {
    k.starts_with("PYPAD_") && k != "PYPAD_LOG"
}

fn home_dir() -> PathBuf {
    BaseDirs::new()
        .map(|b| b.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

fn default_config_path() -> PathBuf {
    let base = BaseDirs::new()
        .map(|b| b.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("~/.config"));
    base.join("pypad").join(".pypadrc")
}

fn default_map() -> HashMap<String, String> {
    let mut m = HashMap::new();

    // Numbers
    m.insert("PYPAD_COMPILE_TIMEOUT_MS".into(), "3000".into());
    m.insert("PYPAD_FLUSH_INTERVAL_MS".into(), "150".into());
    m.insert("PYPAD_MAX_CONSOLE_LINES".into(), "5000".into());

    // Bools as strings
    m.insert("PYPAD_ADVANCE_CURSOR".into(), "true".into());
    m.insert("PYPAD_CELL_HIGHLIGHT".into(), "true".into());
    m.insert("PYPAD_MATPLOTLIB".into(), "true".into());

    m
}
