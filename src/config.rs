use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;

/// VerifyForge: accepts test submissions, charges credits, dispatches to
/// test engines and exports reports.
#[derive(Parser, Debug, Clone)]
#[command(name = "verifyforge")]
pub struct CliArgs {
    /// HTTP port
    #[arg(long = "port", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Directory holding the job database and persistent settings
    #[arg(short = 'D', long = "data-dir")]
    pub data_dir: Option<PathBuf>,

    /// Free tests granted to the account at startup
    #[arg(long = "free-tests", default_value_t = DEFAULT_FREE_TESTS)]
    pub free_tests: u32,

    /// Paid credits granted to the account at startup
    #[arg(long = "paid-credits", default_value_t = 0)]
    pub paid_credits: i64,

    /// What to do when a charge exceeds the paid balance
    #[arg(long = "overdraft", value_enum, default_value_t = OverdraftPolicy::Reject)]
    pub overdraft: OverdraftPolicy,

    /// Abort an engine run after this many seconds
    #[arg(long = "engine-timeout-secs", default_value_t = ENGINE_TIMEOUT_SECS)]
    pub engine_timeout_secs: u64,

    /// Drop progress entries idle for longer than this
    #[arg(long = "progress-ttl-secs", default_value_t = PROGRESS_TTL_SECS)]
    pub progress_ttl_secs: u64,

    /// Maximum number of links the web engine checks per page
    #[arg(long = "max-links", default_value_t = WEB_MAX_LINKS)]
    pub max_links: usize,

    /// Also write logs to daily-rotated files in this directory
    #[arg(short = 'l', long = "log-dir")]
    pub log_dir: Option<PathBuf>,
}

/// Floor applied to the paid balance when no free tests remain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum OverdraftPolicy {
    /// Charge only when the paid balance covers the full cost.
    Reject,
    /// Charge whenever the paid balance is positive; it may go negative.
    AllowNegative,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub port: u16,
    pub data_dir: PathBuf,
    pub free_tests: u32,
    pub paid_credits: i64,
    pub overdraft: OverdraftPolicy,
    pub engine_timeout_secs: u64,
    pub progress_ttl_secs: u64,
    pub max_links: usize,
    pub log_dir: Option<PathBuf>,
}

pub const DEFAULT_PORT: u16 = 8787;
pub const DEFAULT_FREE_TESTS: u32 = 3;
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;
pub const JOB_HISTORY_LIMIT: usize = 20;
pub const JOB_HISTORY_MAX: usize = 200;

// Pricing
pub const DEFAULT_BASE_COST: u32 = 10;
/// Upper bound accepted for a base cost override.
pub const MAX_BASE_COST: u32 = 1_000_000;
pub const BASE_COSTS: &[(&str, u32)] = &[
    ("web", 10),
    ("document", 8),
    ("game", 15),
    ("ai", 12),
    ("avatar", 10),
    ("tool", 8),
    ("api", 5),
    ("mobile", 12),
];

// Engine constants
pub const ENGINE_TIMEOUT_SECS: u64 = 120;
pub const HTTP_CLIENT_TIMEOUT_SECS: u64 = 30;
pub const WEB_MAX_LINKS: usize = 20;
pub const WEB_LINK_TIMEOUT_SECS: u64 = 5;
pub const WEB_USER_AGENT: &str = concat!("VerifyForge/", env!("CARGO_PKG_VERSION"));

// Progress constants
pub const PROGRESS_TTL_SECS: u64 = 3600;
pub const PROGRESS_COMPLETED_TTL_SECS: u64 = 300;
pub const PROGRESS_MAX_ENTRIES: usize = 10_000;
pub const PROGRESS_SWEEP_INTERVAL_SECS: u64 = 30;

// Activity log constants
pub const ACTIVITY_BUFFER_SIZE: usize = 500;

// Report constants
pub const DEFAULT_REPORT_TITLE: &str = "VerifyForge Test Report";
pub const REPORT_GENERATOR: &str = concat!("VerifyForge ", env!("CARGO_PKG_VERSION"));

pub const DB_FILENAME: &str = "verifyforge.db";
pub const SETTINGS_FILENAME: &str = "verifyforge-settings.json";

impl ServiceConfig {
    pub fn from_args(args: CliArgs) -> Self {
        let data_dir = args.data_dir.unwrap_or_else(default_data_dir);

        ServiceConfig {
            port: args.port,
            data_dir,
            free_tests: args.free_tests,
            paid_credits: args.paid_credits,
            overdraft: args.overdraft,
            engine_timeout_secs: args.engine_timeout_secs,
            progress_ttl_secs: args.progress_ttl_secs,
            max_links: args.max_links,
            log_dir: args.log_dir,
        }
    }

    /// Path to the SQLite job database
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILENAME)
    }

    /// Path to the persistent settings file
    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join(SETTINGS_FILENAME)
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("verifyforge")
}
