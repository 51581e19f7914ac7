use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestType {
    Web,
    Document,
    Game,
    Ai,
    Avatar,
    Tool,
    Api,
    Mobile,
}

impl TestType {
    pub const ALL: [TestType; 8] = [
        TestType::Web,
        TestType::Document,
        TestType::Game,
        TestType::Ai,
        TestType::Avatar,
        TestType::Tool,
        TestType::Api,
        TestType::Mobile,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TestType::Web => "web",
            TestType::Document => "document",
            TestType::Game => "game",
            TestType::Ai => "ai",
            TestType::Avatar => "avatar",
            TestType::Tool => "tool",
            TestType::Api => "api",
            TestType::Mobile => "mobile",
        }
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        TestType::ALL
            .into_iter()
            .find(|t| t.as_str() == needle)
            .ok_or_else(|| format!("Unknown test type '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestMode {
    #[default]
    Standard,
    Economy,
    UltraEconomy,
}

impl TestMode {
    pub const ALL: [TestMode; 3] = [TestMode::Standard, TestMode::Economy, TestMode::UltraEconomy];

    pub fn as_str(&self) -> &'static str {
        match self {
            TestMode::Standard => "standard",
            TestMode::Economy => "economy",
            TestMode::UltraEconomy => "ultra_economy",
        }
    }

    /// Percentage taken off the base cost.
    pub fn discount_percent(&self) -> u32 {
        match self {
            TestMode::Standard => 0,
            TestMode::Economy => 40,
            TestMode::UltraEconomy => 60,
        }
    }
}

impl fmt::Display for TestMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "" | "standard" => Ok(TestMode::Standard),
            "economy" => Ok(TestMode::Economy),
            "ultra_economy" => Ok(TestMode::UltraEconomy),
            _ => Err(format!("Unknown test mode '{}'", s)),
        }
    }
}

/// What a test runs against. Uploaded files are described, not kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TestTarget {
    #[serde(rename = "url")]
    Url { url: String },
    #[serde(rename = "file", rename_all = "camelCase")]
    File {
        name: String,
        size: u64,
        content_type: String,
        sha256: String,
    },
}

impl TestTarget {
    pub fn url(&self) -> Option<&str> {
        match self {
            TestTarget::Url { url } => Some(url),
            TestTarget::File { .. } => None,
        }
    }

    /// Short human-readable label used in logs and reports.
    pub fn label(&self) -> &str {
        match self {
            TestTarget::Url { url } => url,
            TestTarget::File { name, .. } => name,
        }
    }
}
