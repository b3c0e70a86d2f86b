use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteStatus {
    #[default]
    Active,
    Completed,
    OnHold,
}

impl SiteStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SiteStatus::Active => "active",
            SiteStatus::Completed => "completed",
            SiteStatus::OnHold => "on_hold",
        }
    }
}

impl FromStr for SiteStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(SiteStatus::Active),
            "completed" => Ok(SiteStatus::Completed),
            "on_hold" | "on-hold" => Ok(SiteStatus::OnHold),
            _ => Err(anyhow::anyhow!("Invalid site status: {}", s)),
        }
    }
}

impl Display for SiteStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Construction site photos are filed under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub status: SiteStatus,
    #[serde(default)]
    pub project_code: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct NewSite {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 500))]
    pub address: Option<String>,
    pub status: SiteStatus,
    #[validate(length(max = 64))]
    pub project_code: Option<String>,
}

impl NewSite {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: None,
            status: SiteStatus::Active,
            project_code: None,
        }
    }
}
