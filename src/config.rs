use std::fmt;
use std::time::Duration;

/// How hard the scan rule is allowed to push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum AttackStrength {
    Low,
    #[default]
    Medium,
    High,
    Insane,
}

impl fmt::Display for AttackStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttackStrength::Low => write!(f, "low"),
            AttackStrength::Medium => write!(f, "medium"),
            AttackStrength::High => write!(f, "high"),
            AttackStrength::Insane => write!(f, "insane"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Scratch buffer size when inflating loose objects.
    pub inflate_buffer_size: usize,
    /// Requests allowed per resolution attempt.
    pub max_requests: usize,
    /// Longest chain of deltas followed before giving up.
    pub max_delta_depth: usize,
    pub attack_strength: AttackStrength,
    pub user_agent: String,
    pub timeout: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            inflate_buffer_size: 4096,
            max_requests: 20,
            max_delta_depth: 512,
            attack_strength: AttackStrength::default(),
            user_agent: concat!("git-disclosure/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}
