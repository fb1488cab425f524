//! Campaign lifecycle states shared by server and clients.

use core::fmt;

/// Lifecycle state of a campaign.
///
/// Campaigns only ever move forward: `Scheduled` → `Active` → `Finished`.
/// `Finished` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CampaignStatus {
    /// Created, waiting for its activation time.
    Scheduled,
    /// Accepting issuance requests.
    Active,
    /// Coupon ceiling reached; no further issuance.
    Finished,
}

impl CampaignStatus {
    /// The wire and database representation of this status.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Active => "active",
            Self::Finished => "finished",
        }
    }

    /// Parses the wire/database representation. Returns `None` for anything
    /// that is not one of the three known states.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "scheduled" => Some(Self::Scheduled),
            "active" => Some(Self::Active),
            "finished" => Some(Self::Finished),
            _ => None,
        }
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
