// ── Site domain type ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SiteStatus {
    #[default]
    Active,
    Inactive,
}

/// A hotspot location mapped (optionally) onto an Omada site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub id: String,
    pub name: String,
    /// The Omada `siteId`. Sites without one are not synced.
    pub omada_site_id: Option<String>,
    pub status: SiteStatus,
    pub created_at: DateTime<Utc>,
}

impl Site {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        omada_site_id: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            omada_site_id,
            status: SiteStatus::Active,
            created_at: Utc::now(),
        }
    }

    /// The Omada site id, if this site takes part in sync.
    ///
    /// A site is syncable only while active and mapped to a non-empty
    /// remote id.
    pub fn syncable_remote_id(&self) -> Option<&str> {
        if self.status != SiteStatus::Active {
            return None;
        }
        self.omada_site_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    /// Human-readable reason this site is skipped, or `None` if it is syncable.
    pub fn unsyncable_reason(&self) -> Option<&'static str> {
        if self.status != SiteStatus::Active {
            Some("site is inactive")
        } else if self.syncable_remote_id().is_none() {
            Some("site has no Omada site id")
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_mapped_site_is_syncable() {
        let site = Site::new("s1", "Lobby", Some("omada-1".into()));
        assert_eq!(site.syncable_remote_id(), Some("omada-1"));
        assert_eq!(site.unsyncable_reason(), None);
    }

    #[test]
    fn inactive_or_unmapped_sites_are_skipped() {
        let mut inactive = Site::new("s1", "Lobby", Some("omada-1".into()));
        inactive.status = SiteStatus::Inactive;
        assert_eq!(inactive.syncable_remote_id(), None);
        assert_eq!(inactive.unsyncable_reason(), Some("site is inactive"));

        let blank = Site::new("s2", "Pool", Some("  ".into()));
        assert_eq!(blank.syncable_remote_id(), None);

        let unmapped = Site::new("s3", "Bar", None);
        assert_eq!(unmapped.unsyncable_reason(), Some("site has no Omada site id"));
    }
}
