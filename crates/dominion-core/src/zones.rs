//! Temporary event zones anchored to areas (war flashpoints, raids).
//!
//! Zones carry no behavior of their own; the scheduler removes them once
//! their lifespan elapses and observers react to the expiry notice.

use chrono::{DateTime, Utc};
use dominion_protocol::{AreaId, ZoneKind, ZoneRecord};

#[derive(Debug, Default)]
pub struct ZoneTracker {
    zones: Vec<ZoneRecord>,
}

impl ZoneTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(
        &mut self,
        area: AreaId,
        kind: ZoneKind,
        now: DateTime<Utc>,
        lifespan: chrono::Duration,
    ) -> &ZoneRecord {
        self.zones.push(ZoneRecord {
            area,
            kind,
            created_at: now,
            expires_at: now + lifespan,
        });
        self.zones.last().expect("just pushed")
    }

    pub fn active(&self) -> impl Iterator<Item = &ZoneRecord> {
        self.zones.iter()
    }

    /// Remove and return every zone past its expiry.
    pub fn expire(&mut self, now: DateTime<Utc>) -> Vec<ZoneRecord> {
        let (expired, live): (Vec<_>, Vec<_>) = self
            .zones
            .drain(..)
            .partition(|z| z.expires_at <= now);
        self.zones = live;
        expired
    }

    pub fn initialize(&mut self, records: Vec<ZoneRecord>) {
        self.zones = records;
    }

    pub fn serialize(&self) -> Vec<ZoneRecord> {
        self.zones.clone()
    }

    pub fn teardown_all(&mut self) {
        self.zones.clear();
    }
}
