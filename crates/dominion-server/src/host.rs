//! Single-task authority over the engine.
//!
//! The host owns the `Dominion` instance outright. Commands drain from an
//! mpsc queue and the enforcement sweep runs on its interval, so every
//! mutation — player-triggered or scheduled — serializes through one
//! `&mut` owner. A cross-registry cascade can never interleave with a
//! concurrently arriving command.

use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use dominion_core::{Dominion, EngineOptions};
use dominion_protocol::Notice;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::command::Command;

pub struct Host {
    engine: Dominion,
    snapshot_path: PathBuf,
    autosave_every: Duration,
    notices: broadcast::Sender<Notice>,
}

impl Host {
    pub fn new(options: EngineOptions, snapshot_path: PathBuf, autosave_every: Duration) -> Self {
        let (notices, _) = broadcast::channel(256);
        Self {
            engine: Dominion::new(options),
            snapshot_path,
            autosave_every,
            notices,
        }
    }

    pub fn engine(&self) -> &Dominion {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Dominion {
        &mut self.engine
    }

    /// Observers (map renderer, announcements, UI) attach here.
    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    /// Restore the persisted snapshot, then heal any dangling
    /// cross-references a mid-cascade crash may have left behind.
    pub fn restore(&mut self) -> anyhow::Result<()> {
        if !self.snapshot_path.exists() {
            info!(path = %self.snapshot_path.display(), "no snapshot, starting empty");
            return Ok(());
        }

        let raw = std::fs::read_to_string(&self.snapshot_path)?;
        self.engine.initialize(serde_json::from_str(&raw)?);

        let healed = self.engine.reconcile(Utc::now());
        if healed > 0 {
            warn!(healed, "reconciliation corrected dangling references");
        }
        info!(
            factions = self.engine.factions().len(),
            "snapshot restored"
        );
        Ok(())
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let snapshot = self.engine.serialize();
        std::fs::write(&self.snapshot_path, serde_json::to_string_pretty(&snapshot)?)?;
        debug!(path = %self.snapshot_path.display(), "snapshot saved");
        Ok(())
    }

    /// Apply one external command. Failures are reported to the log; the
    /// engine returned its error synchronously and left state untouched.
    pub fn apply(&mut self, command: Command) {
        let now = Utc::now();
        let outcome: Result<(), String> = match command {
            Command::CreateFaction {
                id,
                description,
                owner,
            } => self
                .engine
                .create_faction(id, description, owner)
                .map(|_| ())
                .map_err(|e| e.to_string()),
            Command::DisbandFaction { faction } => self
                .engine
                .disband(&faction, dominion_protocol::DisbandReason::Voluntary, now)
                .map_err(|e| e.to_string()),
            Command::EliminateFaction { faction } => self
                .engine
                .eliminate(&faction, now)
                .map_err(|e| e.to_string()),
            Command::JoinFaction { faction, member } => self
                .engine
                .join_faction(&faction, member)
                .map_err(|e| e.to_string()),
            Command::LeaveFaction { member } => self
                .engine
                .leave_faction(&member, now)
                .map_err(|e| e.to_string()),
            Command::SetTaxRate { faction, rate } => self
                .engine
                .set_tax_rate(&faction, rate)
                .map_err(|e| e.to_string()),
            Command::SetTaxContainer { faction, container } => self
                .engine
                .set_tax_container(&faction, container)
                .map_err(|e| e.to_string()),
            Command::Deposit { faction, amount } => self
                .engine
                .deposit(&faction, amount)
                .map(|_| ())
                .map_err(|e| e.to_string()),
            Command::Claim { area, faction } => self
                .engine
                .claim(&area, &faction, now)
                .map_err(|e| e.to_string()),
            Command::Unclaim { areas } => {
                self.engine.unclaim(&areas);
                Ok(())
            }
            Command::SetAreaName { area, name } => self
                .engine
                .set_area_name(&area, name)
                .map_err(|e| e.to_string()),
            Command::DeclareWar {
                attacker,
                defender,
                justification,
            } => self
                .engine
                .declare_war(&attacker, &defender, justification, now)
                .map(|_| ())
                .map_err(|e| e.to_string()),
            Command::Surrender { war } => {
                self.engine.surrender(&war, now).map_err(|e| e.to_string())
            }
            Command::EconomicEvent { area, amount } => {
                self.engine.collect_tax(&area, amount);
                Ok(())
            }
            Command::MemberConnected { member } => {
                let faction = self
                    .engine
                    .factions()
                    .find_by_member(&member)
                    .map(|f| f.id.clone());
                self.engine.directory_mut().connect(member, faction);
                Ok(())
            }
            Command::MemberDisconnected { member } => {
                self.engine.directory_mut().disconnect(&member);
                Ok(())
            }
        };

        if let Err(reason) = outcome {
            warn!(%reason, "command rejected");
        }
        self.publish_notices();
    }

    /// One scheduler tick.
    pub fn sweep(&mut self) {
        self.engine.run_sweep(Utc::now());
        self.publish_notices();
    }

    fn publish_notices(&mut self) {
        for notice in self.engine.drain_notices() {
            debug!(?notice, "notice");
            // Fire-and-forget: no subscribers is not an error.
            let _ = self.notices.send(notice);
        }
    }

    /// Main loop: drain commands, run the sweep on its interval, autosave.
    pub async fn run(mut self, mut commands: mpsc::Receiver<Command>) -> anyhow::Result<()> {
        let mut sweep = tokio::time::interval(self.engine.options().upkeep_check_interval());
        let mut autosave = tokio::time::interval(self.autosave_every);
        // Both intervals fire immediately once; that initial sweep/save is
        // harmless against freshly restored state.
        loop {
            tokio::select! {
                Some(command) = commands.recv() => self.apply(command),
                _ = sweep.tick() => self.sweep(),
                _ = autosave.tick() => {
                    if let Err(err) = self.save() {
                        warn!(%err, "autosave failed");
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("shutting down");
                    self.save()?;
                    self.engine.teardown_all();
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dominion_protocol::AreaSeed;

    fn host(dir: &tempfile::TempDir) -> Host {
        let mut options = EngineOptions::default();
        options.min_faction_members = 1;
        let mut host = Host::new(
            options,
            dir.path().join("snapshot.json"),
            Duration::from_secs(300),
        );
        host.engine_mut().seed_territory([AreaSeed {
            id: "A7".into(),
            labels: vec![],
        }]);
        host
    }

    #[test]
    fn commands_drive_the_engine_and_broadcast_notices() {
        let dir = tempfile::tempdir().unwrap();
        let mut host = host(&dir);
        let mut notices = host.subscribe();

        host.apply(Command::CreateFaction {
            id: "reds".into(),
            description: "Red Alliance".into(),
            owner: "u1".into(),
        });
        host.apply(Command::Claim {
            area: "A7".into(),
            faction: "reds".into(),
        });

        assert!(host.engine().factions().exists(&"reds".into()));
        assert_eq!(host.engine().territory().claim_count(&"reds".into()), 1);
        assert!(matches!(
            notices.try_recv().unwrap(),
            Notice::FactionCreated { .. }
        ));
    }

    #[test]
    fn rejected_commands_leave_state_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let mut host = host(&dir);

        host.apply(Command::CreateFaction {
            id: "reds".into(),
            description: String::new(),
            owner: "u1".into(),
        });
        // Out-of-range rate is rejected; the default rate stays.
        host.apply(Command::SetTaxRate {
            faction: "reds".into(),
            rate: 0.9,
        });
        assert_eq!(
            host.engine().factions().get(&"reds".into()).unwrap().tax_rate,
            0.1
        );
    }

    #[test]
    fn snapshot_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut original = host(&dir);

        original.apply(Command::CreateFaction {
            id: "reds".into(),
            description: "Red Alliance".into(),
            owner: "u1".into(),
        });
        original.apply(Command::Claim {
            area: "A7".into(),
            faction: "reds".into(),
        });
        original.save().unwrap();

        let mut restored = host(&dir);
        restored.restore().unwrap();
        assert!(restored.engine().factions().exists(&"reds".into()));
        assert_eq!(restored.engine().territory().claim_count(&"reds".into()), 1);
    }
}
