//! Resumable multi-step wizard progress (role, intent, team).
//!
//! The step to show is derived from which selections are present, so a
//! wizard closed mid-flow reopens where it left off:
//!
//! | role | intent | step     |
//! |------|--------|----------|
//! | no   | any    | `Role`   |
//! | yes  | no     | `Intent` |
//! | yes  | yes    | `Team`   |
//!
//! Choosing a different role discards the intent and team picked for the
//! previous one.

use serde::{Deserialize, Serialize};

use crate::state_persistence::{StateKey, StateRegistry, Stateful, StorageBackend, StorageResult};

/// Wizard steps, numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WizardStep {
    Role = 1,
    Intent = 2,
    Team = 3,
}

impl WizardStep {
    #[must_use]
    pub const fn number(self) -> u8 {
        self as u8
    }
}

/// Persisted form of [`WizardProgress`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WizardPersistState {
    pub role: Option<String>,
    pub intent: Option<String>,
    pub team: Option<String>,
}

/// All three selections of a finished wizard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WizardSelection {
    pub role: String,
    pub intent: String,
    pub team: String,
}

/// In-progress wizard selections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WizardProgress {
    persistence_id: String,
    role: Option<String>,
    intent: Option<String>,
    team: Option<String>,
}

fn chosen(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl WizardProgress {
    #[must_use]
    pub fn new(persistence_id: impl Into<String>) -> Self {
        Self {
            persistence_id: persistence_id.into(),
            ..Self::default()
        }
    }

    /// Load saved progress for `persistence_id`, or start fresh.
    #[must_use]
    pub fn resume<S: StorageBackend>(
        registry: &StateRegistry<S>,
        persistence_id: impl Into<String>,
    ) -> Self {
        let mut progress = Self::new(persistence_id);
        if registry.restore(&mut progress) {
            tracing::debug!(
                target: "tabula.persist",
                wizard = %progress.persistence_id,
                step = progress.current_step().number(),
                "wizard resumed"
            );
        }
        progress
    }

    #[must_use]
    pub fn persistence_id(&self) -> &str {
        &self.persistence_id
    }

    #[must_use]
    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    #[must_use]
    pub fn intent(&self) -> Option<&str> {
        self.intent.as_deref()
    }

    #[must_use]
    pub fn team(&self) -> Option<&str> {
        self.team.as_deref()
    }

    #[must_use]
    pub fn current_step(&self) -> WizardStep {
        match (&self.role, &self.intent) {
            (Some(_), Some(_)) => WizardStep::Team,
            (Some(_), None) => WizardStep::Intent,
            (None, _) => WizardStep::Role,
        }
    }

    pub fn select_role(&mut self, role: impl Into<String>) {
        let role = chosen(Some(role.into()));
        if role != self.role {
            self.intent = None;
            self.team = None;
        }
        self.role = role;
    }

    pub fn select_intent(&mut self, intent: impl Into<String>) {
        let intent = chosen(Some(intent.into()));
        if intent != self.intent {
            self.team = None;
        }
        self.intent = intent;
    }

    pub fn select_team(&mut self, team: impl Into<String>) {
        self.team = chosen(Some(team.into()));
    }

    /// Undo the most recent step's selection.
    pub fn back(&mut self) {
        if self.team.take().is_none() && self.intent.take().is_none() {
            self.role = None;
        }
    }

    #[must_use]
    pub fn selection(&self) -> Option<WizardSelection> {
        Some(WizardSelection {
            role: self.role.clone()?,
            intent: self.intent.clone()?,
            team: self.team.clone()?,
        })
    }

    pub fn save<S: StorageBackend>(&self, registry: &mut StateRegistry<S>) -> StorageResult<()> {
        registry.persist(self)
    }

    /// Finish the wizard: drop the stored progress and return the selections.
    ///
    /// Returns `Ok(None)` and keeps everything when a selection is missing.
    pub fn complete<S: StorageBackend>(
        &mut self,
        registry: &mut StateRegistry<S>,
    ) -> StorageResult<Option<WizardSelection>> {
        let Some(selection) = self.selection() else {
            return Ok(None);
        };
        registry.forget(&*self)?;
        self.role = None;
        self.intent = None;
        self.team = None;
        tracing::debug!(
            target: "tabula.persist",
            wizard = %self.persistence_id,
            "wizard completed"
        );
        Ok(Some(selection))
    }

    /// Abandon the wizard and forget the stored progress.
    pub fn reset<S: StorageBackend>(
        &mut self,
        registry: &mut StateRegistry<S>,
    ) -> StorageResult<()> {
        registry.forget(&*self)?;
        *self = Self::new(std::mem::take(&mut self.persistence_id));
        Ok(())
    }
}

impl Stateful for WizardProgress {
    type State = WizardPersistState;

    fn state_key(&self) -> StateKey {
        StateKey::new("wizard", self.persistence_id.as_str())
    }

    fn save_state(&self) -> WizardPersistState {
        WizardPersistState {
            role: self.role.clone(),
            intent: self.intent.clone(),
            team: self.team.clone(),
        }
    }

    fn restore_state(&mut self, state: WizardPersistState) {
        self.role = chosen(state.role);
        self.intent = chosen(state.intent);
        self.team = chosen(state.team);
    }
}
