//! The single character sheet and its auto-save loop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;

use crate::api::{ApiError, CampaignApi};
use crate::debounce::Debouncer;
use crate::dnd::{Ability, Character, CharacterUpdate, Magic, STAT_MAX, STAT_MIN};
use crate::modifiers::{ModifierHub, ModifierTable};

pub(crate) const SAVE_DEBOUNCE: Duration = Duration::from_millis(1500);

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SavingStatus {
    #[serde(rename = "salvo")]
    Saved,
    #[serde(rename = "salvando")]
    Saving,
    #[serde(rename = "erro")]
    Error,
}

impl std::fmt::Display for SavingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SavingStatus::Saved => write!(f, "Saved"),
            SavingStatus::Saving => write!(f, "Saving..."),
            SavingStatus::Error => write!(f, "Error"),
        }
    }
}

#[derive(Error, Debug)]
pub(crate) enum SheetError {
    #[error("Character sheet is not loaded")]
    NotLoaded,
    #[error("Backend returned a character without an identifier")]
    MissingId,
    #[error("No spell at position {0}")]
    NoSuchSpell(usize),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Owns the one character the backend keeps.
///
/// Every edit publishes fresh modifiers right away and restarts the save timer; only
/// the state present when the timer fires is sent.
pub(crate) struct CharacterSheet {
    api: Arc<dyn CampaignApi>,
    hub: Arc<ModifierHub>,
    loaded: Option<Loaded>,
    status: Arc<watch::Sender<SavingStatus>>,
    latest_edit: Arc<AtomicU64>,
    saver: Debouncer,
}

struct Loaded {
    id: String,
    character: Character,
}

impl CharacterSheet {
    pub fn new(api: Arc<dyn CampaignApi>, hub: Arc<ModifierHub>) -> Self {
        Self::with_delay(api, hub, SAVE_DEBOUNCE)
    }

    pub fn with_delay(api: Arc<dyn CampaignApi>, hub: Arc<ModifierHub>, delay: Duration) -> Self {
        let (status, _) = watch::channel(SavingStatus::Saved);
        Self {
            api,
            hub,
            loaded: None,
            status: Arc::new(status),
            latest_edit: Arc::new(AtomicU64::new(0)),
            saver: Debouncer::new(delay),
        }
    }

    /// Adopts the backend's character, creating the default one when there is none.
    ///
    /// Adopting publishes modifiers but never schedules a save.
    pub async fn load(&mut self) -> Result<&Character, SheetError> {
        let mut characters = self.api.list_characters().await.map_err(|e| {
            log::error!("Could not fetch character sheets: {}", e);
            e
        })?;
        if characters.len() > 1 {
            log::warn!(
                "Backend holds {} character sheets, using the first one",
                characters.len()
            );
        }

        let mut character = if characters.is_empty() {
            log::info!("No character sheet found, creating the default one");
            let default = CharacterUpdate::from(&Character::new_default());
            self.api.create_character(&default).await.map_err(|e| {
                log::error!("Could not create character sheet: {}", e);
                e
            })?
        } else {
            characters.swap_remove(0)
        };
        character.stats.clamp();

        let id = character.id.clone().ok_or(SheetError::MissingId)?;
        log::info!("Loaded character sheet {} ({})", character.name, id);
        self.hub.publish(ModifierTable::from_character(&character));
        let loaded = self.loaded.insert(Loaded { id, character });
        Ok(&loaded.character)
    }

    pub fn character(&self) -> Option<&Character> {
        self.loaded.as_ref().map(|loaded| &loaded.character)
    }

    pub fn id(&self) -> Option<&str> {
        self.loaded.as_ref().map(|loaded| loaded.id.as_str())
    }

    pub fn status(&self) -> SavingStatus {
        *self.status.borrow()
    }

    pub fn has_pending_save(&self) -> bool {
        self.saver.is_pending()
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> Result<(), SheetError> {
        let name = name.into();
        self.edit(|character| character.name = name)
    }

    pub fn set_class(&mut self, class: impl Into<String>) -> Result<(), SheetError> {
        let class = class.into();
        self.edit(|character| character.class = class)
    }

    pub fn set_race(&mut self, race: impl Into<String>) -> Result<(), SheetError> {
        let race = race.into();
        self.edit(|character| character.race = race)
    }

    pub fn set_level(&mut self, level: u32) -> Result<(), SheetError> {
        self.edit(|character| character.level = level)
    }

    pub fn set_proficiency(&mut self, proficiency: i32) -> Result<(), SheetError> {
        self.edit(|character| character.proficiency = proficiency)
    }

    /// Scores outside 1 to 30 are clamped.
    pub fn set_stat(&mut self, ability: Ability, score: i32) -> Result<(), SheetError> {
        self.edit(|character| *character.stats.get_mut(ability) = score.clamp(STAT_MIN, STAT_MAX))
    }

    pub fn add_spell(&mut self, spell: Magic) -> Result<(), SheetError> {
        self.edit(|character| character.spells.push(spell))
    }

    pub fn remove_spell(&mut self, index: usize) -> Result<Magic, SheetError> {
        let loaded = self.loaded.as_mut().ok_or(SheetError::NotLoaded)?;
        if index >= loaded.character.spells.len() {
            return Err(SheetError::NoSuchSpell(index));
        }
        let removed = loaded.character.spells.remove(index);
        self.changed();
        Ok(removed)
    }

    /// Sends a pending save now instead of waiting for the timer.
    pub async fn flush(&mut self) {
        if let Some(job) = self.saver.flush() {
            log::info!("Flushing pending character save");
            job.await;
        }
    }

    fn edit<F>(&mut self, apply: F) -> Result<(), SheetError>
    where
        F: FnOnce(&mut Character),
    {
        let loaded = self.loaded.as_mut().ok_or(SheetError::NotLoaded)?;
        apply(&mut loaded.character);
        self.changed();
        Ok(())
    }

    fn changed(&mut self) {
        let Some(loaded) = self.loaded.as_ref() else {
            return;
        };
        self.hub
            .publish(ModifierTable::from_character(&loaded.character));

        let edit = self.latest_edit.fetch_add(1, Ordering::SeqCst) + 1;
        self.status.send_replace(SavingStatus::Saving);

        let save = Save {
            api: Arc::clone(&self.api),
            id: loaded.id.clone(),
            update: CharacterUpdate::from(&loaded.character),
            status: Arc::clone(&self.status),
            latest_edit: Arc::clone(&self.latest_edit),
            edit,
        };
        self.saver.schedule(save.run());
    }
}

struct Save {
    api: Arc<dyn CampaignApi>,
    id: String,
    update: CharacterUpdate,
    status: Arc<watch::Sender<SavingStatus>>,
    latest_edit: Arc<AtomicU64>,
    edit: u64,
}

impl Save {
    async fn run(self) {
        let outcome = self.api.update_character(&self.id, &self.update).await;
        let superseded = self.latest_edit.load(Ordering::SeqCst) != self.edit;
        match outcome {
            Ok(()) => {
                log::debug!("Saved character sheet {}", self.id);
                if !superseded {
                    self.status.send_replace(SavingStatus::Saved);
                }
            }
            Err(e) => {
                log::error!("Autosave failed for {}: {}", self.id, e);
                if !superseded {
                    self.status.send_replace(SavingStatus::Error);
                }
            }
        }
    }
}
