//! In-memory backend for unit tests.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::api::{ApiError, CampaignApi, LoginRequest, LoginResponse, MagicFilter};
use crate::dnd::{Character, CharacterUpdate, Magic, SpellLevel};

#[derive(Default)]
pub(crate) struct FakeApi {
    pub characters: Mutex<Vec<Character>>,
    pub magic: Mutex<Vec<Magic>>,
    pub creates: Mutex<Vec<CharacterUpdate>>,
    pub updates: Mutex<Vec<(String, CharacterUpdate)>>,
    pub fail_updates: Mutex<bool>,
    /// Listing characters or spells answers with a server error.
    pub fail_list: Mutex<bool>,
    /// Filters whose name matches answer only after this delay.
    pub slow_names: Mutex<Vec<(String, Duration)>>,
}

impl FakeApi {
    pub fn with_characters(characters: Vec<Character>) -> Self {
        Self {
            characters: Mutex::new(characters),
            ..Self::default()
        }
    }

    pub fn with_magic(magic: Vec<Magic>) -> Self {
        Self {
            magic: Mutex::new(magic),
            ..Self::default()
        }
    }

    pub fn update_count(&self) -> usize {
        self.updates.lock().unwrap().len()
    }

    pub fn last_update(&self) -> Option<(String, CharacterUpdate)> {
        self.updates.lock().unwrap().last().cloned()
    }

    pub fn set_fail_updates(&self, fail: bool) {
        *self.fail_updates.lock().unwrap() = fail;
    }
}

pub(crate) fn spell(name: &str, level: SpellLevel, kind: &str) -> Magic {
    Magic {
        id: Some(format!("id-{}", name)),
        name: name.to_string(),
        description: String::new(),
        level,
        range: "9".to_string(),
        damage: vec![crate::dnd::Damage {
            quantity: 1,
            die: "d6".to_string(),
            kind: kind.to_string(),
        }],
        add_spell_mod: false,
    }
}

fn server_error() -> ApiError {
    ApiError::Status {
        status: 500,
        message: Some("boom".to_string()),
    }
}

#[async_trait]
impl CampaignApi for FakeApi {
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ApiError> {
        if request.password == "secret" {
            Ok(LoginResponse {
                token: None,
                user: Some(serde_json::json!({ "username": request.username })),
            })
        } else {
            Err(ApiError::Status {
                status: 401,
                message: None,
            })
        }
    }

    async fn add_magic(&self, magic: &Magic) -> Result<Magic, ApiError> {
        let mut stored = magic.clone();
        let mut all = self.magic.lock().unwrap();
        stored.id = Some(format!("magic-{}", all.len() + 1));
        all.push(stored.clone());
        Ok(stored)
    }

    async fn update_magic(&self, id: &str, magic: &Magic) -> Result<(), ApiError> {
        let mut all = self.magic.lock().unwrap();
        let existing = all
            .iter_mut()
            .find(|m| m.id.as_deref() == Some(id))
            .ok_or(ApiError::Status {
                status: 404,
                message: None,
            })?;
        *existing = Magic {
            id: Some(id.to_string()),
            ..magic.clone()
        };
        Ok(())
    }

    async fn get_magic(&self, id: &str) -> Result<Magic, ApiError> {
        self.magic
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.id.as_deref() == Some(id))
            .cloned()
            .ok_or(ApiError::Status {
                status: 404,
                message: None,
            })
    }

    async fn list_magic(&self) -> Result<Vec<Magic>, ApiError> {
        if *self.fail_list.lock().unwrap() {
            return Err(server_error());
        }
        Ok(self.magic.lock().unwrap().clone())
    }

    async fn filter_magic(&self, filter: &MagicFilter) -> Result<Vec<Magic>, ApiError> {
        let delay = self
            .slow_names
            .lock()
            .unwrap()
            .iter()
            .find(|(name, _)| *name == filter.name)
            .map(|(_, delay)| *delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if *self.fail_list.lock().unwrap() {
            return Err(server_error());
        }
        let name = filter.name.to_lowercase();
        Ok(self
            .magic
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.name.to_lowercase().contains(&name))
            .filter(|m| filter.level.is_empty() || m.level.to_string() == filter.level)
            .filter(|m| filter.kind.is_empty() || m.damage.iter().any(|d| d.kind == filter.kind))
            .cloned()
            .collect())
    }

    async fn list_characters(&self) -> Result<Vec<Character>, ApiError> {
        if *self.fail_list.lock().unwrap() {
            return Err(server_error());
        }
        Ok(self.characters.lock().unwrap().clone())
    }

    async fn create_character(&self, character: &CharacterUpdate) -> Result<Character, ApiError> {
        self.creates.lock().unwrap().push(character.clone());
        let created = Character {
            id: Some("created-1".to_string()),
            name: character.name.clone(),
            class: character.class.clone(),
            level: character.level,
            race: character.race.clone(),
            proficiency: character.proficiency,
            stats: character.stats,
            spells: character.spells.clone(),
        };
        self.characters.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn update_character(
        &self,
        id: &str,
        character: &CharacterUpdate,
    ) -> Result<(), ApiError> {
        if *self.fail_updates.lock().unwrap() {
            return Err(server_error());
        }
        self.updates
            .lock()
            .unwrap()
            .push((id.to_string(), character.clone()));
        Ok(())
    }
}
