use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::dnd::{Ability, Character};
use crate::storage::{LocalStore, StoreError, MODIFIERS_KEY};

pub(crate) const PROFICIENCY: &str = "PROF";

/// `floor((score - 10) / 2)`, rounding towards negative infinity.
pub(crate) fn ability_modifier(score: i32) -> i32 {
    score.saturating_sub(10).div_euclid(2)
}

/// Named modifiers a roll can apply, e.g. `FOR -> +2`.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(transparent)]
pub(crate) struct ModifierTable(BTreeMap<String, i32>);

impl ModifierTable {
    pub fn from_character(character: &Character) -> Self {
        let mut table: ModifierTable = Ability::ALL
            .into_iter()
            .map(|ability| {
                (
                    ability.modifier_name().to_string(),
                    ability_modifier(character.stats.get(ability)),
                )
            })
            .collect();
        table.0.insert(PROFICIENCY.to_string(), character.proficiency);
        table
    }

    pub fn get(&self, name: &str) -> Option<i32> {
        self.0.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i32)> {
        self.0.iter().map(|(name, value)| (name.as_str(), *value))
    }

    pub fn load_cached(store: &LocalStore) -> Result<Option<Self>, StoreError> {
        match store.get(MODIFIERS_KEY)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }
}

impl FromIterator<(String, i32)> for ModifierTable {
    fn from_iter<I: IntoIterator<Item = (String, i32)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Shared modifier state. The sheet publishes, rollers subscribe.
pub(crate) struct ModifierHub {
    tx: watch::Sender<ModifierTable>,
    store: Option<LocalStore>,
}

impl ModifierHub {
    pub fn new(initial: ModifierTable) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx, store: None }
    }

    /// Hub that also mirrors every table into the local store, so one-shot rolls see it.
    pub fn with_store(initial: ModifierTable, store: LocalStore) -> Self {
        Self {
            store: Some(store),
            ..Self::new(initial)
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ModifierTable> {
        self.tx.subscribe()
    }

    pub fn publish(&self, table: ModifierTable) {
        if let Some(store) = &self.store {
            let cached = serde_json::to_string(&table)
                .map_err(StoreError::from)
                .and_then(|raw| store.set(MODIFIERS_KEY, raw));
            if let Err(e) = cached {
                log::warn!("Could not cache modifiers: {}", e);
            }
        }
        self.tx.send_replace(table);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dnd::Stats;

    #[test]
    fn modifier_rounds_down() {
        let cases = [
            (1, -5),
            (8, -1),
            (9, -1),
            (10, 0),
            (11, 0),
            (14, 2),
            (15, 2),
            (20, 5),
            (30, 10),
            (i32::MIN, i32::MIN / 2),
        ];
        for (score, expected) in cases {
            assert_eq!(ability_modifier(score), expected, "score {}", score);
        }
    }

    #[test]
    fn table_from_character() {
        let mut character = Character::new_default();
        character.proficiency = 3;
        character.stats = Stats {
            strength: 14,
            dexterity: 9,
            constitution: 10,
            intelligence: 18,
            wisdom: 7,
            charisma: 12,
        };

        let table = ModifierTable::from_character(&character);
        let expected: Vec<(&str, i32)> = vec![
            ("CAR", 1),
            ("CON", 0),
            ("DES", -1),
            ("FOR", 2),
            ("INT", 4),
            ("PROF", 3),
            ("SAB", -2),
        ];
        assert_eq!(table.iter().collect::<Vec<_>>(), expected);
    }

    #[test]
    fn hub_mirrors_to_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path().join("store.json"));
        let hub = ModifierHub::with_store(ModifierTable::default(), store.clone());
        let mut rx = hub.subscribe();

        let table = ModifierTable::from_character(&Character::new_default());
        hub.publish(table.clone());

        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), table);
        assert_eq!(ModifierTable::load_cached(&store).unwrap(), Some(table));
    }

    #[test]
    fn malformed_cache_keeps_previous_roller_table() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path().join("store.json"));
        store.set(MODIFIERS_KEY, r#"{"FOR": 2}"#).unwrap();

        let mut roller = crate::dice::DiceRoller::new();
        roller.load_modifiers(&store);
        assert_eq!(roller.modifiers().get("FOR"), Some(2));

        store.set(MODIFIERS_KEY, "{not json").unwrap();
        assert!(ModifierTable::load_cached(&store).is_err());
        roller.load_modifiers(&store);
        assert_eq!(roller.modifiers().get("FOR"), Some(2));
    }
}
