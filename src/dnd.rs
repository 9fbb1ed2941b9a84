use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dice::DieSides;
use crate::parser::ParseRollError;

pub(crate) const STAT_MIN: i32 = 1;
pub(crate) const STAT_MAX: i32 = 30;
pub(crate) const TOUCH_RANGE: &str = "Toque";

#[derive(Error, Debug, PartialEq)]
pub(crate) enum RecordError {
    #[error("Unknown ability {0}, expected one of str, dex, con, int, wis, cha")]
    UnknownAbility(String),
    #[error("Invalid spell level {0}, expected Truque or 1 to 9")]
    InvalidLevel(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Ability {
    Strength,
    Dexterity,
    Constitution,
    Intelligence,
    Wisdom,
    Charisma,
}

impl Ability {
    pub const ALL: [Ability; 6] = [
        Ability::Strength,
        Ability::Dexterity,
        Ability::Constitution,
        Ability::Intelligence,
        Ability::Wisdom,
        Ability::Charisma,
    ];

    /// Key used by the sheet record.
    pub fn key(self) -> &'static str {
        match self {
            Ability::Strength => "str",
            Ability::Dexterity => "dex",
            Ability::Constitution => "con",
            Ability::Intelligence => "int",
            Ability::Wisdom => "wis",
            Ability::Charisma => "cha",
        }
    }

    /// Name the modifier goes by when offered to a roll.
    pub fn modifier_name(self) -> &'static str {
        match self {
            Ability::Strength => "FOR",
            Ability::Dexterity => "DES",
            Ability::Constitution => "CON",
            Ability::Intelligence => "INT",
            Ability::Wisdom => "SAB",
            Ability::Charisma => "CAR",
        }
    }
}

impl FromStr for Ability {
    type Err = RecordError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let lowered = input.trim().to_lowercase();
        Ability::ALL
            .into_iter()
            .find(|ability| {
                ability.key() == lowered || ability.modifier_name().to_lowercase() == lowered
            })
            .ok_or_else(|| RecordError::UnknownAbility(input.to_string()))
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy)]
pub(crate) struct Stats {
    #[serde(rename = "str")]
    pub strength: i32,
    #[serde(rename = "dex")]
    pub dexterity: i32,
    #[serde(rename = "con")]
    pub constitution: i32,
    #[serde(rename = "int")]
    pub intelligence: i32,
    #[serde(rename = "wis")]
    pub wisdom: i32,
    #[serde(rename = "cha")]
    pub charisma: i32,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            strength: 10,
            dexterity: 10,
            constitution: 10,
            intelligence: 10,
            wisdom: 10,
            charisma: 10,
        }
    }
}

impl Stats {
    /// Pulls every score into `STAT_MIN..=STAT_MAX`.
    pub fn clamp(&mut self) {
        for ability in Ability::ALL {
            let score = self.get_mut(ability);
            *score = (*score).clamp(STAT_MIN, STAT_MAX);
        }
    }

    pub fn get(&self, ability: Ability) -> i32 {
        match ability {
            Ability::Strength => self.strength,
            Ability::Dexterity => self.dexterity,
            Ability::Constitution => self.constitution,
            Ability::Intelligence => self.intelligence,
            Ability::Wisdom => self.wisdom,
            Ability::Charisma => self.charisma,
        }
    }

    pub fn get_mut(&mut self, ability: Ability) -> &mut i32 {
        match ability {
            Ability::Strength => &mut self.strength,
            Ability::Dexterity => &mut self.dexterity,
            Ability::Constitution => &mut self.constitution,
            Ability::Intelligence => &mut self.intelligence,
            Ability::Wisdom => &mut self.wisdom,
            Ability::Charisma => &mut self.charisma,
        }
    }
}

fn default_level() -> u32 {
    1
}

fn default_proficiency() -> i32 {
    2
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub(crate) struct Character {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub class: String,
    #[serde(default = "default_level")]
    pub level: u32,
    pub race: String,
    #[serde(default = "default_proficiency")]
    pub proficiency: i32,
    #[serde(default)]
    pub stats: Stats,
    #[serde(default)]
    pub spells: Vec<Magic>,
}

impl Character {
    /// Sheet created when the backend has none yet.
    pub fn new_default() -> Self {
        Self {
            id: None,
            name: "Novo Personagem".to_string(),
            class: "Aventureiro".to_string(),
            level: 1,
            race: "Humano".to_string(),
            proficiency: 2,
            stats: Stats::default(),
            spells: Vec::new(),
        }
    }
}

/// Body of create and update requests: the whole sheet minus its identifier.
#[derive(Serialize, Debug, PartialEq, Eq, Clone)]
pub(crate) struct CharacterUpdate {
    pub name: String,
    pub class: String,
    pub level: u32,
    pub race: String,
    pub proficiency: i32,
    pub stats: Stats,
    pub spells: Vec<Magic>,
}

impl From<&Character> for CharacterUpdate {
    fn from(character: &Character) -> Self {
        Self {
            name: character.name.clone(),
            class: character.class.clone(),
            level: character.level,
            race: character.race.clone(),
            proficiency: character.proficiency,
            stats: character.stats,
            spells: character.spells.clone(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy)]
#[serde(try_from = "RawLevel", into = "String")]
pub(crate) enum SpellLevel {
    Cantrip,
    Level(u8),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawLevel {
    Number(u8),
    Text(String),
}

impl TryFrom<RawLevel> for SpellLevel {
    type Error = RecordError;

    fn try_from(raw: RawLevel) -> Result<Self, Self::Error> {
        match raw {
            RawLevel::Number(level) => SpellLevel::from_str(&level.to_string()),
            RawLevel::Text(level) => SpellLevel::from_str(&level),
        }
    }
}

impl FromStr for SpellLevel {
    type Err = RecordError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let input = input.trim();
        if input.eq_ignore_ascii_case("truque") || input.eq_ignore_ascii_case("cantrip") {
            return Ok(SpellLevel::Cantrip);
        }
        match input.parse::<u8>() {
            Ok(level) if (1..=9).contains(&level) => Ok(SpellLevel::Level(level)),
            _ => Err(RecordError::InvalidLevel(input.to_string())),
        }
    }
}

impl std::fmt::Display for SpellLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpellLevel::Cantrip => write!(f, "Truque"),
            SpellLevel::Level(level) => write!(f, "{}", level),
        }
    }
}

impl From<SpellLevel> for String {
    fn from(level: SpellLevel) -> Self {
        level.to_string()
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub(crate) struct Damage {
    pub quantity: u32,
    pub die: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl Damage {
    pub fn die_sides(&self) -> Result<DieSides, ParseRollError> {
        self.die.parse()
    }
}

impl std::fmt::Display for Damage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.quantity, self.die)?;
        if !self.kind.is_empty() {
            write!(f, " {}", self.kind)?;
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub(crate) struct Magic {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub level: SpellLevel,
    #[serde(default)]
    pub range: String,
    #[serde(default)]
    pub damage: Vec<Damage>,
    #[serde(rename = "addSpellMod", default)]
    pub add_spell_mod: bool,
}

impl Magic {
    /// Damage line as a sheet shows it, e.g. `8d6 fogo+1d4 + Mod`.
    pub fn damage_summary(&self) -> String {
        let mut summary = self
            .damage
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("+");
        if self.add_spell_mod {
            summary.push_str(" + Mod");
        }
        summary
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy, Default)]
pub(crate) struct Coins {
    pub pp: u32,
    pub gp: u32,
    pub sp: u32,
    pub cp: u32,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub(crate) struct Item {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub weight: f64,
    pub rarity: String,
    pub value: Coins,
    pub damage: Vec<Damage>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_abilities() {
        assert_eq!("str".parse::<Ability>(), Ok(Ability::Strength));
        assert_eq!("SAB".parse::<Ability>(), Ok(Ability::Wisdom));
        assert_eq!(" Cha ".parse::<Ability>(), Ok(Ability::Charisma));
        assert_eq!(
            "luck".parse::<Ability>(),
            Err(RecordError::UnknownAbility("luck".to_string()))
        );
    }

    #[test]
    fn spell_levels() {
        let cases = [
            ("Truque", Ok(SpellLevel::Cantrip)),
            ("3", Ok(SpellLevel::Level(3))),
            ("9", Ok(SpellLevel::Level(9))),
            ("0", Err(RecordError::InvalidLevel("0".to_string()))),
            ("10", Err(RecordError::InvalidLevel("10".to_string()))),
        ];
        for (input, expected) in cases {
            assert_eq!(input.parse::<SpellLevel>(), expected);
        }
    }

    #[test]
    fn reads_magic_from_api_shape() {
        let magic: Magic = serde_json::from_value(serde_json::json!({
            "_id": "abc",
            "name": "Bola de Fogo",
            "description": "Boom",
            "level": "3",
            "range": "45",
            "damage": [{"quantity": 8, "die": "d6", "type": "fogo"}],
            "addSpellMod": false,
            "__v": 0
        }))
        .unwrap();
        assert_eq!(magic.id.as_deref(), Some("abc"));
        assert_eq!(magic.level, SpellLevel::Level(3));
        assert_eq!(magic.damage[0].die_sides(), Ok(DieSides::D6));
        assert_eq!(magic.damage_summary(), "8d6 fogo");

        let numeric: Magic = serde_json::from_value(serde_json::json!({
            "name": "Misseis", "level": 1
        }))
        .unwrap();
        assert_eq!(numeric.level, SpellLevel::Level(1));
        assert_eq!(
            serde_json::to_value(&numeric).unwrap()["level"],
            serde_json::json!("1")
        );
    }

    #[test]
    fn reads_character_with_missing_optional_fields() {
        let character: Character = serde_json::from_value(serde_json::json!({
            "_id": "c1",
            "name": "Ana",
            "class": "Maga",
            "level": 3,
            "race": "Elfa",
            "stats": {"str": 8, "dex": 14, "con": 12, "int": 17, "wis": 10, "cha": 11}
        }))
        .unwrap();
        assert_eq!(character.proficiency, 2);
        assert!(character.spells.is_empty());
        assert_eq!(character.stats.get(Ability::Intelligence), 17);
    }

    #[test]
    fn update_body_drops_identifier() {
        let mut character = Character::new_default();
        character.id = Some("c1".to_string());
        let body = serde_json::to_value(CharacterUpdate::from(&character)).unwrap();
        assert!(body.get("_id").is_none());
        assert_eq!(body["stats"]["str"], 10);
        assert_eq!(body["class"], "Aventureiro");
    }
}
