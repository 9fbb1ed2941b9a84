use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

use crate::dice::DieSides;
use crate::dnd::Damage;

#[derive(Error, Debug, PartialEq)]
pub(crate) enum ParseRollError {
    #[error("Invalid dice format: {0}")]
    InvalidFormat(String),
    #[error("Number of dice cannot be zero: {0}")]
    CannotBeZero(String),
    #[error("Unsupported die d{0}, expected one of d4, d6, d8, d10, d12, d20, d100")]
    UnsupportedSides(u32),
    #[error("Invalid damage format: {0}, expected something like 2d6:fire")]
    InvalidDamage(String),
}

/// Parses `NdS` or `dS` into a count and a die. The count defaults to one.
pub(crate) fn parse_dice(input: &str) -> Result<(u32, DieSides), ParseRollError> {
    lazy_static! {
        static ref RE: Regex = Regex::new(r"^([0-9]{1,4})?[dD]([0-9]{1,4})$").unwrap();
    }
    let stripped: String = input.split_whitespace().collect();
    log::trace!("Parsing dice {}", &stripped);
    let captures = RE.captures(&stripped).ok_or_else(|| {
        log::warn!("Regex match failure for {}", input);
        ParseRollError::InvalidFormat(stripped.clone())
    })?;

    // 2d20
    // Some(Captures({
    //     0: Some("2d20"),
    //     1: Some("2"),
    //     2: Some("20"),
    // })),
    let count = match captures.get(1) {
        Some(count) => count
            .as_str()
            .parse::<u32>()
            .map_err(|_| ParseRollError::InvalidFormat(stripped.clone()))?,
        None => 1,
    };
    let sides = captures[2]
        .parse::<u32>()
        .map_err(|_| ParseRollError::InvalidFormat(stripped.clone()))?;

    if count == 0 {
        Err(ParseRollError::CannotBeZero(stripped.clone()))?
    }

    Ok((count, DieSides::try_from(sides)?))
}

/// Parses a damage entry written as `2d6:fire`. The damage type may be left out.
pub(crate) fn parse_damage(input: &str) -> Result<Damage, ParseRollError> {
    let (dice, kind) = match input.split_once(':') {
        Some((dice, kind)) => (dice, kind.trim()),
        None => (input, ""),
    };
    let (quantity, sides) =
        parse_dice(dice).map_err(|_| ParseRollError::InvalidDamage(input.to_string()))?;
    Ok(Damage {
        quantity,
        die: sides.to_string(),
        kind: kind.to_string(),
    })
}

impl FromStr for DieSides {
    type Err = ParseRollError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let stripped: String = input.split_whitespace().collect();
        let digits = stripped
            .strip_prefix('d')
            .or_else(|| stripped.strip_prefix('D'))
            .unwrap_or(&stripped);
        let sides = digits
            .parse::<u32>()
            .map_err(|_| ParseRollError::InvalidFormat(stripped.clone()))?;
        DieSides::try_from(sides)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dice_correctly() {
        let cases = [
            ("1d20", Ok((1, DieSides::D20))),
            ("d20", Ok((1, DieSides::D20))),
            ("3D6", Ok((3, DieSides::D6))),
            (" 2 d 100 ", Ok((2, DieSides::D100))),
            (
                "rubbish",
                Err(ParseRollError::InvalidFormat("rubbish".to_string())),
            ),
            // too many dice
            (
                "10000d6",
                Err(ParseRollError::InvalidFormat("10000d6".to_string())),
            ),
            // zero dice
            (
                "0d6",
                Err(ParseRollError::CannotBeZero("0d6".to_string())),
            ),
            // not a die we have
            ("1d7", Err(ParseRollError::UnsupportedSides(7))),
            ("2d0", Err(ParseRollError::UnsupportedSides(0))),
            // modifiers belong to the bonus, not the dice
            (
                "1d20+3",
                Err(ParseRollError::InvalidFormat("1d20+3".to_string())),
            ),
        ];

        for (input, expected) in cases {
            assert_eq!(parse_dice(input), expected, "input {}", input);
        }
    }

    #[test]
    fn parses_die_labels() {
        assert_eq!("d6".parse::<DieSides>(), Ok(DieSides::D6));
        assert_eq!("D12".parse::<DieSides>(), Ok(DieSides::D12));
        assert_eq!("100".parse::<DieSides>(), Ok(DieSides::D100));
        assert_eq!(" d 20 ".parse::<DieSides>(), Ok(DieSides::D20));
        assert_eq!(
            "d3".parse::<DieSides>(),
            Err(ParseRollError::UnsupportedSides(3))
        );
        assert!("dx".parse::<DieSides>().is_err());
    }

    #[test]
    fn parses_damage_entries() {
        let damage = parse_damage("8d6:fogo").unwrap();
        assert_eq!(damage.quantity, 8);
        assert_eq!(damage.die, "d6");
        assert_eq!(damage.kind, "fogo");

        let untyped = parse_damage("d10").unwrap();
        assert_eq!(untyped.quantity, 1);
        assert_eq!(untyped.die, "d10");
        assert_eq!(untyped.kind, "");

        assert_eq!(
            parse_damage("lots:fogo"),
            Err(ParseRollError::InvalidDamage("lots:fogo".to_string()))
        );
    }
}
