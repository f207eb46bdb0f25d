//! Closed vocabularies for builder metadata

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which builder table a product belongs to. A product is never both.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Setting,
    Stone,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Setting => "setting",
            Self::Stone => "stone",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "setting" => Some(Self::Setting),
            "stone" => Some(Self::Stone),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stone cuts a setting can accept, and the cut of a stone itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoneShape {
    Round,
    Princess,
    Cushion,
    Oval,
    Emerald,
    Pear,
    Marquise,
    Radiant,
    Asscher,
    Heart,
}

impl StoneShape {
    pub const ALL: [Self; 10] = [
        Self::Round,
        Self::Princess,
        Self::Cushion,
        Self::Oval,
        Self::Emerald,
        Self::Pear,
        Self::Marquise,
        Self::Radiant,
        Self::Asscher,
        Self::Heart,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Round => "round",
            Self::Princess => "princess",
            Self::Cushion => "cushion",
            Self::Oval => "oval",
            Self::Emerald => "emerald",
            Self::Pear => "pear",
            Self::Marquise => "marquise",
            Self::Radiant => "radiant",
            Self::Asscher => "asscher",
            Self::Heart => "heart",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|shape| shape.as_str() == s)
    }
}

impl fmt::Display for StoneShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Metals a setting is priced in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Metal {
    #[serde(rename = "14k_yellow")]
    YellowGold14k,
    #[serde(rename = "14k_white")]
    WhiteGold14k,
    #[serde(rename = "14k_rose")]
    RoseGold14k,
    #[serde(rename = "platinum")]
    Platinum,
}

impl Metal {
    pub const ALL: [Self; 4] = [
        Self::YellowGold14k,
        Self::WhiteGold14k,
        Self::RoseGold14k,
        Self::Platinum,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::YellowGold14k => "14k_yellow",
            Self::WhiteGold14k => "14k_white",
            Self::RoseGold14k => "14k_rose",
            Self::Platinum => "platinum",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|metal| metal.as_str() == s)
    }
}

impl fmt::Display for Metal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// GIA color grades carried by the builder (colorless through near-colorless).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColorGrade {
    D,
    E,
    F,
    G,
    H,
    I,
    J,
}

impl ColorGrade {
    pub const ALL: [Self; 7] = [
        Self::D,
        Self::E,
        Self::F,
        Self::G,
        Self::H,
        Self::I,
        Self::J,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::D => "D",
            Self::E => "E",
            Self::F => "F",
            Self::G => "G",
            Self::H => "H",
            Self::I => "I",
            Self::J => "J",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|grade| grade.as_str() == s)
    }
}

/// GIA clarity grades.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ClarityGrade {
    Fl,
    If,
    Vvs1,
    Vvs2,
    Vs1,
    Vs2,
    Si1,
    Si2,
    I1,
}

impl ClarityGrade {
    pub const ALL: [Self; 9] = [
        Self::Fl,
        Self::If,
        Self::Vvs1,
        Self::Vvs2,
        Self::Vs1,
        Self::Vs2,
        Self::Si1,
        Self::Si2,
        Self::I1,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fl => "FL",
            Self::If => "IF",
            Self::Vvs1 => "VVS1",
            Self::Vvs2 => "VVS2",
            Self::Vs1 => "VS1",
            Self::Vs2 => "VS2",
            Self::Si1 => "SI1",
            Self::Si2 => "SI2",
            Self::I1 => "I1",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|grade| grade.as_str() == s)
    }
}

/// Setting styles offered by the builder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingStyle {
    Solitaire,
    Halo,
    Pave,
    ThreeStone,
    Vintage,
    Bezel,
    Tension,
}

impl SettingStyle {
    pub const ALL: [Self; 7] = [
        Self::Solitaire,
        Self::Halo,
        Self::Pave,
        Self::ThreeStone,
        Self::Vintage,
        Self::Bezel,
        Self::Tension,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Solitaire => "solitaire",
            Self::Halo => "halo",
            Self::Pave => "pave",
            Self::ThreeStone => "three_stone",
            Self::Vintage => "vintage",
            Self::Bezel => "bezel",
            Self::Tension => "tension",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|style| style.as_str() == s)
    }
}

impl fmt::Display for SettingStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trips_every_variant() {
        for shape in StoneShape::ALL {
            assert_eq!(StoneShape::parse(shape.as_str()), Some(shape));
        }
        for metal in Metal::ALL {
            assert_eq!(Metal::parse(metal.as_str()), Some(metal));
        }
        for grade in ColorGrade::ALL {
            assert_eq!(ColorGrade::parse(grade.as_str()), Some(grade));
        }
        for grade in ClarityGrade::ALL {
            assert_eq!(ClarityGrade::parse(grade.as_str()), Some(grade));
        }
        for style in SettingStyle::ALL {
            assert_eq!(SettingStyle::parse(style.as_str()), Some(style));
        }
    }

    #[test]
    fn test_unknown_values_parse_to_none() {
        assert_eq!(StoneShape::parse("trillion"), None);
        assert_eq!(Metal::parse("18k_yellow"), None);
        assert_eq!(ColorGrade::parse("K"), None);
        assert_eq!(ClarityGrade::parse("I2"), None);
        assert_eq!(SettingStyle::parse("cathedral"), None);
    }

    #[test]
    fn test_serde_names_match_as_str() {
        let json = serde_json::to_string(&SettingStyle::ThreeStone).unwrap();
        assert_eq!(json, "\"three_stone\"");
        let json = serde_json::to_string(&Metal::YellowGold14k).unwrap();
        assert_eq!(json, "\"14k_yellow\"");
        let json = serde_json::to_string(&ClarityGrade::Vvs1).unwrap();
        assert_eq!(json, "\"VVS1\"");
    }
}
