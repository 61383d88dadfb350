use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const HAND_SIZE: usize = 7;
pub const DECK_SIZE: usize = 108;
pub const COLOR_COUNT: usize = 4;
pub const TRAIT_COUNT: usize = 15;
pub const WILD_COPIES: usize = 4;
pub const MIN_PLAYERS: usize = 2;
pub const MAX_PLAYERS: usize = 4;

/// One of the four concrete card colors.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Color {
    Red,
    Green,
    Blue,
    Yellow,
}

impl Color {
    pub const ALL: [Color; COLOR_COUNT] = [Color::Red, Color::Green, Color::Blue, Color::Yellow];

    /// Single-letter prefix used in action identifiers.
    pub fn code(self) -> char {
        match self {
            Color::Red => 'r',
            Color::Green => 'g',
            Color::Blue => 'b',
            Color::Yellow => 'y',
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "r" => Some(Color::Red),
            "g" => Some(Color::Green),
            "b" => Some(Color::Blue),
            "y" => Some(Color::Yellow),
            _ => None,
        }
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Color::Red => "Red",
            Color::Green => "Green",
            Color::Blue => "Blue",
            Color::Yellow => "Yellow",
        };
        f.write_str(name)
    }
}

/// Rank or special-effect label of a card.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Trait {
    Number(u8),
    Skip,
    Reverse,
    DrawTwo,
    Wild,
    WildDrawFour,
}

impl Trait {
    /// All fifteen traits in feature/identifier order.
    pub fn all() -> [Trait; TRAIT_COUNT] {
        std::array::from_fn(|idx| match idx {
            0..=9 => Trait::Number(idx as u8),
            10 => Trait::Skip,
            11 => Trait::Reverse,
            12 => Trait::DrawTwo,
            13 => Trait::Wild,
            _ => Trait::WildDrawFour,
        })
    }

    #[inline]
    pub fn index(self) -> usize {
        match self {
            Trait::Number(value) => value as usize,
            Trait::Skip => 10,
            Trait::Reverse => 11,
            Trait::DrawTwo => 12,
            Trait::Wild => 13,
            Trait::WildDrawFour => 14,
        }
    }

    pub fn label(self) -> &'static str {
        const NUMBERS: [&str; 10] = ["0", "1", "2", "3", "4", "5", "6", "7", "8", "9"];
        match self {
            Trait::Number(value) => NUMBERS.get(value as usize).copied().unwrap_or("?"),
            Trait::Skip => "skip",
            Trait::Reverse => "reverse",
            Trait::DrawTwo => "draw_2",
            Trait::Wild => "wild",
            Trait::WildDrawFour => "wild_draw_4",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "skip" => Some(Trait::Skip),
            "reverse" => Some(Trait::Reverse),
            "draw_2" => Some(Trait::DrawTwo),
            "wild" => Some(Trait::Wild),
            "wild_draw_4" => Some(Trait::WildDrawFour),
            _ => match label.parse::<u8>() {
                Ok(value) if value <= 9 && label.len() == 1 => Some(Trait::Number(value)),
                _ => None,
            },
        }
    }
}

/// Coarse card category.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum CardType {
    Number,
    Action,
    Wild,
}

/// Representation of an Uno card.
///
/// Wild cards carry no color of their own; the color is chosen when they are
/// played and lives in the game state, never on the card.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Card {
    Number(Color, u8),
    Skip(Color),
    Reverse(Color),
    DrawTwo(Color),
    Wild,
    WildDrawFour,
}

impl Card {
    pub fn new(color: Option<Color>, card_trait: Trait) -> Option<Self> {
        match (color, card_trait) {
            (Some(color), Trait::Number(value)) if value <= 9 => Some(Card::Number(color, value)),
            (Some(color), Trait::Skip) => Some(Card::Skip(color)),
            (Some(color), Trait::Reverse) => Some(Card::Reverse(color)),
            (Some(color), Trait::DrawTwo) => Some(Card::DrawTwo(color)),
            (None, Trait::Wild) => Some(Card::Wild),
            (None, Trait::WildDrawFour) => Some(Card::WildDrawFour),
            _ => None,
        }
    }

    #[inline]
    pub fn color(&self) -> Option<Color> {
        match *self {
            Card::Number(color, _) | Card::Skip(color) | Card::Reverse(color) | Card::DrawTwo(color) => {
                Some(color)
            }
            Card::Wild | Card::WildDrawFour => None,
        }
    }

    #[inline]
    pub fn card_trait(&self) -> Trait {
        match *self {
            Card::Number(_, value) => Trait::Number(value),
            Card::Skip(_) => Trait::Skip,
            Card::Reverse(_) => Trait::Reverse,
            Card::DrawTwo(_) => Trait::DrawTwo,
            Card::Wild => Trait::Wild,
            Card::WildDrawFour => Trait::WildDrawFour,
        }
    }

    #[inline]
    pub fn card_type(&self) -> CardType {
        match self {
            Card::Number(..) => CardType::Number,
            Card::Skip(_) | Card::Reverse(_) | Card::DrawTwo(_) => CardType::Action,
            Card::Wild | Card::WildDrawFour => CardType::Wild,
        }
    }

    #[inline]
    pub fn is_wild(&self) -> bool {
        matches!(self, Card::Wild | Card::WildDrawFour)
    }

    #[inline]
    pub fn is_action(&self) -> bool {
        self.card_type() == CardType::Action
    }

    /// Checks whether the card may be played on `top` while `current_color` is active.
    #[inline]
    pub fn is_playable_on(&self, top: &Card, current_color: Color) -> bool {
        self.is_wild()
            || self.color() == Some(current_color)
            || self.card_trait() == top.card_trait()
    }

    /// Symbolic identifier, e.g. `r-5`, `b-draw_2`, `wild_draw_4`.
    pub fn identifier(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.color() {
            Some(color) => write!(f, "{}-{}", color.code(), self.card_trait().label()),
            None => f.write_str(self.card_trait().label()),
        }
    }
}

impl FromStr for Card {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (color, label) = match s.split_once('-') {
            Some((code, label)) => (
                Some(Color::from_code(code).ok_or_else(|| format!("unknown color in '{s}'"))?),
                label,
            ),
            None => (None, s),
        };
        let card_trait = Trait::from_label(label).ok_or_else(|| format!("unknown trait in '{s}'"))?;
        Card::new(color, card_trait).ok_or_else(|| format!("invalid card '{s}'"))
    }
}

/// Builds the full 108-card deck in deterministic order (unshuffled).
pub fn full_deck() -> Vec<Card> {
    let mut deck = Vec::with_capacity(DECK_SIZE);
    for color in Color::ALL {
        deck.push(Card::Number(color, 0));
        for value in 1..=9 {
            deck.push(Card::Number(color, value));
            deck.push(Card::Number(color, value));
        }
        for _ in 0..2 {
            deck.push(Card::Skip(color));
            deck.push(Card::Reverse(color));
            deck.push(Card::DrawTwo(color));
        }
    }
    deck.extend(std::iter::repeat(Card::Wild).take(WILD_COPIES));
    deck.extend(std::iter::repeat(Card::WildDrawFour).take(WILD_COPIES));
    deck
}
