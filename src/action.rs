use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::card::{Card, Color, Trait};
use crate::error::ActionSpaceError;

/// Zero-based index of a player within the game.
pub type PlayerId = usize;

/// Dense integer index of an action inside the [`ActionSpace`].
pub type ActionIndex = usize;

pub const DRAW_CARD: &str = "draw_card";

/// Symbolic move a player can make on their turn.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Action {
    /// Draw a single card from the deck.
    DrawCard,
    /// Play a colored card from the hand.
    Play(Card),
    /// Play a wild card from the hand, naming the next active color.
    PlayWild { card: Card, color: Color },
}

impl Action {
    /// Returns the hand card this action would consume, if any.
    pub fn card(&self) -> Option<Card> {
        match *self {
            Action::DrawCard => None,
            Action::Play(card) | Action::PlayWild { card, .. } => Some(card),
        }
    }

    /// Color that becomes active if the action is carried out.
    pub fn chosen_color(&self) -> Option<Color> {
        match *self {
            Action::DrawCard => None,
            Action::Play(card) => card.color(),
            Action::PlayWild { color, .. } => Some(color),
        }
    }

    /// The action identifiers a hand card expands to.
    pub fn for_card(card: Card) -> Vec<Action> {
        if card.is_wild() {
            Color::ALL
                .iter()
                .map(|&color| Action::PlayWild { card, color })
                .collect()
        } else {
            vec![Action::Play(card)]
        }
    }

    pub fn identifier(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::DrawCard => f.write_str(DRAW_CARD),
            Action::Play(card) => write!(f, "{card}"),
            Action::PlayWild { card, color } => {
                write!(f, "{}-{}", color.code(), card.card_trait().label())
            }
        }
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == DRAW_CARD {
            return Ok(Action::DrawCard);
        }
        let (code, label) = s
            .split_once('-')
            .ok_or_else(|| format!("action '{s}' lacks a color prefix"))?;
        let color = Color::from_code(code).ok_or_else(|| format!("unknown color in '{s}'"))?;
        match Trait::from_label(label) {
            Some(Trait::Wild) => Ok(Action::PlayWild {
                card: Card::Wild,
                color,
            }),
            Some(Trait::WildDrawFour) => Ok(Action::PlayWild {
                card: Card::WildDrawFour,
                color,
            }),
            Some(card_trait) => Card::new(Some(color), card_trait)
                .map(Action::Play)
                .ok_or_else(|| format!("invalid action '{s}'")),
            None => Err(format!("unknown trait in '{s}'")),
        }
    }
}

/// Every action the game can produce, in canonical index order.
fn canonical_actions() -> Vec<Action> {
    let mut actions = Vec::with_capacity(Color::ALL.len() * Trait::all().len() + 1);
    for color in Color::ALL {
        for card_trait in Trait::all() {
            let action = match card_trait {
                Trait::Wild => Action::PlayWild {
                    card: Card::Wild,
                    color,
                },
                Trait::WildDrawFour => Action::PlayWild {
                    card: Card::WildDrawFour,
                    color,
                },
                other => match Card::new(Some(color), other) {
                    Some(card) => Action::Play(card),
                    None => continue,
                },
            };
            actions.push(action);
        }
    }
    actions.push(Action::DrawCard);
    actions
}

/// Validated bidirectional mapping between action identifiers and dense indices.
///
/// Loaded once and shared (behind an `Arc`) by the engine, the environment and
/// the agent. The fingerprint is recorded in checkpoints so that weights
/// trained against one mapping are never used with another.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionSpace {
    by_index: Vec<Action>,
    by_action: HashMap<Action, ActionIndex>,
    fingerprint: u64,
}

impl ActionSpace {
    /// The canonical 61-entry mapping: colors r, g, b, y times the fifteen
    /// traits, followed by `draw_card` at index 60.
    pub fn standard() -> Self {
        Self::from_actions(canonical_actions())
    }

    /// Parses a JSON object of `{identifier: index}` pairs.
    pub fn from_json(json: &str) -> Result<Self, ActionSpaceError> {
        let raw: BTreeMap<String, usize> = serde_json::from_str(json)?;
        Self::from_entries(raw)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ActionSpaceError> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn to_json(&self) -> Result<String, ActionSpaceError> {
        let entries: BTreeMap<String, usize> = self
            .by_index
            .iter()
            .enumerate()
            .map(|(index, action)| (action.identifier(), index))
            .collect();
        Ok(serde_json::to_string_pretty(&entries)?)
    }

    pub fn from_entries(entries: BTreeMap<String, usize>) -> Result<Self, ActionSpaceError> {
        let size = entries.len();
        let mut slots: Vec<Option<Action>> = vec![None; size];
        for (identifier, index) in entries {
            let action: Action = identifier
                .parse()
                .map_err(|_| ActionSpaceError::UnknownIdentifier(identifier.clone()))?;
            let slot = slots
                .get_mut(index)
                .ok_or(ActionSpaceError::IndexOutOfRange { index, size })?;
            if slot.is_some() {
                return Err(ActionSpaceError::DuplicateIndex(index));
            }
            *slot = Some(action);
        }
        let by_index: Vec<Action> = slots.into_iter().flatten().collect();
        for action in canonical_actions() {
            if !by_index.contains(&action) {
                return Err(ActionSpaceError::MissingAction(action.identifier()));
            }
        }
        Ok(Self::from_actions(by_index))
    }

    /// Same actions with the entries at `a` and `b` trading places.
    #[cfg(test)]
    pub(crate) fn with_swapped(&self, a: ActionIndex, b: ActionIndex) -> Self {
        let mut by_index = self.by_index.clone();
        by_index.swap(a, b);
        Self::from_actions(by_index)
    }

    fn from_actions(by_index: Vec<Action>) -> Self {
        let by_action = by_index
            .iter()
            .enumerate()
            .map(|(index, action)| (*action, index))
            .collect();
        let fingerprint = fingerprint(&by_index);
        Self {
            by_index,
            by_action,
            fingerprint,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.by_index.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.by_index.is_empty()
    }

    pub fn action(&self, index: ActionIndex) -> Option<Action> {
        self.by_index.get(index).copied()
    }

    pub fn index_of(&self, action: &Action) -> Option<ActionIndex> {
        self.by_action.get(action).copied()
    }

    pub fn identifier(&self, index: ActionIndex) -> Option<String> {
        self.action(index).map(|action| action.identifier())
    }

    pub fn index_of_identifier(&self, identifier: &str) -> Option<ActionIndex> {
        identifier
            .parse::<Action>()
            .ok()
            .and_then(|action| self.index_of(&action))
    }

    pub fn draw_index(&self) -> ActionIndex {
        // Construction guarantees every canonical action is present.
        self.by_action[&Action::DrawCard]
    }

    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// Fails when `fingerprint` was produced by a different mapping.
    pub fn ensure_compatible(&self, fingerprint: u64) -> Result<(), ActionSpaceError> {
        if self.fingerprint == fingerprint {
            Ok(())
        } else {
            Err(ActionSpaceError::FingerprintMismatch {
                expected: self.fingerprint,
                found: fingerprint,
            })
        }
    }

    /// Additive mask: `0.0` for legal indices, negative infinity elsewhere.
    pub fn mask(&self, legal: &[ActionIndex]) -> Vec<f32> {
        let mut mask = vec![f32::NEG_INFINITY; self.len()];
        for &index in legal {
            if let Some(slot) = mask.get_mut(index) {
                *slot = 0.0;
            }
        }
        mask
    }
}

impl Default for ActionSpace {
    fn default() -> Self {
        Self::standard()
    }
}

/// FNV-1a over `index=identifier;` pairs.
fn fingerprint(actions: &[Action]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = OFFSET;
    for (index, action) in actions.iter().enumerate() {
        for byte in format!("{index}={action};").bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(PRIME);
        }
    }
    hash
}
