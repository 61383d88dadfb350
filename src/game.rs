use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::action::{Action, ActionIndex, ActionSpace, PlayerId};
use crate::card::{Card, CardType, Color, full_deck};
use crate::error::GameError;
use crate::state::{Direction, GameSettings, GameStateView};

const DEFAULT_SEED: u64 = 0x5EED_5EED_5EED_5EED;

/// Configuration required to bootstrap a game instance.
#[derive(Clone, Copy, Debug)]
pub struct GameConfig {
    pub num_players: usize,
    pub seed: u64,
}

impl GameConfig {
    pub fn new(num_players: usize, seed: u64) -> Result<Self, GameError> {
        GameSettings::new(num_players)?;
        Ok(Self { num_players, seed })
    }
}

/// Builder that enables deterministic deck injection for testing and RL experiments.
pub struct GameBuilder {
    config: GameConfig,
    deck: Option<Vec<Card>>,
    action_space: Option<Arc<ActionSpace>>,
}

impl GameBuilder {
    pub fn new(num_players: usize) -> Result<Self, GameError> {
        Ok(Self {
            config: GameConfig::new(num_players, DEFAULT_SEED)?,
            deck: None,
            action_space: None,
        })
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Use `deck` as-is (no initial shuffle). Cards are dealt from the end.
    pub fn with_deck(mut self, deck: Vec<Card>) -> Self {
        self.deck = Some(deck);
        self
    }

    pub fn with_action_space(mut self, action_space: Arc<ActionSpace>) -> Self {
        self.action_space = Some(action_space);
        self
    }

    pub fn build(self) -> Result<Game, GameError> {
        Game::from_builder(self)
    }
}

/// A seat at the table.
#[derive(Clone, Debug)]
pub struct Player {
    name: String,
    hand: Vec<Card>,
}

impl Player {
    fn new(name: String) -> Self {
        Self {
            name,
            hand: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hand(&self) -> &[Card] {
        &self.hand
    }

    pub fn has_won(&self) -> bool {
        self.hand.is_empty()
    }
}

/// What happened during a call to [`Game::step`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnEvent {
    /// A card left the hand and became the new top card.
    Played { card: Card, color: Color },
    /// The player asked to draw; `None` when no card could be supplied.
    Drew(Option<Card>),
    /// The requested play did not match a legal card in hand, so the engine
    /// drew a card instead.
    FallbackDraw {
        requested: Action,
        drawn: Option<Card>,
    },
}

impl TurnEvent {
    pub fn drawn_card(&self) -> Option<Card> {
        match *self {
            TurnEvent::Played { .. } => None,
            TurnEvent::Drew(card) => card,
            TurnEvent::FallbackDraw { drawn, .. } => drawn,
        }
    }

    pub fn played_card(&self) -> Option<Card> {
        match *self {
            TurnEvent::Played { card, .. } => Some(card),
            _ => None,
        }
    }
}

/// Result of advancing the game by one action.
#[derive(Clone, Debug)]
pub struct StepOutcome {
    /// Training view for the player who acts next.
    pub state: GameStateView,
    pub current_player: PlayerId,
    pub event: TurnEvent,
}

/// Discard pile that always keeps its top card.
#[derive(Clone, Debug)]
struct DiscardPile {
    top: Card,
    below: Vec<Card>,
}

impl DiscardPile {
    fn new(top: Card) -> Self {
        Self {
            top,
            below: Vec::new(),
        }
    }

    fn push(&mut self, card: Card) {
        self.below.push(self.top);
        self.top = card;
    }

    fn len(&self) -> usize {
        self.below.len() + 1
    }

    /// Removes everything except the top card.
    fn take_below(&mut self) -> Vec<Card> {
        std::mem::take(&mut self.below)
    }
}

/// Core Uno turn engine.
pub struct Game {
    settings: GameSettings,
    action_space: Arc<ActionSpace>,
    players: Vec<Player>,
    deck: Vec<Card>,
    discard: DiscardPile,
    current_color: Color,
    direction: Direction,
    current_player: PlayerId,
    skip_next: bool,
    total_cards: usize,
    rng: StdRng,
}

impl Game {
    pub fn builder(num_players: usize) -> Result<GameBuilder, GameError> {
        GameBuilder::new(num_players)
    }

    pub fn new(config: GameConfig) -> Result<Self, GameError> {
        GameBuilder {
            config,
            deck: None,
            action_space: None,
        }
        .build()
    }

    pub fn settings(&self) -> GameSettings {
        self.settings
    }

    pub fn action_space(&self) -> &Arc<ActionSpace> {
        &self.action_space
    }

    pub fn current_player(&self) -> PlayerId {
        self.current_player
    }

    pub fn current_color(&self) -> Color {
        self.current_color
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn top_card(&self) -> Card {
        self.discard.top
    }

    pub fn deck_len(&self) -> usize {
        self.deck.len()
    }

    pub fn discard_len(&self) -> usize {
        self.discard.len()
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, id: PlayerId) -> Result<&Player, GameError> {
        self.players.get(id).ok_or(GameError::InvalidPlayer(id))
    }

    /// Number of cards across deck, discard pile and hands.
    pub fn card_count(&self) -> usize {
        self.deck.len()
            + self.discard.len()
            + self.players.iter().map(|p| p.hand.len()).sum::<usize>()
    }

    /// Number of cards the game started with; [`Game::card_count`] never deviates from it.
    pub fn total_cards(&self) -> usize {
        self.total_cards
    }

    pub fn init_game(&self) -> (GameStateView, PlayerId) {
        (self.view(self.current_player, true), self.current_player)
    }

    pub fn game_over(&self) -> bool {
        self.players.iter().any(Player::has_won)
    }

    pub fn winner(&self) -> Option<PlayerId> {
        self.players.iter().position(Player::has_won)
    }

    pub fn winning_player(&self) -> Option<&Player> {
        self.players.iter().find(|p| p.has_won())
    }

    /// Full-information view of `index`, used for self-play and training.
    pub fn state_for_player(&self, index: PlayerId) -> Result<GameStateView, GameError> {
        self.player(index)?;
        Ok(self.view(index, true))
    }

    /// View of seat `index` as seen by `viewer`: the hand is only revealed
    /// when the viewer owns it.
    pub fn player_view(
        &self,
        index: PlayerId,
        viewer: PlayerId,
    ) -> Result<GameStateView, GameError> {
        self.player(index)?;
        self.player(viewer)?;
        Ok(self.view(index, index == viewer))
    }

    pub fn legal_actions(&self, index: PlayerId) -> Result<Vec<ActionIndex>, GameError> {
        let player = self.player(index)?;
        let mut legal = vec![self.action_space.draw_index()];
        for card in &player.hand {
            if !card.is_playable_on(&self.discard.top, self.current_color) {
                continue;
            }
            for action in Action::for_card(*card) {
                if let Some(action_index) = self.action_space.index_of(&action) {
                    if !legal.contains(&action_index) {
                        legal.push(action_index);
                    }
                }
            }
        }
        Ok(legal)
    }

    /// Whether `card` could be played right now, e.g. straight after drawing it.
    pub fn is_card_playable(&self, card: &Card) -> bool {
        card.is_playable_on(&self.discard.top, self.current_color)
    }

    pub fn step(&mut self, action_index: ActionIndex) -> Result<StepOutcome, GameError> {
        if self.game_over() {
            return Err(GameError::GameOver);
        }
        let action = self
            .action_space
            .action(action_index)
            .ok_or(GameError::UnknownAction(action_index))?;
        let player = self.current_player;
        let event = match action {
            Action::DrawCard => TurnEvent::Drew(self.draw_into(player)),
            requested => match self.find_playable(player, &requested) {
                Some(position) => self.play_card(player, position, &requested),
                None => {
                    let drawn = self.draw_into(player);
                    tracing::debug!(
                        player,
                        action = %requested,
                        drew = drawn.is_some(),
                        "requested card is not playable, drawing instead"
                    );
                    TurnEvent::FallbackDraw { requested, drawn }
                }
            },
        };
        self.advance_turn();
        Ok(StepOutcome {
            state: self.view(self.current_player, true),
            current_player: self.current_player,
            event,
        })
    }

    fn from_builder(builder: GameBuilder) -> Result<Self, GameError> {
        let GameBuilder {
            config,
            deck,
            action_space,
        } = builder;
        let settings = GameSettings::new(config.num_players)?;
        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut deck = match deck {
            Some(deck) => deck,
            None => {
                let mut deck = full_deck();
                deck.shuffle(&mut rng);
                deck
            }
        };
        let total_cards = deck.len();
        if total_cards < settings.num_players * settings.hand_size + 1 {
            return Err(GameError::InvalidConfiguration(
                "deck does not contain enough cards to deal hands",
            ));
        }

        let mut players: Vec<Player> = (0..settings.num_players)
            .map(|idx| Player::new(format!("Player {idx}")))
            .collect();
        for _ in 0..settings.hand_size {
            for player in players.iter_mut() {
                let card = deck.pop().ok_or(GameError::InvalidConfiguration(
                    "deck exhausted while dealing hands",
                ))?;
                player.hand.push(card);
            }
        }

        let start = Self::draw_starting_card(&mut deck, &mut rng)?;
        let current_color = start.color().ok_or(GameError::InvalidConfiguration(
            "starting card must have a color",
        ))?;

        Ok(Game {
            settings,
            action_space: action_space.unwrap_or_default(),
            players,
            deck,
            discard: DiscardPile::new(start),
            current_color,
            direction: Direction::Forward,
            current_player: 0,
            skip_next: false,
            total_cards,
            rng,
        })
    }

    /// Draws until a plain number card turns up; rejected cards go back under
    /// the deck, which is reshuffled before the next attempt.
    fn draw_starting_card(deck: &mut Vec<Card>, rng: &mut StdRng) -> Result<Card, GameError> {
        if !deck.iter().any(|card| card.card_type() == CardType::Number) {
            return Err(GameError::InvalidConfiguration(
                "deck holds no number card to start with",
            ));
        }
        loop {
            let card = deck.pop().ok_or(GameError::InvalidConfiguration(
                "deck exhausted while choosing the starting card",
            ))?;
            if card.card_type() == CardType::Number {
                return Ok(card);
            }
            deck.insert(0, card);
            deck.shuffle(rng);
        }
    }

    fn view(&self, index: PlayerId, reveal_hand: bool) -> GameStateView {
        let opponent_hand_sizes = self
            .players
            .iter()
            .enumerate()
            .filter(|(idx, _)| *idx != index)
            .map(|(_, player)| player.hand.len())
            .collect();
        let legal_actions = self
            .legal_actions(index)
            .unwrap_or_else(|_| vec![self.action_space.draw_index()]);
        GameStateView {
            self_player: index,
            current_player: self.current_player,
            target: self.discard.top,
            current_color: self.current_color,
            direction: self.direction,
            hand: if reveal_hand {
                self.players[index].hand.clone()
            } else {
                Vec::new()
            },
            opponent_hand_sizes,
            legal_actions,
            deck_size: self.deck.len(),
            discard_size: self.discard.len(),
            drawn_card: None,
        }
    }

    fn find_playable(&self, player: PlayerId, action: &Action) -> Option<usize> {
        let wanted = action.card()?;
        self.players[player]
            .hand
            .iter()
            .position(|card| *card == wanted && self.is_card_playable(card))
    }

    fn play_card(&mut self, player: PlayerId, position: usize, action: &Action) -> TurnEvent {
        let card = self.players[player].hand.remove(position);
        self.discard.push(card);
        if let Some(color) = action.chosen_color() {
            self.current_color = color;
        }
        self.apply_card_effect(card);
        TurnEvent::Played {
            card,
            color: self.current_color,
        }
    }

    fn apply_card_effect(&mut self, card: Card) {
        match card {
            Card::Skip(_) => self.skip_next = true,
            Card::Reverse(_) => {
                self.direction = self.direction.reversed();
                if self.players.len() == 2 {
                    self.skip_next = true;
                }
            }
            Card::DrawTwo(_) => {
                let next = self.seat_after(1);
                self.draw_cards(next, 2);
                self.skip_next = true;
            }
            Card::WildDrawFour => {
                let next = self.seat_after(1);
                self.draw_cards(next, 4);
                self.skip_next = true;
            }
            Card::Number(..) | Card::Wild => {}
        }
    }

    /// Seat `steps` positions away from the current player along the direction of play.
    fn seat_after(&self, steps: isize) -> PlayerId {
        let count = self.players.len() as isize;
        (self.current_player as isize + steps * self.direction.sign()).rem_euclid(count) as PlayerId
    }

    fn advance_turn(&mut self) {
        let steps = if self.skip_next { 2 } else { 1 };
        self.skip_next = false;
        self.current_player = self.seat_after(steps);
    }

    fn draw_cards(&mut self, player: PlayerId, count: usize) -> usize {
        (0..count)
            .take_while(|_| self.draw_into(player).is_some())
            .count()
    }

    fn draw_into(&mut self, player: PlayerId) -> Option<Card> {
        let card = self.draw_card()?;
        self.players[player].hand.push(card);
        Some(card)
    }

    fn draw_card(&mut self) -> Option<Card> {
        if self.deck.is_empty() && !self.reshuffle_discard() {
            tracing::debug!("deck and discard pile exhausted, draw skipped");
            return None;
        }
        self.deck.pop()
    }

    /// Turns everything below the top discard into a fresh, shuffled deck.
    fn reshuffle_discard(&mut self) -> bool {
        if self.discard.len() <= 1 {
            return false;
        }
        let mut cards = self.discard.take_below();
        cards.shuffle(&mut self.rng);
        tracing::debug!(cards = cards.len(), "reshuffling discard pile into deck");
        self.deck.append(&mut cards);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_player_game() -> Game {
        GameBuilder::new(2)
            .expect("builder")
            .with_seed(11)
            .build()
            .expect("game")
    }

    #[test]
    fn reshuffle_keeps_top_card_and_rebuilds_deck() {
        let mut game = two_player_game();
        let mut spare = std::mem::take(&mut game.deck);
        let top = spare.pop().expect("deck has cards");
        for card in spare.drain(..5) {
            game.discard.push(card);
        }
        game.discard.push(top);
        // Park the rest in a hand so the card total is unchanged.
        game.players[1].hand.append(&mut spare);
        let old_discard = game.discard_len();
        assert_eq!(old_discard, 7);

        assert!(game.reshuffle_discard());
        assert_eq!(game.deck_len(), old_discard - 1);
        assert_eq!(game.discard_len(), 1);
        assert_eq!(game.top_card(), top);
        assert_eq!(game.card_count(), game.total_cards());
    }

    #[test]
    fn draw_is_a_no_op_without_reshuffle_material() {
        let mut game = two_player_game();
        let mut spare = std::mem::take(&mut game.deck);
        game.players[0].hand.append(&mut spare);
        let before = game.players[0].hand.len();
        assert_eq!(game.discard_len(), 1);
        assert_eq!(game.draw_into(0), None);
        assert_eq!(game.players[0].hand.len(), before);
        assert_eq!(game.card_count(), game.total_cards());
    }

    #[test]
    fn draw_two_wraps_backwards() {
        let mut game = GameBuilder::new(3)
            .expect("builder")
            .build()
            .expect("game");
        game.direction = Direction::Backward;
        let before = game.players[2].hand.len();
        game.apply_card_effect(Card::DrawTwo(Color::Red));
        assert_eq!(game.players[2].hand.len(), before + 2);
        game.advance_turn();
        assert_eq!(game.current_player(), 1);
    }

    #[test]
    fn drawing_from_an_empty_deck_recycles_the_discard_pile() -> Result<(), GameError> {
        let mut game = two_player_game();
        let mut spare = std::mem::take(&mut game.deck);
        let top = spare.pop().expect("deck has cards");
        for card in spare.drain(..5) {
            game.discard.push(card);
        }
        game.discard.push(top);
        game.players[1].hand.append(&mut spare);
        let old_discard = game.discard_len();
        let hand_before = game.player(0)?.hand().len();

        let draw = game.action_space().draw_index();
        let outcome = game.step(draw)?;
        assert!(matches!(outcome.event, TurnEvent::Drew(Some(_))));
        assert_eq!(game.deck_len(), old_discard - 2);
        assert_eq!(game.discard_len(), 1);
        assert_eq!(game.top_card(), top);
        assert_eq!(game.player(0)?.hand().len(), hand_before + 1);
        assert_eq!(game.card_count(), game.total_cards());
        Ok(())
    }
}

