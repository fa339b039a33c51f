//! Cards, notation parsing and the dealing deck.
//!
//! Every card maps to a dense index in `0..52` (rank-major, four suits per
//! rank). Equity seeding and deck construction go through that index.

use std::fmt;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::{CfrError, CfrResult};

const RANK_CHARS: &[u8; 13] = b"23456789TJQKA";
const SUIT_CHARS: &[u8; 4] = b"shdc";

pub const DECK_SIZE: usize = 52;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Rank {
    Two = 2,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Ten,
    Jack,
    Queen,
    King,
    Ace,
}

impl Rank {
    const ORDER: [Rank; 13] = [
        Rank::Two,
        Rank::Three,
        Rank::Four,
        Rank::Five,
        Rank::Six,
        Rank::Seven,
        Rank::Eight,
        Rank::Nine,
        Rank::Ten,
        Rank::Jack,
        Rank::Queen,
        Rank::King,
        Rank::Ace,
    ];

    /// Parse `2`..`9`, `T`, `J`, `Q`, `K`, `A` (upper case only).
    pub fn from_char(c: char) -> CfrResult<Rank> {
        RANK_CHARS
            .iter()
            .position(|&b| b as char == c)
            .map(|i| Rank::ORDER[i])
            .ok_or(CfrError::InvalidRank(c))
    }

    pub fn to_char(self) -> char {
        RANK_CHARS[self.value() as usize - 2] as char
    }

    /// Numeric rank, deuce = 2 through ace = 14.
    pub fn value(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Suit {
    Spades,
    Hearts,
    Diamonds,
    Clubs,
}

impl Suit {
    const ORDER: [Suit; 4] = [Suit::Spades, Suit::Hearts, Suit::Diamonds, Suit::Clubs];

    /// Case-insensitive `s`, `h`, `d`, `c`.
    pub fn from_char(c: char) -> CfrResult<Suit> {
        let lower = c.to_ascii_lowercase();
        SUIT_CHARS
            .iter()
            .position(|&b| b as char == lower)
            .map(|i| Suit::ORDER[i])
            .ok_or(CfrError::InvalidSuit(c))
    }

    pub fn to_char(self) -> char {
        SUIT_CHARS[self as usize] as char
    }

    pub fn symbol(self) -> &'static str {
        ["\u{2660}", "\u{2665}", "\u{2666}", "\u{2663}"][self as usize]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
}

impl Card {
    pub fn new(rank: Rank, suit: Suit) -> Card {
        Card { rank, suit }
    }

    /// Inverse of [`Card::index`]. Panics outside `0..52`.
    pub fn from_index(index: usize) -> Card {
        Card::new(Rank::ORDER[index / 4], Suit::ORDER[index % 4])
    }

    pub fn index(&self) -> usize {
        (self.value() as usize - 2) * 4 + self.suit as usize
    }

    pub fn value(&self) -> u8 {
        self.rank.value()
    }

    /// Rank plus suit glyph, for terminal output.
    pub fn pretty(&self) -> String {
        format!("{}{}", self.rank.to_char(), self.suit.symbol())
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.rank.to_char(), self.suit.to_char())
    }
}

/// All 52 cards in index order.
pub fn full_deck() -> Vec<Card> {
    (0..DECK_SIZE).map(Card::from_index).collect()
}

/// Undealt cards. Dealing takes from the front.
#[derive(Debug, Clone)]
pub struct Deck {
    pub cards: Vec<Card>,
}

impl Deck {
    pub fn full() -> Deck {
        Deck { cards: full_deck() }
    }

    /// A full deck minus the `dead` cards.
    pub fn without(dead: &[Card]) -> Deck {
        let mut deck = Deck::full();
        deck.cards.retain(|c| !dead.contains(c));
        deck
    }

    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) -> &mut Self {
        self.cards.shuffle(rng);
        self
    }

    pub fn deal(&mut self, n: usize) -> CfrResult<Vec<Card>> {
        let available = self.cards.len();
        if n > available {
            return Err(CfrError::NotEnoughDeck {
                requested: n,
                available,
            });
        }
        Ok(self.cards.drain(..n).collect())
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

/// Parse one card such as `"As"` or `"td"`.
pub fn parse_card(notation: &str) -> CfrResult<Card> {
    let trimmed = notation.trim();
    let mut chars = trimmed.chars();
    match (chars.next(), chars.next(), chars.next()) {
        (Some(r), Some(s), None) => Ok(Card::new(
            Rank::from_char(r.to_ascii_uppercase())?,
            Suit::from_char(s)?,
        )),
        _ => Err(CfrError::InvalidCardNotation(trimmed.to_string())),
    }
}

/// Parse concatenated cards; spaces and commas are ignored.
pub fn parse_board(notation: &str) -> CfrResult<Vec<Card>> {
    let chars: Vec<char> = notation
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .collect();
    if chars.len() % 2 != 0 {
        return Err(CfrError::InvalidBoardNotation(chars.into_iter().collect()));
    }
    chars
        .chunks(2)
        .map(|pair| parse_card(&pair.iter().collect::<String>()))
        .collect()
}

/// Parse exactly two hole cards, e.g. `"AsKd"`.
pub fn parse_hole_cards(notation: &str) -> CfrResult<[Card; 2]> {
    match parse_board(notation)?.as_slice() {
        &[a, b] => Ok([a, b]),
        _ => Err(CfrError::InvalidHandSize),
    }
}

pub fn format_cards(cards: &[Card]) -> String {
    cards.iter().map(Card::to_string).collect::<Vec<_>>().join(" ")
}
