//! Card and deck primitives.
//!
//! A card's canonical text form is `<rank><suit>`, e.g. `"AS"` for the ace
//! of spades or `"TD"` for the ten of diamonds.  Decks are shuffled with a
//! Fisher-Yates pass over a seeded PRNG; the seed is drawn from the OS
//! entropy source in production and recorded on the game for replay, but it
//! never appears in any client-facing snapshot.
//!
//! The engine does not burn cards: the board is dealt straight off the
//! cursor, so a hand is fully determined by the shuffled order.

use std::fmt;
use std::str::FromStr;

use borsh::{BorshDeserialize, BorshSerialize};
use rand::rngs::{OsRng, StdRng};
use rand::seq::SliceRandom;
use rand::{RngCore, SeedableRng};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::{self, Result};

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Suit {
    Spades,
    Hearts,
    Diamonds,
    Clubs,
}

pub const SUITS: [Suit; 4] = [Suit::Spades, Suit::Hearts, Suit::Diamonds, Suit::Clubs];

#[derive(
    BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub enum Rank {
    Two,
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

pub const RANKS: [Rank; 13] = [
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

impl Rank {
    /// Comparison order: deuce is 2, ace is 14.
    pub fn order(&self) -> u8 {
        *self as u8 + 2
    }
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
}

impl Card {
    pub const fn new(rank: Rank, suit: Suit) -> Self {
        Self { rank, suit }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ch = match self {
            Rank::Ten => 'T',
            Rank::Jack => 'J',
            Rank::Queen => 'Q',
            Rank::King => 'K',
            Rank::Ace => 'A',
            r => char::from_digit(r.order() as u32, 10).unwrap_or('?'),
        };
        write!(f, "{ch}")
    }
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ch = match self {
            Suit::Spades => 'S',
            Suit::Hearts => 'H',
            Suit::Diamonds => 'D',
            Suit::Clubs => 'C',
        };
        write!(f, "{ch}")
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.rank, self.suit)
    }
}

impl FromStr for Card {
    type Err = crate::errors::EngineError;

    fn from_str(s: &str) -> Result<Self> {
        let mut chars = s.chars();
        let (Some(r_ch), Some(s_ch), None) = (chars.next(), chars.next(), chars.next()) else {
            return Err(errors::bad_card(s));
        };

        let rank = match r_ch.to_ascii_uppercase() {
            '2' => Rank::Two,
            '3' => Rank::Three,
            '4' => Rank::Four,
            '5' => Rank::Five,
            '6' => Rank::Six,
            '7' => Rank::Seven,
            '8' => Rank::Eight,
            '9' => Rank::Nine,
            'T' => Rank::Ten,
            'J' => Rank::Jack,
            'Q' => Rank::Queen,
            'K' => Rank::King,
            'A' => Rank::Ace,
            _ => return Err(errors::bad_card(s)),
        };

        let suit = match s_ch.to_ascii_uppercase() {
            'S' => Suit::Spades,
            'H' => Suit::Hearts,
            'D' => Suit::Diamonds,
            'C' => Suit::Clubs,
            _ => return Err(errors::bad_card(s)),
        };

        Ok(Card { rank, suit })
    }
}

// Cards cross the API as their canonical text form.
impl Serialize for Card {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Card {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = <String as Deserialize>::deserialize(deserializer)?;
        s.parse().map_err(|e| D::Error::custom(format!("{e}")))
    }
}

/// An ordered run of cards with a cursor marking the next card to deal.
#[derive(BorshSerialize, BorshDeserialize, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Deck {
    cards: Vec<Card>,
    cursor: usize,
}

impl Deck {
    /// A fresh 52-card deck shuffled with the given seed (Fisher-Yates).
    pub fn shuffled(seed: u64) -> Self {
        let mut cards: Vec<Card> = SUITS
            .iter()
            .flat_map(|&suit| RANKS.iter().map(move |&rank| Card::new(rank, suit)))
            .collect();
        let mut rng = StdRng::seed_from_u64(seed);
        cards.shuffle(&mut rng);
        Self { cards, cursor: 0 }
    }

    /// Draw a fresh deck seed from the OS entropy source.
    pub fn random_seed() -> u64 {
        OsRng.next_u64()
    }

    /// A deck with an explicit order, for tests and replays.  Rejects
    /// duplicates and anything longer than a full deck.
    pub fn from_cards(cards: Vec<Card>) -> Result<Self> {
        if cards.len() > 52 {
            return Err(errors::duplicate_card());
        }
        for (i, card) in cards.iter().enumerate() {
            if cards[..i].contains(card) {
                return Err(errors::duplicate_card());
            }
        }
        Ok(Self { cards, cursor: 0 })
    }

    pub fn deal(&mut self, n: usize) -> Result<Vec<Card>> {
        if self.cursor + n > self.cards.len() {
            return Err(errors::deck_exhausted());
        }
        let dealt = self.cards[self.cursor..self.cursor + n].to_vec();
        self.cursor += n;
        Ok(dealt)
    }

    pub fn deal_one(&mut self) -> Result<Card> {
        Ok(self.deal(1)?[0])
    }

    pub fn remaining(&self) -> usize {
        self.cards.len() - self.cursor
    }
}

impl Default for Deck {
    fn default() -> Self {
        Self {
            cards: Vec::new(),
            cursor: 0,
        }
    }
}
