//! Functions and structs used to compare (evaluate) players' hands.
//!
//! Seven cards (5 community + 2 hole) go in, the best 5-card hand comes out
//! as a [`HandRank`].  Two ranks compare through their `value` vectors:
//! the category order first, then the five picked card ranks in comparison
//! order.  Equal values mean a split pot regardless of suits.

use std::cmp::Ordering;
use std::collections::HashMap;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::deck::{Card, Rank, Suit};

/// Hand categories, strongest first.  A royal flush is the ace-high case of
/// [`Category::StraightFlush`].
#[derive(
    BorshSerialize, BorshDeserialize, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    StraightFlush,
    FourOfAKind,
    FullHouse,
    Flush,
    Straight,
    ThreeOfAKind,
    TwoPair,
    OnePair,
    HighCard,
}

impl Category {
    fn order(&self) -> u8 {
        match self {
            Category::StraightFlush => 8,
            Category::FourOfAKind => 7,
            Category::FullHouse => 6,
            Category::Flush => 5,
            Category::Straight => 4,
            Category::ThreeOfAKind => 3,
            Category::TwoPair => 2,
            Category::OnePair => 1,
            Category::HighCard => 0,
        }
    }

    /// Display name used in broadcasts and hand histories.
    pub fn label(&self) -> &'static str {
        match self {
            Category::StraightFlush => "Straight Flush",
            Category::FourOfAKind => "Four of a Kind",
            Category::FullHouse => "Full House",
            Category::Flush => "Flush",
            Category::Straight => "Straight",
            Category::ThreeOfAKind => "Three of a Kind",
            Category::TwoPair => "Two Pair",
            Category::OnePair => "One Pair",
            Category::HighCard => "High Card",
        }
    }
}

/// The evaluation of one seven-card hand.
///
/// Equality and ordering go through `value` only: two ranks are equal when
/// their best five cards are category-and-kicker equivalent, even if the
/// picked suits differ.
#[derive(BorshSerialize, BorshDeserialize, Serialize, Deserialize, Debug, Clone)]
pub struct HandRank {
    pub category: Category,
    /// `[category order, pick ranks in comparison order...]`
    pub value: Vec<u8>,
    /// The exact five cards forming the best hand, for display.
    pub picks: Vec<Card>,
}

impl PartialEq for HandRank {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for HandRank {}

impl PartialOrd for HandRank {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HandRank {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

/// Compare two evaluations without re-running the algorithm.
pub fn compare_ranks(a: &HandRank, b: &HandRank) -> Ordering {
    a.value.cmp(&b.value)
}

/// Glue board and hole cards into the seven-card input.
pub fn seven_cards(board: &[Card], hole: &[Card]) -> Vec<Card> {
    let mut cards = Vec::with_capacity(7);
    cards.extend_from_slice(board);
    cards.extend_from_slice(hole);
    cards
}

/// Group the cards by rank, groups ordered by count then rank descending,
/// then flattened.  Paired categories read off the front of this order.
fn rank_grouped(cards: &[Card]) -> Vec<Vec<Card>> {
    let mut groups: HashMap<Rank, Vec<Card>> = HashMap::with_capacity(7);
    for &card in cards {
        groups.entry(card.rank).or_default().push(card);
    }
    let mut grouped: Vec<Vec<Card>> = groups.into_values().collect();
    grouped.sort_by(|a, b| {
        b.len()
            .cmp(&a.len())
            .then(b[0].rank.cmp(&a[0].rank))
    });
    grouped
}

/// Cards sorted by rank descending, ignoring grouping.
fn by_rank_desc(cards: &[Card]) -> Vec<Card> {
    let mut sorted = cards.to_vec();
    sorted.sort_by(|a, b| b.rank.cmp(&a.rank));
    sorted
}

/// At most one suit can hold five of seven cards.
fn find_flush(cards: &[Card]) -> Option<Vec<Card>> {
    let mut groups: HashMap<Suit, Vec<Card>> = HashMap::with_capacity(4);
    for &card in cards {
        groups.entry(card.suit).or_default().push(card);
    }
    groups
        .into_values()
        .find(|suited| suited.len() >= 5)
        .map(|suited| by_rank_desc(&suited))
}

/// The rank orders of the best straight among `cards`, highest card first.
/// The wheel comes out as `[5, 4, 3, 2, 14]`, so its value vector ranks as
/// 5-high.  No wrap-around straights beyond the wheel.
fn find_straight_orders(cards: &[Card]) -> Option<[u8; 5]> {
    let mut present = [false; 15];
    for card in cards {
        present[card.rank.order() as usize] = true;
    }
    for high in (6..=14u8).rev() {
        if (high - 4..=high).all(|o| present[o as usize]) {
            return Some([high, high - 1, high - 2, high - 3, high - 4]);
        }
    }
    if [5u8, 4, 3, 2].iter().all(|&o| present[o as usize]) && present[14] {
        return Some([5, 4, 3, 2, 14]);
    }
    None
}

/// One card per rank order, in order.  `cards` must contain each rank.
fn pick_by_orders(cards: &[Card], orders: &[u8]) -> Vec<Card> {
    orders
        .iter()
        .filter_map(|&o| cards.iter().find(|c| c.rank.order() == o).copied())
        .collect()
}

fn tag_value(picks: &[Card], category: Category) -> Vec<u8> {
    let mut value = Vec::with_capacity(6);
    value.push(category.order());
    value.extend(picks.iter().map(|c| c.rank.order()));
    value
}

fn make_rank(category: Category, picks: Vec<Card>) -> HandRank {
    let value = tag_value(&picks, category);
    HandRank {
        category,
        value,
        picks,
    }
}

/// Evaluate the best five of seven cards.
pub fn evaluate_cards(cards: &[Card]) -> HandRank {
    debug_assert_eq!(cards.len(), 7);

    let flush = find_flush(cards);

    // Straight flush, including the royal as its ace-high case
    if let Some(suited) = &flush {
        if let Some(orders) = find_straight_orders(suited) {
            let picks = pick_by_orders(suited, &orders);
            return make_rank(Category::StraightFlush, picks);
        }
    }

    let grouped = rank_grouped(cards);
    let flat: Vec<Card> = grouped.iter().flatten().copied().collect();
    let counts: Vec<usize> = grouped.iter().map(|g| g.len()).collect();

    // Four of a kind: quads plus the best remaining card
    if counts[0] == 4 {
        let mut picks = flat[..4].to_vec();
        picks.push(by_rank_desc(&flat[4..])[0]);
        return make_rank(Category::FourOfAKind, picks);
    }

    // Full house: grouped order already puts the best trip and pair first
    if counts[0] == 3 && counts.get(1).is_some_and(|&c| c >= 2) {
        return make_rank(Category::FullHouse, flat[..5].to_vec());
    }

    if let Some(suited) = flush {
        return make_rank(Category::Flush, suited[..5].to_vec());
    }

    if let Some(orders) = find_straight_orders(cards) {
        let picks = pick_by_orders(cards, &orders);
        return make_rank(Category::Straight, picks);
    }

    if counts[0] == 3 {
        let mut picks = flat[..3].to_vec();
        picks.extend(by_rank_desc(&flat[3..]).into_iter().take(2));
        return make_rank(Category::ThreeOfAKind, picks);
    }

    if counts[0] == 2 && counts.get(1) == Some(&2) {
        let mut picks = flat[..4].to_vec();
        picks.push(by_rank_desc(&flat[4..])[0]);
        return make_rank(Category::TwoPair, picks);
    }

    if counts[0] == 2 {
        let mut picks = flat[..2].to_vec();
        picks.extend(by_rank_desc(&flat[2..]).into_iter().take(3));
        return make_rank(Category::OnePair, picks);
    }

    make_rank(Category::HighCard, by_rank_desc(cards)[..5].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cards(text: &str) -> Vec<Card> {
        text.split_whitespace().map(|s| s.parse().unwrap()).collect()
    }

    fn eval(board: &str, hole: &str) -> HandRank {
        evaluate_cards(&seven_cards(&cards(board), &cards(hole)))
    }

    fn picks_text(rank: &HandRank) -> Vec<String> {
        rank.picks.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_flush() {
        let rank = eval("AD TD 7C 6D 5D", "2D 9H");
        assert_eq!(rank.category, Category::Flush);
        assert_eq!(picks_text(&rank), vec!["AD", "TD", "6D", "5D", "2D"]);
        assert_eq!(rank.value, vec![5, 14, 10, 6, 5, 2]);
    }

    #[test]
    fn test_straights() {
        // Two sixes still make only one best straight, nine high
        let rank = eval("AC 6D 7C 8D 9D", "5S 6H");
        assert_eq!(rank.category, Category::Straight);
        assert_eq!(rank.value, vec![4, 9, 8, 7, 6, 5]);

        // Ace-high straight wins over the board's trip kings
        let rank = eval("JC TD KC KS KH", "AS QH");
        assert_eq!(rank.category, Category::Straight);
        assert_eq!(rank.value, vec![4, 14, 13, 12, 11, 10]);

        // The wheel ranks as five high, beaten by any six-high straight
        let wheel = eval("5C 3D 2C AH 4D", "AS 7H");
        assert_eq!(wheel.category, Category::Straight);
        assert_eq!(wheel.value, vec![4, 5, 4, 3, 2, 14]);
        let six_high = eval("6C 5D 4C 3H 2D", "KS 9H");
        assert!(wheel < six_high);

        // No wrap-around past the wheel
        let rank = eval("KC QD AC 2H 3D", "9S 7H");
        assert_eq!(rank.category, Category::HighCard);
    }

    #[test]
    fn test_fullhouse() {
        let rank = eval("AC 7D 2C AH 4D", "AS 7H");
        assert_eq!(rank.category, Category::FullHouse);
        assert_eq!(rank.value, vec![6, 14, 14, 14, 7, 7]);
    }

    #[test]
    fn test_four_of_a_kind_uses_best_kicker() {
        let rank = eval("AC 7D AD AH 4D", "AS 7H");
        assert_eq!(rank.category, Category::FourOfAKind);
        // The remaining pair of sevens must not shadow the lone best card
        let rank = eval("AC QD AD AH QH", "AS KH");
        assert_eq!(rank.value, vec![7, 14, 14, 14, 14, 13]);
    }

    #[test]
    fn test_two_pair() {
        let rank = eval("QH QC KD 9D TC", "9C TD");
        assert_eq!(rank.category, Category::TwoPair);
        assert_eq!(rank.value, vec![2, 12, 12, 10, 10, 13]);

        let rank = eval("QH QC KD 9D TC", "9C AD");
        assert_eq!(rank.category, Category::TwoPair);
        assert_eq!(rank.value, vec![2, 12, 12, 9, 9, 14]);
    }

    #[test]
    fn test_royal_is_ace_high_straight_flush() {
        let rank = eval("KS KH JH JS TS", "AS QS");
        assert_eq!(rank.category, Category::StraightFlush);
        assert_eq!(picks_text(&rank), vec!["AS", "KS", "QS", "JS", "TS"]);
        assert_eq!(rank.value, vec![8, 14, 13, 12, 11, 10]);
    }

    #[test]
    fn test_steel_wheel() {
        let rank = eval("7H 6H 2H 3H 4H", "AH 5H");
        assert_eq!(rank.category, Category::StraightFlush);
        // 7-high straight flush beats the in-suit wheel
        assert_eq!(rank.value, vec![8, 7, 6, 5, 4, 3]);
    }

    #[test]
    fn test_trips_with_kickers() {
        let rank = eval("7D 6C 7S 7C TS", "AH 5H");
        assert_eq!(rank.category, Category::ThreeOfAKind);
        assert_eq!(rank.value, vec![3, 7, 7, 7, 14, 10]);
    }

    #[test]
    fn test_compare_hands() {
        let full_house = eval("7D 6C 6S 7C TS", "7H 5H");
        let two_pair = eval("7D 6C 6S 7C TS", "2S 8D");
        assert_eq!(full_house.category, Category::FullHouse);
        assert_eq!(two_pair.category, Category::TwoPair);
        assert_eq!(
            compare_ranks(&full_house, &two_pair),
            std::cmp::Ordering::Greater
        );

        // Same pair, same kickers, different suits: a split
        let a = eval("TS TH KS 8C 5D", "9D 4H");
        let b = eval("TS TH KS 8C 5D", "9H 4S");
        assert_eq!(a.category, Category::OnePair);
        assert_eq!(a.value, vec![1, 10, 10, 13, 9, 8]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_board_plays_for_everyone() {
        // Broadway on the board: hole cards cannot improve or break the tie
        let a = eval("AS KD QH JC TS", "2H 3C");
        let b = eval("AS KD QH JC TS", "9D 8C");
        assert_eq!(a.category, Category::Straight);
        assert_eq!(a, b);
    }
}
