use std::cmp::Ordering;
use std::fmt;

use itertools::Itertools;
use once_cell::sync::Lazy;

use crate::cards::Card;
use crate::error::{CfrError, CfrResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HandCategory {
    HighCard = 0,
    OnePair = 1,
    TwoPair = 2,
    ThreeOfAKind = 3,
    Straight = 4,
    Flush = 5,
    FullHouse = 6,
    FourOfAKind = 7,
    StraightFlush = 8,
    RoyalFlush = 9,
}

impl HandCategory {
    fn from_bits(bits: u32) -> HandCategory {
        match bits {
            0 => HandCategory::HighCard,
            1 => HandCategory::OnePair,
            2 => HandCategory::TwoPair,
            3 => HandCategory::ThreeOfAKind,
            4 => HandCategory::Straight,
            5 => HandCategory::Flush,
            6 => HandCategory::FullHouse,
            7 => HandCategory::FourOfAKind,
            8 => HandCategory::StraightFlush,
            _ => HandCategory::RoyalFlush,
        }
    }
}

impl fmt::Display for HandCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandCategory::HighCard => write!(f, "High Card"),
            HandCategory::OnePair => write!(f, "One Pair"),
            HandCategory::TwoPair => write!(f, "Two Pair"),
            HandCategory::ThreeOfAKind => write!(f, "Three of a Kind"),
            HandCategory::Straight => write!(f, "Straight"),
            HandCategory::Flush => write!(f, "Flush"),
            HandCategory::FullHouse => write!(f, "Full House"),
            HandCategory::FourOfAKind => write!(f, "Four of a Kind"),
            HandCategory::StraightFlush => write!(f, "Straight Flush"),
            HandCategory::RoyalFlush => write!(f, "Royal Flush"),
        }
    }
}

/// Packed, totally ordered hand score.
///
/// Bits 20..24 hold the category, then up to five 4-bit kicker values in
/// decreasing significance. Two hands split the pot iff their ranks are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandRank(u32);

impl HandRank {
    fn pack(category: HandCategory, kickers: &[u8]) -> HandRank {
        let mut score = (category as u32) << 20;
        for (i, &k) in kickers.iter().take(5).enumerate() {
            score |= (k as u32) << (16 - 4 * i);
        }
        HandRank(score)
    }

    pub fn category(self) -> HandCategory {
        HandCategory::from_bits(self.0 >> 20)
    }

    /// Kicker values, most significant first. Unused slots are zero.
    pub fn kickers(self) -> [u8; 5] {
        let mut out = [0u8; 5];
        for (i, k) in out.iter_mut().enumerate() {
            *k = ((self.0 >> (16 - 4 * i)) & 0xF) as u8;
        }
        out
    }
}

impl fmt::Display for HandRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.category())
    }
}

/// Index sets for every 5-card subset of 7 cards.
static SEVEN_CARD_COMBOS: Lazy<Vec<[usize; 5]>> = Lazy::new(|| {
    (0..7)
        .combinations(5)
        .map(|c| [c[0], c[1], c[2], c[3], c[4]])
        .collect()
});

fn straight_high(values_desc: &[u8; 5]) -> Option<u8> {
    let distinct = values_desc.windows(2).all(|w| w[0] != w[1]);
    if !distinct {
        return None;
    }
    if values_desc[0] - values_desc[4] == 4 {
        return Some(values_desc[0]);
    }
    // Wheel: A-2-3-4-5
    if *values_desc == [14, 5, 4, 3, 2] {
        return Some(5);
    }
    None
}

fn evaluate_five(cards: &[Card; 5]) -> HandRank {
    let mut values = [0u8; 5];
    for (v, c) in values.iter_mut().zip(cards.iter()) {
        *v = c.value();
    }
    values.sort_unstable_by(|a, b| b.cmp(a));

    let flush = cards.windows(2).all(|w| w[0].suit == w[1].suit);
    let straight = straight_high(&values);

    if let (true, Some(high)) = (flush, straight) {
        let category = if high == 14 {
            HandCategory::RoyalFlush
        } else {
            HandCategory::StraightFlush
        };
        return HandRank::pack(category, &[high]);
    }

    let mut counts = [0u8; 15];
    for &v in &values {
        counts[v as usize] += 1;
    }

    // (count, value) sorted by count desc, then value desc. This is also the
    // kicker order for every non-straight category.
    let mut groups = [(0u8, 0u8); 5];
    let mut n = 0;
    for v in (2..=14u8).rev() {
        if counts[v as usize] > 0 {
            groups[n] = (counts[v as usize], v);
            n += 1;
        }
    }
    let groups = &mut groups[..n];
    groups.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));

    let mut kickers = [0u8; 5];
    for (k, g) in kickers.iter_mut().zip(groups.iter()) {
        *k = g.1;
    }
    let kickers = &kickers[..n];

    let category = match (groups[0].0, groups.get(1).map(|g| g.0)) {
        (4, _) => HandCategory::FourOfAKind,
        (3, Some(2)) => HandCategory::FullHouse,
        _ if flush => return HandRank::pack(HandCategory::Flush, &values),
        _ if straight.is_some() => {
            return HandRank::pack(HandCategory::Straight, &[straight.unwrap_or(0)])
        }
        (3, _) => HandCategory::ThreeOfAKind,
        (2, Some(2)) => HandCategory::TwoPair,
        (2, _) => HandCategory::OnePair,
        _ => HandCategory::HighCard,
    };

    HandRank::pack(category, kickers)
}

/// Best 5-card hand over `hole_cards ∪ board` (5 to 7 cards total).
pub fn evaluate_hand(hole_cards: &[Card], board: &[Card]) -> CfrResult<HandRank> {
    let mut all_cards: Vec<Card> = Vec::with_capacity(hole_cards.len() + board.len());
    all_cards.extend_from_slice(hole_cards);
    all_cards.extend_from_slice(board);

    if all_cards.len() < 5 {
        return Err(CfrError::NotEnoughCards {
            need: 5,
            got: all_cards.len(),
        });
    }

    let best = if all_cards.len() == 7 {
        SEVEN_CARD_COMBOS
            .iter()
            .map(|idx| evaluate_five(&(*idx).map(|i| all_cards[i])))
            .max()
    } else {
        all_cards
            .iter()
            .combinations(5)
            .map(|c| evaluate_five(&[*c[0], *c[1], *c[2], *c[3], *c[4]]))
            .max()
    };

    best.ok_or(CfrError::NotEnoughCards {
        need: 5,
        got: all_cards.len(),
    })
}

/// `Greater` if hand1 wins, `Less` if hand2 wins, `Equal` on a split.
pub fn compare_hands(hand1: &[Card], hand2: &[Card], board: &[Card]) -> CfrResult<Ordering> {
    let r1 = evaluate_hand(hand1, board)?;
    let r2 = evaluate_hand(hand2, board)?;
    Ok(r1.cmp(&r2))
}
