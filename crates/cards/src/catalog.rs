//! The 78-card tarot deck.

use serde::{Deserialize, Serialize};

/// Number of cards in the standard deck; valid ids are `0..DECK_SIZE`.
pub const DECK_SIZE: u8 = 78;

/// Major vs. minor arcana.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arcana {
    Major,
    Minor,
}

/// One catalog entry. Ids 0..=21 are the major arcana; 22..=77 run through
/// the four suits (Wands, Cups, Swords, Pentacles), Ace through King.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub card_id: u8,
    pub name: String,
    pub arcana: Arcana,
    pub keywords: Vec<String>,
    pub upright_meaning: String,
    pub reversed_meaning: String,
}

/// Major arcana names with their canonical keyword triples.
const MAJOR_ARCANA: [(&str, [&str; 3]); 22] = [
    ("The Fool", ["beginnings", "spontaneity", "faith"]),
    ("The Magician", ["willpower", "skill", "manifestation"]),
    ("The High Priestess", ["intuition", "mystery", "inner voice"]),
    ("The Empress", ["abundance", "nurturing", "creativity"]),
    ("The Emperor", ["structure", "authority", "stability"]),
    ("The Hierophant", ["tradition", "guidance", "belief"]),
    ("The Lovers", ["union", "choice", "harmony"]),
    ("The Chariot", ["determination", "control", "victory"]),
    ("Strength", ["courage", "patience", "compassion"]),
    ("The Hermit", ["introspection", "solitude", "wisdom"]),
    ("Wheel of Fortune", ["cycles", "destiny", "turning point"]),
    ("Justice", ["fairness", "truth", "accountability"]),
    ("The Hanged Man", ["surrender", "perspective", "pause"]),
    ("Death", ["endings", "transformation", "renewal"]),
    ("Temperance", ["balance", "moderation", "purpose"]),
    ("The Devil", ["attachment", "restriction", "shadow"]),
    ("The Tower", ["upheaval", "revelation", "release"]),
    ("The Star", ["hope", "healing", "inspiration"]),
    ("The Moon", ["illusion", "uncertainty", "dreams"]),
    ("The Sun", ["joy", "vitality", "success"]),
    ("Judgement", ["awakening", "reckoning", "absolution"]),
    ("The World", ["completion", "integration", "fulfilment"]),
];

const SUITS: [(&str, &str); 4] = [
    ("Wands", "ambition and creative fire"),
    ("Cups", "emotion and relationships"),
    ("Swords", "thought and conflict"),
    ("Pentacles", "work and material matters"),
];

const RANKS: [&str; 14] = [
    "Ace", "Two", "Three", "Four", "Five", "Six", "Seven", "Eight", "Nine", "Ten", "Page",
    "Knight", "Queen", "King",
];

/// Immutable deck, built once at startup.
#[derive(Debug, Clone)]
pub struct CardCatalog {
    cards: Vec<Card>,
}

impl CardCatalog {
    /// Build the standard 78-card deck.
    pub fn standard() -> Self {
        let mut cards = Vec::with_capacity(DECK_SIZE as usize);

        for (i, (name, keywords)) in MAJOR_ARCANA.iter().enumerate() {
            let keywords: Vec<String> = keywords.iter().map(|k| k.to_string()).collect();
            cards.push(Card {
                card_id: i as u8,
                name: name.to_string(),
                arcana: Arcana::Major,
                upright_meaning: format!("{name} speaks of {}.", keywords.join(", ")),
                reversed_meaning: format!(
                    "Reversed, {name} warns of {} turned inward or resisted.",
                    keywords[0]
                ),
                keywords,
            });
        }

        let mut id = MAJOR_ARCANA.len() as u8;
        for (suit, theme) in SUITS {
            for rank in RANKS {
                let name = format!("{rank} of {suit}");
                let keywords = vec![
                    theme.split(" and ").next().unwrap_or(theme).to_string(),
                    rank.to_lowercase(),
                ];
                cards.push(Card {
                    card_id: id,
                    name: name.clone(),
                    arcana: Arcana::Minor,
                    upright_meaning: format!("The {name} concerns {theme}."),
                    reversed_meaning: format!(
                        "Reversed, the {name} points to blocked or excessive {theme}."
                    ),
                    keywords,
                });
                id += 1;
            }
        }

        Self { cards }
    }

    pub fn get(&self, card_id: u8) -> Option<&Card> {
        self.cards.get(card_id as usize)
    }

    pub fn contains(&self, card_id: u8) -> bool {
        (card_id as usize) < self.cards.len()
    }

    pub fn all(&self) -> &[Card] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

impl Default for CardCatalog {
    fn default() -> Self {
        Self::standard()
    }
}
