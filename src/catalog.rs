//! Fact catalog boundary: read-only content pools consumed by the dealer.
//!
//! The curation pipeline that produces the full catalog lives outside this
//! process; the engine only sees the [`FactCatalog`] trait. The built-in
//! [`SeedCatalog`] carries a small bilingual deck so the server is playable
//! without external data.

use serde_json::json;

use crate::types::{FactCard, FactDeck, FactKind, GameId, GameSummary, Language};

/// Read-only fact source, shared freely across rooms.
pub trait FactCatalog: Send + Sync {
    fn deck(&self, game_id: GameId, language: Language) -> FactDeck;
}

/// Static game registry.
pub fn list_games() -> Vec<GameSummary> {
    vec![
        GameSummary {
            id: GameId::FactOrFake,
            title: "Fact or Fake",
            description: "Find the player with fake information before votes are locked.",
            min_players: 3,
            max_imposters: 3,
            supports_imposters: true,
            has_discussion: true,
            fact_count: SEED_PAIRS.len() * 2,
        },
        GameSummary {
            id: GameId::TrueOrFalse,
            title: "True or False",
            description: "Everyone sees the same claim. Call it true or false.",
            min_players: 2,
            max_imposters: 0,
            supports_imposters: false,
            has_discussion: false,
            fact_count: SEED_PAIRS.len() * 2,
        },
    ]
}

pub fn game_summary(game_id: GameId) -> GameSummary {
    list_games()
        .into_iter()
        .find(|game| game.id == game_id)
        .expect("every GameId variant is registered")
}

struct SeedPair {
    id: &'static str,
    category: (&'static str, &'static str),
    real: (&'static str, &'static str),
    fake: (&'static str, &'static str),
}

/// (en, ru) pairs; the fake's correction is the paired real fact.
const SEED_PAIRS: &[SeedPair] = &[
    SeedPair {
        id: "ff-001",
        category: ("Nature", "Природа"),
        real: (
            "Octopuses have three hearts and blue blood.",
            "У осьминога три сердца и голубая кровь.",
        ),
        fake: (
            "Octopuses can survive two weeks out of water by storing oxygen in their tentacles.",
            "Осьминог может прожить две недели без воды благодаря запасу кислорода в щупальцах.",
        ),
    },
    SeedPair {
        id: "ff-002",
        category: ("History", "История"),
        real: (
            "The shortest war in history lasted about 38 minutes.",
            "Самая короткая война в истории длилась около 38 минут.",
        ),
        fake: (
            "Napoleon once sold the Eiffel Tower to fund a military campaign.",
            "Наполеон продал Эйфелеву башню, чтобы финансировать военную кампанию.",
        ),
    },
    SeedPair {
        id: "ff-003",
        category: ("Space", "Космос"),
        real: (
            "A day on Venus is longer than a year on Venus.",
            "Сутки на Венере длиннее, чем год на Венере.",
        ),
        fake: (
            "The Moon has active volcanoes that erupt every decade.",
            "На Луне есть действующие вулканы, которые извергаются каждые 10 лет.",
        ),
    },
    SeedPair {
        id: "ff-004",
        category: ("Animals", "Животные"),
        real: (
            "Wombat poop is cube-shaped.",
            "Помет вомбата имеет форму кубиков.",
        ),
        fake: (
            "Penguins can identify their own egg by color pattern alone.",
            "Пингвины узнают свое яйцо только по цветному узору скорлупы.",
        ),
    },
    SeedPair {
        id: "ff-005",
        category: ("Human Body", "Тело человека"),
        real: (
            "Your stomach gets a new lining every few days.",
            "Слизистая желудка полностью обновляется каждые несколько дней.",
        ),
        fake: (
            "Humans grow a completely new skeleton every seven years.",
            "Скелет человека полностью заменяется каждые семь лет.",
        ),
    },
    SeedPair {
        id: "ff-006",
        category: ("Food", "Еда"),
        real: (
            "Honey found in ancient tombs was still edible after thousands of years.",
            "Мед из древних гробниц оставался съедобным спустя тысячи лет.",
        ),
        fake: (
            "Bananas are naturally radioactive enough to set off airport scanners.",
            "Бананы настолько радиоактивны, что срабатывают сканеры в аэропортах.",
        ),
    },
    SeedPair {
        id: "ff-007",
        category: ("Geography", "География"),
        real: (
            "Canada has more lakes than the rest of the world combined.",
            "В Канаде больше озер, чем во всех остальных странах вместе.",
        ),
        fake: (
            "The Sahara desert crosses the equator at its southern tip.",
            "Сахара пересекает экватор своей южной оконечностью.",
        ),
    },
    SeedPair {
        id: "ff-008",
        category: ("Nature", "Природа"),
        real: (
            "Sharks existed before trees appeared on Earth.",
            "Акулы появились на Земле раньше деревьев.",
        ),
        fake: (
            "Coral reefs glow at night to attract plankton.",
            "Коралловые рифы светятся ночью, чтобы приманивать планктон.",
        ),
    },
    SeedPair {
        id: "ff-009",
        category: ("History", "История"),
        real: (
            "Oxford University is older than the Aztec Empire.",
            "Оксфордский университет старше империи ацтеков.",
        ),
        fake: (
            "The Great Wall of China is visible from the surface of the Moon.",
            "Великая Китайская стена видна с поверхности Луны.",
        ),
    },
    SeedPair {
        id: "ff-010",
        category: ("Space", "Космос"),
        real: (
            "There are more stars in the universe than grains of sand on Earth.",
            "Звезд во Вселенной больше, чем песчинок на Земле.",
        ),
        fake: (
            "Mars appears red because its atmosphere is mostly iron vapor.",
            "Марс красный, потому что его атмосфера состоит из паров железа.",
        ),
    },
    SeedPair {
        id: "ff-011",
        category: ("Animals", "Животные"),
        real: (
            "A group of flamingos is called a flamboyance.",
            "Группа фламинго называется «флембойанс».",
        ),
        fake: (
            "Goldfish remember faces for up to ten years.",
            "Золотые рыбки помнят лица до десяти лет.",
        ),
    },
    SeedPair {
        id: "ff-012",
        category: ("Science", "Наука"),
        real: (
            "Hot water can freeze faster than cold water.",
            "Горячая вода может замерзнуть быстрее холодной.",
        ),
        fake: (
            "Lightning never strikes the same place twice.",
            "Молния никогда не бьет дважды в одно место.",
        ),
    },
    SeedPair {
        id: "ff-013",
        category: ("Human Body", "Тело человека"),
        real: (
            "Humans share about 60 percent of their DNA with bananas.",
            "ДНК человека примерно на 60 процентов совпадает с ДНК банана.",
        ),
        fake: (
            "Fingernails keep growing for weeks after death.",
            "Ногти продолжают расти несколько недель после смерти.",
        ),
    },
    SeedPair {
        id: "ff-014",
        category: ("Geography", "География"),
        real: (
            "Russia has a larger surface area than Pluto.",
            "Площадь России больше площади поверхности Плутона.",
        ),
        fake: (
            "Mount Everest grows about one meter taller every year.",
            "Эверест становится выше примерно на метр каждый год.",
        ),
    },
];

fn pick(text: (&'static str, &'static str), language: Language) -> &'static str {
    match language {
        Language::En => text.0,
        Language::Ru => text.1,
    }
}

fn seed_metadata() -> serde_json::Value {
    json!({
        "qualityTier": "curated",
        "sourceType": "manual_seed",
        "verificationStatus": "verified",
        "familyFriendly": true,
        "tags": ["seed"],
    })
}

/// Built-in deck; both games draw from the same pools.
#[derive(Default)]
pub struct SeedCatalog;

impl SeedCatalog {
    pub fn new() -> Self {
        Self
    }
}

impl FactCatalog for SeedCatalog {
    fn deck(&self, _game_id: GameId, language: Language) -> FactDeck {
        let mut deck = FactDeck::default();

        for pair in SEED_PAIRS {
            deck.real.push(FactCard {
                id: format!("{}-real", pair.id),
                category: pick(pair.category, language).to_string(),
                text: pick(pair.real, language).to_string(),
                kind: FactKind::Real,
                correction: None,
                metadata: seed_metadata(),
            });
            deck.fake.push(FactCard {
                id: format!("{}-fake", pair.id),
                category: pick(pair.category, language).to_string(),
                text: pick(pair.fake, language).to_string(),
                kind: FactKind::Fake,
                correction: Some(pick(pair.real, language).to_string()),
                metadata: seed_metadata(),
            });
        }

        deck
    }
}
