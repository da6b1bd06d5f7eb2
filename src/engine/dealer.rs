use rand::seq::{IndexedRandom, SliceRandom};
use rand::Rng;
use std::collections::{HashMap, HashSet};

use super::{mark_updated, RoomEngine};
use crate::catalog::game_summary;
use crate::error::{AppError, AppResult};
use crate::types::*;
use crate::util::conflict_key;

pub(crate) struct DealtRound {
    pub assignments: HashMap<PlayerId, Assignment>,
    pub used_fact_ids: HashSet<FactId>,
    pub correct_answer: Option<TrueFalseAnswer>,
}

fn assignment_from(card: &FactCard, role: PlayerRole) -> Assignment {
    Assignment {
        role,
        card: card.text.clone(),
        fact_id: card.id.clone(),
        category: card.category.clone(),
        fact_kind: card.kind,
        fact_correction: card.correction.clone(),
        fact_metadata: card.metadata.clone(),
    }
}

/// Normalized keys under which a card would collide with another card's
/// body text: its own text plus its correction, if any.
fn card_keys(text: &str, correction: Option<&str>) -> Vec<String> {
    let mut keys = vec![conflict_key(text)];
    if let Some(correction) = correction {
        keys.push(conflict_key(correction));
    }
    keys
}

fn collides(card: &FactCard, keys: &HashSet<String>) -> bool {
    card_keys(&card.text, card.correction.as_deref())
        .iter()
        .any(|key| keys.contains(key))
}

/// Draw `count` distinct cards, preferring ids outside the recent-use set;
/// falls back to recently used ids only when the fresh remainder cannot
/// cover the request.
fn draw<'a, R: Rng + ?Sized>(
    pool: &[&'a FactCard],
    used: &HashSet<FactId>,
    count: usize,
    rng: &mut R,
    what: &str,
) -> AppResult<Vec<&'a FactCard>> {
    if pool.len() < count {
        return Err(AppError::Capacity(format!(
            "Not enough {what} to deal this round."
        )));
    }

    let (mut fresh, mut stale): (Vec<&FactCard>, Vec<&FactCard>) = pool
        .iter()
        .copied()
        .partition(|card| !used.contains(&card.id));
    fresh.shuffle(rng);
    stale.shuffle(rng);
    fresh.extend(stale);
    fresh.truncate(count);

    Ok(fresh)
}

/// Imposter-mode dealing: K shuffled players get fake cards, the rest get
/// real cards that do not textually collide with the chosen fakes.
pub(crate) fn deal_imposter_round(
    deck: &FactDeck,
    player_ids: &[PlayerId],
    imposter_count: usize,
    previous_used: &HashSet<FactId>,
) -> AppResult<DealtRound> {
    let mut rng = rand::rng();

    let mut shuffled = player_ids.to_vec();
    shuffled.shuffle(&mut rng);

    let fake_pool: Vec<&FactCard> = deck.fake.iter().collect();
    let fakes = draw(&fake_pool, previous_used, imposter_count, &mut rng, "fake cards")?;

    let fake_keys: HashSet<String> = fakes
        .iter()
        .flat_map(|card| card_keys(&card.text, card.correction.as_deref()))
        .collect();

    let real_pool: Vec<&FactCard> = deck
        .real
        .iter()
        .filter(|card| !collides(card, &fake_keys))
        .collect();
    let truth_count = player_ids.len() - imposter_count;
    let reals = draw(
        &real_pool,
        previous_used,
        truth_count,
        &mut rng,
        "conflict-free real cards",
    )?;

    let mut assignments = HashMap::new();
    let mut used_fact_ids = previous_used.clone();

    for (index, player_id) in shuffled.iter().enumerate() {
        let (card, role) = if index < imposter_count {
            (fakes[index], PlayerRole::Imposter)
        } else {
            (reals[index - imposter_count], PlayerRole::Truth)
        };
        used_fact_ids.insert(card.id.clone());
        assignments.insert(player_id.clone(), assignment_from(card, role));
    }

    Ok(DealtRound {
        assignments,
        used_fact_ids,
        correct_answer: None,
    })
}

/// Binary-mode dealing: everyone sees the same card; the catalog-declared
/// kind determines the correct answer.
pub(crate) fn deal_shared_round(
    deck: &FactDeck,
    player_ids: &[PlayerId],
    previous_used: &HashSet<FactId>,
) -> AppResult<DealtRound> {
    let mut rng = rand::rng();

    let pool: Vec<&FactCard> = deck.real.iter().chain(deck.fake.iter()).collect();
    let card = draw(&pool, previous_used, 1, &mut rng, "cards")?[0];

    let correct_answer = match card.kind {
        FactKind::Real => TrueFalseAnswer::True,
        FactKind::Fake => TrueFalseAnswer::False,
    };

    let mut used_fact_ids = previous_used.clone();
    used_fact_ids.insert(card.id.clone());

    let assignments = player_ids
        .iter()
        .map(|player_id| (player_id.clone(), assignment_from(card, PlayerRole::Truth)))
        .collect();

    Ok(DealtRound {
        assignments,
        used_fact_ids,
        correct_answer: Some(correct_answer),
    })
}

impl RoomEngine {
    /// Replace the caller's own card with a conflict-free unused alternative
    /// of the same kind, up to the per-round limit.
    pub(crate) fn swap_card(&self, room: &mut RoomSnapshot, session_id: &str) -> AppResult<()> {
        if !game_summary(room.game_id).supports_imposters {
            return Err(AppError::Conflict(
                "Card swaps are not available in this game.".to_string(),
            ));
        }
        if room.phase != RoomPhase::Discussion {
            return Err(AppError::Conflict(
                "Cards can only be swapped during discussion.".to_string(),
            ));
        }

        let deck = self.deck(room);
        let round = room.round.as_mut().expect("discussion phase has a round");

        let swaps_used = round.swaps_used.get(session_id).copied().unwrap_or(0);
        if swaps_used >= SWAP_LIMIT_PER_ROUND {
            return Err(AppError::Conflict(
                "No swaps remaining this round.".to_string(),
            ));
        }

        let (kind, role) = {
            let assignment = round.assignments.get(session_id).ok_or_else(|| {
                AppError::Conflict("You have no card this round.".to_string())
            })?;
            (assignment.fact_kind, assignment.role)
        };

        // Keys from everyone else's current card, both body and correction.
        let other_keys: HashSet<String> = round
            .assignments
            .iter()
            .filter(|(player_id, _)| player_id.as_str() != session_id)
            .flat_map(|(_, assignment)| {
                card_keys(&assignment.card, assignment.fact_correction.as_deref())
            })
            .collect();

        let pool = match kind {
            FactKind::Real => &deck.real,
            FactKind::Fake => &deck.fake,
        };
        let candidates: Vec<&FactCard> = pool
            .iter()
            .filter(|card| !round.used_fact_ids.contains(&card.id))
            .filter(|card| !collides(card, &other_keys))
            .collect();

        let Some(card) = candidates.choose(&mut rand::rng()).copied() else {
            return Err(AppError::Conflict(
                "No compatible replacement card is available.".to_string(),
            ));
        };

        round.used_fact_ids.insert(card.id.clone());
        round
            .assignments
            .insert(session_id.to_string(), assignment_from(card, role));
        *round.swaps_used.entry(session_id.to_string()).or_insert(0) += 1;
        mark_updated(room);

        Ok(())
    }
}
