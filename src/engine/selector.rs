// src/engine/selector.rs

//! Question drawing for quiz sessions.

use rand::Rng;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("question pool has {available} questions, {required} required")]
    InsufficientPool { available: usize, required: usize },
}

/// Unbiased in-place Fisher-Yates shuffle.
///
/// Walks from the back, swapping each slot with a uniformly chosen slot at or
/// before it, so every permutation is equally likely.
pub fn fisher_yates<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = rng.gen_range(0..=i);
        items.swap(i, j);
    }
}

/// Draws `sample_size` items from `pool` without replacement, in random order.
pub fn select_quiz_questions<T, R: Rng + ?Sized>(
    mut pool: Vec<T>,
    sample_size: usize,
    rng: &mut R,
) -> Result<Vec<T>, SelectionError> {
    if pool.len() < sample_size {
        return Err(SelectionError::InsufficientPool {
            available: pool.len(),
            required: sample_size,
        });
    }

    fisher_yates(&mut pool, rng);
    pool.truncate(sample_size);
    Ok(pool)
}

/// Presentation order for a question's options.
/// `order[presented_index] = stored_index`.
pub fn shuffle_option_order<R: Rng + ?Sized>(option_count: usize, rng: &mut R) -> Vec<usize> {
    let mut order: Vec<usize> = (0..option_count).collect();
    fisher_yates(&mut order, rng);
    order
}

/// Letter shown for the option at `presented_index` ("A", "B", ...).
pub fn option_letter(presented_index: usize) -> String {
    char::from_u32('A' as u32 + presented_index as u32)
        .map(String::from)
        .unwrap_or_default()
}

/// Maps a submitted letter back to the stored option index.
pub fn resolve_choice(order: &[usize], letter: &str) -> Option<usize> {
    let mut chars = letter.trim().chars();
    let c = chars.next()?.to_ascii_uppercase();
    if chars.next().is_some() || !c.is_ascii_uppercase() {
        return None;
    }
    order.get((c as u8 - b'A') as usize).copied()
}
