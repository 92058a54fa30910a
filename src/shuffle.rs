//! Per-participant answer shuffling
//!
//! Every participant receives the answer options of a question in their own
//! random order. The shuffle keeps track of where the correct answer ends up
//! so that a participant's numeric response can be checked later.

use super::{question::Question, round::ParticipantRound};

/// Shuffles `answers` uniformly and returns the new position of the tracked answer
///
/// This is a Fisher-Yates shuffle over all positions. Whenever a swap touches
/// the slot holding the tracked answer, the returned index follows it.
///
/// # Arguments
///
/// * `answers` - The answers to permute
/// * `correct_index` - Position of the answer to track before shuffling
/// * `rng` - Random source, seeded in tests for reproducible permutations
///
/// # Returns
///
/// The permuted answers and the tracked answer's new position
pub fn shuffle(
    mut answers: Vec<String>,
    mut correct_index: usize,
    rng: &mut fastrand::Rng,
) -> (Vec<String>, usize) {
    for i in (1..answers.len()).rev() {
        let j = rng.usize(..=i);
        answers.swap(i, j);
        if correct_index == i {
            correct_index = j;
        } else if correct_index == j {
            correct_index = i;
        }
    }

    (answers, correct_index)
}

/// Deals a question to one participant
///
/// The correct answer is appended after the incorrect answers and the whole
/// list is shuffled.
pub fn deal(question: &Question, rng: &mut fastrand::Rng) -> ParticipantRound {
    let mut answers = question.incorrect_answers.clone();
    answers.push(question.correct_answer.clone());
    let correct_index = answers.len() - 1;

    let (answers, correct_index) = shuffle(answers, correct_index, rng);
    ParticipantRound::new(answers, correct_index)
}
