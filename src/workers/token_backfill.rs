//! Heal legacy sentence-word rows whose lemma was unresolved when the
//! sentence was stored, typically words imported before their lemma entry
//! existed. The selector performs the same heal inline; this job sweeps the
//! whole table.

use crate::arabic::lookup::LemmaIndex;
use crate::store::Store;

pub async fn run(store: &Store) {
    let lemmas = match store.list_lemmas() {
        Ok(lemmas) => lemmas,
        Err(err) => {
            tracing::error!(error = %err, "Token backfill: listing lemmas failed");
            return;
        }
    };
    let index = LemmaIndex::build(&lemmas);

    let unmapped = match store.list_unmapped_sentence_words() {
        Ok(words) => words,
        Err(err) => {
            tracing::error!(error = %err, "Token backfill: listing unmapped words failed");
            return;
        }
    };

    let mut resolved = 0usize;
    for word in &unmapped {
        let Some(lemma_id) = index.resolve_surface(&word.surface_form) else {
            continue;
        };
        match store.set_sentence_word_lemma(&word.sentence_id, word.position, lemma_id) {
            Ok(()) => resolved += 1,
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    sentence_id = %word.sentence_id,
                    position = word.position,
                    "Token backfill: write failed"
                );
            }
        }
    }

    if resolved > 0 || !unmapped.is_empty() {
        tracing::info!(
            resolved,
            still_unmapped = unmapped.len() - resolved,
            "Token backfill complete"
        );
    }
}
