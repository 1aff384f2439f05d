pub mod grammar;
pub mod interactions;
pub mod knowledge;
pub mod lemmas;
pub mod review_logs;
pub mod sentence_reviews;
pub mod sentences;
