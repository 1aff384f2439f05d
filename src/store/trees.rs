/// Sled tree 名称常量。
///
/// 修改 tree 名称会导致已有数据不可访问，请勿随意更改。
/// 索引 tree 统一使用 `idx_` 前缀。

pub const LEMMAS: &str = "lemmas";
pub const ROOTS: &str = "roots";
pub const SENTENCES: &str = "sentences";
pub const SENTENCE_WORDS: &str = "sentence_words";
pub const KNOWLEDGE: &str = "knowledge";
pub const REVIEW_LOGS: &str = "review_logs";
pub const SENTENCE_REVIEW_LOGS: &str = "sentence_review_logs";
pub const GRAMMAR_FEATURES: &str = "grammar_features";
pub const GRAMMAR_EXPOSURE: &str = "grammar_exposure";
pub const INTERACTIONS: &str = "interactions";

// Secondary index trees
pub const SENTENCE_WORDS_BY_LEMMA: &str = "idx_sentence_words_by_lemma";
pub const REVIEWS_BY_LEMMA: &str = "idx_reviews_by_lemma";
pub const REVIEW_CLIENT_IDS: &str = "idx_review_client_ids";
pub const SENTENCE_REVIEW_CLIENT_IDS: &str = "idx_sentence_review_client_ids";
