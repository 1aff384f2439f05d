pub fn lemma_key(lemma_id: &str) -> String {
    lemma_id.to_string()
}

pub fn root_key(root_id: &str) -> String {
    root_id.to_string()
}

pub fn sentence_key(sentence_id: &str) -> String {
    sentence_id.to_string()
}

/// 句子词按 (sentence_id, position) 排序，position 固定三位补零保证前缀扫描有序。
pub fn sentence_word_key(sentence_id: &str, position: usize) -> String {
    format!("{}:{:03}", sentence_id, position)
}

pub fn sentence_word_prefix(sentence_id: &str) -> String {
    format!("{}:", sentence_id)
}

pub fn sentence_words_by_lemma_key(lemma_id: &str, sentence_id: &str) -> String {
    format!("{}:{}", lemma_id, sentence_id)
}

pub fn sentence_words_by_lemma_prefix(lemma_id: &str) -> String {
    format!("{}:", lemma_id)
}

pub fn knowledge_key(lemma_id: &str) -> String {
    lemma_id.to_string()
}

pub fn review_log_key(reviewed_at_ms: i64, review_id: &str) -> String {
    let ts = reviewed_at_ms.max(0) as u64;
    let reverse_ts = u64::MAX - ts;
    format!("{:020}:{}", reverse_ts, review_id)
}

pub fn review_by_lemma_key(lemma_id: &str, reviewed_at_ms: i64, review_id: &str) -> String {
    let ts = reviewed_at_ms.max(0) as u64;
    let reverse_ts = u64::MAX - ts;
    format!("{}:{:020}:{}", lemma_id, reverse_ts, review_id)
}

pub fn review_by_lemma_prefix(lemma_id: &str) -> String {
    format!("{}:", lemma_id)
}

pub fn client_review_id_key(client_review_id: &str) -> String {
    client_review_id.to_string()
}

pub fn sentence_review_log_key(reviewed_at_ms: i64, review_id: &str) -> String {
    let ts = reviewed_at_ms.max(0) as u64;
    let reverse_ts = u64::MAX - ts;
    format!("{:020}:{}", reverse_ts, review_id)
}

pub fn grammar_feature_key(feature_key: &str) -> String {
    feature_key.to_string()
}

pub fn grammar_exposure_key(feature_key: &str) -> String {
    feature_key.to_string()
}

pub fn interaction_key(timestamp_ms: i64, event_id: &str) -> String {
    let ts = timestamp_ms.max(0) as u64;
    let reverse_ts = u64::MAX - ts;
    format!("{:020}:{}", reverse_ts, event_id)
}
