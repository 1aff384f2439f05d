/// 习得阶段 Box 1 间隔（小时）
pub const BOX_1_INTERVAL_HOURS: i64 = 4;

/// 习得阶段 Box 2 间隔（天）
pub const BOX_2_INTERVAL_DAYS: i64 = 1;

/// 习得阶段 Box 3 间隔（天）
pub const BOX_3_INTERVAL_DAYS: i64 = 3;

/// 毕业最少复习次数
pub const GRADUATION_MIN_REVIEWS: u32 = 5;

/// 毕业最低正确率
pub const GRADUATION_MIN_ACCURACY: f64 = 0.60;

/// 毕业要求的最少自然日跨度（UTC）
pub const GRADUATION_MIN_CALENDAR_DAYS: usize = 2;

/// FSRS 目标保持率
pub const DESIRED_RETENTION: f32 = 0.9;

/// learning → known 的稳定度阈值（天）
pub const KNOWN_STABILITY_DAYS: f32 = 21.0;

/// 每个词要求的最少活跃例句数
pub const MIN_SENTENCES_PER_WORD: usize = 2;

/// 活跃例句总量上限（advisory，并发 worker 可短暂超出）
pub const PIPELINE_CAP: usize = 300;

/// 每次会话最多重新介绍的词数
pub const MAX_REINTRO_PER_SESSION: usize = 3;

/// 判定 struggling 的最少复习次数
pub const STRUGGLING_MIN_SEEN: u32 = 3;

/// 每次会话最多推荐的新词数
pub const MAX_INTRO_PER_SESSION: usize = 2;

/// scaffold 词复习次数超过此基线后开始扣分
pub const FRESHNESS_BASELINE: f64 = 8.0;

/// 语法点混淆率阈值（达到即进入 refresher 列表）
pub const CONFUSION_RATE_THRESHOLD: f64 = 0.3;

/// 混淆率统计要求的最少出现次数
pub const MIN_SEEN_FOR_CONFUSION: u32 = 5;

/// 默认会话长度
pub const DEFAULT_SESSION_LIMIT: usize = 10;

/// 会话长度上限
pub const MAX_SESSION_LIMIT: usize = 20;
