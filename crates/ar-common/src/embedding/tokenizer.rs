/// 重み付き特徴トークン
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedToken {
    pub token: String,
    pub weight: f32,
}

impl WeightedToken {
    pub fn new(token: impl Into<String>, weight: f32) -> Self {
        Self {
            token: token.into(),
            weight,
        }
    }
}

const WORD_WEIGHT: f32 = 1.0;
const TRIGRAM_WEIGHT: f32 = 0.5;

/// 英数字以外を区切りとして小文字の単語に分割する
pub fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect()
}

/// トークン形式
/// - w:<word>     (単語 - weight 1.0)
/// - c:<trigram>  (文字 trigram、語境界 `#` 付き - weight 0.5)
///
/// trigram により語形変化（"analyst" / "analysis"）が特徴を共有する
pub fn tokenize_text(text: &str) -> Vec<WeightedToken> {
    let mut tokens = Vec::new();

    for word in words(text) {
        let padded: Vec<char> = format!("#{word}#").chars().collect();
        for window in padded.windows(3) {
            let trigram: String = window.iter().collect();
            tokens.push(WeightedToken::new(format!("c:{trigram}"), TRIGRAM_WEIGHT));
        }
        tokens.push(WeightedToken::new(format!("w:{word}"), WORD_WEIGHT));
    }

    tokens
}
