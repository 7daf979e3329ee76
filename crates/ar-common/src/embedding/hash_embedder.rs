use super::{EncodingError, TextEmbedder, similarity::l2_normalize, tokenizer};
use siphasher::sip::SipHasher13;
use std::hash::{Hash, Hasher};

/// 固定 seed（決定論的 hash のため）
/// ⚠️ この値を変更すると全 embedding が変わる → version() を上げること
const HASH_SEED_K0: u64 = 0x0123_4567_89ab_cdef;
const HASH_SEED_K1: u64 = 0xfedc_ba98_7654_3210;

/// Feature Hashing を用いた決定論的 embedder
///
/// - 学習不要（固定ハッシュ関数）
/// - O(n) where n = token count
/// - SipHash13 + 固定 seed で Rust バージョン間の安定性を保証
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn hash_token(&self, token: &str) -> u64 {
        let mut hasher = SipHasher13::new_with_keys(HASH_SEED_K0, HASH_SEED_K1);
        token.hash(&mut hasher);
        hasher.finish()
    }

    fn bucket(&self, token: &str) -> usize {
        (self.hash_token(token) % self.dimension as u64) as usize
    }
}

impl TextEmbedder for HashEmbedder {
    fn name(&self) -> &'static str {
        "hash"
    }

    fn version(&self) -> &str {
        // トークン設計やハッシュ関数が変わったらバージョンを上げる
        "v1"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EncodingError> {
        let mut vector = vec![0.0f32; self.dimension];

        for wt in tokenizer::tokenize_text(text) {
            let idx = self.bucket(&wt.token);
            // Sign hashing: 偶数ハッシュ → +weight, 奇数ハッシュ → -weight
            let sign = if self.hash_token(&format!("{}_sign", wt.token)) % 2 == 0 {
                1.0
            } else {
                -1.0
            };
            vector[idx] += sign * wt.weight;
        }

        // sign hashing で打ち消し合うと、空でないテキストでもゼロベクトルになりうる
        l2_normalize(&mut vector)?;
        Ok(vector)
    }
}
