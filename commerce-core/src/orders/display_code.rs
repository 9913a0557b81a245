//! Display code generation
//!
//! Human-facing order codes: family prefix + business date + random suffix,
//! e.g. `R260806-K7Q2`. Distinct from the internal numeric id. Collisions
//! are checked against the family's code index and regenerated a bounded
//! number of times.

use crate::core::error::{CoreError, CoreResult};
use chrono::NaiveDate;
use rand::Rng;

const SUFFIX_LEN: usize = 4;
/// 혼동 문자(0/O, 1/I/L) 제외
const ALPHABET: &[u8] = b"23456789ABCDEFGHJKMNPQRSTUVWXYZ";

fn random_suffix() -> String {
    let mut rng = rand::thread_rng();
    (0..SUFFIX_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// 코드 1개 생성 (충돌 검사 없음)
pub fn generate(prefix: char, date: NaiveDate) -> String {
    format!("{}{}-{}", prefix, date.format("%y%m%d"), random_suffix())
}

/// 충돌 검사를 통과할 때까지 생성 — 상한 초과 시 도메인 오류
pub fn generate_unique(
    prefix: char,
    date: NaiveDate,
    max_attempts: u32,
    taken: impl Fn(&str) -> bool,
) -> CoreResult<String> {
    for _ in 0..max_attempts.max(1) {
        let code = generate(prefix, date);
        if !taken(&code) {
            return Ok(code);
        }
    }
    Err(CoreError::domain("주문 코드 생성에 실패했습니다. 잠시 후 다시 시도해주세요"))
}
