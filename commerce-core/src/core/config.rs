//! Core configuration
//!
//! # 환경 변수
//!
//! 모든 설정은 환경 변수로 덮어쓸 수 있다:
//!
//! | 환경 변수 | 기본값 | 설명 |
//! |-----------|--------|------|
//! | LOCK_TIMEOUT_MS | 3000 | 행 잠금 대기 한도 (밀리초) |
//! | RETRY_MAX_ATTEMPTS | 3 | 스위프 재시도 최대 횟수 |
//! | RETRY_BASE_DELAY_MS | 200 | 재시도 백오프 기본 지연 |
//! | PAYMENT_GRACE_MS | 120000 | 결제 대기 유예 시간 (2분) |
//! | PAYMENT_SWEEP_INTERVAL_MS | 60000 | 결제 정산 스위프 주기 |
//! | DELIVERY_SLA_MS | 5400000 | 배달 자동완료 SLA (90분) |
//! | DELIVERY_SWEEP_INTERVAL_MS | 300000 | 배달 자동완료 스위프 주기 |
//! | NO_SHOW_SWEEP_INTERVAL_MS | 3600000 | 노쇼 정리 스위프 주기 |
//! | BUSINESS_TZ | Asia/Seoul | 영업 시간대 |

use chrono_tz::Tz;

/// 코어 설정 — 잠금/유예/스위프 주기 등 모든 시간 상수
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// 행 잠금 획득 대기 한도 (밀리초)
    pub lock_timeout_ms: u64,
    /// 스위프 재시도 최대 횟수
    pub retry_max_attempts: u32,
    /// 재시도 백오프 기본 지연 (밀리초, 지수 증가 + 지터)
    pub retry_base_delay_ms: u64,
    /// PG 거래 발급 후 정산 스위프가 개입하기까지의 유예 (밀리초)
    pub payment_grace_ms: i64,
    /// 결제 정산 스위프 주기 (밀리초)
    pub payment_sweep_interval_ms: u64,
    /// 배달 수락 후 자동완료 처리 SLA (밀리초)
    pub delivery_sla_ms: i64,
    /// 배달 자동완료 스위프 주기 (밀리초)
    pub delivery_sweep_interval_ms: u64,
    /// 노쇼 정리 스위프 주기 (밀리초) — 본문이 날짜 기준이라 중복 실행 무해
    pub no_show_sweep_interval_ms: u64,
    /// 주문 코드 생성 충돌 재시도 한도
    pub display_code_max_attempts: u32,
    /// 영업 시간대
    pub timezone: Tz,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl CoreConfig {
    /// 환경 변수에서 설정 로드 (미설정 시 기본값)
    pub fn from_env() -> Self {
        let timezone = std::env::var("BUSINESS_TZ")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(chrono_tz::Asia::Seoul);
        Self {
            lock_timeout_ms: env_parse("LOCK_TIMEOUT_MS", 3_000),
            retry_max_attempts: env_parse("RETRY_MAX_ATTEMPTS", 3),
            retry_base_delay_ms: env_parse("RETRY_BASE_DELAY_MS", 200),
            payment_grace_ms: env_parse("PAYMENT_GRACE_MS", 120_000),
            payment_sweep_interval_ms: env_parse("PAYMENT_SWEEP_INTERVAL_MS", 60_000),
            delivery_sla_ms: env_parse("DELIVERY_SLA_MS", 90 * 60 * 1_000),
            delivery_sweep_interval_ms: env_parse("DELIVERY_SWEEP_INTERVAL_MS", 300_000),
            no_show_sweep_interval_ms: env_parse("NO_SHOW_SWEEP_INTERVAL_MS", 3_600_000),
            display_code_max_attempts: env_parse("DISPLAY_CODE_MAX_ATTEMPTS", 5),
            timezone,
        }
    }

    /// 테스트용 짧은 타임아웃 설정
    pub fn for_tests() -> Self {
        Self {
            lock_timeout_ms: 500,
            retry_max_attempts: 3,
            retry_base_delay_ms: 10,
            payment_grace_ms: 120_000,
            payment_sweep_interval_ms: 60_000,
            delivery_sla_ms: 90 * 60 * 1_000,
            delivery_sweep_interval_ms: 300_000,
            no_show_sweep_interval_ms: 3_600_000,
            display_code_max_attempts: 5,
            timezone: chrono_tz::Asia::Seoul,
        }
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
